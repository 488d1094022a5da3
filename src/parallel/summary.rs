//! Aggregate statistics and the end-of-run report

use std::path::Path;
use std::time::Duration;
use console::style;
use serde::Serialize;

use crate::config::format_megabytes;
use crate::parallel::BatchOutcome;
use crate::processing::{Action, CompressionResult};

/// Totals derived from a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Sum of `original - new` over replaced files
    pub bytes_saved: u64,
    /// Original size of every processed file
    pub bytes_before: u64,
    /// Size on disk after the run
    pub bytes_after: u64,
    /// Jobs whose audit row could not be written
    pub audit_failures: usize,
}

impl BatchStats {
    /// Single pass over the results
    pub fn from_results(results: &[CompressionResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            stats.bytes_before += result.original_size;
            match result.action {
                Action::Replaced => {
                    stats.replaced += 1;
                    stats.bytes_saved += result.bytes_saved();
                    stats.bytes_after += result.new_size;
                }
                Action::Skipped => {
                    stats.skipped += 1;
                    stats.bytes_after += result.original_size;
                }
                Action::Failed => {
                    stats.failed += 1;
                    stats.bytes_after += result.original_size;
                }
            }
        }

        stats
    }

    pub fn with_audit_failures(mut self, audit_failures: usize) -> Self {
        self.audit_failures = audit_failures;
        self
    }

    /// Get size reduction percentage
    pub fn size_reduction(&self) -> f64 {
        if self.bytes_before == 0 {
            return 0.0;
        }
        (self.bytes_saved as f64 / self.bytes_before as f64) * 100.0
    }
}

/// Machine-readable run report
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub stats: &'a BatchStats,
    pub elapsed_seconds: f64,
    pub log_file: &'a Path,
    pub results: &'a [CompressionResult],
}

impl BatchOutcome {
    /// Build the JSON report for this outcome
    pub fn json_report<'a>(&'a self, log_file: &'a Path) -> JsonReport<'a> {
        JsonReport {
            stats: &self.stats,
            elapsed_seconds: self.elapsed.as_secs_f64(),
            log_file,
            results: &self.results,
        }
    }

    /// Print summary to console
    pub fn print_summary(&self, log_file: &Path) {
        let stats = &self.stats;

        println!();
        println!("{}", style("Compression Summary:").bold());
        println!("  {}: {}", style("Replaced").green(), stats.replaced);
        println!("  {}: {}", style("Skipped").yellow(), stats.skipped);
        if stats.failed > 0 {
            println!("  {}: {}", style("Failed").red(), stats.failed);
        } else {
            println!("  Failed: 0");
        }
        println!(
            "  {}: {} ({:.1}% of {})",
            style("Saved").cyan(),
            format_megabytes(stats.bytes_saved),
            stats.size_reduction(),
            format_megabytes(stats.bytes_before)
        );
        println!("  {}: {}", style("Duration").blue(), format_duration(self.elapsed));
        if stats.audit_failures > 0 {
            println!(
                "  {}: {} audit rows could not be written",
                style("Warning").red().bold(),
                stats.audit_failures
            );
        }
        println!("  Audit log: {}", log_file.display());

        let failures: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.action == Action::Failed)
            .collect();
        if !failures.is_empty() {
            println!("\nErrors:");
            for (i, result) in failures.iter().enumerate() {
                println!(
                    "  {}: {}: {}",
                    i + 1,
                    result.original_path.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

fn format_duration(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
