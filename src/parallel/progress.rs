//! Progress tracking for parallel operations

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::processing::Action;

/// Thread-safe completion counter with an optional terminal bar.
///
/// Counters are atomics; the bar throttles its own redraws, so workers
/// never wait on rendering.
pub struct ProgressTracker {
    bar: ProgressBar,
    total: AtomicU64,
    completed: AtomicUsize,
    replaced: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub completed: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ProgressTracker {
    /// Tracker that draws a bar on stderr
    pub fn visible() -> Self {
        let bar = ProgressBar::new(0);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => debug!("Falling back to default progress style: {}", e),
        }
        Self::with_bar(bar)
    }

    /// Tracker that only counts
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            total: AtomicU64::new(0),
            completed: AtomicUsize::new(0),
            replaced: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Reset the counters for a batch of `total` jobs
    pub fn start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.replaced.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    /// Count one finished job
    pub fn advance(&self, action: Action) {
        let counter = match action {
            Action::Replaced => &self.replaced,
            Action::Skipped => &self.skipped,
            Action::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);

        self.bar.inc(1);
        if !self.bar.is_hidden() {
            self.bar.set_message(format!(
                "replaced {} / skipped {} / failed {}",
                self.replaced.load(Ordering::Relaxed),
                self.skipped.load(Ordering::Relaxed),
                self.failed.load(Ordering::Relaxed),
            ));
        }
    }

    /// Stop the bar, leaving the final state on screen
    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::hidden()
    }
}

impl ProgressSnapshot {
    /// Percentage of jobs finished
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}
