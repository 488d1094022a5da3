//! imgsqueeze CLI - Bounded-Concurrency Batch Image Compressor
//!
//! Recompresses every JPEG and PNG under a directory in place, keeping a
//! new encoding only when it is smaller, and records each decision in a
//! rotating CSV audit log.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::{debug, info, warn};

use imgsqueeze::config::format_megabytes;
use imgsqueeze::{
    init_logging, scan_images, AuditLog, BatchCoordinator, BatchOutcome, BatchStats, Config,
    ConfigOverrides, ImageJob, ImgSqueezeError, ProgressTracker, RunConfig,
};

/// imgsqueeze - Batch Image Compressor
#[derive(Parser, Debug)]
#[command(
    name = "imgsqueeze",
    version,
    about = "Recompress JPEG and PNG images in place, keeping only smaller results",
    long_about = "imgsqueeze walks a directory tree and re-encodes every JPEG and PNG at the \
                  requested quality, downsampling images wider than --max-width. A file is \
                  overwritten only when the new encoding is strictly smaller, and every file \
                  gets a row in a size-rotated CSV audit log."
)]
struct Cli {
    /// Root directory to scan recursively
    #[arg(short, long, value_name = "PATH")]
    directory: Option<PathBuf>,

    /// Downsample images wider than this many pixels
    #[arg(short = 'w', long, value_name = "PIXELS")]
    max_width: Option<u32>,

    /// Encoder quality (1-100) [default: 75]
    #[arg(short, long, value_name = "QUALITY", allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Skip files smaller than this, e.g. 500K or 2M [default: 0]
    #[arg(short = 's', long, value_name = "SIZE")]
    min_size: Option<String>,

    /// Concurrent jobs, 0 for half the CPUs [default: 0]
    #[arg(short, long, value_name = "COUNT", allow_negative_numbers = true)]
    threads: Option<i64>,

    /// CSV audit log path [default: ./imgsqueeze.csv]
    #[arg(short, long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Rotate the audit log once it would reach this size [default: 10M]
    #[arg(long, value_name = "SIZE")]
    log_max_size: Option<String>,

    /// Configuration file (.toml or .yaml)
    #[arg(short, long, value_name = "FILE", env = "IMGSQUEEZE_CONFIG")]
    config: Option<PathBuf>,

    /// List the files that would be processed and exit
    #[arg(long)]
    dry_run: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            directory: self.directory.clone(),
            max_width: self.max_width,
            quality: self.quality,
            min_size: self.min_size.clone(),
            threads: self.threads,
            log_file: self.log_file.clone(),
            log_max_size: self.log_max_size.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", style("Error").red().bold(), e);
        if let Some(path) = e.downcast_ref::<ImgSqueezeError>().and_then(|err| err.file_path()) {
            eprintln!("  Path: {}", path.display());
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    if let Some(path) = &cli.config {
        info!("Loaded configuration from: {:?}", path);
    }

    let settings = RunConfig::resolve(&config, &cli.overrides())?;
    debug!("Resolved settings: {:?}", settings);

    let jobs = scan_images(&settings.directory, settings.min_size)?;
    let total_bytes: u64 = jobs.iter().map(|job| job.size).sum();
    info!(
        "Found {} images ({}) under {:?}",
        jobs.len(),
        format_megabytes(total_bytes),
        settings.directory
    );

    if cli.dry_run {
        print_dry_run(&jobs, total_bytes, cli.json)?;
        return Ok(());
    }

    if jobs.is_empty() {
        if cli.json {
            let outcome = BatchOutcome {
                results: Vec::new(),
                stats: BatchStats::default(),
                elapsed: Duration::ZERO,
            };
            println!("{}", serde_json::to_string_pretty(&outcome.json_report(&settings.log_file))?);
        } else if !cli.quiet {
            println!("No images found matching the criteria");
        }
        return Ok(());
    }

    if !cli.json && !cli.quiet {
        println!(
            "Compressing {} images ({}) with {} workers",
            style(jobs.len()).bold(),
            format_megabytes(total_bytes),
            settings.concurrency
        );
    }

    let audit = Arc::new(AuditLog::open(&settings.log_file, settings.log_max_size)?);
    audit
        .write_header()
        .with_context(|| format!("Failed to write audit log header to {}", settings.log_file.display()))?;

    let progress = if cli.json || cli.quiet {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::visible()
    };

    let coordinator = BatchCoordinator::from_config(&settings).with_progress(Arc::new(progress));
    let outcome = coordinator.run(&jobs, &audit).await;

    if let Err(e) = audit.close() {
        warn!("Failed to close audit log {:?}: {}", audit.path(), e);
    }
    if audit.rotations() > 0 {
        info!("Audit log {:?} rotated {} times", audit.path(), audit.rotations());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.json_report(audit.path()))?);
    } else if !cli.quiet {
        outcome.print_summary(audit.path());
    }

    Ok(())
}

fn print_dry_run(jobs: &[ImageJob], total_bytes: u64, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(jobs)?);
        return Ok(());
    }

    println!(
        "{} files would be processed ({}):",
        style(jobs.len()).bold(),
        format_megabytes(total_bytes)
    );
    for job in jobs {
        println!("  {} ({} bytes)", job.path.display(), job.size);
    }
    Ok(())
}
