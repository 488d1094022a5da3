//! imgsqueeze - Bounded-Concurrency Batch Image Compressor
//!
//! Walks a directory tree, re-encodes every JPEG and PNG at a target
//! quality (downsampling anything wider than a maximum width), and
//! replaces the original only when the new encoding is strictly smaller.
//! Every file gets one row in a size-rotated CSV audit log.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use imgsqueeze::{AuditLog, BatchCoordinator, scan_images};
//!
//! # async fn demo() -> imgsqueeze::Result<()> {
//! let jobs = scan_images("photos", 100 * 1024)?;
//!
//! let audit = Arc::new(AuditLog::open("imgsqueeze.csv", 10 * 1024 * 1024)?);
//! audit.write_header()?;
//!
//! let outcome = BatchCoordinator::new(1920, 80, 4).run(&jobs, &audit).await;
//! audit.close()?;
//!
//! println!("saved {} bytes", outcome.stats.bytes_saved);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use audit::{AuditLog, LogRecord};
pub use config::{Config, ConfigOverrides, LoggingConfig, RunConfig};
pub use error::{Result, ImgSqueezeError};
pub use parallel::{BatchCoordinator, BatchOutcome, BatchStats, ProgressTracker};
pub use processing::{scan_images, Action, CompressionResult, Compressor, ImageJob};

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber.
///
/// Output goes to stderr so stdout stays clean for the summary and JSON
/// report. Calling this more than once is harmless; only the first
/// subscriber is kept.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        ImgSqueezeError::config(format!("Invalid log level {:?}: {}", config.level, e))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        debug!("imgsqueeze v{} logging initialized at {:?}", VERSION, config.level);
    }

    Ok(())
}
