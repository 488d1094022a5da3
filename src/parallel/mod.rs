//! Bounded-concurrency dispatch of compression jobs

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::audit::{AuditLog, LogRecord};
use crate::config::RunConfig;
use crate::error::ImgSqueezeError;
use crate::processing::{CompressionResult, Compressor, ImageCodec, ImageJob};

pub mod progress;
pub mod summary;

pub use progress::*;
pub use summary::*;

/// Resolve the requested job concurrency.
///
/// Zero or negative means "auto": half the logical CPUs, at least one.
/// Requests are capped at the semaphore's permit limit.
pub fn resolve_concurrency(requested: i64) -> usize {
    if requested > 0 {
        return usize::try_from(requested)
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS);
    }
    (num_cpus::get() / 2).max(1)
}

/// Runs a fixed job list with at most `concurrency` jobs in flight
pub struct BatchCoordinator {
    compressor: Arc<Compressor>,
    max_width: u32,
    quality: u8,
    concurrency: usize,
    progress: Arc<ProgressTracker>,
}

/// Everything a finished batch produced
#[derive(Debug)]
pub struct BatchOutcome {
    /// `results[i]` belongs to `jobs[i]`
    pub results: Vec<CompressionResult>,
    pub stats: BatchStats,
    pub elapsed: Duration,
}

struct JobOutcome {
    result: CompressionResult,
    audited: bool,
}

impl BatchCoordinator {
    /// Create a coordinator; `concurrency` is clamped to `1..=Semaphore::MAX_PERMITS`
    pub fn new(max_width: u32, quality: u8, concurrency: usize) -> Self {
        let concurrency = concurrency.clamp(1, Semaphore::MAX_PERMITS);
        info!("Initializing batch coordinator with {} concurrent workers", concurrency);

        Self {
            compressor: Arc::new(Compressor::new()),
            max_width,
            quality,
            concurrency,
            progress: Arc::new(ProgressTracker::hidden()),
        }
    }

    /// Create a coordinator from validated run settings
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.max_width, config.quality, config.concurrency)
    }

    /// Use a custom codec for every job
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.compressor = Arc::new(Compressor::with_codec(codec));
        self
    }

    /// Report completions to the given tracker
    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every job and wait for all of them.
    ///
    /// Each job yields exactly one result, one audit row and one progress
    /// tick, whatever happens inside it.
    pub async fn run(&self, jobs: &[ImageJob], audit: &Arc<AuditLog>) -> BatchOutcome {
        let start_time = Instant::now();
        // Never more permits than jobs
        let semaphore = Arc::new(Semaphore::new(self.concurrency.min(jobs.len().max(1))));

        info!("Starting parallel processing of {} files", jobs.len());
        self.progress.start(jobs.len() as u64);

        let tasks: Vec<_> = jobs
            .iter()
            .cloned()
            .map(|job| {
                let semaphore = Arc::clone(&semaphore);
                let compressor = Arc::clone(&self.compressor);
                let audit = Arc::clone(audit);
                let progress = Arc::clone(&self.progress);
                let (max_width, quality) = (self.max_width, self.quality);

                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ImgSqueezeError::task(format!("admission closed: {}", e)))?;

                    tokio::task::spawn_blocking(move || {
                        run_job(&compressor, &job, max_width, quality, &audit, &progress)
                    })
                    .await
                    .map_err(|e| ImgSqueezeError::task(format!("worker join error: {}", e)))
                })
            })
            .collect();

        let joined = futures::future::join_all(tasks).await;

        let mut results = Vec::with_capacity(jobs.len());
        let mut audit_failures = 0;
        for (job, task_result) in jobs.iter().zip(joined) {
            let outcome = task_result
                .map_err(|e| ImgSqueezeError::task(format!("task join error: {}", e)))
                .and_then(|inner| inner);

            let (result, audited) = match outcome {
                Ok(JobOutcome { result, audited }) => (result, audited),
                Err(e) => {
                    // The job never reported back: account for it here
                    error!("Job for {:?} was lost: {}", job.path, e);
                    let result = CompressionResult::failed(&job.path, job.size, &e);
                    let audited = record_outcome(audit, &result, Duration::ZERO);
                    self.progress.advance(result.action);
                    (result, audited)
                }
            };

            if !audited {
                audit_failures += 1;
            }
            results.push(result);
        }

        self.progress.finish();
        let elapsed = start_time.elapsed();
        let stats = BatchStats::from_results(&results).with_audit_failures(audit_failures);

        info!(
            "Batch completed in {:.2}s: {} replaced, {} skipped, {} failed",
            elapsed.as_secs_f64(),
            stats.replaced,
            stats.skipped,
            stats.failed
        );

        BatchOutcome { results, stats, elapsed }
    }
}

/// Body of one admitted job, run on the blocking pool
fn run_job(
    compressor: &Compressor,
    job: &ImageJob,
    max_width: u32,
    quality: u8,
    audit: &AuditLog,
    progress: &ProgressTracker,
) -> JobOutcome {
    let started = Instant::now();
    debug!("Processing {:?}", job.path);

    let mut result = panic::catch_unwind(AssertUnwindSafe(|| {
        compressor.process(&job.path, max_width, quality)
    }))
    .unwrap_or_else(|payload| {
        let e = ImgSqueezeError::task(panic_message(payload.as_ref()));
        error!("Worker panicked on {:?}: {}", job.path, e);
        CompressionResult::failed(&job.path, job.size, &e)
    });
    result.original_path = job.path.clone();

    let audited = record_outcome(audit, &result, started.elapsed());
    progress.advance(result.action);

    JobOutcome { result, audited }
}

/// Write the audit row; a failure is reported but never fails the job
fn record_outcome(audit: &AuditLog, result: &CompressionResult, elapsed: Duration) -> bool {
    match audit.write(&LogRecord::from_result(result, elapsed)) {
        Ok(()) => true,
        Err(e) => {
            error!("Audit log write failed for {:?}: {}", result.original_path, e);
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
