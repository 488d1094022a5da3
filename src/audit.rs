//! Append-only CSV audit log with size-triggered rotation
//!
//! Every job produces one row. Writers on any thread share a single
//! [`AuditLog`]; each call holds the internal lock for the whole
//! check-rotate-write-flush sequence, so rows never interleave.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use chrono::{DateTime, Local, SecondsFormat};
use tracing::{debug, info, warn};

use crate::error::{Result, ImgSqueezeError};
use crate::processing::{Action, CompressionResult};

/// Column names written at the start of every run
pub const HEADER: [&str; 7] = [
    "timestamp",
    "file_path",
    "original_size",
    "processed_size",
    "action_taken",
    "processing_time",
    "status",
];

/// One audit row
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub file_path: PathBuf,
    pub original_size: u64,
    pub new_size: u64,
    pub action: Action,
    pub processing_time: Duration,
    pub status: String,
}

impl LogRecord {
    /// Build the row for a finished job, stamped with the current time
    pub fn from_result(result: &CompressionResult, processing_time: Duration) -> Self {
        Self {
            timestamp: Local::now(),
            file_path: result.original_path.clone(),
            original_size: result.original_size,
            new_size: result.new_size,
            action: result.action,
            processing_time,
            status: result.status(),
        }
    }

    fn to_row(&self) -> [String; 7] {
        [
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.file_path.to_string_lossy().into_owned(),
            self.original_size.to_string(),
            self.new_size.to_string(),
            self.action.as_str().to_string(),
            self.processing_time.as_millis().to_string(),
            self.status.clone(),
        ]
    }
}

/// Thread-safe rotating CSV sink
pub struct AuditLog {
    path: PathBuf,
    max_size: u64,
    file: Mutex<Option<File>>,
    rotations: AtomicUsize,
}

impl AuditLog {
    /// Open (or create) the log for appending.
    ///
    /// `max_size` is the rotation threshold in bytes.
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ImgSqueezeError::audit_log(path.clone(), e.to_string()))?;
        }
        let file = open_append(&path)?;

        info!("Audit log: {:?} (rotates at {} bytes)", path, max_size);

        Ok(Self {
            path,
            max_size,
            file: Mutex::new(Some(file)),
            rotations: AtomicUsize::new(0),
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rotations performed since opening
    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Write the column header row
    pub fn write_header(&self) -> Result<()> {
        self.write_row(&HEADER)
    }

    /// Append one record, rotating first if it would reach the threshold
    pub fn write(&self, record: &LogRecord) -> Result<()> {
        self.write_row(&record.to_row())
    }

    fn write_row<I, T>(&self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let encoded = encode_row(row)?;

        let mut guard = self
            .file
            .lock()
            .map_err(|_| ImgSqueezeError::audit_log(self.path.clone(), "log lock poisoned"))?;
        let file = guard
            .as_mut()
            .ok_or_else(|| ImgSqueezeError::audit_log(self.path.clone(), "log already closed"))?;

        let current = file.metadata()?.len();
        if current > 0 && current + encoded.len() as u64 >= self.max_size {
            self.rotate(&mut guard)?;
        }

        let file = guard
            .as_mut()
            .ok_or_else(|| ImgSqueezeError::audit_log(self.path.clone(), "log unavailable after rotation"))?;
        file.write_all(&encoded)?;
        file.flush()?;
        Ok(())
    }

    /// Move the full log aside and start a fresh one at the same path
    fn rotate(&self, slot: &mut Option<File>) -> Result<()> {
        if let Some(mut current) = slot.take() {
            current.flush()?;
        }

        let backup = self.backup_path();
        if let Err(e) = fs::rename(&self.path, &backup) {
            // Keep logging into the unrotated file
            *slot = open_append(&self.path).ok();
            return Err(ImgSqueezeError::audit_log(
                self.path.clone(),
                format!("rotation to {:?} failed: {}", backup, e),
            ));
        }

        *slot = Some(open_append(&self.path)?);
        self.rotations.fetch_add(1, Ordering::Relaxed);
        debug!("Rotated audit log to {:?}", backup);
        Ok(())
    }

    /// `<path>.<YYYYMMDD_HHMMSS>`, with a counter appended if that name is taken
    fn backup_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut base = OsString::from(self.path.as_os_str());
        base.push(".");
        base.push(&stamp);

        let mut candidate = PathBuf::from(&base);
        let mut counter = 1;
        while candidate.exists() {
            let mut name = base.clone();
            name.push(format!("_{}", counter));
            candidate = PathBuf::from(name);
            counter += 1;
        }
        candidate
    }

    /// Flush and release the file. Later writes fail; repeated calls are no-ops.
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| ImgSqueezeError::audit_log(self.path.clone(), "log lock poisoned"))?;
        if let Some(mut file) = guard.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close audit log {:?}: {}", self.path, e);
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ImgSqueezeError::audit_log(path.to_path_buf(), e.to_string()))
}

fn encode_row<I, T>(row: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(row)?;
    writer
        .into_inner()
        .map_err(|e| ImgSqueezeError::task(format!("CSV buffer error: {}", e)))
}
