//! Error types and handling for imgsqueeze

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgsqueeze operations
pub type Result<T> = std::result::Result<T, ImgSqueezeError>;

/// Main error type for imgsqueeze operations
#[derive(Debug, Error)]
pub enum ImgSqueezeError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Decode, resize or encode errors from the codec
    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File extension outside the supported codec families
    #[error("Unsupported image format: {extension} (file: {file:?})")]
    UnsupportedFormat {
        extension: String,
        file: Option<PathBuf>,
    },

    /// The scan root could not be walked
    #[error("Scan error in {root:?}: {message}")]
    ScanError { root: PathBuf, message: String },

    /// Audit log open, write or rotation failure
    #[error("Audit log error ({path:?}): {message}")]
    AuditLogError { path: PathBuf, message: String },

    /// CSV encoding errors
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// A job task panicked or could not be joined
    #[error("Task error: {message}")]
    TaskError { message: String },
}

impl ImgSqueezeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(extension: S, file: Option<PathBuf>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
            file,
        }
    }

    /// Create a new scan error
    pub fn scan<S: Into<String>>(root: PathBuf, message: S) -> Self {
        Self::ScanError {
            root,
            message: message.into(),
        }
    }

    /// Create a new audit log error
    pub fn audit_log<S: Into<String>>(path: PathBuf, message: S) -> Self {
        Self::AuditLogError {
            path,
            message: message.into(),
        }
    }

    /// Create a new task error
    pub fn task<S: Into<String>>(message: S) -> Self {
        Self::TaskError {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the run can continue)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Per-job failures are recorded and the batch carries on
            Self::IoError(_)
            | Self::ImageError(_)
            | Self::UnsupportedFormat { .. }
            | Self::TaskError { .. }
            | Self::CsvError(_) => true,

            // Rotation failures degrade to a missing audit row
            Self::AuditLogError { .. } => true,

            // These stop the run before any job is dispatched
            Self::ConfigError { .. }
            | Self::ScanError { .. }
            | Self::SerdeError(_) => false,
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::UnsupportedFormat { file, .. } => file.as_ref(),
            Self::ScanError { root, .. } => Some(root),
            Self::AuditLogError { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::IoError(e) => format!("File system error: {}", e),
            Self::ImageError(e) => format!("Image processing failed: {}", e),
            Self::UnsupportedFormat { extension, .. } => {
                let shown = if extension.is_empty() { "<none>" } else { extension.as_str() };
                format!(
                    "Unsupported image format: {}. Supported formats: JPEG, PNG",
                    shown
                )
            }
            Self::TaskError { message } => format!("Job aborted unexpectedly: {}", message),
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for ImgSqueezeError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for ImgSqueezeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for ImgSqueezeError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerdeError(format!("JSON error: {}", err))
    }
}
