//! Configuration management for imgsqueeze
//!
//! Settings come from an optional TOML/YAML file and from command-line
//! overrides. They are merged and validated once into an immutable
//! [`RunConfig`] that is handed to the rest of the pipeline.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, ImgSqueezeError};
use crate::parallel::resolve_concurrency;

pub mod size;
pub use size::*;

/// Default audit log location
pub const DEFAULT_LOG_FILE: &str = "./imgsqueeze.csv";

/// Default audit log rotation threshold
pub const DEFAULT_LOG_MAX_SIZE: &str = "10M";

/// Default encoder quality
pub const DEFAULT_QUALITY: i64 = 75;

/// Main configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to compress and how
    pub compression: CompressionConfig,

    /// Audit log settings
    pub audit: AuditConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Root directory to scan
    pub directory: Option<PathBuf>,

    /// Images wider than this are downsampled to exactly this width
    pub max_width: Option<u32>,

    /// Encoder quality (1-100)
    pub quality: i64,

    /// Minimum file size to consider, e.g. "500K"
    pub min_size: String,

    /// Concurrent jobs (0 or less = half the CPUs)
    pub threads: i64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_width: None,
            quality: DEFAULT_QUALITY,
            min_size: "0".to_string(),
            threads: 0,
        }
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// CSV file receiving one row per job
    pub log_file: PathBuf,

    /// Rotation threshold, e.g. "10M"
    pub max_size: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            max_size: DEFAULT_LOG_MAX_SIZE.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Values supplied on the command line; `Some` wins over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub directory: Option<PathBuf>,
    pub max_width: Option<u32>,
    pub quality: Option<i64>,
    pub min_size: Option<String>,
    pub threads: Option<i64>,
    pub log_file: Option<PathBuf>,
    pub log_max_size: Option<String>,
}

/// Validated, immutable settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub directory: PathBuf,
    pub max_width: u32,
    pub quality: u8,
    pub min_size: u64,
    pub concurrency: usize,
    pub log_file: PathBuf,
    pub log_max_size: u64,
}

impl RunConfig {
    /// Merge file settings with overrides and validate the result
    pub fn resolve(config: &Config, overrides: &ConfigOverrides) -> Result<Self> {
        let directory = overrides
            .directory
            .clone()
            .or_else(|| config.compression.directory.clone())
            .ok_or_else(|| ImgSqueezeError::config("--directory is required"))?;

        let max_width = overrides
            .max_width
            .or(config.compression.max_width)
            .filter(|width| *width > 0)
            .ok_or_else(|| ImgSqueezeError::config("--max-width is required and must be greater than 0"))?;

        let quality = overrides.quality.unwrap_or(config.compression.quality);
        if !(1..=100).contains(&quality) {
            return Err(ImgSqueezeError::config(format!(
                "--quality must be between 1 and 100 (got {})",
                quality
            )));
        }

        let min_size = parse_size(
            overrides
                .min_size
                .as_deref()
                .unwrap_or(&config.compression.min_size),
        );

        let threads = overrides.threads.unwrap_or(config.compression.threads);

        let log_file = overrides
            .log_file
            .clone()
            .unwrap_or_else(|| config.audit.log_file.clone());

        let log_max_size = parse_size(
            overrides
                .log_max_size
                .as_deref()
                .unwrap_or(&config.audit.max_size),
        );
        if log_max_size == 0 {
            return Err(ImgSqueezeError::config(
                "--log-max-size must be a positive size such as 512K or 10M",
            ));
        }

        Ok(Self {
            directory,
            max_width,
            quality: quality as u8,
            min_size,
            concurrency: resolve_concurrency(threads),
            log_file,
            log_max_size,
        })
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ImgSqueezeError::config(
                format!("Failed to read config file {:?}: {}", path.as_ref(), e)
            ))?;

        match extension_of(path.as_ref()).as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(ImgSqueezeError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match extension_of(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| ImgSqueezeError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            _ => return Err(ImgSqueezeError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        };

        std::fs::write(&path, content)
            .map_err(|e| ImgSqueezeError::config(
                format!("Failed to write config file {:?}: {}", path.as_ref(), e)
            ))?;

        Ok(())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
