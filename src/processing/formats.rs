//! Codec family detection

use std::path::Path;
use serde::Serialize;
use crate::error::{Result, ImgSqueezeError};

/// File extensions picked up by the scanner (lowercase, without the dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Image format group that decides how a file is decoded and re-encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    /// Lossy; the quality setting drives the encoder
    Jpeg,
    /// Lossless; encoded with maximum compression effort
    Png,
}

impl CodecFamily {
    /// Map a file extension (case-insensitive, no dot) to its family
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Detect the family of a file from its extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        Self::from_extension(extension).ok_or_else(|| {
            ImgSqueezeError::unsupported_format(
                extension.to_ascii_lowercase(),
                Some(path.to_path_buf()),
            )
        })
    }

    /// Whether the encoder honours a quality setting
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// The matching `image` crate format
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
        }
    }
}

/// Check if a file extension is picked up by the scanner
pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|&ext| ext.eq_ignore_ascii_case(extension))
}
