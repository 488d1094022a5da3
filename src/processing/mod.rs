//! Per-file compression: decode, downsample, re-encode, replace if smaller

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{Result, ImgSqueezeError};

pub mod codec;
pub mod formats;
pub mod replace;
pub mod scan;

pub use codec::*;
pub use formats::*;
pub use replace::*;
pub use scan::*;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The original was overwritten with a smaller encoding
    Replaced,
    /// Left untouched: unsupported format or no size gain
    Skipped,
    /// An error stopped processing; the original is untouched
    Failed,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionResult {
    pub original_path: PathBuf,
    pub original_size: u64,
    pub new_size: u64,
    pub action: Action,
    pub error: Option<String>,
}

impl CompressionResult {
    /// The file was overwritten with `new_size` bytes
    pub fn replaced(path: &Path, original_size: u64, new_size: u64) -> Self {
        Self {
            original_path: path.to_path_buf(),
            original_size,
            new_size,
            action: Action::Replaced,
            error: None,
        }
    }

    /// The file was left alone; `note` explains a soft skip
    pub fn skipped(path: &Path, original_size: u64, new_size: u64, note: Option<String>) -> Self {
        Self {
            original_path: path.to_path_buf(),
            original_size,
            new_size,
            action: Action::Skipped,
            error: note,
        }
    }

    /// Create a failed result
    pub fn failed(path: &Path, original_size: u64, error: &ImgSqueezeError) -> Self {
        Self {
            original_path: path.to_path_buf(),
            original_size,
            new_size: 0,
            action: Action::Failed,
            error: Some(error.user_message()),
        }
    }

    /// Bytes freed on disk; zero unless the file was replaced
    pub fn bytes_saved(&self) -> u64 {
        match self.action {
            Action::Replaced => self.original_size.saturating_sub(self.new_size),
            _ => 0,
        }
    }

    /// Status column for the audit log
    pub fn status(&self) -> String {
        match (self.action, &self.error) {
            (Action::Failed, Some(error)) => error.clone(),
            (Action::Failed, None) => "failed".to_string(),
            _ => "success".to_string(),
        }
    }
}

/// Compression worker shared by all jobs of a batch
pub struct Compressor {
    codec: Arc<dyn ImageCodec>,
}

impl Compressor {
    /// Create a worker backed by the `image` crate codec
    pub fn new() -> Self {
        Self::with_codec(Arc::new(StandardCodec))
    }

    /// Create a worker with a custom codec
    pub fn with_codec(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Compress a single file in place.
    ///
    /// Never returns an error: every failure is captured in the result, and
    /// the file is written at most once, only when the new encoding is
    /// strictly smaller.
    pub fn process(&self, path: &Path, max_width: u32, quality: u8) -> CompressionResult {
        let mut original_size = 0;
        match self.try_process(path, max_width, quality, &mut original_size) {
            Ok(result) => result,
            Err(e) => {
                if e.is_recoverable() {
                    warn!("Failed to compress {:?}: {}", path, e);
                } else {
                    error!("Failed to compress {:?}: {}", path, e);
                }
                CompressionResult::failed(path, original_size, &e)
            }
        }
    }

    fn try_process(
        &self,
        path: &Path,
        max_width: u32,
        quality: u8,
        original_size: &mut u64,
    ) -> Result<CompressionResult> {
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        *original_size = metadata.len();

        let family = match CodecFamily::from_path(path) {
            Ok(family) => family,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                return Ok(CompressionResult::skipped(
                    path,
                    *original_size,
                    *original_size,
                    Some(e.user_message()),
                ));
            }
        };

        let mut data = Vec::with_capacity(*original_size as usize);
        file.read_to_end(&mut data)?;
        drop(file);

        let mut image = self.codec.decode(&data, family)?;
        drop(data);

        if let Some((width, height)) = downscaled_dimensions(image.width(), image.height(), max_width) {
            debug!(
                "Resizing {:?}: {}x{} -> {}x{}",
                path,
                image.width(),
                image.height(),
                width,
                height
            );
            image = self.codec.resize(&image, width, height);
        }

        let encoded = self.codec.encode(&image, family, quality)?;
        let new_size = encoded.len() as u64;

        if new_size >= *original_size {
            debug!("Keeping {:?}: {} -> {} bytes is no gain", path, original_size, new_size);
            return Ok(CompressionResult::skipped(path, *original_size, new_size, None));
        }

        replace_file(path, &encoded, metadata.permissions())?;
        debug!("Replaced {:?}: {} -> {} bytes", path, original_size, new_size);

        Ok(CompressionResult::replaced(path, *original_size, new_size))
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    /// Noisy image so that a high-quality JPEG is large
    fn noisy_image(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        let img = ImageBuffer::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn write_jpeg(path: &Path, image: &DynamicImage, quality: u8) {
        let mut bytes = Vec::new();
        image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
            .unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_wide_jpeg_is_downscaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.jpg");
        write_jpeg(&path, &noisy_image(2000, 1000), 95);
        let before = fs::read(&path).unwrap();

        let result = Compressor::new().process(&path, 1024, 80);

        assert_eq!(result.original_path, path);
        assert_eq!(result.original_size, before.len() as u64);
        match result.action {
            Action::Replaced => {
                assert!(result.new_size < result.original_size);
                assert_eq!(fs::metadata(&path).unwrap().len(), result.new_size);
                let (width, height) = image::image_dimensions(&path).unwrap();
                assert!(width <= 1024);
                assert_eq!((width, height), (1024, 512));
            }
            Action::Skipped => {
                assert!(result.new_size >= result.original_size);
                assert_eq!(fs::read(&path).unwrap(), before);
            }
            Action::Failed => panic!("unexpected failure: {:?}", result.error),
        }
        assert_eq!(result.status(), "success");
    }

    #[test]
    fn test_no_gain_is_skipped_and_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.jpg");
        // Already at low quality: re-encoding at max quality cannot shrink it
        write_jpeg(&path, &noisy_image(64, 64), 10);
        let before = fs::read(&path).unwrap();

        let result = Compressor::new().process(&path, 4096, 100);

        assert_eq!(result.action, Action::Skipped);
        assert!(result.new_size >= result.original_size);
        assert!(result.error.is_none());
        assert_eq!(result.bytes_saved(), 0);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_unsupported_format_is_soft_skip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anim.gif");
        fs::write(&path, b"GIF89a not really a gif").unwrap();

        let result = Compressor::new().process(&path, 100, 75);

        assert_eq!(result.action, Action::Skipped);
        assert!(result.error.as_deref().unwrap().contains("Unsupported image format"));
        assert_eq!(result.status(), "success");
        assert_eq!(fs::read(&path).unwrap(), b"GIF89a not really a gif");
    }

    #[test]
    fn test_corrupt_file_fails_without_mutation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png at all").unwrap();

        let result = Compressor::new().process(&path, 100, 75);

        assert_eq!(result.action, Action::Failed);
        assert_eq!(result.original_size, 16);
        assert!(result.error.is_some());
        assert_eq!(result.status(), *result.error.as_ref().unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"not a png at all");
    }

    /// Decodes anything to one pixel and always encodes to a single byte
    struct OneByteCodec;

    impl ImageCodec for OneByteCodec {
        fn decode(&self, _data: &[u8], _family: CodecFamily) -> Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(1, 1, Rgb([0, 0, 0]))))
        }

        fn encode(&self, _image: &DynamicImage, _family: CodecFamily, _quality: u8) -> Result<Vec<u8>> {
            Ok(vec![1])
        }
    }

    #[test]
    fn test_read_only_file_fails_and_is_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.jpg");
        fs::write(&path, b"read-only original").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        let result = Compressor::with_codec(Arc::new(OneByteCodec)).process(&path, 100, 75);

        assert_eq!(result.action, Action::Failed);
        assert_eq!(result.original_size, 18);
        assert!(result.error.as_deref().unwrap().contains("File system error"));
        assert_eq!(fs::read(&path).unwrap(), b"read-only original");
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[test]
    fn test_stub_codec_replaces_writable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rw.png");
        fs::write(&path, b"writable original").unwrap();

        let result = Compressor::with_codec(Arc::new(OneByteCodec)).process(&path, 100, 75);

        assert_eq!(result.action, Action::Replaced);
        assert_eq!(fs::read(&path).unwrap(), vec![1]);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.jpg");

        let result = Compressor::new().process(&path, 100, 75);

        assert_eq!(result.action, Action::Failed);
        assert_eq!(result.original_size, 0);
        assert!(result.error.unwrap().contains("File system error"));
    }

    #[test]
    fn test_bytes_saved_only_counts_replacements() {
        let path = Path::new("a.jpg");
        assert_eq!(CompressionResult::replaced(path, 100, 40).bytes_saved(), 60);
        assert_eq!(CompressionResult::skipped(path, 100, 140, None).bytes_saved(), 0);
        let err = ImgSqueezeError::task("boom");
        assert_eq!(CompressionResult::failed(path, 100, &err).bytes_saved(), 0);
    }

    #[test]
    fn test_action_serialization() {
        assert_eq!(Action::Replaced.to_string(), "replaced");
        assert_eq!(serde_json::to_string(&Action::Skipped).unwrap(), "\"skipped\"");
    }
}
