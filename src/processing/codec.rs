//! Decode, downsample and encode primitives

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::Result;
use crate::processing::formats::CodecFamily;

/// Codec capability used by the compression worker.
///
/// Implementations must be thread-safe: one instance is shared by every
/// in-flight job.
pub trait ImageCodec: Send + Sync {
    /// Decode raw file bytes of the given family
    fn decode(&self, data: &[u8], family: CodecFamily) -> Result<DynamicImage>;

    /// Resample to exactly `width` x `height`
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    /// Encode back into the given family
    fn encode(&self, image: &DynamicImage, family: CodecFamily, quality: u8) -> Result<Vec<u8>>;
}

/// Codec backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, data: &[u8], family: CodecFamily) -> Result<DynamicImage> {
        let format: ImageFormat = family.image_format();
        Ok(image::load_from_memory_with_format(data, format)?)
    }

    fn encode(&self, image: &DynamicImage, family: CodecFamily, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();

        match family {
            CodecFamily::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                // JPEG carries no alpha and only 8-bit samples
                match image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                        image.write_with_encoder(encoder)?;
                    }
                    DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                        DynamicImage::ImageLuma8(image.to_luma8()).write_with_encoder(encoder)?;
                    }
                    _ => {
                        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
                    }
                }
            }
            CodecFamily::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                );
                image.write_with_encoder(encoder)?;
            }
        }

        if family.is_lossy() {
            debug!("Encoded {} at quality {}: {} bytes", family.name(), quality, buffer.len());
        } else {
            debug!("Encoded {}: {} bytes", family.name(), buffer.len());
        }
        Ok(buffer)
    }
}

/// Dimensions after fitting `width` down to `max_width`, keeping aspect ratio.
///
/// Returns `None` when the image is already narrow enough.
pub fn downscaled_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if width <= max_width || width == 0 {
        return None;
    }
    let aspect_ratio = height as f64 / width as f64;
    let new_height = (max_width as f64 * aspect_ratio).round() as u32;
    Some((max_width, new_height.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let intensity = ((x * 7 + y * 13) % 255) as u8;
            Rgb([intensity, intensity / 2, 255 - intensity])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_downscaled_dimensions() {
        assert_eq!(downscaled_dimensions(2000, 1000, 1024), Some((1024, 512)));
        assert_eq!(downscaled_dimensions(3000, 2000, 1000), Some((1000, 667)));
        assert_eq!(downscaled_dimensions(1024, 768, 1024), None);
        assert_eq!(downscaled_dimensions(640, 480, 1024), None);
        // Extreme panoramas never collapse to zero height
        assert_eq!(downscaled_dimensions(10_000, 1, 100), Some((100, 1)));
    }

    #[test]
    fn test_jpeg_roundtrip_preserves_dimensions() {
        let codec = StandardCodec;
        let image = create_test_image(64, 48);

        let bytes = codec.encode(&image, CodecFamily::Jpeg, 80).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));

        let decoded = codec.decode(&bytes, CodecFamily::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_png_encode_handles_alpha() {
        let codec = StandardCodec;
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(16, 16, Rgba([10, 20, 30, 128])));

        let bytes = codec.encode(&image, CodecFamily::Png, 75).unwrap();
        assert!(bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]));

        let decoded = codec.decode(&bytes, CodecFamily::Png).unwrap();
        assert_eq!(decoded.width(), 16);
    }

    #[test]
    fn test_jpeg_encode_drops_alpha() {
        let codec = StandardCodec;
        let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(8, 8, Rgba([200, 100, 50, 10])));
        assert!(codec.encode(&image, CodecFamily::Jpeg, 75).is_ok());
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let codec = StandardCodec;
        let image = create_test_image(200, 150);
        let high = codec.encode(&image, CodecFamily::Jpeg, 95).unwrap();
        let low = codec.encode(&image, CodecFamily::Jpeg, 20).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = StandardCodec;
        assert!(codec.decode(b"definitely not a jpeg", CodecFamily::Jpeg).is_err());
        assert!(codec.decode(&[], CodecFamily::Png).is_err());
    }

    #[test]
    fn test_default_resize_is_exact() {
        let codec = StandardCodec;
        let image = create_test_image(300, 200);
        let resized = codec.resize(&image, 150, 100);
        assert_eq!((resized.width(), resized.height()), (150, 100));
    }
}
