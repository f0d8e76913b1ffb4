//! Canonical image encoding.
//!
//! Every image entering the system is decoded and re-encoded as a baseline
//! JPEG at a fixed quality, so that all downstream digests, fingerprints and
//! signatures are computed over a single reproducible byte representation
//! regardless of which camera or software produced the upload.
//!
//! Note that the content hash of a record therefore attests to the canonical
//! bytes, not to the literal upload stream.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use tracing::debug;

use crate::error::{IntegrityError, Result};

/// JPEG quality used for the canonical encoding (0-100 scale).
///
/// Changing this value changes every canonical byte stream and invalidates
/// stored content hashes.
pub const CANONICAL_JPEG_QUALITY: u8 = 70;

/// Canonicalizes arbitrary input image bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decode `raw` and re-encode it as canonical JPEG bytes.
    pub fn normalize(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let decoded = decode(raw)?;
        let canonical = canonical_color(decoded);
        encode_canonical(&canonical)
    }

    /// Decode `raw` and return the canonical image alongside its encoded bytes.
    ///
    /// The returned image is the decode of the canonical bytes, i.e. exactly
    /// what a later reader of the stored blob will see.
    pub fn normalize_image(&self, raw: &[u8]) -> Result<(Vec<u8>, DynamicImage)> {
        let bytes = self.normalize(raw)?;
        let image = decode(&bytes)?;
        Ok((bytes, image))
    }
}

/// Decode image bytes, mapping failures to [`IntegrityError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| IntegrityError::Decode(format!("Failed to decode image: {}", e)))
}

/// Reduce the decoded image to a colour mode the JPEG encoder accepts.
///
/// Grayscale stays single-channel; alpha, palette-expanded and high bit depth
/// images are flattened to 8-bit RGB.
fn canonical_color(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => image,
        ColorType::L16 => DynamicImage::ImageLuma8(image.to_luma8()),
        other => {
            debug!(color = ?other, "Converting to RGB for canonical encoding");
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    }
}

fn encode_canonical(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, CANONICAL_JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| IntegrityError::Decode(format!("Failed to re-encode image: {}", e)))?;

    debug!(
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "Canonical JPEG encoded"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn rgba_fixture() -> DynamicImage {
        let img = RgbaImage::from_fn(48, 32, |x, y| {
            Rgba([(x * 5) as u8, (y * 7) as u8, 90, if x < 24 { 255 } else { 128 }])
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = png_bytes(rgba_fixture());
        let normalizer = ImageNormalizer::new();

        let first = normalizer.normalize(&raw).unwrap();
        let second = normalizer.normalize(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_outputs_jpeg() {
        let raw = png_bytes(rgba_fixture());
        let canonical = ImageNormalizer::new().normalize(&raw).unwrap();

        assert_eq!(image::guess_format(&canonical).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_alpha_is_flattened_to_rgb() {
        let raw = png_bytes(rgba_fixture());
        let (_, image) = ImageNormalizer::new().normalize_image(&raw).unwrap();

        assert_eq!(image.color(), ColorType::Rgb8);
        assert_eq!((image.width(), image.height()), (48, 32));
    }

    #[test]
    fn test_grayscale_stays_single_channel() {
        let gray = image::GrayImage::from_fn(16, 16, |x, y| image::Luma([(x * 16 + y) as u8]));
        let raw = png_bytes(DynamicImage::ImageLuma8(gray));
        let (_, image) = ImageNormalizer::new().normalize_image(&raw).unwrap();

        assert_eq!(image.color(), ColorType::L8);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = ImageNormalizer::new()
            .normalize(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, IntegrityError::Decode(_)));
    }
}
