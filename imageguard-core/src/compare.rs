//! Tampering detection against a stored canonical image.
//!
//! A challenge image is normalized exactly like ingested evidence, resized to
//! the stored image's dimensions and compared pixel by pixel. The perceptual
//! distance is reported alongside as a similarity score; the tampering
//! verdict itself comes from the pixel difference.

use std::fmt;
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IntegrityError, Result};
use crate::fingerprint::{hamming, Fingerprint, PerceptualHasher, FINGERPRINT_BITS};
use crate::normalize::{self, ImageNormalizer};

/// Divisor of the similarity formula, configured per case.
///
/// Valid values are `1..=64`: zero would divide by zero, and anything above
/// the fingerprint width can never be reached by a Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TamperingThreshold(u32);

impl TamperingThreshold {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = FINGERPRINT_BITS;
    pub const DEFAULT: u32 = 5;

    pub fn new(value: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(IntegrityError::InvalidThreshold(value))
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for TamperingThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for TamperingThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for TamperingThreshold {
    type Error = IntegrityError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TamperingThreshold> for u32 {
    fn from(threshold: TamperingThreshold) -> Self {
        threshold.0
    }
}

/// `clamp(0, 100, 100 - distance / threshold * 100)`, rounded to two decimals.
///
/// Saturates at 0 once `distance >= threshold`.
pub fn similarity_percent(distance: u32, threshold: TamperingThreshold) -> f64 {
    let raw = 100.0 - (f64::from(distance) / f64::from(threshold.get())) * 100.0;
    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// Verdict of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TamperStatus {
    Original,
    Tampered,
}

impl fmt::Display for TamperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "Original"),
            Self::Tampered => write!(f, "Tampered"),
        }
    }
}

/// Smallest rectangle enclosing all non-zero difference pixels.
///
/// `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Per-channel absolute difference of two equally sized RGB images.
#[derive(Debug, Clone)]
pub struct DifferenceImage {
    image: RgbImage,
}

impl DifferenceImage {
    /// Compute `|a - b|` per channel. Both images must share dimensions.
    pub fn between(a: &RgbImage, b: &RgbImage) -> Self {
        debug_assert_eq!(a.dimensions(), b.dimensions());
        let image = RgbImage::from_fn(a.width(), a.height(), |x, y| {
            let Rgb(pa) = *a.get_pixel(x, y);
            let Rgb(pb) = *b.get_pixel(x, y);
            Rgb([pa[0].abs_diff(pb[0]), pa[1].abs_diff(pb[1]), pa[2].abs_diff(pb[2])])
        });
        Self { image }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Bounding box of non-zero pixels, `None` when the inputs were identical.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel.0 == [0, 0, 0] {
                continue;
            }
            let b = bbox.get_or_insert(BoundingBox {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            });
            b.left = b.left.min(x);
            b.top = b.top.min(y);
            b.right = b.right.max(x + 1);
            b.bottom = b.bottom.max(y + 1);
        }
        bbox
    }

    /// Number of pixels with any non-zero channel.
    pub fn changed_pixels(&self) -> u64 {
        self.image.pixels().filter(|p| p.0 != [0, 0, 0]).count() as u64
    }

    /// Encode the difference image as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| IntegrityError::Serialization(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer.into_inner())
    }
}

/// Outcome of one comparison. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub stored_hash: Fingerprint,
    pub uploaded_hash: Fingerprint,
    pub hamming_distance: u32,
    pub similarity_percent: f64,
    pub tampered: bool,
    pub status: TamperStatus,
    pub threshold: TamperingThreshold,
    pub difference_bbox: Option<BoundingBox>,
}

/// A comparison result together with its difference image.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub result: ComparisonResult,
    pub difference: DifferenceImage,
}

/// The stored side of a comparison.
#[derive(Debug, Clone, Copy)]
pub struct StoredImage<'a> {
    /// Record identity, carried into errors
    pub record_id: &'a str,
    /// Canonical bytes as held by the blob store
    pub canonical: &'a [u8],
    pub perceptual_hash: Fingerprint,
}

/// Compares challenge images against stored canonical images.
#[derive(Debug, Clone, Copy, Default)]
pub struct TamperingComparator {
    normalizer: ImageNormalizer,
    hasher: PerceptualHasher,
}

impl TamperingComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare(
        &self,
        stored: StoredImage<'_>,
        challenge: &[u8],
        threshold: TamperingThreshold,
    ) -> Result<Comparison> {
        let fail = |reason: IntegrityError| IntegrityError::image_processing(stored.record_id, reason);

        let (_, challenge_image) = self.normalizer.normalize_image(challenge).map_err(fail)?;
        let stored_image = normalize::decode(stored.canonical).map_err(fail)?;

        let stored_rgb = stored_image.to_rgb8();
        let challenge_rgb = resize_to(&challenge_image, stored_rgb.dimensions());
        let difference = DifferenceImage::between(&stored_rgb, &challenge_rgb);

        let uploaded_hash = self.hasher.fingerprint_image(&challenge_image);
        let hamming_distance = hamming(&stored.perceptual_hash, &uploaded_hash);
        let similarity = similarity_percent(hamming_distance, threshold);

        let difference_bbox = difference.bounding_box();
        let tampered = difference_bbox.is_some();
        let status = if tampered {
            TamperStatus::Tampered
        } else {
            TamperStatus::Original
        };

        debug!(
            record_id = stored.record_id,
            hamming_distance,
            similarity,
            ?difference_bbox,
            "Comparison computed"
        );

        Ok(Comparison {
            result: ComparisonResult {
                stored_hash: stored.perceptual_hash,
                uploaded_hash,
                hamming_distance,
                similarity_percent: similarity,
                tampered,
                status,
                threshold,
                difference_bbox,
            },
            difference,
        })
    }
}

fn resize_to(image: &DynamicImage, (width, height): (u32, u32)) -> RgbImage {
    if (image.width(), image.height()) == (width, height) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(width, height, FilterType::CatmullRom)
            .to_rgb8()
    }
}
