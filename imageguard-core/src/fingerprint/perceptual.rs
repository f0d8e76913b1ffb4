//! Frequency-domain perceptual hashing for images.
//!
//! Fingerprints are DCT median hashes computed with `image_hasher`:
//! the grayscale image is resized with a Lanczos3 filter to a grid twice
//! the hash size, transformed with a 2D discrete cosine transform and
//! cropped to the 8x8 lowest-frequency block. Each bit is set when its
//! coefficient is above the block median.
//!
//! The hash bytes are packed big-endian into a `u64`, so the rendered
//! 16 hex characters are the hash bytes in order.
//!
//! # Usage
//!
//! ```no_run
//! use imageguard_core::fingerprint::PerceptualHasher;
//!
//! let canonical = std::fs::read("evidence.jpg").unwrap();
//! let hasher = PerceptualHasher::new();
//! let fp1 = hasher.fingerprint(&canonical).unwrap();
//!
//! let challenge = std::fs::read("challenge.jpg").unwrap();
//! let fp2 = hasher.fingerprint(&challenge).unwrap();
//! let distance = fp1.hamming_distance(&fp2);
//! ```

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};

use crate::error::{IntegrityError, Result};
use crate::normalize;

/// Side length of the low-frequency block kept after the DCT.
pub const HASH_SIDE: u32 = 8;

/// Number of bits in a fingerprint.
pub const FINGERPRINT_BITS: u32 = 64;

/// Length of a rendered fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// A 64-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Number of differing bits, in `0..=64`.
    pub const fn hamming_distance(&self, other: &Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Render as 16 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// Parse exactly 16 hex characters.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != FINGERPRINT_HEX_LEN
            || !hex_str.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(IntegrityError::InvalidFingerprint(format!(
                "expected {} hex characters, got {:?}",
                FINGERPRINT_HEX_LEN, hex_str
            )));
        }
        u64::from_str_radix(hex_str, 16)
            .map(Self)
            .map_err(|e| IntegrityError::InvalidFingerprint(format!("{:?}: {}", hex_str, e)))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

/// Hamming distance between two fingerprints.
pub fn hamming(a: &Fingerprint, b: &Fingerprint) -> u32 {
    a.hamming_distance(b)
}

/// Computes perceptual fingerprints from canonical image bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptualHasher;

impl PerceptualHasher {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint encoded image bytes.
    pub fn fingerprint(&self, canonical: &[u8]) -> Result<Fingerprint> {
        let image = normalize::decode(canonical)?;
        Ok(self.fingerprint_image(&image))
    }

    /// Fingerprint an already decoded image.
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Fingerprint {
        let hash = dct_median_hasher().hash_image(image);
        let bits = hash
            .as_bytes()
            .iter()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
        Fingerprint(bits)
    }
}

fn dct_median_hasher() -> Hasher {
    HasherConfig::new()
        .hash_size(HASH_SIDE, HASH_SIDE)
        .hash_alg(HashAlg::Median)
        .preproc_dct()
        .resize_filter(FilterType::Lanczos3)
        .to_hasher()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let pattern = if (x / 16 + y / 16) % 2 == 0 { 40 } else { 0 };
            Rgb([
                ((x * 255 / width) as u8).saturating_add(pattern),
                (y * 255 / height) as u8,
                ((x + y) * 200 / (width + height)) as u8,
            ])
        }))
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let hasher = PerceptualHasher::new();
        let image = gradient(128, 96);
        assert_eq!(hasher.fingerprint_image(&image), hasher.fingerprint_image(&image));
    }

    #[test]
    fn test_self_distance_is_zero() {
        let fp = PerceptualHasher::new().fingerprint_image(&gradient(64, 64));
        assert_eq!(hamming(&fp, &fp), 0);
    }

    #[test]
    fn test_inverted_image_is_far_away() {
        let hasher = PerceptualHasher::new();
        let image = gradient(64, 64);
        let mut inverted = image.clone();
        inverted.invert();

        let distance = hasher
            .fingerprint_image(&image)
            .hamming_distance(&hasher.fingerprint_image(&inverted));
        assert!(distance > 16, "distance was {}", distance);
    }

    #[test]
    fn test_hamming_bounds_and_symmetry() {
        let zero = Fingerprint::from_bits(0);
        let ones = Fingerprint::from_bits(u64::MAX);
        let one_bit = Fingerprint::from_bits(1);

        assert_eq!(hamming(&zero, &ones), FINGERPRINT_BITS);
        assert_eq!(hamming(&ones, &zero), FINGERPRINT_BITS);
        assert_eq!(hamming(&zero, &one_bit), 1);
        assert_eq!(hamming(&one_bit, &zero), 1);
    }

    #[test]
    fn test_hex_rendering() {
        let fp = Fingerprint::from_bits(0xDEAD_BEEF_CAFE_BABE);
        assert_eq!(fp.to_hex(), "deadbeefcafebabe");
        assert_eq!(fp.to_string(), "deadbeefcafebabe");
        assert_eq!(Fingerprint::from_bits(1).to_hex(), "0000000000000001");

        let parsed: Fingerprint = "DEADBEEFCAFEBABE".parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Fingerprint::from_hex("deadbeef").is_err());
        assert!(Fingerprint::from_hex("zzzzzzzzzzzzzzzz").is_err());
        assert!(Fingerprint::from_hex("+eadbeefcafebabe").is_err());
    }

    #[test]
    fn test_fingerprint_uses_all_hash_bytes() {
        let image = gradient(128, 96);
        let fp = PerceptualHasher::new().fingerprint_image(&image);
        let bytes = dct_median_hasher().hash_image(&image).as_bytes().to_vec();

        assert_eq!(bytes.len() * 8, FINGERPRINT_BITS as usize);
        assert_eq!(fp.to_hex(), hex::encode(bytes));
    }

    #[test]
    fn test_fingerprint_from_bytes_rejects_garbage() {
        let err = PerceptualHasher::new().fingerprint(b"nope").unwrap_err();
        assert!(matches!(err, IntegrityError::Decode(_)));
    }
}
