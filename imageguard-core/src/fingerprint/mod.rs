//! Perceptual fingerprinting of canonical images.
//!
//! A fingerprint captures the low-frequency visual structure of an image, so
//! two images that differ only by recompression, small resizes or minor
//! colour shifts land a small Hamming distance apart, while structurally
//! different images drift further away.
//!
//! # Components
//!
//! - **Perceptual hashing**: 64-bit DCT/median fingerprint rendered as 16 hex
//!   characters, plus the Hamming distance used by the tampering comparator.

pub mod perceptual;

pub use perceptual::*;
