//! ImageGuard Core - evidence integrity and tampering detection
//!
//! This crate turns raw image bytes into integrity material for digital
//! evidence, and later decides whether a freshly submitted image has been
//! altered relative to the stored one.
//!
//! # Features
//!
//! - Canonical JPEG re-encoding, so every digest is taken over one reproducible byte stream
//! - Streaming SHA-256 content hashes rendered as 64 lowercase hex characters
//! - 64-bit DCT perceptual fingerprints and Hamming distance
//! - Ed25519 attestations with a fresh keypair per record, optionally escrowed
//! - Pixel-difference tampering detection with a bounded similarity score
//! - Explicit audit events for every ingest and comparison
//!
//! # Example
//!
//! ```no_run
//! use imageguard_core::{CompareRequest, EngineConfig, EvidenceEngine, IngestRequest, TamperStatus};
//!
//! # fn example() -> imageguard_core::Result<()> {
//! let engine = EvidenceEngine::in_memory(EngineConfig::default())?;
//!
//! let original = std::fs::read("scene.jpg").unwrap();
//! let receipt = engine.ingest(IngestRequest::new("case-2024-001", &original))?;
//! assert!(receipt.record.verify_signature());
//!
//! let challenge = std::fs::read("scene-copy.jpg").unwrap();
//! let report = engine.compare(CompareRequest::new(receipt.record.id, &challenge, "scene-copy.jpg"))?;
//! if report.result.status == TamperStatus::Tampered {
//!     println!("altered region: {:?}", report.result.difference_bbox);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod compare;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod record;
pub mod signing;
pub mod store;

// Re-export main types for convenience
pub use audit::{AuditAction, AuditEvent};
pub use compare::{
    similarity_percent, BoundingBox, Comparison, ComparisonResult, DifferenceImage, StoredImage,
    TamperStatus, TamperingComparator, TamperingThreshold,
};
pub use config::EngineConfig;
pub use digest::{ContentDigest, ContentHasher, DEFAULT_CHUNK_SIZE};
pub use engine::{
    Collaborators, CompareRequest, ComparisonReport, EvidenceEngine, ImageFingerprints,
    IngestReceipt, IngestRequest, RecordVerification, SealedEvidence,
};
pub use error::{IntegrityError, Result};
pub use fingerprint::{hamming, Fingerprint, PerceptualHasher};
pub use normalize::{ImageNormalizer, CANONICAL_JPEG_QUALITY};
pub use record::{BlobRef, EvidenceRecord, RecordDraft, RecordId};
pub use signing::{
    generate_keypair, sign, verify, Attestation, KeyPair, SignatureService, SigningMode,
    ZeroizingSecretKey, ED25519_PUBLIC_KEY_BYTES, ED25519_SECRET_KEY_BYTES,
    ED25519_SIGNATURE_BYTES,
};
pub use store::{AuditSink, BlobStore, KeyEscrow, RecordStore};
