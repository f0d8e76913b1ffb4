//! Evidence records produced by the ingest pipeline.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::digest::ContentDigest;
use crate::error::{IntegrityError, Result};
use crate::fingerprint::Fingerprint;
use crate::signing::{self, Attestation, SigningMode};

/// Identifier of a stored evidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| IntegrityError::InvalidRecordId(s.to_string()))
    }
}

/// Opaque handle to canonical image bytes held by a blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored image together with its integrity material.
///
/// Created once by the ingest pipeline and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub id: RecordId,
    /// Owning case, opaque to the engine
    pub case_id: String,
    /// Name of the uploaded file, when known
    pub original_filename: Option<String>,
    /// Handle to the canonical (post-normalization) bytes
    pub canonical_image_ref: BlobRef,
    /// SHA-256 of the canonical bytes
    pub content_hash: ContentDigest,
    /// 64-bit perceptual fingerprint of the canonical bytes
    pub perceptual_hash: Fingerprint,
    /// Base64 Ed25519 signature over the hex content hash
    pub signature: String,
    /// Base64 Ed25519 public key paired with `signature`
    pub public_key: String,
    pub signing_mode: SigningMode,
    pub uploaded_at: DateTime<Utc>,
}

impl EvidenceRecord {
    /// Check the stored signature against the stored content hash.
    ///
    /// Missing or malformed signature material yields `false`.
    pub fn verify_signature(&self) -> bool {
        let (Ok(public_key), Ok(signature)) =
            (BASE64.decode(&self.public_key), BASE64.decode(&self.signature))
        else {
            return false;
        };
        signing::verify(
            &public_key,
            self.content_hash.signing_message(),
            &signature,
        )
    }

    /// Raw public key bytes, if the stored value is valid Base64.
    pub fn public_key_bytes(&self) -> Option<Vec<u8>> {
        BASE64.decode(&self.public_key).ok()
    }

    /// Serialize the record to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| IntegrityError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize a record from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| IntegrityError::Serialization(e.to_string()))
    }
}

/// A record whose integrity fields may not have been computed yet.
///
/// Completed with [`crate::EvidenceEngine::complete_draft`], which fills only
/// the absent fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    pub id: RecordId,
    pub case_id: String,
    pub original_filename: Option<String>,
    pub canonical_image_ref: BlobRef,
    pub content_hash: Option<ContentDigest>,
    pub perceptual_hash: Option<Fingerprint>,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    pub signing_mode: Option<SigningMode>,
    pub uploaded_at: DateTime<Utc>,
}

impl RecordDraft {
    pub fn new(case_id: impl Into<String>, canonical_image_ref: BlobRef) -> Self {
        Self {
            id: RecordId::new(),
            case_id: case_id.into(),
            original_filename: None,
            canonical_image_ref,
            content_hash: None,
            perceptual_hash: None,
            signature: None,
            public_key: None,
            signing_mode: None,
            uploaded_at: Utc::now(),
        }
    }

    /// Names of the integrity fields still absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.content_hash.is_none() {
            missing.push("contentHash");
        }
        if self.perceptual_hash.is_none() {
            missing.push("perceptualHash");
        }
        if self.signature.is_none() {
            missing.push("signature");
        }
        if self.public_key.is_none() {
            missing.push("publicKey");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub(crate) fn attach(&mut self, attestation: &Attestation) {
        self.signature = Some(attestation.signature_base64());
        self.public_key = Some(attestation.public_key_base64());
        self.signing_mode = Some(attestation.mode);
    }
}

impl From<EvidenceRecord> for RecordDraft {
    fn from(record: EvidenceRecord) -> Self {
        Self {
            id: record.id,
            case_id: record.case_id,
            original_filename: record.original_filename,
            canonical_image_ref: record.canonical_image_ref,
            content_hash: Some(record.content_hash),
            perceptual_hash: Some(record.perceptual_hash),
            signature: Some(record.signature),
            public_key: Some(record.public_key),
            signing_mode: Some(record.signing_mode),
            uploaded_at: record.uploaded_at,
        }
    }
}

impl TryFrom<RecordDraft> for EvidenceRecord {
    type Error = IntegrityError;

    fn try_from(draft: RecordDraft) -> Result<Self> {
        let missing = draft.missing_fields();
        match (
            draft.content_hash,
            draft.perceptual_hash,
            draft.signature,
            draft.public_key,
        ) {
            (Some(content_hash), Some(perceptual_hash), Some(signature), Some(public_key)) => {
                Ok(Self {
                    id: draft.id,
                    case_id: draft.case_id,
                    original_filename: draft.original_filename,
                    canonical_image_ref: draft.canonical_image_ref,
                    content_hash,
                    perceptual_hash,
                    signature,
                    public_key,
                    signing_mode: draft.signing_mode.unwrap_or_default(),
                    uploaded_at: draft.uploaded_at,
                })
            }
            _ => Err(IntegrityError::Storage(format!(
                "Record draft {} is incomplete: missing {}",
                draft.id,
                missing.join(", ")
            ))),
        }
    }
}
