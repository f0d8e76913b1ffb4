//! Ingest and comparison orchestration.
//!
//! [`EvidenceEngine`] runs the pipeline components against caller-supplied
//! collaborators. It holds no mutable state of its own, so one engine can
//! serve concurrent ingests and comparisons from many threads.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditEvent;
use crate::compare::{
    Comparison, ComparisonResult, DifferenceImage, StoredImage, TamperingComparator,
    TamperingThreshold,
};
use crate::config::EngineConfig;
use crate::digest::{ContentDigest, ContentHasher};
use crate::error::{IntegrityError, Result};
use crate::fingerprint::{Fingerprint, PerceptualHasher};
use crate::normalize::ImageNormalizer;
use crate::record::{BlobRef, EvidenceRecord, RecordDraft, RecordId};
use crate::signing::{Attestation, PendingAttestation, SignatureService, SigningMode};
use crate::store::{
    AuditSink, BlobStore, KeyEscrow, MemoryAuditSink, MemoryBlobStore, MemoryKeyEscrow,
    MemoryRecordStore, RecordStore,
};

/// External collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
    pub audit: Arc<dyn AuditSink>,
    /// Required when the engine signs in escrowed mode
    pub escrow: Option<Arc<dyn KeyEscrow>>,
}

impl Collaborators {
    /// Fresh in-memory collaborators, including a key escrow.
    pub fn in_memory() -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            records: Arc::new(MemoryRecordStore::new()),
            audit: Arc::new(MemoryAuditSink::new()),
            escrow: Some(Arc::new(MemoryKeyEscrow::new())),
        }
    }
}

/// Canonical bytes of an image and the integrity material derived from them.
///
/// In escrowed mode the attestation still holds its private key; it reaches
/// the escrow only when the evidence is committed by an ingest.
#[derive(Debug, Clone)]
pub struct SealedEvidence {
    pub canonical: Vec<u8>,
    pub content_hash: ContentDigest,
    pub perceptual_hash: Fingerprint,
    pub attestation: PendingAttestation,
}

/// Fingerprints of an image that is not stored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFingerprints {
    pub content_hash: ContentDigest,
    pub perceptual_hash: Fingerprint,
    pub canonical_size: usize,
}

#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    pub case_id: String,
    pub image: &'a [u8],
    pub original_filename: Option<String>,
    pub actor_id: Option<String>,
}

impl<'a> IngestRequest<'a> {
    pub fn new(case_id: impl Into<String>, image: &'a [u8]) -> Self {
        Self {
            case_id: case_id.into(),
            image,
            original_filename: None,
            actor_id: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.original_filename = Some(filename.into());
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// A committed record and the audit event describing it.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub record: EvidenceRecord,
    pub event: AuditEvent,
}

#[derive(Debug, Clone)]
pub struct CompareRequest<'a> {
    pub record_id: RecordId,
    pub challenge: &'a [u8],
    /// Identity of the challenge image, e.g. its file name
    pub challenge_name: String,
    pub actor_id: Option<String>,
    /// Falls back to the configured default when absent
    pub threshold: Option<TamperingThreshold>,
}

impl<'a> CompareRequest<'a> {
    pub fn new(record_id: RecordId, challenge: &'a [u8], challenge_name: impl Into<String>) -> Self {
        Self {
            record_id,
            challenge,
            challenge_name: challenge_name.into(),
            actor_id: None,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: TamperingThreshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Outcome of a comparison, owned by the caller.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub record_id: RecordId,
    pub case_id: String,
    pub result: ComparisonResult,
    pub difference: DifferenceImage,
    pub event: AuditEvent,
}

/// Result of re-checking a stored record against its canonical bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVerification {
    pub record_id: RecordId,
    pub content_hash_matches: bool,
    pub signature_valid: bool,
}

impl RecordVerification {
    pub fn is_intact(&self) -> bool {
        self.content_hash_matches && self.signature_valid
    }
}

pub struct EvidenceEngine {
    config: EngineConfig,
    normalizer: ImageNormalizer,
    content_hasher: ContentHasher,
    perceptual_hasher: PerceptualHasher,
    signer: SignatureService,
    comparator: TamperingComparator,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for EvidenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceEngine")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl EvidenceEngine {
    /// Fails with `Signature` when escrowed signing is configured without an escrow.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        let signer = match (config.signing_mode, collaborators.escrow) {
            (SigningMode::SelfVerifyOnly, _) => SignatureService::self_verify_only(),
            (SigningMode::Escrowed, Some(escrow)) => SignatureService::escrowed(escrow),
            (SigningMode::Escrowed, None) => {
                return Err(IntegrityError::Signature(
                    "Escrowed signing mode requires a key escrow".into(),
                ))
            }
        };

        Ok(Self {
            content_hasher: ContentHasher::new(config.hash_chunk_size),
            normalizer: ImageNormalizer::new(),
            perceptual_hasher: PerceptualHasher::new(),
            comparator: TamperingComparator::new(),
            signer,
            blobs: collaborators.blobs,
            records: collaborators.records,
            audit: collaborators.audit,
            config,
        })
    }

    /// Engine over fresh in-memory collaborators.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::new(config, Collaborators::in_memory())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn signing_mode(&self) -> SigningMode {
        self.signer.mode()
    }

    /// Normalize, hash, fingerprint and sign `raw` without storing anything.
    pub fn seal(&self, raw: &[u8]) -> Result<SealedEvidence> {
        let (canonical, image) = self.normalizer.normalize_image(raw)?;
        let content_hash = self.content_hasher.hash(&canonical)?;
        let perceptual_hash = self.perceptual_hasher.fingerprint_image(&image);
        let attestation = self.signer.prepare(&content_hash)?;
        debug!(
            content_hash = %content_hash,
            perceptual_hash = %perceptual_hash,
            canonical_size = canonical.len(),
            "Evidence sealed"
        );

        Ok(SealedEvidence {
            canonical,
            content_hash,
            perceptual_hash,
            attestation,
        })
    }

    /// Normalize and fingerprint `raw` without signing or storing it.
    pub fn fingerprint(&self, raw: &[u8]) -> Result<ImageFingerprints> {
        let (canonical, image) = self.normalizer.normalize_image(raw)?;
        Ok(ImageFingerprints {
            content_hash: self.content_hasher.hash(&canonical)?,
            perceptual_hash: self.perceptual_hasher.fingerprint_image(&image),
            canonical_size: canonical.len(),
        })
    }

    /// Run the full pipeline and commit one record.
    ///
    /// All-or-nothing: if any step fails no record becomes visible, and the
    /// blob and escrowed key written before a failed record create are
    /// removed again.
    #[instrument(skip(self, request), fields(case_id = %request.case_id))]
    pub fn ingest(&self, request: IngestRequest<'_>) -> Result<IngestReceipt> {
        let SealedEvidence {
            canonical,
            content_hash,
            perceptual_hash,
            attestation,
        } = self.seal(request.image)?;

        let canonical_image_ref = self.blobs.put(&canonical)?;
        let attestation = match self.signer.commit(attestation) {
            Ok(attestation) => attestation,
            Err(e) => {
                self.discard_blob(&canonical_image_ref);
                return Err(e);
            }
        };

        let record = EvidenceRecord {
            id: RecordId::new(),
            case_id: request.case_id,
            original_filename: request.original_filename,
            canonical_image_ref,
            content_hash,
            perceptual_hash,
            signature: attestation.signature_base64(),
            public_key: attestation.public_key_base64(),
            signing_mode: attestation.mode,
            uploaded_at: Utc::now(),
        };

        if let Err(e) = self.records.create(&record) {
            if let Err(cleanup) = self.signer.rollback(&attestation) {
                warn!(error = %cleanup, "Failed to roll back escrowed key");
            }
            self.discard_blob(&record.canonical_image_ref);
            return Err(e);
        }

        info!(
            record_id = %record.id,
            content_hash = %record.content_hash,
            "Evidence record committed"
        );

        let event = AuditEvent::evidence_ingested(&record, request.actor_id);
        self.forward(&event);

        Ok(IngestReceipt { record, event })
    }

    /// Compare a challenge image against a stored record.
    ///
    /// On failure no result is returned and no audit event is emitted.
    #[instrument(skip(self, request), fields(record_id = %request.record_id))]
    pub fn compare(&self, request: CompareRequest<'_>) -> Result<ComparisonReport> {
        let record = self.records.get(&request.record_id)?;
        let canonical = self.blobs.get(&record.canonical_image_ref)?;
        let threshold = request.threshold.unwrap_or(self.config.default_threshold);
        let record_id = record.id.to_string();

        let Comparison { result, difference } = self.comparator.compare(
            StoredImage {
                record_id: &record_id,
                canonical: &canonical,
                perceptual_hash: record.perceptual_hash,
            },
            request.challenge,
            threshold,
        )?;

        info!(
            challenge = %request.challenge_name,
            status = %result.status,
            hamming_distance = result.hamming_distance,
            similarity = result.similarity_percent,
            "Tampering detection performed"
        );

        let event = AuditEvent::tampering_detection(
            record.case_id.clone(),
            record.id,
            &request.challenge_name,
            &result,
            request.actor_id,
        );
        self.forward(&event);

        Ok(ComparisonReport {
            record_id: record.id,
            case_id: record.case_id,
            result,
            difference,
            event,
        })
    }

    /// Recompute the content hash from stored bytes and check the signature.
    pub fn verify_record(&self, id: &RecordId) -> Result<RecordVerification> {
        let record = self.records.get(id)?;
        let canonical = self.blobs.get(&record.canonical_image_ref)?;
        let recomputed = self.content_hasher.hash(&canonical)?;

        let verification = RecordVerification {
            record_id: record.id,
            content_hash_matches: recomputed == record.content_hash,
            signature_valid: record.verify_signature(),
        };
        debug!(?verification, "Record verified");
        Ok(verification)
    }

    /// Re-sign a record's content hash with its escrowed private key.
    pub fn reattest(&self, id: &RecordId) -> Result<Attestation> {
        let record = self.records.get(id)?;
        let public_key = record.public_key_bytes().ok_or_else(|| {
            IntegrityError::Signature(format!("Record {} has a malformed public key", id))
        })?;
        self.signer.reattest(&public_key, &record.content_hash)
    }

    /// Fill the absent integrity fields of `draft` from its canonical bytes.
    ///
    /// Present fields are never overwritten, so completing an already
    /// complete draft returns it unchanged. Signature and public key are
    /// issued together, only when both are absent; a draft holding just one
    /// of them keeps it and stays incomplete.
    pub fn complete_draft(&self, mut draft: RecordDraft) -> Result<RecordDraft> {
        if draft.is_complete() {
            return Ok(draft);
        }
        debug!(record_id = %draft.id, missing = ?draft.missing_fields(), "Completing draft");

        let needs_image = draft.content_hash.is_none() || draft.perceptual_hash.is_none();
        if needs_image {
            let canonical = self.blobs.get(&draft.canonical_image_ref)?;
            if draft.content_hash.is_none() {
                draft.content_hash = Some(self.content_hasher.hash(&canonical)?);
            }
            if draft.perceptual_hash.is_none() {
                draft.perceptual_hash = Some(self.perceptual_hasher.fingerprint(&canonical)?);
            }
        }

        match (&draft.signature, &draft.public_key, &draft.content_hash) {
            (None, None, Some(content_hash)) => {
                let attestation = self.signer.attest(content_hash)?;
                draft.attach(&attestation);
            }
            (Some(_), None, _) | (None, Some(_), _) => {
                warn!(
                    record_id = %draft.id,
                    "Draft holds half a signature pair; left unverifiable"
                );
            }
            _ => {}
        }

        Ok(draft)
    }

    fn discard_blob(&self, reference: &BlobRef) {
        if let Err(cleanup) = self.blobs.delete(reference) {
            warn!(blob = %reference, error = %cleanup, "Failed to roll back canonical blob");
        }
    }

    fn forward(&self, event: &AuditEvent) {
        if let Err(e) = self.audit.append(event) {
            warn!(
                action = %event.action,
                case_id = %event.case_id,
                error = %e,
                "Failed to forward audit event"
            );
        }
    }
}
