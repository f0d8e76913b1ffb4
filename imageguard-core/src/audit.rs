//! Audit events emitted by ingest and comparison.
//!
//! Events are returned to the caller and forwarded to an
//! [`AuditSink`](crate::store::AuditSink); nothing fires implicitly on
//! persistence.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::compare::ComparisonResult;
use crate::record::{EvidenceRecord, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    EvidenceIngested,
    TamperingDetectionPerformed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EvidenceIngested => write!(f, "EVIDENCE_INGESTED"),
            Self::TamperingDetectionPerformed => write!(f, "TAMPERING_DETECTION_PERFORMED"),
        }
    }
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub actor_id: Option<String>,
    pub case_id: String,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn evidence_ingested(record: &EvidenceRecord, actor_id: Option<String>) -> Self {
        Self {
            actor_id,
            case_id: record.case_id.clone(),
            action: AuditAction::EvidenceIngested,
            details: json!({
                "recordId": record.id,
                "originalFilename": record.original_filename,
                "contentHash": record.content_hash,
                "perceptualHash": record.perceptual_hash,
                "signingMode": record.signing_mode,
            }),
            timestamp: Utc::now(),
        }
    }

    /// Event for a finished comparison. `challenge` names the submitted image.
    pub fn tampering_detection(
        case_id: impl Into<String>,
        record_id: RecordId,
        challenge: &str,
        result: &ComparisonResult,
        actor_id: Option<String>,
    ) -> Self {
        Self {
            actor_id,
            case_id: case_id.into(),
            action: AuditAction::TamperingDetectionPerformed,
            details: json!({
                "challenge": challenge,
                "recordId": record_id,
                "storedHash": result.stored_hash,
                "uploadedHash": result.uploaded_hash,
                "hammingDistance": result.hamming_distance,
                "similarityPercent": result.similarity_percent,
                "threshold": result.threshold,
                "status": result.status,
            }),
            timestamp: Utc::now(),
        }
    }
}
