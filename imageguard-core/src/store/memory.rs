//! In-memory collaborators backed by `DashMap`.
//!
//! Nothing here survives a restart.

use std::fmt;
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{AuditSink, BlobStore, KeyEscrow, RecordStore};
use crate::audit::AuditEvent;
use crate::error::{IntegrityError, Result};
use crate::record::{BlobRef, EvidenceRecord, RecordId};
use crate::signing::ZeroizingSecretKey;

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        let reference = Uuid::new_v4().to_string();
        self.blobs.insert(reference.clone(), bytes.to_vec());
        Ok(BlobRef::new(reference))
    }

    fn get(&self, reference: &BlobRef) -> Result<Vec<u8>> {
        self.blobs
            .get(reference.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| IntegrityError::BlobNotFound(reference.to_string()))
    }

    fn delete(&self, reference: &BlobRef) -> Result<()> {
        self.blobs.remove(reference.as_str());
        Ok(())
    }
}

impl fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("blobs", &self.blobs.len())
            .finish()
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    records: DashMap<RecordId, EvidenceRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, record: &EvidenceRecord) -> Result<RecordId> {
        match self.records.entry(record.id) {
            Entry::Occupied(_) => Err(IntegrityError::Storage(format!(
                "Record {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(record.id)
            }
        }
    }

    fn get(&self, id: &RecordId) -> Result<EvidenceRecord> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| IntegrityError::RecordNotFound(id.to_string()))
    }
}

impl fmt::Debug for MemoryRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRecordStore")
            .field("records", &self.records.len())
            .finish()
    }
}

/// Audit sink keeping events in append order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event appended so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, event: &AuditEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| IntegrityError::Storage("Audit log lock poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyEscrow {
    keys: DashMap<Vec<u8>, ZeroizingSecretKey>,
}

impl MemoryKeyEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyEscrow for MemoryKeyEscrow {
    fn deposit(&self, public_key: &[u8], secret_key: ZeroizingSecretKey) -> Result<()> {
        self.keys.insert(public_key.to_vec(), secret_key);
        Ok(())
    }

    fn retrieve(&self, public_key: &[u8]) -> Result<Option<ZeroizingSecretKey>> {
        Ok(self.keys.get(public_key).map(|entry| entry.value().clone()))
    }

    fn remove(&self, public_key: &[u8]) -> Result<()> {
        self.keys.remove(public_key);
        Ok(())
    }
}

impl fmt::Debug for MemoryKeyEscrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyEscrow")
            .field("keys", &self.keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::digest::ContentHasher;
    use crate::fingerprint::Fingerprint;
    use crate::signing::{generate_keypair, SigningMode};
    use chrono::Utc;

    fn record() -> EvidenceRecord {
        EvidenceRecord {
            id: RecordId::new(),
            case_id: "case-1".into(),
            original_filename: None,
            canonical_image_ref: BlobRef::new("blob"),
            content_hash: ContentHasher::default().hash(b"x").unwrap(),
            perceptual_hash: Fingerprint::from_bits(42),
            signature: "c2ln".into(),
            public_key: "cGs=".into(),
            signing_mode: SigningMode::SelfVerifyOnly,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_blob_put_get_delete() {
        let store = MemoryBlobStore::new();
        let reference = store.put(b"canonical").unwrap();
        assert_eq!(store.get(&reference).unwrap(), b"canonical");

        store.delete(&reference).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.get(&reference),
            Err(IntegrityError::BlobNotFound(_))
        ));
        store.delete(&reference).unwrap();
    }

    #[test]
    fn test_record_create_rejects_duplicates() {
        let store = MemoryRecordStore::new();
        let record = record();

        assert_eq!(store.create(&record).unwrap(), record.id);
        assert!(matches!(
            store.create(&record),
            Err(IntegrityError::Storage(_))
        ));
        assert_eq!(store.get(&record.id).unwrap(), record);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_record() {
        let store = MemoryRecordStore::new();
        assert!(matches!(
            store.get(&RecordId::new()),
            Err(IntegrityError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_audit_sink_preserves_order() {
        let sink = MemoryAuditSink::new();
        let record = record();
        sink.append(&AuditEvent::evidence_ingested(&record, None)).unwrap();
        sink.append(&AuditEvent::evidence_ingested(&record, Some("a".into())))
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::EvidenceIngested);
        assert_eq!(events[1].actor_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_escrow_retrieve_keeps_key() {
        let escrow = MemoryKeyEscrow::new();
        let keypair = generate_keypair().unwrap();
        escrow
            .deposit(&keypair.public_key, keypair.secret_key.clone())
            .unwrap();

        let first = escrow.retrieve(&keypair.public_key).unwrap().unwrap();
        let second = escrow.retrieve(&keypair.public_key).unwrap().unwrap();
        assert_eq!(first.as_bytes(), keypair.secret_key.as_bytes());
        assert_eq!(second.as_bytes(), keypair.secret_key.as_bytes());
        assert!(escrow.retrieve(&[0u8; 32]).unwrap().is_none());
    }

    #[test]
    fn test_escrow_remove() {
        let escrow = MemoryKeyEscrow::new();
        let keypair = generate_keypair().unwrap();
        escrow
            .deposit(&keypair.public_key, keypair.secret_key.clone())
            .unwrap();

        escrow.remove(&keypair.public_key).unwrap();
        assert!(escrow.is_empty());
        assert!(escrow.retrieve(&keypair.public_key).unwrap().is_none());
        escrow.remove(&keypair.public_key).unwrap();
    }
}
