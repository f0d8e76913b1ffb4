//! Collaborator interfaces consumed by the engine.
//!
//! The engine never touches a filesystem or database itself. Callers supply
//! implementations of these traits: [`memory`] provides thread-safe in-memory
//! versions for tests and embedding, and the CLI ships directory-backed ones.

pub mod memory;

pub use memory::{MemoryAuditSink, MemoryBlobStore, MemoryKeyEscrow, MemoryRecordStore};

use crate::audit::AuditEvent;
use crate::error::Result;
use crate::record::{BlobRef, EvidenceRecord, RecordId};
use crate::signing::ZeroizingSecretKey;

/// Holds canonical image bytes.
pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<BlobRef>;

    /// Fails with `BlobNotFound` for an unknown reference.
    fn get(&self, reference: &BlobRef) -> Result<Vec<u8>>;

    /// Remove a blob. Used to roll back an ingest whose record could not be
    /// created; deleting an unknown reference is not an error.
    fn delete(&self, reference: &BlobRef) -> Result<()>;
}

/// Holds evidence records. `create` is atomic: either the whole record
/// becomes visible or nothing does.
pub trait RecordStore: Send + Sync {
    /// Fails with `Storage` if a record with the same id already exists.
    fn create(&self, record: &EvidenceRecord) -> Result<RecordId>;

    /// Fails with `RecordNotFound` for an unknown id.
    fn get(&self, id: &RecordId) -> Result<EvidenceRecord>;
}

/// Append-only audit log.
pub trait AuditSink: Send + Sync {
    fn append(&self, event: &AuditEvent) -> Result<()>;
}

/// Secured storage for private keys issued in escrowed signing mode,
/// indexed by the raw public key bytes.
pub trait KeyEscrow: Send + Sync {
    fn deposit(&self, public_key: &[u8], secret_key: ZeroizingSecretKey) -> Result<()>;

    /// Look up a key without removing it.
    fn retrieve(&self, public_key: &[u8]) -> Result<Option<ZeroizingSecretKey>>;

    /// Destroy a key. Used to roll back an ingest whose record could not be
    /// created; removing an unknown key is not an error.
    fn remove(&self, public_key: &[u8]) -> Result<()>;
}
