//! Directory-backed collaborators.
//!
//! Layout of a vault directory:
//!
//! ```text
//! <vault>/blobs/<uuid>.jpg      canonical image bytes
//! <vault>/records/<uuid>.cbor   evidence records
//! <vault>/escrow/<hex>.key      escrowed Ed25519 seeds, keyed by public key
//! <vault>/audit.jsonl           one audit event per line
//! ```
//!
//! Files are written to a temporary name and renamed into place, so a
//! record either exists completely or not at all.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use imageguard_core::{
    AuditEvent, AuditSink, BlobRef, BlobStore, Collaborators, EvidenceRecord, IntegrityError,
    KeyEscrow, RecordId, RecordStore, ZeroizingSecretKey,
};
use tracing::debug;
use zeroize::Zeroizing;

type CoreResult<T> = imageguard_core::Result<T>;

const BLOB_EXTENSION: &str = "jpg";
const RECORD_EXTENSION: &str = "cbor";
const KEY_EXTENSION: &str = "key";
const AUDIT_LOG: &str = "audit.jsonl";

/// An opened vault directory.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Open `root`, creating the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in ["blobs", "records", "escrow"] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create vault directory: {}", path.display()))?;
        }
        debug!(path = %root.display(), "Opened vault");
        Ok(Self { root })
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.join(AUDIT_LOG)
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            blobs: Arc::new(FsBlobStore::new(self.root.join("blobs"))),
            records: Arc::new(FsRecordStore::new(self.root.join("records"))),
            audit: Arc::new(FsAuditSink::new(self.audit_log())),
            escrow: Some(Arc::new(FsKeyEscrow::new(self.root.join("escrow")))),
        }
    }
}

fn storage_error(action: &str, path: &Path, err: io::Error) -> IntegrityError {
    IntegrityError::Storage(format!("Failed to {} {}: {}", action, path.display(), err))
}

/// Write `bytes` next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    write_atomic_with(path, bytes, &mut OpenOptions::new())
}

/// Like [`write_atomic`], but the file is created owner-only from the start.
fn write_private(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    write_atomic_with(path, bytes, &mut options)
}

fn write_atomic_with(path: &Path, bytes: &[u8], options: &mut OpenOptions) -> CoreResult<()> {
    let tmp = path.with_extension("tmp");
    // Left over from an interrupted write; never reuse its permissions.
    let _ = fs::remove_file(&tmp);
    let written = options
        .write(true)
        .create_new(true)
        .open(&tmp)
        .and_then(|mut file| file.write_all(bytes));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(storage_error("write", &tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        storage_error("commit", path, e)
    })
}

/// Accept only plain file stems, so a stored reference cannot escape the vault.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, reference: &BlobRef) -> CoreResult<PathBuf> {
        if !is_safe_name(reference.as_str()) {
            return Err(IntegrityError::BlobNotFound(reference.to_string()));
        }
        Ok(self
            .dir
            .join(reference.as_str())
            .with_extension(BLOB_EXTENSION))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8]) -> CoreResult<BlobRef> {
        let reference = BlobRef::new(uuid::Uuid::new_v4().to_string());
        let path = self.path_for(&reference)?;
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored canonical blob");
        Ok(reference)
    }

    fn get(&self, reference: &BlobRef) -> CoreResult<Vec<u8>> {
        let path = self.path_for(reference)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IntegrityError::BlobNotFound(reference.to_string()),
            _ => storage_error("read", &path, e),
        })
    }

    fn delete(&self, reference: &BlobRef) -> CoreResult<()> {
        let path = self.path_for(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("delete", &path, e)),
        }
    }
}

pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, id: &RecordId) -> PathBuf {
        self.dir.join(id.to_string()).with_extension(RECORD_EXTENSION)
    }
}

impl RecordStore for FsRecordStore {
    fn create(&self, record: &EvidenceRecord) -> CoreResult<RecordId> {
        let path = self.path_for(&record.id);
        if path.exists() {
            return Err(IntegrityError::Storage(format!(
                "Record {} already exists",
                record.id
            )));
        }
        write_atomic(&path, &record.to_cbor()?)?;
        debug!(path = %path.display(), "Stored evidence record");
        Ok(record.id)
    }

    /// Records are stored as CBOR; JSON is accepted for hand-imported files.
    fn get(&self, id: &RecordId) -> CoreResult<EvidenceRecord> {
        let path = self.path_for(id);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IntegrityError::RecordNotFound(id.to_string()),
            _ => storage_error("read", &path, e),
        })?;

        if let Ok(record) = EvidenceRecord::from_cbor(&bytes) {
            debug!(format = "cbor", "Parsed record");
            Ok(record)
        } else if let Ok(record) = serde_json::from_slice(&bytes) {
            debug!(format = "json", "Parsed record");
            Ok(record)
        } else {
            Err(IntegrityError::Serialization(format!(
                "Failed to parse record {} (tried CBOR and JSON)",
                id
            )))
        }
    }
}

/// JSON-lines audit log, appended under a lock.
pub struct FsAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FsAuditSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }
}

impl AuditSink for FsAuditSink {
    fn append(&self, event: &AuditEvent) -> CoreResult<()> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| IntegrityError::Serialization(e.to_string()))?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| IntegrityError::Storage("Audit log lock poisoned".into()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage_error("open", &self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| storage_error("append to", &self.path, e))
    }
}

pub struct FsKeyEscrow {
    dir: PathBuf,
}

impl FsKeyEscrow {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, public_key: &[u8]) -> PathBuf {
        self.dir
            .join(hex::encode(public_key))
            .with_extension(KEY_EXTENSION)
    }
}

impl KeyEscrow for FsKeyEscrow {
    fn deposit(&self, public_key: &[u8], secret_key: ZeroizingSecretKey) -> CoreResult<()> {
        write_private(&self.path_for(public_key), secret_key.as_bytes())
    }

    fn retrieve(&self, public_key: &[u8]) -> CoreResult<Option<ZeroizingSecretKey>> {
        let path = self.path_for(public_key);
        match fs::read(&path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                ZeroizingSecretKey::from_slice(&bytes).map(Some)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    fn remove(&self, public_key: &[u8]) -> CoreResult<()> {
        let path = self.path_for(public_key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Escrowed key removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }
}
