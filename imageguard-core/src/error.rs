use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Hash computation error: {0}")]
    HashComputation(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Image processing error for record {record_id}: {reason}")]
    ImageProcessing { record_id: String, reason: String },

    #[error("Invalid tampering threshold {0}: must be between 1 and 64")]
    InvalidThreshold(u32),

    #[error("Invalid perceptual fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Invalid content digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("Evidence record not found: {0}")]
    RecordNotFound(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IntegrityError {
    /// Wrap a failure from the comparison pipeline, keeping the record under test.
    pub fn image_processing(record_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ImageProcessing {
            record_id: record_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error was raised by an external collaborator rather than the pipeline itself.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound(_) | Self::BlobNotFound(_) | Self::Storage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IntegrityError>;
