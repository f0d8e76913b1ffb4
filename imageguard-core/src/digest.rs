//! SHA-256 content digests of canonical image bytes.

use std::fmt;
use std::io::{ErrorKind, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IntegrityError, Result};

/// Default number of bytes fed to the digest per read.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// A SHA-256 digest rendered as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parse a rendered digest. Uppercase input is accepted and lowercased.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let lowered = hex_str.to_ascii_lowercase();
        if lowered.len() != DIGEST_HEX_LEN || !lowered.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IntegrityError::InvalidDigest(format!(
                "expected {} hex characters, got {:?}",
                DIGEST_HEX_LEN, hex_str
            )));
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The message covered by a record's signature.
    pub fn signing_message(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

/// Streams bytes through SHA-256 in bounded chunks.
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest an in-memory canonical byte stream.
    pub fn hash(&self, canonical: &[u8]) -> Result<ContentDigest> {
        self.hash_reader(canonical)
    }

    /// Digest everything readable from `reader`, at most `chunk_size` bytes at a time.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> Result<ContentDigest> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(IntegrityError::HashComputation(format!(
                        "Failed to read bytes for digest: {}",
                        e
                    )))
                }
            };
            hasher.update(&buffer[..read]);
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Ok(ContentDigest::from_bytes(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"))
        }
    }

    #[test]
    fn test_known_vector() {
        let digest = ContentHasher::default().hash(b"abc").unwrap();
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_input() {
        let digest = ContentHasher::default().hash(b"").unwrap();
        assert_eq!(
            digest.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let whole = ContentHasher::new(1 << 20).hash(&data).unwrap();
        let tiny = ContentHasher::new(7).hash(&data).unwrap();
        assert_eq!(whole, tiny);
    }

    #[test]
    fn test_digest_shape() {
        let digest = ContentHasher::default().hash(b"evidence").unwrap();
        assert_eq!(digest.as_str().len(), DIGEST_HEX_LEN);
        assert!(digest
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(ContentHasher::new(0).chunk_size(), 1);
    }

    #[test]
    fn test_read_failure_is_hash_error() {
        let err = ContentHasher::default().hash_reader(FailingReader).unwrap_err();
        assert!(matches!(err, IntegrityError::HashComputation(_)));
    }

    #[test]
    fn test_from_hex_validation() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let parsed = ContentDigest::from_hex(upper).unwrap();
        assert_eq!(parsed.as_str(), upper.to_ascii_lowercase());

        assert!(ContentDigest::from_hex("abc").is_err());
        assert!(ContentDigest::from_hex(&"z".repeat(64)).is_err());
    }
}
