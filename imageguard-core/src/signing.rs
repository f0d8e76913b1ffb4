//! Ed25519 attestation of content digests.
//!
//! A fresh keypair is issued for every signing operation. What happens to the
//! private key afterwards is governed by an explicit [`SigningMode`]:
//!
//! - [`SigningMode::SelfVerifyOnly`]: the private key is zeroized and dropped
//!   as soon as the signature exists. The attestation can only be checked
//!   against the public key emitted alongside it.
//! - [`SigningMode::Escrowed`]: the private seed is deposited in a
//!   [`KeyEscrow`] keyed by its public key, so the same digest can be
//!   re-attested later.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::digest::ContentDigest;
use crate::error::{IntegrityError, Result};
use crate::store::KeyEscrow;

/// Size of an Ed25519 private seed in bytes.
pub const ED25519_SECRET_KEY_BYTES: usize = 32;

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_BYTES: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_BYTES: usize = 64;

/// What happens to the private key after a signature is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningMode {
    /// Key discarded after issuance.
    #[default]
    SelfVerifyOnly,
    /// Key retained in a key escrow for later re-attestation.
    Escrowed,
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfVerifyOnly => write!(f, "self-verify-only"),
            Self::Escrowed => write!(f, "escrowed"),
        }
    }
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "self-verify-only" | "self_verify_only" | "selfverifyonly" => Ok(Self::SelfVerifyOnly),
            "escrowed" => Ok(Self::Escrowed),
            other => Err(format!("unknown signing mode: {}", other)),
        }
    }
}

/// Ed25519 private seed, zeroized on drop.
#[derive(Clone)]
pub struct ZeroizingSecretKey(Zeroizing<[u8; ED25519_SECRET_KEY_BYTES]>);

impl ZeroizingSecretKey {
    pub fn from_bytes(bytes: [u8; ED25519_SECRET_KEY_BYTES]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ED25519_SECRET_KEY_BYTES {
            return Err(IntegrityError::Signature(format!(
                "Invalid private key length: expected {}, got {}",
                ED25519_SECRET_KEY_BYTES,
                bytes.len()
            )));
        }
        let mut seed = Zeroizing::new([0u8; ED25519_SECRET_KEY_BYTES]);
        seed.copy_from_slice(bytes);
        Ok(Self(seed))
    }

    pub fn as_bytes(&self) -> &[u8; ED25519_SECRET_KEY_BYTES] {
        &self.0
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }

    /// Derive the public key paired with this seed.
    pub fn public_key(&self) -> [u8; ED25519_PUBLIC_KEY_BYTES] {
        self.signing_key().verifying_key().to_bytes()
    }
}

impl fmt::Debug for ZeroizingSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ZeroizingSecretKey([REDACTED])")
    }
}

/// A freshly issued signing keypair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: ZeroizingSecretKey,
    pub public_key: [u8; ED25519_PUBLIC_KEY_BYTES],
}

/// Issue a new Ed25519 keypair from the operating system RNG.
pub fn generate_keypair() -> Result<KeyPair> {
    let mut seed = Zeroizing::new([0u8; ED25519_SECRET_KEY_BYTES]);
    OsRng
        .try_fill_bytes(&mut *seed)
        .map_err(|e| IntegrityError::Signature(format!("Key generation failed: {}", e)))?;

    let secret_key = ZeroizingSecretKey(seed);
    let public_key = secret_key.public_key();
    Ok(KeyPair {
        secret_key,
        public_key,
    })
}

/// Sign `message`. Ed25519 signatures are deterministic for a given key and message.
pub fn sign(secret_key: &ZeroizingSecretKey, message: &[u8]) -> [u8; ED25519_SIGNATURE_BYTES] {
    let signature: Signature = secret_key.signing_key().sign(message);
    signature.to_bytes()
}

/// Verify `signature` over `message`.
///
/// Fails closed: a malformed key, a malformed signature or a mismatch all
/// return `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; ED25519_PUBLIC_KEY_BYTES]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify_strict(message, &signature).is_ok()
}

/// Signature material attached to an evidence record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub mode: SigningMode,
}

impl Attestation {
    pub fn signature_base64(&self) -> String {
        BASE64.encode(&self.signature)
    }

    pub fn public_key_base64(&self) -> String {
        BASE64.encode(&self.public_key)
    }

    /// Check this attestation against the digest it claims to cover.
    pub fn verify(&self, digest: &ContentDigest) -> bool {
        verify(&self.public_key, digest.signing_message(), &self.signature)
    }
}

/// An attestation whose private key has not been handed to custody yet.
///
/// Dropping it without [`SignatureService::commit`] zeroizes the key.
#[derive(Clone)]
pub struct PendingAttestation {
    attestation: Attestation,
    secret_key: Option<ZeroizingSecretKey>,
}

impl PendingAttestation {
    pub fn attestation(&self) -> &Attestation {
        &self.attestation
    }
}

impl fmt::Debug for PendingAttestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAttestation")
            .field("attestation", &self.attestation)
            .field("holds_key", &self.secret_key.is_some())
            .finish()
    }
}

enum KeyCustody {
    Discard,
    Escrow(Arc<dyn KeyEscrow>),
}

/// Issues attestations over content digests.
pub struct SignatureService {
    custody: KeyCustody,
}

impl fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureService")
            .field("mode", &self.mode())
            .finish()
    }
}

impl Default for SignatureService {
    fn default() -> Self {
        Self::self_verify_only()
    }
}

impl SignatureService {
    /// Discard every private key right after signing.
    pub fn self_verify_only() -> Self {
        Self {
            custody: KeyCustody::Discard,
        }
    }

    /// Deposit every private key in `escrow` after signing.
    pub fn escrowed(escrow: Arc<dyn KeyEscrow>) -> Self {
        Self {
            custody: KeyCustody::Escrow(escrow),
        }
    }

    pub fn mode(&self) -> SigningMode {
        match self.custody {
            KeyCustody::Discard => SigningMode::SelfVerifyOnly,
            KeyCustody::Escrow(_) => SigningMode::Escrowed,
        }
    }

    /// Issue a fresh keypair and sign `digest` with it.
    ///
    /// Nothing is deposited yet. In escrowed mode the private key travels
    /// with the returned [`PendingAttestation`] until [`commit`](Self::commit).
    pub fn prepare(&self, digest: &ContentDigest) -> Result<PendingAttestation> {
        let keypair = generate_keypair()?;
        let signature = sign(&keypair.secret_key, digest.signing_message());
        let attestation = Attestation {
            signature: signature.to_vec(),
            public_key: keypair.public_key.to_vec(),
            mode: self.mode(),
        };

        let secret_key = match self.custody {
            KeyCustody::Discard => None,
            KeyCustody::Escrow(_) => Some(keypair.secret_key),
        };
        Ok(PendingAttestation {
            attestation,
            secret_key,
        })
    }

    /// Hand the private key of `pending` to custody and release its attestation.
    pub fn commit(&self, pending: PendingAttestation) -> Result<Attestation> {
        let PendingAttestation {
            attestation,
            secret_key,
        } = pending;

        if let (KeyCustody::Escrow(escrow), Some(secret_key)) = (&self.custody, secret_key) {
            escrow.deposit(&attestation.public_key, secret_key)?;
            debug!(public_key = %hex::encode(&attestation.public_key), "Private key escrowed");
        }
        Ok(attestation)
    }

    /// Undo [`commit`](Self::commit): drop the escrowed key behind `attestation`.
    pub fn rollback(&self, attestation: &Attestation) -> Result<()> {
        if let KeyCustody::Escrow(escrow) = &self.custody {
            escrow.remove(&attestation.public_key)?;
            debug!(public_key = %hex::encode(&attestation.public_key), "Escrowed key removed");
        }
        Ok(())
    }

    /// Sign `digest` with a fresh keypair and commit the key at once.
    pub fn attest(&self, digest: &ContentDigest) -> Result<Attestation> {
        let pending = self.prepare(digest)?;
        self.commit(pending)
    }

    /// Re-sign `digest` with the escrowed key belonging to `public_key`.
    pub fn reattest(&self, public_key: &[u8], digest: &ContentDigest) -> Result<Attestation> {
        let KeyCustody::Escrow(escrow) = &self.custody else {
            return Err(IntegrityError::Signature(
                "Re-attestation requires escrowed signing mode".into(),
            ));
        };

        let secret_key = escrow.retrieve(public_key)?.ok_or_else(|| {
            IntegrityError::Signature(format!(
                "No escrowed key for public key {}",
                hex::encode(public_key)
            ))
        })?;

        if secret_key.public_key().as_slice() != public_key {
            return Err(IntegrityError::Signature(
                "Escrowed key does not match the requested public key".into(),
            ));
        }

        Ok(Attestation {
            signature: sign(&secret_key, digest.signing_message()).to_vec(),
            public_key: public_key.to_vec(),
            mode: SigningMode::Escrowed,
        })
    }
}
