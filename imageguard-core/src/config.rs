//! Engine configuration
//!
//! Loaded from environment variables with sensible defaults. The canonical
//! JPEG quality and the perceptual grid are constants, not configuration:
//! changing them would make stored fingerprints irreproducible.

use tracing::warn;

use crate::compare::TamperingThreshold;
use crate::digest::DEFAULT_CHUNK_SIZE;
use crate::signing::SigningMode;

pub const ENV_SIGNING_MODE: &str = "IMAGEGUARD_SIGNING_MODE";
pub const ENV_HASH_CHUNK_SIZE: &str = "IMAGEGUARD_HASH_CHUNK_SIZE";
pub const ENV_DEFAULT_THRESHOLD: &str = "IMAGEGUARD_DEFAULT_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// What happens to private keys after signing (default: self-verify-only)
    pub signing_mode: SigningMode,
    /// Bytes per streamed digest chunk (default: 64 KiB, at least 1)
    pub hash_chunk_size: usize,
    /// Threshold used when a comparison does not supply one (default: 5)
    pub default_threshold: TamperingThreshold,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signing_mode: SigningMode::SelfVerifyOnly,
            hash_chunk_size: DEFAULT_CHUNK_SIZE,
            default_threshold: TamperingThreshold::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let signing_mode = lookup(ENV_SIGNING_MODE)
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| match v.parse::<SigningMode>() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    warn!(key = ENV_SIGNING_MODE, value = %v, "{}, using default", e);
                    None
                }
            })
            .unwrap_or(defaults.signing_mode);

        let hash_chunk_size = lookup(ENV_HASH_CHUNK_SIZE)
            .and_then(|v| match v.trim().parse::<usize>() {
                Ok(size) => Some(size.max(1)),
                Err(_) => {
                    warn!(key = ENV_HASH_CHUNK_SIZE, value = %v, "Invalid chunk size, using default");
                    None
                }
            })
            .unwrap_or(defaults.hash_chunk_size);

        let default_threshold = lookup(ENV_DEFAULT_THRESHOLD)
            .and_then(|v| {
                match v
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .and_then(|t| TamperingThreshold::new(t).ok())
                {
                    Some(threshold) => Some(threshold),
                    None => {
                        warn!(
                            key = ENV_DEFAULT_THRESHOLD,
                            value = %v,
                            "Threshold must be an integer between {} and {}, using default",
                            TamperingThreshold::MIN,
                            TamperingThreshold::MAX
                        );
                        None
                    }
                }
            })
            .unwrap_or(defaults.default_threshold);

        Self {
            signing_mode,
            hash_chunk_size,
            default_threshold,
        }
    }
}
