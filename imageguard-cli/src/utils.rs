//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imageguard_core::{EngineConfig, EvidenceEngine, RecordId};
use serde::Serialize;
use tracing::info;

use crate::vault::Vault;

/// Read an input file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

pub fn parse_record_id(raw: &str) -> Result<RecordId> {
    Ok(raw.parse::<RecordId>()?)
}

/// Build an engine over the vault at `path`, configured from the environment.
pub fn open_engine(path: &Path) -> Result<EvidenceEngine> {
    let vault = Vault::open(path)?;
    let engine = EvidenceEngine::new(EngineConfig::from_env(), vault.collaborators())
        .context("Failed to initialize evidence engine")?;
    Ok(engine)
}

/// Final path component, used to name files in records and audit events.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/evidence/scene.png")), "scene.png");
        assert_eq!(file_name(Path::new("scene.png")), "scene.png");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2024-01-15 12:30:45 UTC");
    }

    #[test]
    fn test_parse_record_id() {
        let id = RecordId::new();
        assert_eq!(parse_record_id(&id.to_string()).unwrap(), id);
        assert!(parse_record_id("case-1").is_err());
    }
}
