//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use imageguard_core::{EngineConfig, EvidenceEngine};

use crate::utils::{print_json, read_input};
use crate::OutputFormat;

/// Execute the fingerprint command. Nothing is stored.
pub fn execute(file: PathBuf, format: OutputFormat, quiet: bool) -> Result<()> {
    let content = read_input(&file)?;
    let engine = EvidenceEngine::in_memory(EngineConfig::from_env())?;
    let fingerprints = engine
        .fingerprint(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;

    if quiet {
        return Ok(());
    }
    match format {
        OutputFormat::Json => print_json(&fingerprints)?,
        OutputFormat::Text => {
            println!();
            println!("   {} {}", "File:".dimmed(), file.display());
            println!(
                "   {} {}",
                "Content hash:".dimmed(),
                fingerprints.content_hash
            );
            println!(
                "   {} {}",
                "Perceptual hash:".dimmed(),
                fingerprints.perceptual_hash
            );
            println!(
                "   {} {} bytes",
                "Canonical size:".dimmed(),
                fingerprints.canonical_size
            );
        }
    }
    Ok(())
}
