//! Verify command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{error, info};

use crate::exit_codes::VerificationFailed;
use crate::utils::{open_engine, parse_record_id};

fn status_line(ok: bool, good: &str, bad: &str) -> colored::ColoredString {
    if ok {
        good.green()
    } else {
        bad.red()
    }
}

/// Execute the verify command.
pub fn execute(vault: &Path, record_id: &str, quiet: bool) -> Result<()> {
    let record_id = parse_record_id(record_id)?;
    let engine = open_engine(vault)?;

    let verification = engine
        .verify_record(&record_id)
        .with_context(|| format!("Failed to verify record {}", record_id))?;

    if verification.is_intact() {
        info!(%record_id, "Verification successful");
    } else {
        error!(
            %record_id,
            content_hash_matches = verification.content_hash_matches,
            signature_valid = verification.signature_valid,
            "Verification failed"
        );
    }

    if !quiet {
        println!();
        if verification.is_intact() {
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!(
                "{}",
                "║               INTACT                   ║".green().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".green());
        } else {
            println!("{}", "╔════════════════════════════════════════╗".red());
            println!(
                "{}",
                "║              TAMPERED                  ║".red().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".red());
        }
        println!();
        println!("   {} {}", "Record ID:".dimmed(), record_id);
        println!(
            "   {} {}",
            "Content:".dimmed(),
            status_line(
                verification.content_hash_matches,
                "Matches recorded hash",
                "MODIFIED since ingest"
            )
        );
        println!(
            "   {} {}",
            "Signature:".dimmed(),
            status_line(verification.signature_valid, "Valid (Ed25519)", "INVALID")
        );
    }

    match (
        verification.content_hash_matches,
        verification.signature_valid,
    ) {
        (true, true) => Ok(()),
        (false, _) => Err(VerificationFailed(
            "stored image no longer matches its content hash".into(),
        )
        .into()),
        (true, false) => Err(VerificationFailed(
            "signature does not match the content hash".into(),
        )
        .into()),
    }
}
