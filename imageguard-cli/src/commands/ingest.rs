//! Ingest command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use imageguard_core::IngestRequest;
use tracing::info;

use crate::commands::print_record;
use crate::utils::{file_name, open_engine, print_json, read_input};
use crate::OutputFormat;

/// Execute the ingest command.
pub fn execute(
    vault: &Path,
    file: PathBuf,
    case_id: String,
    actor: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let content = read_input(&file)?;
    let engine = open_engine(vault)?;

    let mut request = IngestRequest::new(case_id, &content).with_filename(file_name(&file));
    if let Some(actor) = actor {
        request = request.with_actor(actor);
    }

    let receipt = engine
        .ingest(request)
        .with_context(|| format!("Failed to ingest {}", file.display()))?;
    let record = receipt.record;

    info!(record_id = %record.id, signing_mode = %record.signing_mode, "Evidence ingested");

    if quiet {
        return Ok(());
    }
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!();
            println!("{}", "Evidence ingested".green().bold());
            println!();
            print_record(&record);
        }
    }
    Ok(())
}
