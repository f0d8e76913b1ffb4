//! Show command implementation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::commands::print_record;
use crate::utils::{parse_record_id, print_json};
use crate::vault::Vault;
use crate::OutputFormat;

/// Execute the show command.
pub fn execute(vault: &Path, record_id: &str, format: OutputFormat, quiet: bool) -> Result<()> {
    let record_id = parse_record_id(record_id)?;
    let collaborators = Vault::open(vault)?.collaborators();
    let record = collaborators
        .records
        .get(&record_id)
        .with_context(|| format!("Failed to load record {}", record_id))?;

    if quiet {
        return Ok(());
    }
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!();
            print_record(&record);
        }
    }
    Ok(())
}
