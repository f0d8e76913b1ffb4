//! Compare command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use imageguard_core::{CompareRequest, ComparisonReport, TamperStatus, TamperingThreshold};
use serde_json::json;
use tracing::{debug, warn};

use crate::exit_codes::VerificationFailed;
use crate::utils::{file_name, open_engine, parse_record_id, print_json, read_input};
use crate::OutputFormat;

pub struct CompareArgs {
    pub record_id: String,
    pub file: PathBuf,
    pub threshold: Option<u32>,
    pub actor: Option<String>,
    pub diff_out: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Execute the compare command.
pub fn execute(vault: &Path, args: CompareArgs, quiet: bool) -> Result<()> {
    let record_id = parse_record_id(&args.record_id)?;
    let threshold = args.threshold.map(TamperingThreshold::new).transpose()?;
    let challenge = read_input(&args.file)?;
    let engine = open_engine(vault)?;

    let mut request = CompareRequest::new(record_id, &challenge, file_name(&args.file));
    if let Some(threshold) = threshold {
        request = request.with_threshold(threshold);
    }
    if let Some(actor) = args.actor {
        request = request.with_actor(actor);
    }

    let report = engine
        .compare(request)
        .with_context(|| format!("Failed to compare {}", args.file.display()))?;

    if let Some(path) = &args.diff_out {
        let png = report.difference.to_png()?;
        std::fs::write(path, png)
            .with_context(|| format!("Failed to write difference image: {}", path.display()))?;
        debug!(path = %path.display(), "Difference image written");
    }

    if !quiet {
        match args.format {
            OutputFormat::Json => print_json(&json!({
                "recordId": report.record_id,
                "caseId": report.case_id,
                "challenge": file_name(&args.file),
                "result": report.result,
            }))?,
            OutputFormat::Text => print_report(&report),
        }
    }

    if report.result.status == TamperStatus::Tampered {
        warn!(record_id = %report.record_id, "Challenge image differs from stored evidence");
        return Err(VerificationFailed("image has been tampered".into()).into());
    }
    Ok(())
}

fn print_report(report: &ComparisonReport) {
    let result = &report.result;
    println!();
    match result.status {
        TamperStatus::Original => {
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!(
                "{}",
                "║              ORIGINAL                  ║".green().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".green());
        }
        TamperStatus::Tampered => {
            println!("{}", "╔════════════════════════════════════════╗".red());
            println!(
                "{}",
                "║              TAMPERED                  ║".red().bold()
            );
            println!("{}", "╚════════════════════════════════════════╝".red());
        }
    }
    println!();
    println!("   {} {}", "Record ID:".dimmed(), report.record_id);
    println!("   {} {}", "Stored hash:".dimmed(), result.stored_hash);
    println!("   {} {}", "Uploaded hash:".dimmed(), result.uploaded_hash);
    println!(
        "   {} {}/64",
        "Hamming distance:".dimmed(),
        result.hamming_distance
    );
    println!(
        "   {} {:.2}% (threshold {})",
        "Similarity:".dimmed(),
        result.similarity_percent,
        result.threshold
    );
    match &result.difference_bbox {
        Some(bbox) => println!(
            "   {} {}x{} at ({}, {})",
            "Changed region:".dimmed(),
            bbox.width(),
            bbox.height(),
            bbox.left,
            bbox.top
        ),
        None => println!("   {} {}", "Changed region:".dimmed(), "none".green()),
    }
}
