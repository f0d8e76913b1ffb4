//! Subcommand implementations.

pub mod compare;
pub mod fingerprint;
pub mod ingest;
pub mod show;
pub mod verify;

use colored::Colorize;
use imageguard_core::EvidenceRecord;

use crate::utils::format_timestamp;

/// Print the fields of a record in the shared text layout.
pub(crate) fn print_record(record: &EvidenceRecord) {
    println!("   {} {}", "Record ID:".dimmed(), record.id);
    println!("   {} {}", "Case:".dimmed(), record.case_id);
    if let Some(name) = &record.original_filename {
        println!("   {} {}", "File:".dimmed(), name);
    }
    println!("   {} {}", "Content hash:".dimmed(), record.content_hash);
    println!("   {} {}", "Perceptual hash:".dimmed(), record.perceptual_hash);
    println!("   {} {}", "Signing mode:".dimmed(), record.signing_mode);
    println!("   {} {}", "Public key:".dimmed(), record.public_key);
    println!(
        "   {} {}",
        "Uploaded at:".dimmed(),
        format_timestamp(&record.uploaded_at)
    );
}
