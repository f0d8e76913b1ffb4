//! ImageGuard CLI - evidence ingest and tampering detection.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;
mod vault;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid record id or threshold)
  65  Image tampered or record verification failed
  66  Input file or record not found
  74  Vault I/O error";

#[derive(Parser)]
#[command(name = "imageguard")]
#[command(author, version, about = "Evidence integrity and tampering detection for images", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Vault directory holding canonical images, records and the audit log
    #[arg(long, global = true, env = "IMAGEGUARD_VAULT", default_value = ".imageguard")]
    vault: PathBuf,

    /// Suppress user-facing output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize, fingerprint and sign an image, storing it as evidence
    Ingest {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Case the evidence belongs to
        #[arg(long = "case", value_name = "CASE_ID")]
        case_id: String,

        /// Actor recorded in the audit log
        #[arg(long, value_name = "ID")]
        actor: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Compare an image against stored evidence
    Compare {
        /// Record to compare against
        #[arg(value_name = "RECORD_ID")]
        record_id: String,

        /// Path to the challenge image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Tampering threshold, 1-64 (defaults to IMAGEGUARD_DEFAULT_THRESHOLD or 5)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Actor recorded in the audit log
        #[arg(long, value_name = "ID")]
        actor: Option<String>,

        /// Write the difference image as PNG
        #[arg(long, value_name = "PNG")]
        diff_out: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Recompute a record's content hash and check its signature
    Verify {
        #[arg(value_name = "RECORD_ID")]
        record_id: String,
    },

    /// Print a stored evidence record
    Show {
        #[arg(value_name = "RECORD_ID")]
        record_id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the canonical content hash and perceptual hash of an image
    Fingerprint {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    let vault = cli.vault;

    match cli.command {
        Commands::Ingest {
            file,
            case_id,
            actor,
            format,
        } => commands::ingest::execute(&vault, file, case_id, actor, format, quiet),
        Commands::Compare {
            record_id,
            file,
            threshold,
            actor,
            diff_out,
            format,
        } => commands::compare::execute(
            &vault,
            commands::compare::CompareArgs {
                record_id,
                file,
                threshold,
                actor,
                diff_out,
                format,
            },
            quiet,
        ),
        Commands::Verify { record_id } => commands::verify::execute(&vault, &record_id, quiet),
        Commands::Show { record_id, format } => {
            commands::show::execute(&vault, &record_id, format, quiet)
        }
        Commands::Fingerprint { file, format } => {
            commands::fingerprint::execute(file, format, quiet)
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::success().into(),
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {}", "Error:".red().bold(), message);
            }
            exit.into()
        }
    }
}
