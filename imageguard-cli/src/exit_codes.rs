//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use std::io;

use imageguard_core::IntegrityError;
use thiserror::Error;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (tampered image, failed verification).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file or unknown record.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (vault unreadable or unwritable).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// A negative verdict: the image was tampered with or its record failed
/// verification. Exits with [`VERIFICATION_FAILED`].
#[derive(Debug, Error)]
#[error("Verification failed: {0}")]
pub struct VerificationFailed(pub String);

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let verdict = err.downcast_ref::<VerificationFailed>();
        let integrity = err.chain().find_map(|e| e.downcast_ref::<IntegrityError>());
        let io = err.chain().find_map(|e| e.downcast_ref::<io::Error>());

        let code = match (integrity, io) {
            _ if verdict.is_some() => VERIFICATION_FAILED,
            (Some(IntegrityError::RecordNotFound(_) | IntegrityError::BlobNotFound(_)), _) => {
                INPUT_ERROR
            }
            (Some(IntegrityError::InvalidThreshold(_) | IntegrityError::InvalidRecordId(_)), _) => {
                USAGE_ERROR
            }
            (Some(e), _) if e.is_collaborator_failure() => IO_ERROR,
            (_, Some(e)) if e.kind() == io::ErrorKind::NotFound => INPUT_ERROR,
            (_, Some(_)) => IO_ERROR,
            _ => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(exit: ExitCode) -> Self {
        std::process::ExitCode::from(u8::try_from(exit.code).unwrap_or(1))
    }
}
