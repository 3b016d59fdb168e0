//! Unified library error type.
//! Every layer (codec, store, lister, scanner, query) returns AppError so
//! callers can tell "nothing here" apart from hard failures.

use crate::codec::FormatError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Store conditions
    // ---------------------------
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("No records found for date {0}")]
    NoRecordsForDate(String),

    #[error("Operation cancelled")]
    Cancelled,

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Malformed record file {}: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("Invalid record path: {0}")]
    InvalidRecordPath(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    // ---------------------------
    // Logic errors
    // ---------------------------
    #[error("Inconsistent record: {0}")]
    Consistency(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// True for the "nothing to show" family, as opposed to hard failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::NoRecordsForDate(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
