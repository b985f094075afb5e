use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error type covering the different failure cases that can occur while the
/// pipeline cleans, merges, aggregates, or persists feature tables.
///
/// Recoverability follows a three-tier policy: row-level defects are absorbed
/// with diagnostics, vocabulary gaps abort one instrument's reports, and
/// write failures are fatal only for the single artifact being produced.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the CSV reader or writer.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when JSON configuration parsing fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a column required by a report is absent from the table.
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    /// Raised when an instrument token has no taxonomy mapping. This signals
    /// a vocabulary gap, not a data defect, so it is never defaulted away.
    #[error("no taxonomy entry for instrument token '{0}'")]
    Resolution(String),

    /// Raised when a report artifact cannot be created or written.
    #[error("failed to write report '{path}': {message}")]
    Write { path: PathBuf, message: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
