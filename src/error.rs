//! Error types for resolution-collector
//!
//! The taxonomy mirrors the pipeline's containment policy:
//! - per-item failures (one search page, one document, one validated file)
//!   are contained and reported by the run, never propagated out of it;
//! - only session initialization ([`Error::Session`]) and artifact
//!   persistence ([`PersistenceError`]) are allowed to abort a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for resolution-collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for resolution-collector
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Browser-automation session could not be initialized or lost its
    /// backing process. Fatal before any enumeration begins: no useful
    /// work is possible without a session.
    #[error("session error: {0}")]
    Session(String),

    /// The readiness marker never appeared in the rendered page within the
    /// configured timeout. Transient: eligible for bounded retry.
    #[error("readiness marker {marker:?} not found on {url} within {waited:?}")]
    FetchTimeout {
        /// URL that was being rendered
        url: String,
        /// CSS selector that was expected to appear
        marker: String,
        /// How long the fetch waited before giving up
        waited: Duration,
    },

    /// Navigation or page-snapshot failure below the readiness barrier.
    /// Transient: eligible for bounded retry.
    #[error("navigation failed for {url}: {reason}")]
    Navigation {
        /// URL that failed to load
        url: String,
        /// Underlying driver error text
        reason: String,
    },

    /// Expected markup absent on an otherwise rendered page. Never retried:
    /// missing structure will not appear on a second attempt.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// A downloaded PDF could not be converted to text. Contained per
    /// attachment: the remaining conversions still run.
    #[error("failed to extract text from {path}: {reason}")]
    PdfText {
        /// Attachment that could not be converted
        path: PathBuf,
        /// Underlying conversion error text
        reason: String,
    },

    /// Artifact write failure. Fatal for the persistence step, but must not
    /// clobber a previously persisted artifact (write-then-rename).
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A configured CSS selector failed to parse
    #[error("invalid selector {selector:?}: {reason}")]
    Selector {
        /// The selector text that failed to parse
        selector: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Plain HTTP error (attachment downloads)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL construction or resolution error
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural extraction failures: the page rendered but the expected
/// content markers were not present.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Title element absent from the document page
    #[error("title element missing on {url}")]
    MissingTitle {
        /// Document URL whose title element was absent
        url: String,
    },

    /// No body content elements present on the document page.
    /// Note: body elements that exist but hold empty text are NOT a
    /// structural failure — emptiness is a validation-stage concern.
    #[error("body content elements missing on {url}")]
    MissingBody {
        /// Document URL whose body elements were absent
        url: String,
    },
}

/// Artifact persistence failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Could not create the destination directory
    #[error("failed to create directory {path}: {reason}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error text
        reason: String,
    },

    /// Could not write the temporary artifact file
    #[error("failed to write temporary artifact {path}: {reason}")]
    TempWrite {
        /// Temporary file path that could not be written
        path: PathBuf,
        /// Underlying I/O error text
        reason: String,
    },

    /// Could not rename the temporary file over the final artifact path
    #[error("failed to commit {from} to {to}: {reason}")]
    Commit {
        /// Temporary file that was fully written
        from: PathBuf,
        /// Final artifact path
        to: PathBuf,
        /// Underlying I/O error text
        reason: String,
    },
}

impl Error {
    /// True for errors a single fetch can recover from by retrying.
    /// Structural and setup failures are permanent by definition.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::FetchTimeout { .. } | Error::Navigation { .. } => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
