//! Error types for bookcorpus-dl
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] - crate-level error, returned by run-fatal operations
//! - [`FetchError`] - network retrieval failures (retried, then abandoned per item)
//! - [`ConvertError`] - EPUB conversion failures (fatal for one item)
//! - [`StoreError`] - output directory and file write failures
//! - [`ManifestError`] - manifest open/read failures and malformed records
//! - [`CleanupError`] - best-effort removal failures (logged, never propagated)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for bookcorpus-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bookcorpus-dl
///
/// Only failures that end a whole run surface as this type. Per-item failures
/// are folded into [`crate::types::ItemOutcome`] by the harvester.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// Manifest could not be opened or read
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Output store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or request error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was stopped by a termination signal
    #[error("interrupted")]
    Interrupted,
}

/// Retrieval errors for a single URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, request, or body read failure reported by the HTTP client
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The URL being fetched
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// No response headers, or no new body bytes, arrived within the timeout
    #[error("{url} stalled for {}s", .after.as_secs_f64())]
    Timeout {
        /// The URL being fetched
        url: String,
        /// How long the request waited without progress
        after: Duration,
    },

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The URL being fetched
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Writing the downloaded body to disk failed
    #[error("failed to write {url} to {path}: {source}")]
    Io {
        /// The URL being fetched
        url: String,
        /// Destination file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Every attempt failed; carries the cause of the last one
    #[error("gave up on {url} after {attempts} attempts: {source}")]
    Exhausted {
        /// The URL being fetched
        url: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: Box<FetchError>,
    },
}

/// EPUB conversion errors
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The container could not be opened or parsed
    #[error("failed to open EPUB {path}: {reason}")]
    Open {
        /// Path of the EPUB file
        path: PathBuf,
        /// Decoder error message
        reason: String,
    },

    /// The container has no readable documents in its spine
    #[error("EPUB {path} has no readable documents")]
    NoContent {
        /// Path of the EPUB file
        path: PathBuf,
    },

    /// The blocking conversion task panicked or was cancelled
    #[error("conversion task for {path} failed: {reason}")]
    Task {
        /// Path of the EPUB file
        path: PathBuf,
        /// Join error message
        reason: String,
    },
}

/// Output store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Output directory could not be created
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Existing outputs could not be listed
    #[error("failed to list output directory {path}: {source}")]
    Snapshot {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing the output text failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// File being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Moving the finished file into place failed
    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        /// Partial file
        from: PathBuf,
        /// Final output path
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Manifest errors
///
/// `Open` and `Read` end the run; the remaining variants describe a single
/// malformed line, which is reported and skipped.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be opened
    #[error("failed to open manifest {path}: {source}")]
    Open {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading from the manifest failed mid-stream
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Line is not valid UTF-8
    #[error("line {line}: not valid UTF-8: {source}")]
    NotUtf8 {
        /// 1-based line number
        line: usize,
        /// Decoder error reported by the line reader
        #[source]
        source: std::io::Error,
    },

    /// Line is not a valid JSON record
    #[error("line {line}: invalid JSON record: {source}")]
    InvalidJson {
        /// 1-based line number
        line: usize,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Record has neither an EPUB nor a text URL
    #[error("line {line}: record for {page} has neither an epub nor a txt URL")]
    MissingSource {
        /// 1-based line number
        line: usize,
        /// Catalog page URL of the record
        page: String,
    },

    /// No page identifier could be derived from the page URL
    #[error("line {line}: cannot derive a page id from {page:?}")]
    InvalidPage {
        /// 1-based line number
        line: usize,
        /// Catalog page URL of the record
        page: String,
    },
}

impl ManifestError {
    /// Whether this error ends the run rather than skipping one line
    pub fn is_fatal(&self) -> bool {
        matches!(self, ManifestError::Open { .. } | ManifestError::Read { .. })
    }
}

/// Failure to remove an intermediate or partial file
///
/// Cleanup never masks the primary outcome of an item, so this error is only
/// ever logged.
#[derive(Debug, Error)]
#[error("failed to remove {path}: {source}")]
pub struct CleanupError {
    /// File that could not be removed
    pub path: PathBuf,
    /// Underlying I/O error
    #[source]
    pub source: std::io::Error,
}
