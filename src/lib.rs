//! # bookcorpus-dl
//!
//! Resumable, parallel fetch-and-validate pipeline for building a plain-text
//! book corpus from an ebook catalog manifest.
//!
//! ## Pipeline
//!
//! - [`harvest`] - reads a JSONL manifest and, for every entry whose output
//!   does not exist yet, fetches the plain text directly or downloads and
//!   converts the EPUB, checks the word count, and writes
//!   `{page_id}__{name}.txt` into the output directory
//! - [`sentences`] - rewrites a directory of books as one sentence per line
//! - [`tokenize`] - splits sentence lines into space-separated tokens
//!
//! Re-running [`Harvester::run`] against the same output directory only does
//! the work that is still missing; the files on disk are the only state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bookcorpus_dl::{Config, EpubTextConverter, Harvester, HttpRetrieval};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.harvest.output_dir = Some("out_txts".into());
//!     config.harvest.manifest_path = Some("url_list.jsonl".into());
//!     config.validate()?;
//!
//!     let retrieval = HttpRetrieval::new(&config.http, config.retry.clone())?;
//!     let harvester = Harvester::new(
//!         Arc::new(config),
//!         Arc::new(retrieval),
//!         Arc::new(EpubTextConverter),
//!     );
//!
//!     let report = harvester.run().await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// EPUB to text conversion
pub mod convert;
/// Error types
pub mod error;
/// HTTP retrieval
pub mod fetch;
/// Fetch orchestration over a manifest
pub mod harvest;
/// Manifest parsing
pub mod manifest;
/// Retry logic with backoff
pub mod retry;
/// Sentence-per-line corpus stage
pub mod sentences;
/// Output directory management
pub mod store;
/// Word tokenization corpus stage
pub mod tokenize;
/// Core types and outcomes
pub mod types;
/// Utility functions
pub mod utils;
/// Content validation
pub mod validate;

// Re-export commonly used types
pub use config::{Config, CorpusConfig, HarvestConfig, HttpConfig, RetryConfig};
pub use convert::{EpubConverter, EpubTextConverter};
pub use error::{
    CleanupError, ConvertError, Error, FetchError, ManifestError, Result, StoreError,
};
pub use fetch::{HttpRetrieval, Retrieval};
pub use harvest::Harvester;
pub use store::OutputStore;
pub use types::{ItemOutcome, ManifestEntry, RunReport, Source};
pub use validate::{ContentValidator, Verdict};

/// Drive `work` to completion unless the process is asked to stop first
///
/// On SIGTERM/SIGINT (Ctrl+C elsewhere) the work is dropped and
/// [`Error::Interrupted`] is returned. Items that were in flight are simply
/// redone by the next run, since nothing is committed until an item is
/// complete.
///
/// # Example
///
/// ```no_run
/// use bookcorpus_dl::{Config, EpubTextConverter, Harvester, HttpRetrieval, run_until_signal};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::from_file("bookcorpus.json".as_ref())?);
/// let retrieval = Arc::new(HttpRetrieval::new(&config.http, config.retry.clone())?);
/// let harvester = Harvester::new(config, retrieval, Arc::new(EpubTextConverter));
///
/// let report = run_until_signal(harvester.run()).await?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
pub async fn run_until_signal<F, T>(work: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        result = work => result,
        () = wait_for_signal() => {
            tracing::warn!("interrupted; unfinished items will be redone on the next run");
            Err(Error::Interrupted)
        }
    }
}

/// Resolves when a termination signal arrives; never resolves if none can be observed
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(
                error = %e,
                "Could not register one signal handler, listening on the other"
            );
            only.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(
                error = %e,
                "Could not register any signal handlers, using ctrl_c fallback"
            );
            ctrl_c_or_pending().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c_or_pending().await;
}

async fn ctrl_c_or_pending() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
