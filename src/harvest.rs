//! Fetch orchestration
//!
//! [`Harvester::run`] streams the manifest, skips entries whose output already
//! exists, and runs every other entry through
//! fetch → (convert) → validate → commit on its own task. At most `workers`
//! items are in flight; they complete in any order.
//!
//! Per-item failures never stop the batch. They are logged with the URL and
//! cause and counted in the returned [`RunReport`]. Only an unreadable
//! manifest or an unusable output directory ends a run early.

use crate::config::Config;
use crate::convert::EpubConverter;
use crate::error::{ManifestError, Result};
use crate::fetch::Retrieval;
use crate::manifest;
use crate::store::OutputStore;
use crate::types::{ItemOutcome, ManifestEntry, RunReport, Source};
use crate::utils::decode_text;
use crate::validate::{ContentValidator, Verdict};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives one pass over a manifest
pub struct Harvester {
    config: Arc<Config>,
    retrieval: Arc<dyn Retrieval>,
    converter: Arc<dyn EpubConverter>,
}

/// Shared, read-only state handed to every item task
struct ItemContext {
    manifest_path: PathBuf,
    store: OutputStore,
    retrieval: Arc<dyn Retrieval>,
    converter: Arc<dyn EpubConverter>,
    validator: ContentValidator,
}

impl Harvester {
    /// Create a harvester over the given retrieval and conversion backends
    pub fn new(
        config: Arc<Config>,
        retrieval: Arc<dyn Retrieval>,
        converter: Arc<dyn EpubConverter>,
    ) -> Self {
        Self {
            config,
            retrieval,
            converter,
        }
    }

    /// Process every manifest line once
    ///
    /// # Errors
    /// Fails only when the configuration lacks a path, the output directory
    /// cannot be created or listed, or the manifest cannot be opened or read.
    pub async fn run(&self) -> Result<RunReport> {
        let output_dir = self.config.output_dir()?;
        let manifest_path = self.config.manifest_path()?;
        let workers = self.config.harvest.workers.max(1);

        let store = OutputStore::open(output_dir).await?;
        info!(
            "{} files had already been saved in {}",
            store.done_count(),
            store.dir().display()
        );
        info!("Using {workers} workers");

        let lines = manifest::read_lines(manifest_path).await?;

        let ctx = Arc::new(ItemContext {
            manifest_path: manifest_path.to_path_buf(),
            store,
            retrieval: self.retrieval.clone(),
            converter: self.converter.clone(),
            validator: ContentValidator::new(self.config.harvest.filter_word_count),
        });

        let mut outcomes = lines
            .map(|(line_number, line)| handle_line(ctx.clone(), line_number, line))
            .buffer_unordered(workers);

        let mut report = RunReport::default();
        while let Some(result) = outcomes.next().await {
            match result {
                Ok(Some(outcome)) => report.record(&outcome),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "stopping: manifest could not be read");
                    return Err(e.into());
                }
            }
        }

        info!("{report}");
        Ok(report)
    }
}

/// Parse one manifest line and run its item on a dedicated task
///
/// Returns `Ok(None)` for blank lines and `Err` only for a fatal read error.
async fn handle_line(
    ctx: Arc<ItemContext>,
    line_number: usize,
    line: std::io::Result<String>,
) -> std::result::Result<Option<ItemOutcome>, ManifestError> {
    let parsed = line
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::InvalidData {
                ManifestError::NotUtf8 {
                    line: line_number,
                    source,
                }
            } else {
                ManifestError::Read {
                    path: ctx.manifest_path.clone(),
                    source,
                }
            }
        })
        .and_then(|line| manifest::parse_line(line_number, &line));

    let entry = match parsed {
        Ok(Some(entry)) => entry,
        Ok(None) => return Ok(None),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(line = line_number, error = %e, "skipping malformed manifest line");
            return Ok(Some(ItemOutcome::Malformed(e.to_string())));
        }
    };

    let task_ctx = ctx.clone();
    let task_entry = entry.clone();
    let handle = tokio::spawn(async move { task_ctx.process(&task_entry).await });

    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                line = line_number,
                url = entry.source().url(),
                error = %e,
                "item worker crashed"
            );
            if matches!(entry.source(), Source::Epub(_)) {
                ctx.store.discard_temp(&ctx.store.temp_path_for(&entry)).await;
            }
            ItemOutcome::Crashed(e.to_string())
        }
    };

    Ok(Some(outcome))
}

impl ItemContext {
    async fn process(&self, entry: &ManifestEntry) -> ItemOutcome {
        if self.store.is_done(entry) {
            debug!(
                line = entry.line_number,
                page = %entry.source_page_id,
                "already saved, skipping"
            );
            return ItemOutcome::Skipped;
        }

        let outcome = match entry.source() {
            Source::Text(url) => self.process_text(entry, url).await,
            Source::Epub(url) => self.process_epub(entry, url).await,
        };
        debug!(line = entry.line_number, outcome = outcome.label(), "item finished");
        outcome
    }

    async fn process_text(&self, entry: &ManifestEntry, url: &str) -> ItemOutcome {
        let bytes = match self.retrieval.fetch_bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(url, error = %e, "giving up on text");
                return ItemOutcome::FetchFailed(e.to_string());
            }
        };

        let text = decode_text(&bytes);
        // Direct text downloads are trusted: the declared count describes the EPUB
        let verdict = self.validator.accept(&text, None);
        self.finish(entry, url, &text, verdict).await
    }

    async fn process_epub(&self, entry: &ManifestEntry, url: &str) -> ItemOutcome {
        let temp = self.store.temp_path_for(entry);

        let converted = match self.retrieval.fetch_to_file(url, &temp).await {
            Ok(_) => self.converter.convert(&temp).await,
            Err(e) => {
                error!(url, error = %e, "giving up on EPUB");
                self.store.discard_temp(&temp).await;
                return ItemOutcome::FetchFailed(e.to_string());
            }
        };
        self.store.discard_temp(&temp).await;

        let text = match converted {
            Ok(text) => text,
            Err(e) => {
                error!(url, error = %e, "EPUB conversion failed");
                return ItemOutcome::ConvertFailed(e.to_string());
            }
        };

        let verdict = self.validator.accept(&text, entry.expected_word_count);
        self.finish(entry, url, &text, verdict).await
    }

    async fn finish(
        &self,
        entry: &ManifestEntry,
        url: &str,
        text: &str,
        verdict: Verdict,
    ) -> ItemOutcome {
        if !verdict.is_accepted() {
            info!(url, reason = %verdict, "rejected");
            return ItemOutcome::Rejected(verdict);
        }

        match self.store.commit(entry, text).await {
            Ok(path) => {
                debug!(url, path = %path.display(), "saved");
                ItemOutcome::Committed
            }
            Err(e) => {
                error!(url, error = %e, "failed to save text");
                self.store.remove_output(entry).await;
                ItemOutcome::StoreFailed(e.to_string())
            }
        }
    }
}
