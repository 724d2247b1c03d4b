//! Core types shared by the harvest pipeline

use crate::validate::Verdict;
use std::fmt;

/// One catalog item read from the manifest
///
/// Immutable once parsed. At least one of `epub_url` / `text_url` is
/// non-empty; [`crate::manifest::parse_line`] rejects records that violate this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// 1-based manifest line the entry came from
    pub line_number: usize,
    /// Stable identifier derived from the catalog page URL
    pub source_page_id: String,
    /// EPUB download URL, possibly empty
    pub epub_url: String,
    /// Direct plain-text URL, possibly empty
    pub text_url: String,
    /// Word count declared by the catalog, if captured
    pub expected_word_count: Option<u64>,
}

impl ManifestEntry {
    /// Retrieval route for this entry; a direct text URL wins over the EPUB
    pub fn source(&self) -> Source<'_> {
        if !self.text_url.is_empty() {
            Source::Text(&self.text_url)
        } else {
            Source::Epub(&self.epub_url)
        }
    }
}

/// Retrievable form chosen for an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source<'a> {
    /// Already-plain-text resource, fetched into memory
    Text(&'a str),
    /// EPUB container, fetched to a temporary file and converted
    Epub(&'a str),
}

impl<'a> Source<'a> {
    /// URL of the chosen resource
    pub fn url(&self) -> &'a str {
        match self {
            Source::Text(url) | Source::Epub(url) => url,
        }
    }
}

/// Terminal state of one manifest item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Output already existed when the run started
    Skipped,
    /// Text was validated and written
    Committed,
    /// Text failed the plausibility filter; nothing written
    Rejected(Verdict),
    /// Retrieval failed permanently or exhausted its attempts
    FetchFailed(String),
    /// EPUB could not be converted to text
    ConvertFailed(String),
    /// Output could not be written
    StoreFailed(String),
    /// Manifest line could not be turned into an entry
    Malformed(String),
    /// The worker processing the item panicked
    Crashed(String),
}

impl ItemOutcome {
    /// Short lowercase label for logs
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Committed => "committed",
            ItemOutcome::Rejected(_) => "rejected",
            ItemOutcome::FetchFailed(_) => "fetch_failed",
            ItemOutcome::ConvertFailed(_) => "convert_failed",
            ItemOutcome::StoreFailed(_) => "store_failed",
            ItemOutcome::Malformed(_) => "malformed",
            ItemOutcome::Crashed(_) => "crashed",
        }
    }
}

/// Per-outcome counts for one run
///
/// Informational only: the files on disk are the result of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Items whose output already existed
    pub skipped: usize,
    /// Items written
    pub committed: usize,
    /// Items dropped by validation
    pub rejected: usize,
    /// Items whose retrieval failed
    pub fetch_failed: usize,
    /// Items whose conversion failed
    pub convert_failed: usize,
    /// Items whose output could not be written
    pub store_failed: usize,
    /// Manifest lines that were not valid entries
    pub malformed: usize,
    /// Items whose worker panicked
    pub crashed: usize,
}

impl RunReport {
    /// Count one outcome
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Committed => self.committed += 1,
            ItemOutcome::Rejected(_) => self.rejected += 1,
            ItemOutcome::FetchFailed(_) => self.fetch_failed += 1,
            ItemOutcome::ConvertFailed(_) => self.convert_failed += 1,
            ItemOutcome::StoreFailed(_) => self.store_failed += 1,
            ItemOutcome::Malformed(_) => self.malformed += 1,
            ItemOutcome::Crashed(_) => self.crashed += 1,
        }
    }

    /// Total number of manifest items seen
    pub fn total(&self) -> usize {
        self.skipped
            + self.committed
            + self.rejected
            + self.fetch_failed
            + self.convert_failed
            + self.store_failed
            + self.malformed
            + self.crashed
    }

    /// Number of items that ended in a failure
    pub fn failures(&self) -> usize {
        self.fetch_failed + self.convert_failed + self.store_failed + self.malformed + self.crashed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} committed, {} skipped, {} rejected, {} failed",
            self.total(),
            self.committed,
            self.skipped,
            self.rejected,
            self.failures()
        )
    }
}
