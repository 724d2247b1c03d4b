//! Output directory management
//!
//! Each committed book is one `.txt` file whose name is derived from the
//! manifest entry alone, so the presence of that file is the only "done"
//! marker. There is no separate ledger.
//!
//! The set of existing outputs is listed once when the store is opened and is
//! not refreshed while a run is in progress. Two entries that map to the same
//! file name within one run are not detected; page ids keep names disjoint.

use crate::error::{CleanupError, StoreError};
use crate::types::ManifestEntry;
use crate::utils::{url_basename, with_txt_extension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix of a file being written, renamed away once complete
const PARTIAL_SUFFIX: &str = ".part";

/// Deterministic, idempotent output directory
#[derive(Debug)]
pub struct OutputStore {
    dir: PathBuf,
    done: HashSet<String>,
}

impl OutputStore {
    /// Create the directory if needed and snapshot the existing `.txt` outputs
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;

        let snapshot_err = |source| StoreError::Snapshot {
            path: dir.to_path_buf(),
            source,
        };

        let mut done = HashSet::new();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(snapshot_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(snapshot_err)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(".txt") {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                done.insert(name);
            }
        }

        debug!(dir = %dir.display(), existing = done.len(), "output directory snapshot taken");

        Ok(Self {
            dir: dir.to_path_buf(),
            done,
        })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of outputs that existed when the store was opened
    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    /// Whether the entry's output existed when the store was opened
    pub fn is_done(&self, entry: &ManifestEntry) -> bool {
        self.done.contains(&output_file_name(entry))
    }

    /// Final output path for an entry
    pub fn path_for(&self, entry: &ManifestEntry) -> PathBuf {
        self.dir.join(output_file_name(entry))
    }

    /// Path the entry's EPUB is downloaded to before conversion
    ///
    /// Never ends in `.txt`, so a leftover is never mistaken for an output.
    pub fn temp_path_for(&self, entry: &ManifestEntry) -> PathBuf {
        let mut name = format!(
            "tmp_{}_{}",
            entry.source_page_id,
            url_basename(&entry.epub_url)
        );
        if !name.ends_with(".epub") {
            name.push_str(".epub");
        }
        self.dir.join(name)
    }

    /// Write `text` as the entry's output
    ///
    /// The text goes to a `.part` sibling first and is renamed into place, so
    /// the final path either holds the complete text or does not exist.
    pub async fn commit(&self, entry: &ManifestEntry, text: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(entry);
        let partial = partial_path(&path);

        if let Err(source) = tokio::fs::write(&partial, text.as_bytes()).await {
            self.discard(&partial).await;
            return Err(StoreError::Write {
                path: partial,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&partial, &path).await {
            self.discard(&partial).await;
            return Err(StoreError::Rename {
                from: partial,
                to: path,
                source,
            });
        }

        Ok(path)
    }

    /// Remove an intermediate download; failures are logged, never returned
    pub async fn discard_temp(&self, path: &Path) {
        self.discard(path).await;
    }

    /// Remove whatever a failed item may have left at its output path
    pub async fn remove_output(&self, entry: &ManifestEntry) {
        let path = self.path_for(entry);
        self.discard(&partial_path(&path)).await;
        self.discard(&path).await;
    }

    async fn discard(&self, path: &Path) {
        match remove_if_exists(path).await {
            Ok(true) => debug!(path = %path.display(), "removed"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "cleanup failed"),
        }
    }
}

/// Output file name for an entry: `{source_page_id}__{basename}.txt`
///
/// The basename comes from the URL that will actually be fetched (the text URL
/// when present, otherwise the EPUB URL).
pub fn output_file_name(entry: &ManifestEntry) -> String {
    let basename = with_txt_extension(&url_basename(entry.source().url()));
    format!("{}__{}", entry.source_page_id, basename)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Remove a file, treating "already gone" as success
///
/// Returns whether a file was removed.
pub async fn remove_if_exists(path: &Path) -> Result<bool, CleanupError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
