//! Manifest parsing
//!
//! The manifest is newline-delimited JSON, one catalog item per line:
//!
//! ```json
//! {"page": "https://www.smashwords.com/books/view/12345", "epub": "https://…/book.epub", "txt": "", "num_words": 52000}
//! ```
//!
//! Other fields written by the catalog scraper (`title`, `author`, `genres`,
//! `publish`, `b_idx`) are ignored.

use crate::error::ManifestError;
use crate::types::ManifestEntry;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;

/// Raw manifest record as written by the catalog scraper
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRecord {
    /// Catalog page URL
    pub page: String,
    /// EPUB URL; missing or `null` means empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub epub: String,
    /// Plain-text URL; missing or `null` means empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub txt: String,
    /// Declared word count
    #[serde(default)]
    pub num_words: Option<u64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse one manifest line
///
/// Returns `Ok(None)` for blank lines, which are ignored rather than reported.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<ManifestEntry>, ManifestError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let record: ManifestRecord =
        serde_json::from_str(line).map_err(|source| ManifestError::InvalidJson {
            line: line_number,
            source,
        })?;

    ManifestEntry::from_record(line_number, record).map(Some)
}

impl ManifestEntry {
    /// Build an entry from a raw record, enforcing the entry invariants
    pub fn from_record(line_number: usize, record: ManifestRecord) -> Result<Self, ManifestError> {
        let epub_url = record.epub.trim().to_string();
        let text_url = record.txt.trim().to_string();

        if epub_url.is_empty() && text_url.is_empty() {
            return Err(ManifestError::MissingSource {
                line: line_number,
                page: record.page,
            });
        }

        let source_page_id =
            page_id(&record.page).ok_or_else(|| ManifestError::InvalidPage {
                line: line_number,
                page: record.page.clone(),
            })?;

        Ok(Self {
            line_number,
            source_page_id,
            epub_url,
            text_url,
            // The scraper writes 0 when it could not read a count
            expected_word_count: record.num_words.filter(|&n| n > 0),
        })
    }
}

/// Stable identifier for a catalog page: the last non-empty path segment
///
/// `https://www.smashwords.com/books/view/12345` → `12345`
pub fn page_id(page: &str) -> Option<String> {
    let page = page.trim();
    let segment = match url::Url::parse(page) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(str::to_string),
        Err(_) => page
            .rsplit('/')
            .find(|s| !s.is_empty())
            .map(str::to_string),
    };
    segment.filter(|s| s != "." && s != "..")
}

/// Open a manifest and stream its lines with 1-based line numbers
///
/// Failure to open the file is fatal for the run; so is a read error later on.
pub async fn read_lines(
    path: &Path,
) -> Result<
    impl Stream<Item = (usize, std::io::Result<String>)> + Send + Unpin + 'static,
    ManifestError,
> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let lines = tokio::io::BufReader::new(file).lines();
    Ok(LinesStream::new(lines)
        .enumerate()
        .map(|(index, line)| (index + 1, line)))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_scraper_record() {
        let line = r#"{"page": "https://www.smashwords.com/books/view/12345", "epub": "https://www.smashwords.com/books/download/12345/8/latest/0/0/a-book.epub", "txt": "", "title": "A Book", "author": "Someone", "genres": ["Fiction\tFantasy"], "publish": "May 1, 2010", "num_words": 52000, "b_idx": 7}"#;

        let entry = parse_line(3, line).unwrap().unwrap();
        assert_eq!(entry.line_number, 3);
        assert_eq!(entry.source_page_id, "12345");
        assert!(entry.epub_url.ends_with("a-book.epub"));
        assert_eq!(entry.text_url, "");
        assert_eq!(entry.expected_word_count, Some(52000));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(2, "   \t").unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_reported_with_line_number() {
        match parse_line(9, "{not json") {
            Err(ManifestError::InvalidJson { line, .. }) => assert_eq!(line, 9),
            other => panic!("expected InvalidJson, got {other:?}"),
        }
        // `page` is required
        assert!(matches!(
            parse_line(1, r#"{"epub": "https://x/a.epub"}"#),
            Err(ManifestError::InvalidJson { .. })
        ));
    }

    #[test]
    fn record_without_any_url_is_malformed() {
        for line in [
            r#"{"page": "https://x/books/view/1", "epub": "", "txt": ""}"#,
            r#"{"page": "https://x/books/view/1"}"#,
            r#"{"page": "https://x/books/view/1", "epub": null, "txt": "  "}"#,
        ] {
            assert!(
                matches!(parse_line(1, line), Err(ManifestError::MissingSource { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn zero_or_missing_word_count_means_unknown() {
        let zero = r#"{"page": "https://x/v/1", "txt": "https://x/1.txt", "num_words": 0}"#;
        assert_eq!(parse_line(1, zero).unwrap().unwrap().expected_word_count, None);

        let missing = r#"{"page": "https://x/v/1", "txt": "https://x/1.txt"}"#;
        assert_eq!(parse_line(1, missing).unwrap().unwrap().expected_word_count, None);

        let null = r#"{"page": "https://x/v/1", "txt": "https://x/1.txt", "num_words": null}"#;
        assert_eq!(parse_line(1, null).unwrap().unwrap().expected_word_count, None);
    }

    #[test]
    fn negative_word_count_is_invalid() {
        let line = r#"{"page": "https://x/v/1", "txt": "https://x/1.txt", "num_words": -5}"#;
        assert!(matches!(parse_line(1, line), Err(ManifestError::InvalidJson { .. })));
    }

    #[test]
    fn page_id_takes_last_non_empty_segment() {
        assert_eq!(
            page_id("https://www.smashwords.com/books/view/12345").as_deref(),
            Some("12345")
        );
        assert_eq!(page_id("https://x.com/books/view/777/").as_deref(), Some("777"));
        assert_eq!(page_id("https://x.com/a?b=c").as_deref(), Some("a"));
        assert_eq!(page_id("books/view/42").as_deref(), Some("42"));
        assert_eq!(page_id("https://x.com/"), None);
        assert_eq!(page_id(""), None);
    }

    #[test]
    fn unusable_page_is_malformed() {
        let line = r#"{"page": "https://x.com/", "txt": "https://x/1.txt"}"#;
        assert!(matches!(parse_line(5, line), Err(ManifestError::InvalidPage { line: 5, .. })));
    }

    #[tokio::test]
    async fn read_lines_numbers_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.jsonl");
        std::fs::write(&path, "a\n\nc\n").unwrap();

        let lines: Vec<(usize, String)> = read_lines(&path)
            .await
            .unwrap()
            .map(|(n, l)| (n, l.unwrap()))
            .collect()
            .await;

        assert_eq!(
            lines,
            vec![(1, "a".to_string()), (2, String::new()), (3, "c".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_manifest_is_fatal_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_lines(&dir.path().join("nope.jsonl")).await.err().unwrap();
        assert!(err.is_fatal());
        assert!(matches!(err, ManifestError::Open { .. }));
    }
}
