//! Sentence-per-line corpus stage
//!
//! Turns a directory of harvested `.txt` books into one stream with one
//! sentence per line. Paragraphs are found by blank lines, re-joined, and split
//! into sentences by a rule-based heuristic. Each book's block ends with
//! `\n\n\n\n` so books stay distinguishable in the concatenated output.

use crate::error::Result;
use futures::StreamExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

/// Separator written after every book
pub const FILE_SEPARATOR: &str = "\n\n\n\n";

/// Element pushed after each flushed paragraph
const PARAGRAPH_BREAK: &str = "\n";

/// Terminal punctuation, optional closing quotes or brackets, then whitespace
#[allow(clippy::expect_used)]
static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?…]+["'”’)\]]*\s+"#).expect("valid sentence boundary regex")
});

/// Lowercase abbreviations (without their final period) that never end a sentence
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "st", "jr", "sr", "prof", "rev", "gen", "col", "capt", "lt", "sgt",
    "fr", "mt", "vs", "e.g", "i.e", "cf", "approx", "dept", "vol", "fig",
];

/// Split one paragraph into sentences
///
/// Whitespace runs are collapsed first. A boundary is terminal punctuation
/// followed by whitespace and then an uppercase letter, a digit, or an
/// opening quote or bracket, unless the word before a period is a known
/// abbreviation or a single-letter initial.
///
/// # Examples
///
/// ```
/// use bookcorpus_dl::sentences::split_sentences;
///
/// assert_eq!(
///     split_sentences("Dr. Watson arrived. It was late!  Nobody   slept."),
///     vec!["Dr. Watson arrived.", "It was late!", "Nobody slept."]
/// );
/// ```
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    let text = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in BOUNDARY.find_iter(&text) {
        let Some(next) = text[m.end()..].chars().next() else {
            continue;
        };
        if !opens_sentence(next) {
            continue;
        }

        let end = m.start() + m.as_str().trim_end().len();
        let candidate = &text[start..end];
        if ends_with_abbreviation(candidate) {
            continue;
        }

        sentences.push(candidate.to_string());
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_numeric() || matches!(c, '"' | '\'' | '“' | '‘' | '(' | '[')
}

fn ends_with_abbreviation(candidate: &str) -> bool {
    let Some(stem) = candidate.strip_suffix('.') else {
        return false;
    };
    if stem.ends_with('.') {
        // Ellipsis
        return false;
    }

    let word = stem
        .rsplit(' ')
        .next()
        .unwrap_or(stem)
        .trim_start_matches(['"', '\'', '“', '‘', '(', '[']);

    let mut chars = word.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_alphabetic();
    }

    let lower = word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Split a whole book into sentence lines
///
/// Returns the output elements and the number of sentences among them. Each
/// paragraph closed by a blank line is followed by a `"\n"` element; a
/// paragraph still open at end of input is not.
pub fn sentence_lines(text: &str) -> (Vec<String>, usize) {
    let mut lines = Vec::new();
    let mut sentences = 0;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if !line.is_empty() {
            paragraph.push(line);
            continue;
        }
        if paragraph.is_empty() {
            continue;
        }
        let split = split_sentences(&paragraph.join(" "));
        sentences += split.len();
        lines.extend(split);
        lines.push(PARAGRAPH_BREAK.to_string());
        paragraph.clear();
    }

    if !paragraph.is_empty() {
        let split = split_sentences(&paragraph.join(" "));
        sentences += split.len();
        lines.extend(split);
    }

    (lines, sentences)
}

/// Render one book as its block of the combined output
pub fn render_book(text: &str) -> (String, usize) {
    let (lines, sentences) = sentence_lines(text);
    (lines.join("\n") + FILE_SEPARATOR, sentences)
}

/// Every `*.txt` file directly inside `dir`, sorted by path
pub async fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path.extension().and_then(|e| e.to_str()) == Some("txt");
        if is_txt && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Convert every book in `dir`, writing blocks to `out` in sorted file order
///
/// Files are read and split on up to `workers` blocking tasks at once. A
/// progress line `{index}/{total}\t{sentences}\t{path}` goes to `progress`
/// for every file that was processed. A file that cannot be read is logged
/// and contributes an empty block. Returns the number of files seen.
pub async fn run<W, P>(dir: &Path, workers: usize, out: &mut W, progress: &mut P) -> Result<usize>
where
    W: AsyncWrite + Unpin,
    P: AsyncWrite + Unpin,
{
    let files = list_text_files(dir).await?;
    let total = files.len();
    let workers = workers.max(1);
    info!("Processing {total} files using {workers} workers");

    let mut blocks = futures::stream::iter(files.into_iter().enumerate())
        .map(|(index, path)| async move {
            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                std::fs::read_to_string(&task_path).map(|text| render_book(&text))
            })
            .await;
            (index, path, result)
        })
        .buffered(workers);

    while let Some((index, path, result)) = blocks.next().await {
        match result {
            Ok(Ok((block, sentences))) => {
                out.write_all(block.as_bytes()).await?;
                let line = format!("{index}/{total}\t{sentences}\t{}\n", path.display());
                progress.write_all(line.as_bytes()).await?;
            }
            Ok(Err(e)) => error!(path = %path.display(), error = %e, "failed to read book"),
            Err(e) => error!(path = %path.display(), error = %e, "sentence task failed"),
        }
    }

    out.flush().await?;
    progress.flush().await?;
    Ok(total)
}
