//! Word tokenization corpus stage
//!
//! Reads sentence lines and writes the same number of lines back with every
//! token separated by a single space. Words and numbers stay whole, including
//! internal apostrophes and hyphens (`don't`, `well-known`, `3.14`); every
//! other visible character becomes its own token.

use crate::error::Result;
use futures::StreamExt;
use regex::Regex;
use std::sync::LazyLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

#[allow(clippy::expect_used)]
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \p{N}+(?:[.,]\p{N}+)+                                  # 3.14, 1,000
        | [\p{L}\p{N}_][\p{L}\p{M}\p{N}_]*(?:['’\-][\p{L}\p{M}\p{N}_]+)*  # words
        | \S                                                   # anything else
        ",
    )
    .expect("valid token regex")
});

/// Tokenize one line; blank lines become empty strings
///
/// # Examples
///
/// ```
/// use bookcorpus_dl::tokenize::tokenize_line;
///
/// assert_eq!(tokenize_line("\"Don't,\" she said."), "\" Don't , \" she said .");
/// assert_eq!(tokenize_line("   "), "");
/// ```
pub fn tokenize_line(line: &str) -> String {
    TOKEN
        .find_iter(line.trim())
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenize a chunk of lines, one output per input
pub fn tokenize_chunk(lines: &[String]) -> Vec<String> {
    lines.iter().map(|line| tokenize_line(line)).collect()
}

/// Tokenize every line of `input` into `output`
///
/// Lines are grouped into chunks of `chunk_size` and tokenized on up to
/// `workers` blocking tasks; chunks are written back in input order. Returns
/// the number of lines written, which always equals the number read.
pub async fn run<R, W>(input: R, output: &mut W, workers: usize, chunk_size: usize) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunks = LinesStream::new(input.lines())
        .chunks(chunk_size.max(1))
        .map(|chunk| async move {
            let lines = chunk.into_iter().collect::<std::io::Result<Vec<String>>>()?;
            let tokens = tokio::task::spawn_blocking(move || tokenize_chunk(&lines))
                .await
                .map_err(std::io::Error::other)?;
            Ok::<_, std::io::Error>(tokens)
        })
        .buffered(workers.max(1));

    let mut written = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        for line in &chunk {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
        }
        written += chunk.len();
    }
    output.flush().await?;

    debug!(lines = written, "tokenized");
    Ok(written)
}
