//! Utility functions for URL-derived file names and text decoding

use std::path::Path;

/// Name used when a URL has no usable last path segment
const FALLBACK_BASENAME: &str = "download";

/// Extract the file name from a URL path
///
/// The last path segment is percent-decoded; query strings and fragments are
/// ignored. Characters that would act as path separators are replaced by `_`.
/// Falls back to splitting on `/` when the string is not an absolute URL, and
/// to `"download"` when there is no last segment at all.
///
/// # Examples
///
/// ```
/// use bookcorpus_dl::utils::url_basename;
///
/// assert_eq!(url_basename("https://example.com/dl/My%20Book.epub?x=1"), "My Book.epub");
/// assert_eq!(url_basename("https://example.com/"), "download");
/// ```
pub fn url_basename(url: &str) -> String {
    let raw = match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
        Err(_) => url
            .trim()
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
    };

    let Some(raw) = raw else {
        return FALLBACK_BASENAME.to_string();
    };

    let decoded = urlencoding::decode(&raw)
        .map(|cow| cow.into_owned())
        .unwrap_or(raw);

    let sanitized = sanitize_file_name(&decoded);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        FALLBACK_BASENAME.to_string()
    } else {
        sanitized
    }
}

/// Replace characters that cannot appear in a single path component
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Swap the extension of `basename` for `.txt`, or append it when there is none
///
/// # Examples
///
/// ```
/// use bookcorpus_dl::utils::with_txt_extension;
///
/// assert_eq!(with_txt_extension("a-book.epub"), "a-book.txt");
/// assert_eq!(with_txt_extension("a-book.txt"), "a-book.txt");
/// assert_eq!(with_txt_extension("a-book"), "a-book.txt");
/// ```
pub fn with_txt_extension(basename: &str) -> String {
    let path = Path::new(basename);
    match (path.file_stem().and_then(|s| s.to_str()), path.extension()) {
        (Some(stem), Some(_)) => format!("{stem}.txt"),
        _ => format!("{basename}.txt"),
    }
}

/// Decode a response body as UTF-8, dropping invalid byte sequences
///
/// Invalid sequences are removed rather than replaced with U+FFFD, and a
/// leading byte-order mark is stripped.
pub fn decode_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
