//! [`EpubConverter`] backed by the `epub` and `html2text` crates

use super::EpubConverter;
use crate::error::ConvertError;
use async_trait::async_trait;
use epub::doc::EpubDoc;
use std::path::Path;
use tracing::{debug, warn};

/// Line width handed to `html2text`; wide enough that paragraphs never wrap
const RENDER_WIDTH: usize = 10_000;

/// Walks the spine in reading order and renders each document as plain text
///
/// Chapters are separated by a blank line. Documents that render to nothing
/// (cover images, empty separators) are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubTextConverter;

#[async_trait]
impl EpubConverter for EpubTextConverter {
    async fn convert(&self, path: &Path) -> Result<String, ConvertError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || convert_blocking(&owned))
            .await
            .map_err(|e| ConvertError::Task {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

fn convert_blocking(path: &Path) -> Result<String, ConvertError> {
    let mut doc = EpubDoc::new(path).map_err(|e| ConvertError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut text = String::new();
    let mut documents = 0usize;

    loop {
        let Some((chapter, _mime)) = doc.get_current_str() else {
            break;
        };
        documents += 1;

        match html2text::from_read(chapter.as_bytes(), RENDER_WIDTH) {
            Ok(rendered) => {
                let rendered = rendered.trim();
                if !rendered.is_empty() {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(rendered);
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    document = documents,
                    error = %e,
                    "skipping unrenderable document"
                )
            }
        }

        if !doc.go_next() {
            break;
        }
    }

    if documents == 0 {
        return Err(ConvertError::NoContent {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), documents, chars = text.len(), "converted EPUB");
    text.push('\n');
    Ok(text)
}
