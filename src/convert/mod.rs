//! EPUB to plain-text conversion
//!
//! The harvester only sees the [`EpubConverter`] trait, so the decoder can be
//! swapped (or faked in tests) without touching the pipeline.

use crate::error::ConvertError;
use async_trait::async_trait;
use std::path::Path;

mod epub_text;

pub use self::epub_text::EpubTextConverter;

/// Turns a downloaded EPUB container into plain text
///
/// # Examples
///
/// ```no_run
/// use bookcorpus_dl::convert::{EpubConverter, EpubTextConverter};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let text = EpubTextConverter.convert(Path::new("tmp_123_book.epub")).await?;
/// println!("{} chars", text.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait EpubConverter: Send + Sync {
    /// Convert the EPUB at `path`
    ///
    /// # Errors
    /// Returns [`ConvertError`] for containers that cannot be opened or hold
    /// no readable documents. The error is fatal for the item only.
    async fn convert(&self, path: &Path) -> Result<String, ConvertError>;
}
