//! Plain text and Markdown documents.

use std::io::Read;

use super::{ExtractionError, TextExtractor};

/// Treats the whole file as a single UTF-8 section.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn extract(&self, reader: &mut dyn Read) -> Result<Vec<String>, ExtractionError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ExtractionError::Parse(format!("invalid UTF-8: {e}")))?;
        Ok(vec![text])
    }
}
