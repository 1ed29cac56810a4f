//! PDF text extraction backed by `lopdf`.

use std::io::Read;

use lopdf::Document;

use super::{ExtractionError, TextExtractor};

/// Extracts text from PDF documents, one entry per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, reader: &mut dyn Read) -> Result<Vec<String>, ExtractionError> {
        let document =
            Document::load_from(reader).map_err(|e| ExtractionError::Parse(e.to_string()))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            let text = document
                .extract_text(&[*page_number])
                .map_err(|e| ExtractionError::Parse(format!("page {page_number}: {e}")))?;
            // `extract_text` terminates every page with its own newline.
            pages.push(text.trim_end_matches(['\r', '\n']).to_owned());
        }
        Ok(pages)
    }
}
