//! Reference-document extraction.
//!
//! The [`DocumentExtractor`] walks a document directory and lazily turns each
//! supported file into plain text. Support is decided by file extension
//! (case-insensitive) through a registry of [`TextExtractor`]s. A document
//! that fails to extract contributes empty text; it never fails the corpus.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub mod pdf;
pub mod text;

pub use pdf::PdfExtractor;
pub use text::PlainTextExtractor;

/// Text used in place of the corpus when no document can be offered.
pub const EMPTY_CORPUS_NOTICE: &str = "No supported documents found in the document directory.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to extract a single document.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The file could not be opened.
    #[error("failed to open document: {0}")]
    Open(#[source] std::io::Error),
    /// Reading the file failed part-way.
    #[error("failed to read document: {0}")]
    Read(#[from] std::io::Error),
    /// The file content is not valid for its declared type.
    #[error("failed to parse document: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Extractor seam
// ---------------------------------------------------------------------------

/// Turns one document's bytes into page (or section) texts.
pub trait TextExtractor: Send + Sync {
    /// Lower-case file extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    /// Extract text page by page from an open document.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if the content cannot be read or parsed.
    fn extract(&self, reader: &mut dyn Read) -> Result<Vec<String>, ExtractionError>;
}

/// Source of extracted documents, as consumed by the prompt assembler.
pub trait DocumentSource: Send + Sync {
    /// Scan a directory and describe its corpus.
    fn scan(&self, dir: &Path) -> Corpus;
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// One document's plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// File name within the document directory.
    pub filename: String,
    /// Concatenated page texts; empty if extraction failed.
    pub text: String,
}

/// Result of scanning a document directory.
#[derive(Debug)]
pub enum Corpus {
    /// At least one supported document exists; extraction is lazy.
    Documents(Documents),
    /// Directory missing, unreadable, or without supported documents.
    Empty,
}

impl Corpus {
    /// Sentinel text describing an empty corpus.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Self::Documents(_) => None,
            Self::Empty => Some(EMPTY_CORPUS_NOTICE),
        }
    }
}

struct PendingDocument {
    filename: String,
    path: PathBuf,
    extractor: Arc<dyn TextExtractor>,
}

/// Lazy iterator over the documents of a corpus, in filename order.
pub struct Documents {
    pending: std::vec::IntoIter<PendingDocument>,
}

impl std::fmt::Debug for Documents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Documents")
            .field("remaining", &self.pending.len())
            .finish()
    }
}

impl Iterator for Documents {
    type Item = ExtractedDocument;

    fn next(&mut self) -> Option<Self::Item> {
        let doc = self.pending.next()?;
        let text = match extract_file(&doc.path, doc.extractor.as_ref()) {
            Ok(text) => text,
            Err(err) => {
                error!(file = %doc.filename, error = %err, "document extraction failed");
                String::new()
            }
        };
        debug!(file = %doc.filename, chars = text.len(), "document extracted");
        Some(ExtractedDocument {
            filename: doc.filename,
            text,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

/// Open, extract, and close one document.
///
/// The file handle lives only for the duration of this call.
fn extract_file(path: &Path, extractor: &dyn TextExtractor) -> Result<String, ExtractionError> {
    let mut file = File::open(path).map_err(ExtractionError::Open)?;
    let pages = extractor.extract(&mut file)?;

    let mut text = String::new();
    for page in pages.iter().filter(|p| !p.is_empty()) {
        text.push_str(page);
        text.push('\n');
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Extractor registry
// ---------------------------------------------------------------------------

/// Extension-keyed registry of [`TextExtractor`]s.
#[derive(Clone, Default)]
pub struct DocumentExtractor {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
}

impl std::fmt::Debug for DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        f.debug_struct("DocumentExtractor")
            .field("extensions", &extensions)
            .finish()
    }
}

impl DocumentExtractor {
    /// Registry with no extractors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry handling PDF, plain text and Markdown.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfExtractor));
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    /// Register an extractor for each extension it declares.
    ///
    /// Later registrations replace earlier ones for the same extension.
    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        for ext in extractor.extensions() {
            self.extractors
                .insert(ext.to_ascii_lowercase(), Arc::clone(&extractor));
        }
    }

    /// Whether a path has a supported extension.
    pub fn supports(&self, path: &Path) -> bool {
        self.extractor_for(path).is_some()
    }

    fn extractor_for(&self, path: &Path) -> Option<&Arc<dyn TextExtractor>> {
        let ext = path.extension()?.to_str()?;
        self.extractors.get(&ext.to_ascii_lowercase())
    }
}

impl DocumentSource for DocumentExtractor {
    fn scan(&self, dir: &Path) -> Corpus {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "document directory does not exist");
                return Corpus::Empty;
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "document directory unreadable");
                return Corpus::Empty;
            }
        };

        let mut pending: Vec<PendingDocument> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(extractor) = self.extractor_for(&path) else {
                continue;
            };
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %path.display(), "skipping document with non UTF-8 file name");
                continue;
            };
            pending.push(PendingDocument {
                filename,
                extractor: Arc::clone(extractor),
                path,
            });
        }

        if pending.is_empty() {
            info!(dir = %dir.display(), "no supported documents found");
            return Corpus::Empty;
        }

        pending.sort_by(|a, b| a.filename.cmp(&b.filename));
        info!(dir = %dir.display(), documents = pending.len(), "document corpus found");
        Corpus::Documents(Documents {
            pending: pending.into_iter(),
        })
    }
}
