//! Document-grounded system prompt assembly.
//!
//! [`PromptAssembler::system_prompt`] returns the cached prompt when the
//! cache slot is occupied, and otherwise builds it from the instruction
//! template plus every document in the corpus, each wrapped in
//! `--- Begin <file> ---` / `--- End <file> ---` delimiters, then caches it.
//!
//! The result is deterministic for a fixed template and document set, which
//! is what makes presence-only caching usable.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::documents::{Corpus, DocumentSource, EMPTY_CORPUS_NOTICE};

pub mod cache;
pub mod template;

pub use cache::{CacheError, FilePromptCache, MemoryPromptCache, PromptCache};
pub use template::{CORPUS_HEADER, DEFAULT_INSTRUCTIONS};

/// Errors that prevent a system prompt from being produced.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// An existing cache entry could not be read.
    #[error("failed to read cached system prompt: {0}")]
    Cache(#[from] CacheError),
}

/// Where a system prompt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOrigin {
    /// Read back from the cache slot.
    Cache,
    /// Freshly assembled from the corpus.
    Assembled,
}

/// Assembled system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt {
    /// Full prompt text.
    pub text: String,
    /// Cache hit or fresh assembly.
    pub origin: PromptOrigin,
}

/// Builds the system prompt from a template and a document corpus.
#[derive(Debug)]
pub struct PromptAssembler<C, S> {
    cache: C,
    source: S,
    documents_dir: PathBuf,
    instructions: String,
}

impl<C: PromptCache, S: DocumentSource> PromptAssembler<C, S> {
    /// Create an assembler over an explicit cache handle and document source.
    pub fn new(
        cache: C,
        source: S,
        documents_dir: impl Into<PathBuf>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            source,
            documents_dir: documents_dir.into(),
            instructions: instructions.into(),
        }
    }

    /// Directory scanned on a cache miss.
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// The cache handle.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Return the system prompt, assembling and caching it on a miss.
    ///
    /// A cache hit is returned as-is without touching the document
    /// directory. A failed cache write is logged and does not fail
    /// assembly.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Cache`] if the cache holds an entry that
    /// cannot be read.
    pub fn system_prompt(&self) -> Result<SystemPrompt, PromptError> {
        if self.cache.exists() {
            let text = self.cache.read()?;
            info!(chars = text.len(), "system prompt loaded from cache");
            return Ok(SystemPrompt {
                text,
                origin: PromptOrigin::Cache,
            });
        }

        let text = self.assemble();

        if let Err(err) = self.cache.write(&text) {
            warn!(error = %err, "failed to cache system prompt");
        }

        Ok(SystemPrompt {
            text,
            origin: PromptOrigin::Assembled,
        })
    }

    /// Build the prompt text from the template and the current corpus.
    pub fn assemble(&self) -> String {
        let mut prompt = String::with_capacity(self.instructions.len());
        prompt.push_str(&self.instructions);
        prompt.push_str(CORPUS_HEADER);

        let mut documents = 0_usize;
        match self.source.scan(&self.documents_dir) {
            Corpus::Documents(docs) => {
                for doc in docs {
                    template::push_document_block(&mut prompt, &doc.filename, &doc.text);
                    documents = documents.saturating_add(1);
                }
            }
            Corpus::Empty => prompt.push_str(EMPTY_CORPUS_NOTICE),
        }

        info!(
            dir = %self.documents_dir.display(),
            documents,
            chars = prompt.len(),
            "system prompt assembled"
        );
        prompt
    }
}
