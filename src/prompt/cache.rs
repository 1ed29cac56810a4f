//! Single-slot prompt cache.
//!
//! The presence of an entry is taken as proof of validity: nothing compares
//! a cached prompt with the current document set.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// Errors from prompt cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `read` was called while the slot is empty.
    #[error("prompt cache entry not found")]
    NotFound,
    /// I/O failure on an existing slot.
    #[error("prompt cache I/O error at {path}: {source}")]
    Io {
        /// Location of the slot.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The in-memory slot's lock was poisoned by a panicking writer.
    #[error("prompt cache lock poisoned")]
    Poisoned,
}

/// Durable key→text store with exactly one slot.
pub trait PromptCache: Send + Sync {
    /// Whether the slot holds an entry.
    fn exists(&self) -> bool;

    /// Read the slot.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] when the slot is empty, or
    /// [`CacheError::Io`] if an existing entry cannot be read.
    fn read(&self) -> Result<String, CacheError>;

    /// Overwrite the slot.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the entry cannot be written.
    fn write(&self, text: &str) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// File-backed slot
// ---------------------------------------------------------------------------

/// Default cache file name inside the cache directory.
pub const CACHE_FILE_NAME: &str = "system_prompt_cache.txt";

/// Prompt cache stored as one UTF-8 text file.
#[derive(Debug, Clone)]
pub struct FilePromptCache {
    path: PathBuf,
}

impl FilePromptCache {
    /// Cache slot at an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache slot at `{dir}/system_prompt_cache.txt`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE_NAME))
    }

    /// Location of the slot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PromptCache for FilePromptCache {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<String, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CacheError::NotFound),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write(&self, text: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        std::fs::write(&self.path, text).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), bytes = text.len(), "prompt cache written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory slot
// ---------------------------------------------------------------------------

/// Process-local cache slot.
#[derive(Debug, Default)]
pub struct MemoryPromptCache {
    slot: Mutex<Option<String>>,
}

impl MemoryPromptCache {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with `text`.
    pub fn with_entry(text: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(text.into())),
        }
    }
}

impl PromptCache for MemoryPromptCache {
    /// A poisoned slot counts as present; [`read`](Self::read) then reports
    /// [`CacheError::Poisoned`].
    fn exists(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => true,
        }
    }

    fn read(&self) -> Result<String, CacheError> {
        let slot = self.slot.lock().map_err(|_| CacheError::Poisoned)?;
        slot.clone().ok_or(CacheError::NotFound)
    }

    fn write(&self, text: &str) -> Result<(), CacheError> {
        let mut slot = self.slot.lock().map_err(|_| CacheError::Poisoned)?;
        *slot = Some(text.to_owned());
        Ok(())
    }
}
