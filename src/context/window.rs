//! Bounded history window.
//!
//! Holds the local copy of the conversation in order (oldest first) and
//! truncates it to the most recent N turns. Mutations are synchronous so the
//! window is never observed half-updated by an event handler.

use std::sync::Arc;

use tracing::debug;

use super::{ChatMessage, MessageId};

/// Default number of messages kept in the window.
pub const DEFAULT_MAX_MESSAGES: usize = 10;

/// Ordered, capacity-bounded sequence of chat messages.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    messages: Vec<ChatMessage>,
    capacity: usize,
}

/// Immutable copy of the window taken at truncation time.
///
/// Shared with the background synchronizer; it may already be stale by the
/// time the synchronizer runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Monotonic counter distinguishing successive snapshots.
    pub generation: u64,
    /// Window contents, oldest first.
    pub messages: Arc<[ChatMessage]>,
}

impl HistoryWindow {
    /// Create an empty window holding at most `capacity` messages after
    /// truncation.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity,
        }
    }

    /// Create a window seeded with a single system message.
    pub fn with_system(capacity: usize, instructions: impl Into<String>) -> Self {
        let mut window = Self::new(capacity);
        window.append(ChatMessage::system(instructions));
        window
    }

    /// Append a message at the end of the conversation.
    ///
    /// Appending never truncates; the bound is restored by
    /// [`enforce_capacity`](Self::enforce_capacity).
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Current messages, oldest first.
    pub fn current(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keep only the last `n` messages, preserving order.
    ///
    /// No-op when the window already holds `n` or fewer messages. Returns
    /// `true` when messages were dropped.
    pub fn truncate_to(&mut self, n: usize) -> bool {
        let excess = self.messages.len().saturating_sub(n);
        if excess == 0 {
            return false;
        }
        self.messages.drain(..excess);
        debug!(dropped = excess, kept = self.messages.len(), "history window truncated");
        true
    }

    /// Truncate to the configured capacity.
    ///
    /// Level-triggered: re-evaluates the length on every call regardless of
    /// how many messages arrived since the last check.
    pub fn enforce_capacity(&mut self) -> bool {
        self.truncate_to(self.capacity)
    }

    /// Replace a pending identity with the one assigned by the remote
    /// session. Returns `false` if no message carries `pending`.
    pub fn acknowledge(&mut self, pending: &MessageId, remote: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == pending) {
            Some(message) => {
                message.id = MessageId::Remote(remote.into());
                true
            }
            None => false,
        }
    }

    /// Whether a message with the given identity is in the window.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// Take an immutable snapshot of the current contents.
    pub fn snapshot(&self, generation: u64) -> WindowSnapshot {
        WindowSnapshot {
            generation,
            messages: Arc::from(self.messages.as_slice()),
        }
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}
