//! Conversation context: chat message identities and the bounded history
//! window.
//!
//! Every [`ChatMessage`] carries a stable [`MessageId`]. Messages created
//! locally start out [`MessageId::Pending`] and are switched to
//! [`MessageId::Remote`] once the remote session acknowledges them, which is
//! what lets the synchronizer patch by identity instead of replacing the
//! whole remote transcript.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod window;

pub use window::{HistoryWindow, WindowSnapshot, DEFAULT_MAX_MESSAGES};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identity of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    /// Identity assigned by the remote session.
    Remote(String),
    /// Locally minted identity not yet acknowledged by the remote session.
    Pending(Uuid),
}

impl MessageId {
    /// Mint a fresh pending identity.
    pub fn pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    /// The remote identity, if one has been assigned.
    pub fn remote(&self) -> Option<&str> {
        match self {
            Self::Remote(id) => Some(id.as_str()),
            Self::Pending(_) => None,
        }
    }

    /// Whether the remote session has acknowledged this message.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Pending(id) => write!(f, "pending:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// Human participant.
    User,
    /// The agent.
    Assistant,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One dialogue turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable identity.
    pub id: MessageId,
    /// Author role.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl ChatMessage {
    /// Create a message with a fresh pending identity.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::pending(),
            role,
            content: content.into(),
        }
    }

    /// Create a message that already carries a remote identity.
    pub fn with_remote_id(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::Remote(id.into()),
            role,
            content: content.into(),
        }
    }

    /// New pending system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// New pending user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// New pending assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
