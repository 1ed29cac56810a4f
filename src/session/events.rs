//! Typed events delivered to the conversation loop.

use crate::context::{ChatMessage, MessageId};

/// Discriminant of a [`SessionEvent`], used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A user utterance was transcribed and committed.
    UserSpeechCommitted,
    /// The agent finished speaking a reply.
    AgentSpeechCommitted,
    /// The agent was interrupted while speaking.
    AgentSpeechInterrupted,
    /// A text-channel reply was generated and published.
    ReplyReady,
    /// The remote session assigned an identity to a local message.
    MessageAcknowledged,
    /// Raw bytes arrived on the text data channel.
    DataReceived,
    /// Stop the loop.
    Shutdown,
}

/// Event kinds after which the history bound is re-evaluated.
pub const TRUNCATION_TRIGGERS: &[EventKind] = &[
    EventKind::AgentSpeechCommitted,
    EventKind::AgentSpeechInterrupted,
    EventKind::ReplyReady,
];

impl EventKind {
    /// Whether this kind appears in [`TRUNCATION_TRIGGERS`].
    pub fn triggers_truncation(self) -> bool {
        TRUNCATION_TRIGGERS.contains(&self)
    }
}

/// Events emitted by the remote-session collaborator, the sync worker and
/// in-flight text replies.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A user utterance was committed.
    UserSpeechCommitted(ChatMessage),
    /// An agent reply was fully spoken.
    AgentSpeechCommitted(ChatMessage),
    /// An agent reply was cut short; carries the partial message.
    AgentSpeechInterrupted(ChatMessage),
    /// A text-channel reply was published; carries the assistant turn.
    ReplyReady(ChatMessage),
    /// The remote session assigned `remote` to the message known locally as
    /// `pending`.
    MessageAcknowledged {
        /// Identity the message had locally.
        pending: MessageId,
        /// Identity assigned by the remote session.
        remote: String,
    },
    /// Raw bytes from the text data channel.
    DataReceived(Vec<u8>),
    /// Stop processing events.
    Shutdown,
}

impl SessionEvent {
    /// The event's kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UserSpeechCommitted(_) => EventKind::UserSpeechCommitted,
            Self::AgentSpeechCommitted(_) => EventKind::AgentSpeechCommitted,
            Self::AgentSpeechInterrupted(_) => EventKind::AgentSpeechInterrupted,
            Self::ReplyReady(_) => EventKind::ReplyReady,
            Self::MessageAcknowledged { .. } => EventKind::MessageAcknowledged,
            Self::DataReceived(_) => EventKind::DataReceived,
            Self::Shutdown => EventKind::Shutdown,
        }
    }
}
