//! The remote session seam.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::context::{ChatMessage, MessageId, Role};

use super::sync::{IncrementalPlan, SyncOp};
use super::SyncError;

/// The remote session assigned `remote` to a message sent as `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAssignment {
    /// Identity the message carried when it was sent.
    pub pending: MessageId,
    /// Identity assigned by the remote session.
    pub remote: String,
}

/// One entry of the remote transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    /// Identity assigned by the remote session.
    pub id: String,
    /// Local identity the entry was inserted with, if it came from an insert.
    pub origin: Option<MessageId>,
}

impl RemoteItem {
    /// Entry created on the remote side.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: None,
        }
    }

    /// Entry created by inserting the local message `origin`.
    pub fn inserted(id: impl Into<String>, origin: MessageId) -> Self {
        Self {
            id: id.into(),
            origin: Some(origin),
        }
    }
}

/// Remote copy of the conversation.
///
/// Calls may arrive out of submission order; implementations must treat
/// identity-keyed operations idempotently.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Entries of the remote transcript, in remote order.
    ///
    /// Entries created by an insert report the local identity they were
    /// inserted with, so a message whose acknowledgement has not reached the
    /// local window yet is still recognized as held.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the remote session cannot be queried.
    async fn remote_ids(&self) -> Result<Vec<RemoteItem>, SyncError>;

    /// Whether identity-keyed patches are accepted at all.
    fn supports_incremental(&self) -> bool {
        true
    }

    /// Apply an incremental plan.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unsupported`] if the plan cannot be applied by
    /// identity, or another [`SyncError`] on transport failure.
    async fn apply(&self, plan: &IncrementalPlan) -> Result<Vec<IdAssignment>, SyncError>;

    /// Replace the entire remote transcript.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] on transport failure or rejection.
    async fn replace_history(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Vec<IdAssignment>, SyncError>;
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RemoteEntry {
    id: String,
    origin: Option<MessageId>,
    role: Role,
    content: String,
}

#[derive(Debug, Default)]
struct RemoteState {
    entries: Vec<RemoteEntry>,
    next_id: u64,
    applied: u64,
    replaced: u64,
}

impl RemoteState {
    fn mint_id(&mut self) -> String {
        self.next_id = self.next_id.wrapping_add(1);
        format!("item_{:06}", self.next_id)
    }

    fn take_by_origin(&mut self, origin: &MessageId) -> Option<RemoteEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.origin.as_ref() == Some(origin))?;
        Some(self.entries.remove(pos))
    }

    /// Resolve an inserted message to an entry, reusing the one created by an
    /// earlier delivery of the same message.
    fn upsert(&mut self, message: &ChatMessage) -> (RemoteEntry, IdAssignment) {
        let entry = match self.take_by_origin(&message.id) {
            Some(mut entry) => {
                entry.role = message.role;
                entry.content.clone_from(&message.content);
                entry
            }
            None => RemoteEntry {
                id: self.mint_id(),
                origin: Some(message.id.clone()),
                role: message.role,
                content: message.content.clone(),
            },
        };
        let assignment = IdAssignment {
            pending: message.id.clone(),
            remote: entry.id.clone(),
        };
        (entry, assignment)
    }
}

/// Counters exposed by [`InMemoryRemoteSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStats {
    /// Incremental plans applied.
    pub applied: u64,
    /// Full replacements performed.
    pub replaced: u64,
}

/// Remote session kept in process memory.
///
/// Used for console sessions, where no realtime runtime is attached, and as
/// the reference implementation of the idempotence contract.
#[derive(Debug)]
pub struct InMemoryRemoteSession {
    state: Mutex<RemoteState>,
    incremental: bool,
}

impl InMemoryRemoteSession {
    /// Empty transcript accepting incremental plans.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            incremental: true,
        }
    }

    /// Empty transcript that only accepts full replacement.
    pub fn replace_only() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            incremental: false,
        }
    }

    /// Record a message originating on the remote side (for example a
    /// transcribed utterance) and return it with its remote identity.
    pub async fn push_remote(&self, role: Role, content: impl Into<String>) -> ChatMessage {
        let mut state = self.state.lock().await;
        let id = state.mint_id();
        let content = content.into();
        state.entries.push(RemoteEntry {
            id: id.clone(),
            origin: None,
            role,
            content: content.clone(),
        });
        ChatMessage::with_remote_id(id, role, content)
    }

    /// Current remote transcript.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .map(|e| ChatMessage::with_remote_id(e.id.clone(), e.role, e.content.clone()))
            .collect()
    }

    /// Apply and replace counters.
    pub async fn stats(&self) -> RemoteStats {
        let state = self.state.lock().await;
        RemoteStats {
            applied: state.applied,
            replaced: state.replaced,
        }
    }
}

impl Default for InMemoryRemoteSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSession for InMemoryRemoteSession {
    async fn remote_ids(&self) -> Result<Vec<RemoteItem>, SyncError> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .map(|e| RemoteItem {
                id: e.id.clone(),
                origin: e.origin.clone(),
            })
            .collect())
    }

    fn supports_incremental(&self) -> bool {
        self.incremental
    }

    async fn apply(&self, plan: &IncrementalPlan) -> Result<Vec<IdAssignment>, SyncError> {
        if !self.incremental {
            return Err(SyncError::Unsupported(
                "session accepts full replacement only".to_owned(),
            ));
        }

        let mut state = self.state.lock().await;
        state.entries.retain(|e| !plan.deletes.contains(&e.id));

        let mut ordered: Vec<RemoteEntry> = Vec::with_capacity(plan.ops.len());
        let mut assignments = Vec::new();
        for op in &plan.ops {
            match op {
                SyncOp::Patch { id, role, content } => {
                    // Entries deleted concurrently on the remote side stay deleted.
                    if let Some(pos) = state.entries.iter().position(|e| &e.id == id) {
                        let mut entry = state.entries.remove(pos);
                        entry.role = *role;
                        entry.content.clone_from(content);
                        ordered.push(entry);
                    }
                }
                SyncOp::Insert { message } => {
                    let (entry, assignment) = state.upsert(message);
                    ordered.push(entry);
                    assignments.push(assignment);
                }
            }
        }

        // Remote entries the plan does not mention arrived after the snapshot.
        let trailing: Vec<RemoteEntry> = state.entries.drain(..).collect();
        ordered.extend(trailing);
        state.entries = ordered;
        state.applied = state.applied.wrapping_add(1);
        trace!(entries = state.entries.len(), "incremental plan applied");
        Ok(assignments)
    }

    async fn replace_history(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Vec<IdAssignment>, SyncError> {
        let mut state = self.state.lock().await;
        let mut replaced: Vec<RemoteEntry> = Vec::with_capacity(messages.len());
        let mut assignments = Vec::new();
        for message in messages {
            match &message.id {
                MessageId::Remote(id) => replaced.push(RemoteEntry {
                    id: id.clone(),
                    origin: None,
                    role: message.role,
                    content: message.content.clone(),
                }),
                MessageId::Pending(_) => {
                    let (entry, assignment) = state.upsert(message);
                    replaced.push(entry);
                    assignments.push(assignment);
                }
            }
        }
        state.entries = replaced;
        state.replaced = state.replaced.wrapping_add(1);
        trace!(entries = state.entries.len(), "remote history replaced");
        Ok(assignments)
    }
}
