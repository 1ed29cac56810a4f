//! Identity-based reconciliation of the local window with the remote session.
//!
//! [`plan_sync`] prefers an incremental plan: messages whose remote identity
//! the remote session already holds are patched in place, the rest are
//! inserted, and remote messages that fell out of the window are deleted.
//! Full replacement is used only when the remote session does not accept
//! identity-keyed patches, or when the shared identities appear in a
//! different relative order on each side (an ordering change that patches by
//! identity cannot express).
//!
//! The [`SyncHandle`] / worker pair keeps synchronization off the turn path:
//! requests go into a single-slot `watch` channel where a newer snapshot
//! replaces an older one that has not been picked up yet, and exactly one
//! background task drains it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::context::{ChatMessage, MessageId, Role, WindowSnapshot};

use super::events::SessionEvent;
use super::remote::{IdAssignment, RemoteItem, RemoteSession};
use super::SyncError;

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// One step of an incremental plan, in local conversation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOp {
    /// Update a message the remote session already holds.
    Patch {
        /// Remote identity.
        id: String,
        /// Author role.
        role: Role,
        /// Text content.
        content: String,
    },
    /// Send a message by its local identity. The remote session resolves it
    /// to the entry an earlier insert of the same message created, if any.
    Insert {
        /// The full message, carrying its local identity.
        message: ChatMessage,
    },
}

/// Identity-keyed update of the remote transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementalPlan {
    /// Remote identities to remove.
    pub deletes: Vec<String>,
    /// Patches and inserts in the desired final order.
    pub ops: Vec<SyncOp>,
}

impl IncrementalPlan {
    /// Number of patch operations.
    pub fn patches(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SyncOp::Patch { .. }))
            .count()
    }

    /// Number of insert operations.
    pub fn inserts(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SyncOp::Insert { .. }))
            .count()
    }
}

/// How the remote transcript will be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Patch by identity.
    Incremental(IncrementalPlan),
    /// Overwrite the remote transcript with these messages.
    Replace(Vec<ChatMessage>),
}

/// Compute the reconciliation plan for `local` against the remote entries
/// `remote` (in remote order).
///
/// A pending message counts as held when a remote entry reports it as its
/// origin: an earlier sync inserted it and the acknowledgement is still in
/// flight. Such an entry is kept and the message is sent again as an insert,
/// which the remote session resolves to the same entry.
pub fn plan_sync(local: &[ChatMessage], remote: &[RemoteItem], incremental: bool) -> SyncPlan {
    if !incremental {
        return SyncPlan::Replace(local.to_vec());
    }

    let remote_set: HashSet<&str> = remote.iter().map(|item| item.id.as_str()).collect();
    let by_origin: HashMap<&MessageId, &str> = remote
        .iter()
        .filter_map(|item| Some((item.origin.as_ref()?, item.id.as_str())))
        .collect();

    let shared_local: Vec<&str> = local
        .iter()
        .filter_map(|m| held_as(m, &remote_set, &by_origin))
        .collect();
    let shared_set: HashSet<&str> = shared_local.iter().copied().collect();
    let shared_remote: Vec<&str> = remote
        .iter()
        .map(|item| item.id.as_str())
        .filter(|id| shared_set.contains(id))
        .collect();

    if shared_local != shared_remote {
        debug!("shared identities reordered, falling back to full replacement");
        return SyncPlan::Replace(local.to_vec());
    }

    let deletes = remote
        .iter()
        .filter(|item| !shared_set.contains(item.id.as_str()))
        .map(|item| item.id.clone())
        .collect();

    let ops = local
        .iter()
        .map(|m| match m.id.remote() {
            Some(id) if remote_set.contains(id) => SyncOp::Patch {
                id: id.to_owned(),
                role: m.role,
                content: m.content.clone(),
            },
            _ => SyncOp::Insert { message: m.clone() },
        })
        .collect();

    SyncPlan::Incremental(IncrementalPlan { deletes, ops })
}

/// Remote identity under which `message` is already held, if any.
fn held_as<'a>(
    message: &'a ChatMessage,
    remote_set: &HashSet<&'a str>,
    by_origin: &HashMap<&MessageId, &'a str>,
) -> Option<&'a str> {
    match message.id.remote() {
        Some(id) if remote_set.contains(id) => Some(id),
        _ => by_origin.get(&message.id).copied(),
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Which path a reconciliation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Identity-keyed patches.
    Incremental,
    /// Full replacement.
    Replace,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Snapshot generation that was pushed.
    pub generation: u64,
    /// Path taken.
    pub mode: SyncMode,
    /// Messages in the pushed snapshot.
    pub messages: usize,
    /// Identities newly assigned by the remote session.
    pub assignments: Vec<IdAssignment>,
}

/// Reconciles window snapshots with one remote session.
#[derive(Clone)]
pub struct Synchronizer {
    remote: Arc<dyn RemoteSession>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer").finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Synchronizer for the given remote session.
    pub fn new(remote: Arc<dyn RemoteSession>) -> Self {
        Self { remote }
    }

    /// Push `snapshot` to the remote session.
    ///
    /// An incremental plan rejected as unsupported is retried once as a full
    /// replacement.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the remote session cannot be queried or
    /// rejects the update.
    pub async fn reconcile(&self, snapshot: &WindowSnapshot) -> Result<SyncReport, SyncError> {
        let remote = self.remote.remote_ids().await?;
        let plan = plan_sync(
            &snapshot.messages,
            &remote,
            self.remote.supports_incremental(),
        );

        let (mode, assignments) = match plan {
            SyncPlan::Incremental(plan) => {
                trace!(
                    generation = snapshot.generation,
                    patches = plan.patches(),
                    inserts = plan.inserts(),
                    deletes = plan.deletes.len(),
                    "applying incremental sync"
                );
                match self.remote.apply(&plan).await {
                    Ok(assignments) => (SyncMode::Incremental, assignments),
                    Err(SyncError::Unsupported(reason)) => {
                        debug!(%reason, "incremental sync unsupported, replacing history");
                        let assignments = self.remote.replace_history(&snapshot.messages).await?;
                        (SyncMode::Replace, assignments)
                    }
                    Err(err) => return Err(err),
                }
            }
            SyncPlan::Replace(messages) => {
                let assignments = self.remote.replace_history(&messages).await?;
                (SyncMode::Replace, assignments)
            }
        };

        Ok(SyncReport {
            generation: snapshot.generation,
            mode,
            messages: snapshot.messages.len(),
            assignments,
        })
    }
}

// ---------------------------------------------------------------------------
// Background worker
// ---------------------------------------------------------------------------

/// Non-blocking handle used by the conversation loop to request a sync.
#[derive(Debug)]
pub struct SyncHandle {
    tx: watch::Sender<Option<WindowSnapshot>>,
}

impl SyncHandle {
    /// Queue `snapshot` for synchronization, replacing any snapshot the
    /// worker has not picked up yet. Never waits.
    ///
    /// Returns `false` if the worker has stopped.
    pub fn request(&self, snapshot: WindowSnapshot) -> bool {
        let generation = snapshot.generation;
        self.tx.send_replace(Some(snapshot));
        let alive = !self.tx.is_closed();
        if alive {
            trace!(generation, "sync requested");
        } else {
            warn!(generation, "sync worker stopped, request dropped");
        }
        alive
    }
}

/// Spawn the single sync worker.
///
/// Identity assignments reported by the remote session are forwarded as
/// [`SessionEvent::MessageAcknowledged`] through `acks` when it is still
/// alive. The worker exits once the returned [`SyncHandle`] is dropped and
/// the last queued snapshot has been processed.
pub fn spawn_sync_worker(
    synchronizer: Synchronizer,
    acks: Option<mpsc::WeakSender<SessionEvent>>,
) -> (SyncHandle, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(run_worker(synchronizer, rx, acks));
    (SyncHandle { tx }, handle)
}

async fn run_worker(
    synchronizer: Synchronizer,
    mut rx: watch::Receiver<Option<WindowSnapshot>>,
    acks: Option<mpsc::WeakSender<SessionEvent>>,
) {
    while rx.changed().await.is_ok() {
        let Some(snapshot) = rx.borrow_and_update().clone() else {
            continue;
        };

        match synchronizer.reconcile(&snapshot).await {
            Ok(report) => {
                info!(
                    generation = report.generation,
                    mode = ?report.mode,
                    messages = report.messages,
                    assigned = report.assignments.len(),
                    "remote session synchronized"
                );
                forward_assignments(acks.as_ref(), report.assignments).await;
            }
            Err(err) => {
                warn!(
                    generation = snapshot.generation,
                    error = %err,
                    "remote session sync failed, next truncation will retry"
                );
            }
        }
    }
    trace!("sync worker stopped");
}

async fn forward_assignments(
    acks: Option<&mpsc::WeakSender<SessionEvent>>,
    assignments: Vec<IdAssignment>,
) {
    if assignments.is_empty() {
        return;
    }
    let Some(tx) = acks.and_then(mpsc::WeakSender::upgrade) else {
        return;
    };
    for assignment in assignments {
        let event = SessionEvent::MessageAcknowledged {
            pending: assignment.pending,
            remote: assignment.remote,
        };
        if tx.send(event).await.is_err() {
            debug!("conversation loop gone, dropping identity acknowledgements");
            return;
        }
    }
}
