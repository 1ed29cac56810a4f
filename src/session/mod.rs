//! Remote-session synchronization and the conversation event loop.
//!
//! The remote session (hosted by the realtime runtime) owns the
//! authoritative transcript. The local [`HistoryWindow`](crate::context::HistoryWindow)
//! is truncated whenever an agent turn completes, and the truncated state is
//! pushed to the remote session by a single background worker so that turn
//! production never waits on the network.
//!
//! - [`events`]: typed event stream emitted by the remote-session
//!   collaborator and the dispatch table of truncation triggers.
//! - [`remote`]: the [`RemoteSession`] seam plus an in-process
//!   implementation.
//! - [`sync`]: identity-based reconciliation and the sync worker.
//! - [`conversation`]: the loop that owns the window.

pub mod conversation;
pub mod events;
pub mod remote;
pub mod sync;

pub use conversation::Conversation;
pub use events::{EventKind, SessionEvent, TRUNCATION_TRIGGERS};
pub use remote::{IdAssignment, InMemoryRemoteSession, RemoteItem, RemoteSession};
pub use sync::{
    plan_sync, spawn_sync_worker, IncrementalPlan, SyncHandle, SyncMode, SyncOp, SyncPlan,
    SyncReport, Synchronizer,
};

/// Errors from reconciling with the remote session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote session could not be reached.
    #[error("remote session unreachable: {0}")]
    Unreachable(String),
    /// The remote session rejected the update.
    #[error("remote session rejected update: {0}")]
    Rejected(String),
    /// The remote call did not resolve in time.
    #[error("remote session timed out")]
    Timeout,
    /// The remote session cannot apply identity-keyed patches for this
    /// message set.
    #[error("incremental update unsupported: {0}")]
    Unsupported(String),
}
