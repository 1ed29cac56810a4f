//! The conversation loop.
//!
//! [`Conversation`] owns the [`HistoryWindow`] and is the only place it is
//! mutated. Events are handled one at a time; every window mutation
//! completes before the handler returns. When a trigger event leaves the
//! window over capacity, the window is truncated and a snapshot is handed to
//! the sync worker without waiting for it.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bridge::TextBridge;
use crate::context::{ChatMessage, HistoryWindow};
use crate::providers::CompletionRequest;

use super::events::SessionEvent;
use super::sync::SyncHandle;

/// Text bridge plus the route its replies take back into the loop.
#[derive(Debug)]
struct Replies {
    bridge: TextBridge,
    events: mpsc::WeakSender<SessionEvent>,
}

/// Local conversation state driven by [`SessionEvent`]s.
#[derive(Debug)]
pub struct Conversation {
    window: HistoryWindow,
    sync: SyncHandle,
    replies: Option<Replies>,
    generation: u64,
}

impl Conversation {
    /// Conversation over `window`, synchronizing through `sync`.
    pub fn new(window: HistoryWindow, sync: SyncHandle) -> Self {
        Self {
            window,
            sync,
            replies: None,
            generation: 0,
        }
    }

    /// Answer data-channel packets with `bridge`.
    ///
    /// Replies are delivered as [`SessionEvent::ReplyReady`] on `events`,
    /// normally a downgraded sender of the channel passed to [`run`](Self::run).
    #[must_use]
    pub fn with_bridge(
        mut self,
        bridge: TextBridge,
        events: mpsc::WeakSender<SessionEvent>,
    ) -> Self {
        self.replies = Some(Replies { bridge, events });
        self
    }

    /// The local window.
    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// Number of sync requests issued so far.
    pub fn sync_requests(&self) -> u64 {
        self.generation
    }

    /// Handle one event. Returns `false` once the loop should stop.
    pub async fn handle(&mut self, event: SessionEvent) -> bool {
        let kind = event.kind();
        match event {
            SessionEvent::UserSpeechCommitted(message)
            | SessionEvent::AgentSpeechCommitted(message)
            | SessionEvent::AgentSpeechInterrupted(message)
            | SessionEvent::ReplyReady(message) => {
                self.record(message);
            }
            SessionEvent::MessageAcknowledged { pending, remote } => {
                if !self.window.acknowledge(&pending, remote.clone()) {
                    debug!(%pending, %remote, "acknowledged message no longer in window");
                }
            }
            SessionEvent::DataReceived(payload) => {
                self.on_data(&payload);
            }
            SessionEvent::Shutdown => {
                info!("conversation shutting down");
                return false;
            }
        }

        if kind.triggers_truncation() {
            self.turn_completed();
        }
        true
    }

    /// Consume events until [`SessionEvent::Shutdown`] or until every sender
    /// is dropped, then return the final window.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> HistoryWindow {
        info!(
            capacity = self.window.capacity(),
            messages = self.window.len(),
            "conversation started"
        );
        while let Some(event) = events.recv().await {
            if !self.handle(event).await {
                break;
            }
        }
        info!(
            messages = self.window.len(),
            syncs = self.generation,
            "conversation ended"
        );
        self.window
    }

    fn record(&mut self, message: ChatMessage) {
        if self.window.contains(&message.id) {
            debug!(id = %message.id, "message already in window");
            return;
        }
        self.window.append(message);
    }

    fn on_data(&mut self, payload: &[u8]) {
        let Some(replies) = self.replies.as_ref() else {
            debug!(bytes = payload.len(), "no text bridge attached, dropping packet");
            return;
        };
        let request = match replies.bridge.accept(&mut self.window, payload) {
            Ok(request) => request,
            Err(err) => {
                error!(error = %err, "failed to process text message");
                return;
            }
        };
        tokio::spawn(generate_reply(
            replies.bridge.clone(),
            request,
            replies.events.clone(),
        ));
    }

    /// Level-triggered bound check; queues a sync when truncation happened.
    fn turn_completed(&mut self) {
        if !self.window.enforce_capacity() {
            return;
        }
        self.generation = self.generation.wrapping_add(1);
        let snapshot = self.window.snapshot(self.generation);
        self.sync.request(snapshot);
    }
}

async fn generate_reply(
    bridge: TextBridge,
    request: CompletionRequest,
    events: mpsc::WeakSender<SessionEvent>,
) {
    let text = match bridge.respond(request).await {
        Ok(text) => text,
        Err(err) => {
            error!(error = %err, "failed to process text message");
            return;
        }
    };
    let Some(tx) = events.upgrade() else {
        debug!("conversation loop gone, dropping text reply");
        return;
    };
    if tx
        .send(SessionEvent::ReplyReady(ChatMessage::assistant(text)))
        .await
        .is_err()
    {
        debug!("conversation loop gone, dropping text reply");
    }
}
