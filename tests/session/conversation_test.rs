//! Conversation loop tests: truncation triggers, sync hand-off, and the
//! text bridge.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use parley::bridge::{BridgeError, DataChannel, ReplySettings, TextBridge};
use parley::context::{ChatMessage, HistoryWindow, Role};
use parley::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, StopReason, UsageStats,
};
use parley::session::{
    spawn_sync_worker, Conversation, EventKind, InMemoryRemoteSession, SessionEvent,
    Synchronizer, TRUNCATION_TRIGGERS,
};

struct FixedProvider {
    reply: Option<&'static str>,
}

#[async_trait]
impl LlmProvider for FixedProvider {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        match self.reply {
            Some(text) => Ok(CompletionResponse {
                text: text.to_owned(),
                stop_reason: StopReason::EndTurn,
                usage: UsageStats::default(),
                model: "fixed".to_owned(),
            }),
            None => Err(ProviderError::HttpStatus {
                status: 503,
                body: "unavailable".to_owned(),
            }),
        }
    }

    fn model_id(&self) -> &str {
        "fixed"
    }
}

/// Provider whose completion never resolves.
struct StalledProvider;

#[async_trait]
impl LlmProvider for StalledProvider {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        std::future::pending().await
    }

    fn model_id(&self) -> &str {
        "stalled"
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl DataChannel for Outbox {
    async fn publish(&self, payload: &[u8]) -> Result<(), BridgeError> {
        self.sent
            .lock()
            .map_err(|_| BridgeError::Publish("poisoned".to_owned()))?
            .push(payload.to_vec());
        Ok(())
    }
}

fn conversation(capacity: usize, remote: &Arc<InMemoryRemoteSession>) -> Conversation {
    let (sync, _worker) = spawn_sync_worker(Synchronizer::new(remote.clone()), None);
    Conversation::new(HistoryWindow::new(capacity), sync)
}

/// Conversation answering packets with `provider`; replies come back on `rx`.
struct Bridged {
    convo: Conversation,
    outbox: Arc<Outbox>,
    rx: mpsc::Receiver<SessionEvent>,
    _tx: mpsc::Sender<SessionEvent>,
}

fn bridged(conversation: Conversation, provider: Arc<dyn LlmProvider>) -> Bridged {
    let outbox = Arc::new(Outbox::default());
    let (tx, rx) = mpsc::channel(8);
    let bridge = TextBridge::new(provider, outbox.clone(), ReplySettings::default());
    Bridged {
        convo: conversation.with_bridge(bridge, tx.downgrade()),
        outbox,
        rx,
        _tx: tx,
    }
}

#[test]
fn only_agent_turn_completion_triggers_truncation() {
    assert_eq!(
        TRUNCATION_TRIGGERS,
        &[
            EventKind::AgentSpeechCommitted,
            EventKind::AgentSpeechInterrupted,
            EventKind::ReplyReady,
        ]
    );
    assert!(!EventKind::UserSpeechCommitted.triggers_truncation());
    assert!(!EventKind::DataReceived.triggers_truncation());
    assert!(!EventKind::MessageAcknowledged.triggers_truncation());
}

#[tokio::test]
async fn user_speech_alone_does_not_truncate() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(3, &remote);

    for i in 0..5 {
        let event = SessionEvent::UserSpeechCommitted(ChatMessage::user(format!("u{i}")));
        assert!(convo.handle(event).await);
    }

    assert_eq!(convo.window().len(), 5);
    assert_eq!(convo.sync_requests(), 0);
}

#[tokio::test]
async fn agent_turn_restores_bound_and_requests_sync() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(10, &remote);

    for i in 0..14 {
        convo
            .handle(SessionEvent::UserSpeechCommitted(ChatMessage::user(format!(
                "u{i}"
            ))))
            .await;
    }
    convo
        .handle(SessionEvent::AgentSpeechCommitted(ChatMessage::assistant(
            "done",
        )))
        .await;

    let contents: Vec<&str> = convo
        .window()
        .current()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents.len(), 10);
    assert_eq!(contents[0], "u5");
    assert_eq!(contents[9], "done");
    assert_eq!(convo.sync_requests(), 1);
}

#[tokio::test]
async fn interrupted_turn_is_recorded_and_triggers() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(1, &remote);

    convo
        .handle(SessionEvent::UserSpeechCommitted(ChatMessage::user("q")))
        .await;
    convo
        .handle(SessionEvent::AgentSpeechInterrupted(ChatMessage::assistant(
            "partial ans",
        )))
        .await;

    assert_eq!(convo.window().len(), 1);
    assert_eq!(convo.window().current()[0].content, "partial ans");
    assert_eq!(convo.sync_requests(), 1);
}

#[tokio::test]
async fn within_bound_trigger_does_not_sync() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(10, &remote);

    convo
        .handle(SessionEvent::AgentSpeechCommitted(ChatMessage::assistant(
            "hi",
        )))
        .await;
    assert_eq!(convo.sync_requests(), 0);
}

#[tokio::test]
async fn duplicate_delivery_is_recorded_once() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(10, &remote);
    let message = ChatMessage::user("once");

    convo
        .handle(SessionEvent::UserSpeechCommitted(message.clone()))
        .await;
    convo
        .handle(SessionEvent::UserSpeechCommitted(message))
        .await;

    assert_eq!(convo.window().len(), 1);
}

#[tokio::test]
async fn acknowledgement_assigns_remote_identity() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(10, &remote);
    let message = ChatMessage::user("hello");
    let pending = message.id.clone();

    convo.handle(SessionEvent::UserSpeechCommitted(message)).await;
    convo
        .handle(SessionEvent::MessageAcknowledged {
            pending,
            remote: "item_000009".to_owned(),
        })
        .await;

    assert_eq!(convo.window().current()[0].id.remote(), Some("item_000009"));
}

#[tokio::test]
async fn text_packet_gets_reply_and_counts_as_turn() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let Bridged {
        mut convo,
        outbox,
        mut rx,
        _tx,
    } = bridged(
        conversation(2, &remote),
        Arc::new(FixedProvider {
            reply: Some("covered"),
        }),
    );

    convo
        .handle(SessionEvent::UserSpeechCommitted(ChatMessage::user("earlier")))
        .await;
    assert!(convo.handle(SessionEvent::DataReceived(b"am I covered?".to_vec())).await);
    // The user turn is recorded before the reply exists.
    assert_eq!(convo.window().len(), 2);
    assert_eq!(convo.sync_requests(), 0);

    let reply = rx.recv().await.expect("reply should be delivered");
    assert_eq!(reply.kind(), EventKind::ReplyReady);
    let sent = outbox.sent.lock().expect("lock").clone();
    assert_eq!(sent, vec![b"covered".to_vec()]);

    assert!(convo.handle(reply).await);
    let roles: Vec<Role> = convo.window().current().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(convo.window().current()[0].content, "am I covered?");
    assert_eq!(convo.window().current()[1].content, "covered");
    assert_eq!(convo.sync_requests(), 1);
}

#[tokio::test]
async fn bridge_failures_do_not_stop_the_loop() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let Bridged {
        mut convo,
        outbox,
        mut rx,
        _tx,
    } = bridged(conversation(10, &remote), Arc::new(FixedProvider { reply: None }));

    assert!(convo.handle(SessionEvent::DataReceived(vec![0xc3, 0x28])).await);
    assert!(convo.window().is_empty());

    assert!(convo.handle(SessionEvent::DataReceived(b"hello".to_vec())).await);
    let delivered = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(delivered.is_err(), "failed reply should not be delivered");
    assert!(outbox.sent.lock().expect("lock").is_empty());
    assert_eq!(convo.window().len(), 1);
    assert_eq!(convo.sync_requests(), 0);
}

#[tokio::test]
async fn pending_reply_does_not_hold_up_speech_events() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let (sync, _worker) = spawn_sync_worker(Synchronizer::new(remote.clone()), None);
    let (tx, rx) = mpsc::channel(16);
    let bridge = TextBridge::new(
        Arc::new(StalledProvider),
        Arc::new(Outbox::default()),
        ReplySettings::default(),
    );
    let convo =
        Conversation::new(HistoryWindow::new(2), sync).with_bridge(bridge, tx.downgrade());

    let spoken = ChatMessage::user("spoken question");
    let spoken_id = spoken.id.clone();
    for event in [
        SessionEvent::UserSpeechCommitted(spoken),
        SessionEvent::DataReceived(b"typed question".to_vec()),
        SessionEvent::MessageAcknowledged {
            pending: spoken_id,
            remote: "item_000001".to_owned(),
        },
        SessionEvent::AgentSpeechCommitted(ChatMessage::assistant("spoken answer")),
        SessionEvent::Shutdown,
    ] {
        tx.send(event).await.expect("send");
    }

    let window = tokio::time::timeout(Duration::from_secs(5), convo.run(rx))
        .await
        .expect("loop should not wait for the model");

    let contents: Vec<&str> = window.current().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["typed question", "spoken answer"]);
}

#[tokio::test]
async fn packet_without_bridge_is_dropped() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let mut convo = conversation(10, &remote);

    assert!(convo.handle(SessionEvent::DataReceived(b"ignored".to_vec())).await);
    assert!(convo.window().is_empty());
}

#[tokio::test]
async fn run_stops_on_shutdown_and_remote_converges() {
    let remote = Arc::new(InMemoryRemoteSession::new());
    let (sync, worker) = spawn_sync_worker(Synchronizer::new(remote.clone()), None);
    let convo = Conversation::new(HistoryWindow::new(3), sync);

    let (tx, rx) = mpsc::channel(16);
    for i in 0..4 {
        tx.send(SessionEvent::UserSpeechCommitted(ChatMessage::user(format!(
            "u{i}"
        ))))
        .await
        .expect("send");
    }
    tx.send(SessionEvent::AgentSpeechCommitted(ChatMessage::assistant(
        "a",
    )))
    .await
    .expect("send");
    tx.send(SessionEvent::Shutdown).await.expect("send");
    tx.send(SessionEvent::UserSpeechCommitted(ChatMessage::user("after")))
        .await
        .expect("send");

    let window = convo.run(rx).await;
    worker.await.expect("worker should exit once the loop ends");

    let local: Vec<String> = window.current().iter().map(|m| m.content.clone()).collect();
    assert_eq!(local, vec!["u2", "u3", "a"]);

    let remote_contents: Vec<String> = remote
        .transcript()
        .await
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert_eq!(remote_contents, local);
}
