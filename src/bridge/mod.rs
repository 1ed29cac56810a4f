//! Text-channel bridge.
//!
//! Packets arriving on the session's data channel are decoded as UTF-8 and
//! appended to the conversation as a user turn ([`TextBridge::accept`]).
//! The reply is generated and published back on the same channel by
//! [`TextBridge::respond`], which runs outside the conversation loop; the
//! loop records it as an assistant turn when it comes back. Failures drop
//! the packet and leave the channel open.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::{ChatMessage, HistoryWindow};
use crate::providers::{CompletionRequest, LlmProvider, Message, ProviderError};

pub mod console;

pub use console::StdoutChannel;

/// Errors from handling one data-channel packet.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The packet is not valid UTF-8.
    #[error("failed to decode text packet: {0}")]
    Decode(#[from] std::str::Utf8Error),
    /// The language model call failed.
    #[error("language model call failed: {0}")]
    Provider(#[from] ProviderError),
    /// The reply could not be published.
    #[error("failed to publish reply: {0}")]
    Publish(String),
}

/// Outbound half of the session's data channel.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Publish a payload reliably to the session's participants.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Publish`] if the payload cannot be sent.
    async fn publish(&self, payload: &[u8]) -> Result<(), BridgeError>;
}

/// Generation settings for bridge replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplySettings {
    /// Maximum tokens per reply.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// Answers text packets with a language model.
#[derive(Clone)]
pub struct TextBridge {
    provider: Arc<dyn LlmProvider>,
    channel: Arc<dyn DataChannel>,
    settings: ReplySettings,
}

impl std::fmt::Debug for TextBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBridge")
            .field("model", &self.provider.model_id())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TextBridge {
    /// Bridge answering with `provider` and replying on `channel`.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        channel: Arc<dyn DataChannel>,
        settings: ReplySettings,
    ) -> Self {
        Self {
            provider,
            channel,
            settings,
        }
    }

    /// Decode `payload` and append it to `window` as a user turn.
    ///
    /// Returns the request that generates the reply. A packet that fails to
    /// decode leaves the window untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Decode`] if the packet is not valid UTF-8.
    pub fn accept(
        &self,
        window: &mut HistoryWindow,
        payload: &[u8],
    ) -> Result<CompletionRequest, BridgeError> {
        let text = std::str::from_utf8(payload)?;
        window.append(ChatMessage::user(text));

        Ok(CompletionRequest {
            messages: window.current().iter().map(Message::from).collect(),
            system: None,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        })
    }

    /// Generate the reply for `request` and publish it on the channel.
    ///
    /// Does not touch the window; the caller records the returned text as
    /// the assistant turn.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] on model or publish failure.
    pub async fn respond(&self, request: CompletionRequest) -> Result<String, BridgeError> {
        let response = self.provider.complete(request).await?;
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "text reply generated"
        );

        self.channel.publish(response.text.as_bytes()).await?;
        Ok(response.text)
    }
}
