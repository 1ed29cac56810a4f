//! LLM provider abstraction layer.
//!
//! Defines the [`LlmProvider`] trait used by the text-channel bridge and the
//! shared request/response types. The only implementation is
//! [`azure::AzureOpenAiProvider`] (Azure OpenAI chat completions).

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::{ChatMessage, Role};

pub mod azure;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// A message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl From<&ChatMessage> for Message {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// A request to an LLM provider for a completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Conversation history including the latest user message.
    pub messages: Vec<Message>,
    /// System prompt (injected before messages).
    pub system: Option<String>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// The reason a completion stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Normal end of turn.
    EndTurn,
    /// Max token limit reached.
    MaxTokens,
    /// Output withheld by a content filter.
    ContentFilter,
    /// Provider-specific other reason.
    Other(String),
}

/// Usage statistics for a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageStats {
    /// Tokens used in the prompt/input.
    pub input_tokens: u32,
    /// Tokens generated in the response.
    pub output_tokens: u32,
}

/// The response from an LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Response text.
    pub text: String,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage.
    pub usage: UsageStats,
    /// The model identifier that served this response.
    pub model: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by model providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP transport failure.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match expected schema.
    #[error("provider response parse error: {0}")]
    Parse(String),
    /// Upstream provider responded with an error status.
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `ProviderError::Request` on transport failure, `ProviderError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact credentials and cap the length of an error
/// body before it reaches logs.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-[A-Za-z0-9]{32,}",
        r"[A-Fa-f0-9]{32}",
        r#"(?i)api[-_]?key["':= ]+[A-Za-z0-9_\-]{16,}"#,
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core LLM provider interface.
///
/// Implementations must be `Send + Sync` so a provider can be shared with
/// the conversation loop.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request a completion from the LLM.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on API, network, or parse failure.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// The model (or deployment) identifier this provider targets.
    fn model_id(&self) -> &str;
}
