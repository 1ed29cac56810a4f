//! Azure OpenAI provider using the deployment-scoped chat completions API.

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
    StopReason, UsageStats,
};

const DEFAULT_MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AzureChatRequest {
    /// Conversation messages.
    pub messages: Vec<AzureMessage>,
    /// Maximum completion tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A message in chat completions format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AzureMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Text content.
    pub content: String,
}

/// Chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureChatResponse {
    /// Response choices.
    pub choices: Vec<AzureChoice>,
    /// Model that served the response.
    #[serde(default)]
    pub model: String,
    /// Token usage.
    pub usage: Option<AzureUsage>,
}

/// A response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureChoice {
    /// Assistant message for this choice.
    pub message: AzureResponseMessage,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Assistant message in a response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureResponseMessage {
    /// Optional text content.
    pub content: Option<String>,
}

/// Usage statistics.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AzureUsage {
    /// Prompt token count.
    pub prompt_tokens: Option<u32>,
    /// Completion token count.
    pub completion_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Azure OpenAI chat completions provider.
#[derive(Clone)]
pub struct AzureOpenAiProvider {
    url: String,
    deployment: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureOpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiProvider")
            .field("url", &self.url)
            .field("deployment", &self.deployment)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AzureOpenAiProvider {
    /// Create a provider for one deployment.
    pub fn new(endpoint: &str, deployment: &str, api_version: &str, api_key: String) -> Self {
        Self {
            url: completions_url(endpoint, deployment, api_version),
            deployment: deployment.to_owned(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

/// Build the deployment-scoped completions URL.
#[doc(hidden)]
pub fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    format!("{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}")
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a chat completions request body.
#[doc(hidden)]
pub fn build_request(request: &CompletionRequest) -> AzureChatRequest {
    let mut messages: Vec<AzureMessage> = Vec::with_capacity(request.messages.len());

    if let Some(system) = &request.system {
        messages.push(AzureMessage {
            role: "system".to_owned(),
            content: system.clone(),
        });
    }

    for msg in &request.messages {
        messages.push(AzureMessage {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        });
    }

    AzureChatRequest {
        messages,
        max_tokens: Some(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        temperature: request.temperature,
    }
}

/// Parse a chat completions response body.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the body cannot be deserialized or has
/// no choices.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: AzureChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("missing choices[0]".to_owned()))?;

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("stop") | None => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        Some(other) => StopReason::Other(other.to_owned()),
    };

    let usage = resp
        .usage
        .map(|u| UsageStats {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        text: choice.message.content.unwrap_or_default(),
        stop_reason,
        usage,
        model: resp.model,
    })
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = build_request(&request);

        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn model_id(&self) -> &str {
        &self.deployment
    }
}
