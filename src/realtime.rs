//! Realtime session parameters handed to the voice runtime.
//!
//! The assembled system prompt reaches the realtime model exactly once, as
//! the `instructions` of the `session.update` event sent when the session is
//! established.

use serde_json::{json, Value};

use crate::config::RealtimeConfig;

/// First thing the agent says after joining.
pub const GREETING: &str = "Hey, how can I help you today?";

/// Server-side voice activity detection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerVad {
    /// Activation threshold (0.0–1.0).
    pub threshold: f32,
    /// Audio kept before detected speech, in milliseconds.
    pub prefix_padding_ms: u32,
    /// Silence that ends a turn, in milliseconds.
    pub silence_duration_ms: u32,
    /// Whether the server starts a response when a turn ends.
    pub create_response: bool,
}

/// Everything needed to open a realtime session.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSession {
    /// Azure resource endpoint (`https://…`), if configured.
    pub endpoint: Option<String>,
    /// Realtime model deployment.
    pub deployment: String,
    /// API version query parameter.
    pub api_version: String,
    /// Output voice.
    pub voice: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// System instructions (the assembled prompt).
    pub instructions: String,
    /// Turn detection.
    pub turn_detection: ServerVad,
}

impl RealtimeSession {
    /// Build session parameters from configuration and the system prompt.
    pub fn new(config: &RealtimeConfig, instructions: impl Into<String>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            voice: config.voice.clone(),
            temperature: config.temperature,
            instructions: instructions.into(),
            turn_detection: ServerVad {
                threshold: config.vad_threshold,
                prefix_padding_ms: config.prefix_padding_ms,
                silence_duration_ms: config.silence_duration_ms,
                create_response: config.create_response,
            },
        }
    }

    /// WebSocket URL of the realtime endpoint, if an endpoint is configured.
    pub fn websocket_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?.trim_end_matches('/');
        let host = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("wss://"))
            .unwrap_or(endpoint);
        Some(format!(
            "wss://{host}/openai/realtime?api-version={}&deployment={}",
            self.api_version, self.deployment
        ))
    }

    /// The `session.update` client event carrying these parameters.
    pub fn session_update_event(&self) -> Value {
        json!({
            "type": "session.update",
            "session": {
                "modalities": ["text", "audio"],
                "instructions": self.instructions,
                "voice": self.voice,
                "temperature": self.temperature,
                "turn_detection": {
                    "type": "server_vad",
                    "threshold": self.turn_detection.threshold,
                    "prefix_padding_ms": self.turn_detection.prefix_padding_ms,
                    "silence_duration_ms": self.turn_detection.silence_duration_ms,
                    "create_response": self.turn_detection.create_response,
                },
            },
        })
    }
}
