//! Configuration loading and validation.
//!
//! Loaded from `./parley.toml` (or `$PARLEY_CONFIG_PATH`). Environment
//! variables override file values; file values override defaults. A `.env`
//! file in the working directory is loaded by the binary before any of this
//! runs, so the Azure variables can live there.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::context::DEFAULT_MAX_MESSAGES;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Conversation window settings.
    pub context: ContextConfig,
    /// Chat completions model used by the text bridge.
    pub llm: LlmConfig,
    /// Realtime voice session settings.
    pub realtime: RealtimeConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl ParleyConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$PARLEY_CONFIG_PATH` or `./parley.toml`. A missing
    /// file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        Self::load_from(&path)
    }

    /// Load from an explicit file path, then apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("PARLEY_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("parley.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Paths.
        if let Some(v) = env("PARLEY_DATA_DIR") {
            self.paths.documents_dir = PathBuf::from(v);
        }
        if let Some(v) = env("PARLEY_CACHE_FILE") {
            self.paths.cache_file = PathBuf::from(v);
        }
        if let Some(v) = env("PARLEY_INSTRUCTIONS_FILE") {
            self.paths.instructions_file = Some(PathBuf::from(v));
        }
        if let Some(v) = env("PARLEY_LOGS_DIR") {
            self.paths.logs_dir = Some(PathBuf::from(v));
        }

        // Context.
        if let Some(v) = env("PARLEY_MAX_MESSAGES") {
            match v.parse() {
                Ok(n) => self.context.max_messages = n,
                Err(_) => tracing::warn!(
                    var = "PARLEY_MAX_MESSAGES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // Chat completions.
        if let Some(v) = env("AZURE_OPENAI_ENDPOINT") {
            self.llm.endpoint = Some(v);
        }
        if let Some(v) = env("AZURE_OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.deployment = v;
        }
        if let Some(v) = env("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = v;
        }

        // Realtime.
        if let Some(v) = env("AZURE_OPENAI_REALTIME_ENDPOINT") {
            self.realtime.endpoint = Some(v);
        }

        // Logging.
        if let Some(v) = env("PARLEY_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Reject settings the agent cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error if `context.max_messages` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.context.max_messages == 0 {
            anyhow::bail!("context.max_messages must be at least 1");
        }
        Ok(())
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid config TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: ParleyConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Paths config ────────────────────────────────────────────────

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the reference documents.
    pub documents_dir: PathBuf,
    /// Cache slot for the assembled system prompt.
    pub cache_file: PathBuf,
    /// Optional file replacing the built-in instruction template.
    pub instructions_file: Option<PathBuf>,
    /// Log directory for `chat`; defaults to `~/.parley/logs`.
    pub logs_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./data"),
            cache_file: PathBuf::from("./cache/system_prompt_cache.txt"),
            instructions_file: None,
            logs_dir: None,
        }
    }
}

impl PathsConfig {
    /// Configured log directory, or `~/.parley/logs`.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is configured and the home directory
    /// cannot be determined.
    pub fn resolve_logs_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.logs_dir {
            return Ok(dir.clone());
        }
        let home = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.home_dir().join(".parley").join("logs"))
    }
}

// ── Context config ──────────────────────────────────────────────

/// Conversation window settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Messages kept after truncation.
    pub max_messages: usize,
    /// Buffer size of the session event channel.
    pub event_buffer: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            event_buffer: 64,
        }
    }
}

// ── LLM config ──────────────────────────────────────────────────

/// Azure OpenAI chat completions settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Resource endpoint, e.g. `https://example.openai.azure.com`.
    pub endpoint: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Deployment name.
    pub deployment: String,
    /// API version.
    pub api_version: String,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: "gpt-4o-mini".to_owned(),
            api_version: "2024-08-01-preview".to_owned(),
            max_tokens: 1024,
            temperature: 0.8,
        }
    }
}

// ── Realtime config ─────────────────────────────────────────────

/// Realtime voice session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Realtime resource endpoint.
    pub endpoint: Option<String>,
    /// Realtime model deployment.
    pub deployment: String,
    /// API version.
    pub api_version: String,
    /// Output voice.
    pub voice: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Server VAD activation threshold.
    pub vad_threshold: f32,
    /// Audio kept before detected speech, in milliseconds.
    pub prefix_padding_ms: u32,
    /// Silence ending a turn, in milliseconds.
    pub silence_duration_ms: u32,
    /// Whether the server replies automatically at end of turn.
    pub create_response: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: "gpt-4o-mini-realtime-preview".to_owned(),
            api_version: "2024-10-01-preview".to_owned(),
            voice: "alloy".to_owned(),
            temperature: 0.8,
            vad_threshold: 0.6,
            prefix_padding_ms: 200,
            silence_duration_ms: 500,
            create_response: true,
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
