//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model endpoint
    #[serde(default)]
    pub llm: LlmConfig,

    /// Satori server connection
    #[serde(default)]
    pub satori: SatoriConfig,

    /// Channel/message persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Bot persona
    #[serde(default)]
    pub bot: BotConfig,

    /// Context windows and loop timing
    #[serde(default)]
    pub limits: LoopLimits,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Language the bot should answer in, if fixed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_language: Option<String>,

    /// Send `think: false` (Ollama reasoning models)
    #[serde(default)]
    pub disable_think: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: None,
            temperature: default_temperature(),
            response_language: None,
            disable_think: false,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("response_language", &self.response_language)
            .field("disable_think", &self.disable_think)
            .finish()
    }
}

/// The three settings the planner cannot run without.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmCredentials {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCredentials")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmConfig {
    /// Return the api key, base URL, and model, or name the first missing one.
    pub fn require(&self) -> Result<LlmCredentials, ConfigError> {
        fn field(value: &Option<String>, env: &str, key: &str) -> Result<String, ConfigError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "{env} is not set (llm.{key} in config.toml)"
                    ))
                })
        }

        Ok(LlmCredentials {
            api_key: field(&self.api_key, "LLM_API_KEY", "api_key")?,
            base_url: field(&self.base_url, "LLM_API_BASE_URL", "base_url")?,
            model: field(&self.model, "LLM_MODEL", "model")?,
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SatoriConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_ws_url() -> String {
    "ws://localhost:5140/v1/events".into()
}
fn default_api_url() -> String {
    "http://localhost:5140".into()
}
fn default_heartbeat_secs() -> u64 {
    10
}
fn default_reconnect_secs() -> u64 {
    5
}

impl Default for SatoriConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            token: None,
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl std::fmt::Debug for SatoriConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatoriConfig")
            .field("ws_url", &self.ws_url)
            .field("api_url", &self.api_url)
            .field("token", &redact(&self.token))
            .field("heartbeat_secs", &self.heartbeat_secs)
            .field("reconnect_secs", &self.reconnect_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite file; defaults to `~/.parley/parley.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("parley.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Extra persona text appended to the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
}

fn default_bot_name() -> String {
    "Parley".into()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            personality: None,
        }
    }
}

/// Bounds on per-channel memory and the timing of the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopLimits {
    #[serde(default = "default_max_messages")]
    pub max_messages_in_context: usize,
    #[serde(default = "default_messages_keep")]
    pub messages_keep_on_trim: usize,
    #[serde(default = "default_max_actions")]
    pub max_actions_in_context: usize,
    #[serde(default = "default_actions_keep")]
    pub actions_keep_on_trim: usize,
    #[serde(default = "default_max_unread")]
    pub max_unread_events: usize,
    #[serde(default = "default_max_recent")]
    pub max_recent_interacted_channels: usize,
    #[serde(default = "default_periodic_ms")]
    pub periodic_loop_interval_ms: u64,
    #[serde(default = "default_continue_ms")]
    pub loop_continue_delay_ms: u64,
    #[serde(default = "default_sleep_ms")]
    pub sleep_duration_ms: u64,
}

fn default_max_messages() -> usize {
    20
}
fn default_messages_keep() -> usize {
    5
}
fn default_max_actions() -> usize {
    50
}
fn default_actions_keep() -> usize {
    20
}
fn default_max_unread() -> usize {
    20
}
fn default_max_recent() -> usize {
    5
}
fn default_periodic_ms() -> u64 {
    60_000
}
fn default_continue_ms() -> u64 {
    1_000
}
fn default_sleep_ms() -> u64 {
    30_000
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_messages_in_context: default_max_messages(),
            messages_keep_on_trim: default_messages_keep(),
            max_actions_in_context: default_max_actions(),
            actions_keep_on_trim: default_actions_keep(),
            max_unread_events: default_max_unread(),
            max_recent_interacted_channels: default_max_recent(),
            periodic_loop_interval_ms: default_periodic_ms(),
            loop_continue_delay_ms: default_continue_ms(),
            sleep_duration_ms: default_sleep_ms(),
        }
    }
}

impl LoopLimits {
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_loop_interval_ms)
    }

    pub fn continue_delay(&self) -> Duration {
        Duration::from_millis(self.loop_continue_delay_ms)
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_duration_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            (
                "messages",
                self.max_messages_in_context,
                self.messages_keep_on_trim,
            ),
            (
                "actions",
                self.max_actions_in_context,
                self.actions_keep_on_trim,
            ),
        ];
        for (name, max, keep) in windows {
            if max == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "limits.max_{name}_in_context must be > 0"
                )));
            }
            if keep > max {
                return Err(ConfigError::ValidationError(format!(
                    "limits.{name}_keep_on_trim ({keep}) exceeds limits.max_{name}_in_context ({max})"
                )));
            }
        }
        if self.max_unread_events == 0 || self.max_recent_interacted_channels == 0 {
            return Err(ConfigError::ValidationError(
                "unread and recent-channel caps must be > 0".into(),
            ));
        }
        if self.periodic_loop_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.periodic_loop_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override file values:
    /// - `LLM_API_KEY`, `LLM_API_BASE_URL`, `LLM_MODEL`
    /// - `LLM_RESPONSE_LANGUAGE`, `LLM_OLLAMA_DISABLE_THINK`
    /// - `SATORI_WS_URL`, `SATORI_API_URL`, `SATORI_TOKEN`
    /// - `PARLEY_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = non_empty("LLM_API_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = non_empty("LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = non_empty("LLM_RESPONSE_LANGUAGE") {
            self.llm.response_language = Some(v);
        }
        if let Some(v) = non_empty("LLM_OLLAMA_DISABLE_THINK") {
            self.llm.disable_think = matches!(v.trim(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(v) = non_empty("SATORI_WS_URL") {
            self.satori.ws_url = v;
        }
        if let Some(v) = non_empty("SATORI_API_URL") {
            self.satori.api_url = v;
        }
        if let Some(v) = non_empty("SATORI_TOKEN") {
            self.satori.token = Some(v);
        }
        if let Some(v) = non_empty("PARLEY_DB_PATH") {
            self.store.path = Some(PathBuf::from(v));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }

        self.limits.validate()
    }

    /// Generate a default config TOML string (for `parley config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
