// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Threadline relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Threadline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadlineConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer token to user resolution.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Remote assistant provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Run driver and stream relay settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration.
///
/// Maps opaque bearer tokens to the user id they authenticate. An empty map
/// rejects every authenticated request.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tokens", &format!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

/// Remote assistant provider configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the API, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value sent in the `OpenAI-Beta` header.
    #[serde(default = "default_beta_header")]
    pub beta_header: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient HTTP statuses (429, 500, 502, 503).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            beta_header: default_beta_header(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("beta_header", &self.beta_header)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_beta_header() -> String {
    "assistants=v2".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

/// How the run driver observes a remote run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverMode {
    /// Poll run status and the latest thread message.
    #[default]
    Poll,
    /// Consume the provider's run event stream, polling only as a fallback.
    Stream,
}

/// Run driver and stream relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Run observation mode.
    #[serde(default)]
    pub mode: DriverMode,

    /// Maximum number of status polls before the turn times out.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Minimum delay between two polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Lifetime of a stream session token, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Interval of the expired-token sweeper, in seconds.
    #[serde(default = "default_token_sweep_secs")]
    pub token_sweep_secs: u64,

    /// Text persisted as the assistant message when a turn fails.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// User-safe text sent in the `error` frame when a turn fails.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: DriverMode::default(),
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            token_ttl_secs: default_token_ttl_secs(),
            token_sweep_secs: default_token_sweep_secs(),
            fallback_message: default_fallback_message(),
            error_message: default_error_message(),
        }
    }
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_token_ttl_secs() -> u64 {
    600
}

fn default_token_sweep_secs() -> u64 {
    60
}

fn default_fallback_message() -> String {
    "I'm sorry, I'm experiencing technical difficulties and couldn't finish my reply. Please try again in a moment.".to_string()
}

fn default_error_message() -> String {
    "We're experiencing technical difficulties. Please try again shortly.".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("threadline").join("threadline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("threadline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}
