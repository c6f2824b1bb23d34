//! Application settings and API credentials.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_GEMINI_API_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_SLACK_API_BASE_URL};

/// Slack API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`) used for the Web API.
    pub bot_token: String,

    /// App-level token (`xapp-...`) used to open Socket Mode connections.
    pub app_token: String,

    /// Signing secret. Not needed for Socket Mode but kept for completeness.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Base URL of the Slack Web API.
    #[serde(default = "default_slack_api_base_url")]
    pub api_base_url: String,
}

fn default_slack_api_base_url() -> String {
    DEFAULT_SLACK_API_BASE_URL.to_owned()
}

impl SlackConfig {
    /// Creates a new Slack configuration with the default API URL.
    #[must_use]
    pub fn new(bot_token: String, app_token: String) -> Self {
        Self {
            bot_token,
            app_token,
            signing_secret: None,
            api_base_url: default_slack_api_base_url(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `SLACK_BOT_TOKEN` and `SLACK_APP_TOKEN` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = required(&lookup, "SLACK_BOT_TOKEN")?;
        let app_token = required(&lookup, "SLACK_APP_TOKEN")?;

        // Socket Mode only accepts app-level tokens
        if !app_token.starts_with("xapp-") {
            return Err(ConfigError::InvalidValue {
                name: "SLACK_APP_TOKEN",
                value: redact(&app_token),
            });
        }

        Ok(Self {
            bot_token,
            app_token,
            signing_secret: optional(&lookup, "SLACK_SIGNING_SECRET"),
            api_base_url: optional(&lookup, "SLACK_API_BASE_URL")
                .unwrap_or_else(default_slack_api_base_url),
        })
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("app_token", &redact(&self.app_token))
            .field("signing_secret", &self.signing_secret.as_deref().map(redact))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Gemini API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. When absent, celebration messages come from the fallback list.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for generation.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_gemini_api_base_url")]
    pub api_base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_owned()
}

fn default_gemini_api_base_url() -> String {
    DEFAULT_GEMINI_API_BASE_URL.to_owned()
}

fn default_gemini_timeout() -> u64 {
    10
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            api_base_url: default_gemini_api_base_url(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

impl GeminiConfig {
    /// Creates configuration from environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: optional(&lookup, "GEMINI_API_KEY"),
            model: optional(&lookup, "GEMINI_MODEL").unwrap_or_else(default_gemini_model),
            api_base_url: optional(&lookup, "GEMINI_API_BASE_URL")
                .unwrap_or_else(default_gemini_api_base_url),
            timeout_secs: parsed(&lookup, "GEMINI_TIMEOUT_SECS")
                .unwrap_or_else(default_gemini_timeout),
        }
    }

    /// Whether an API key is available.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Number of users shown on the leaderboard.
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: u32,

    /// Minimum interval between posted replies in milliseconds.
    #[serde(default = "default_min_post_interval")]
    pub min_post_interval_ms: u64,

    /// Log filter directives (`RUST_LOG`), used when `--log-level` is not given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/home/ubuntu/kudos.db")
}

fn default_leaderboard_limit() -> u32 {
    10
}

fn default_min_post_interval() -> u64 {
    1000 // Slack allows roughly one message per second per channel
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            leaderboard_limit: default_leaderboard_limit(),
            min_post_interval_ms: default_min_post_interval(),
            log_level: default_log_level(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates bot settings from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: optional(&lookup, "DB_PATH").map_or_else(default_db_path, PathBuf::from),
            leaderboard_limit: parsed(&lookup, "LEADERBOARD_LIMIT")
                .filter(|&limit| limit > 0)
                .unwrap_or_else(default_leaderboard_limit),
            min_post_interval_ms: parsed(&lookup, "MIN_POST_INTERVAL_MS")
                .unwrap_or_else(default_min_post_interval),
            log_level: optional(&lookup, "RUST_LOG").unwrap_or_else(default_log_level),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional(lookup, name).ok_or(ConfigError::MissingEnvVar(name))
}

/// Reads a variable, treating blank values as unset.
fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    optional(lookup, name).and_then(|v| v.parse().ok())
}

/// Keeps the token prefix visible so the token type can still be told apart.
/// Slack token prefixes that identify the token type without revealing it.
const TOKEN_PREFIXES: &[&str] = &["xoxb-", "xoxp-", "xapp-"];

fn redact(secret: &str) -> String {
    let prefix = TOKEN_PREFIXES
        .iter()
        .find(|prefix| secret.starts_with(**prefix))
        .copied()
        .unwrap_or_default();
    format!("{prefix}***")
}
