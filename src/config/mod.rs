//! Configuration module for the kudos bot.
//!
//! Handles loading of Slack and Gemini credentials and bot settings
//! from the environment.

mod settings;

pub use settings::{BotSettings, ConfigError, GeminiConfig, SlackConfig};

/// Default Slack Web API endpoint.
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Default Generative Language API endpoint.
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for celebration messages.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
