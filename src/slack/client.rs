//! Slack Web API client.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info};

use super::RateLimiter;
use crate::config::SlackConfig;
use crate::retry::{RetryPolicy, Transient};

/// Timeout for a single Web API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Slack error codes that indicate a server-side problem worth retrying.
const TRANSIENT_API_ERRORS: &[&str] = &[
    "ratelimited",
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// Errors that can occur while talking to Slack.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tungstenite::Error> for SlackError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl Transient for SlackError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Api(code) => TRANSIENT_API_ERRORS.contains(&code.as_str()),
            Self::RateLimited(_) | Self::WebSocket(_) => true,
            Self::Json(_) => false,
        }
    }
}

/// A message to post to a channel, optionally in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl OutgoingMessage {
    /// Creates a reply in the given thread.
    #[must_use]
    pub fn in_thread(
        channel: impl Into<String>,
        thread_ts: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            thread_ts: Some(thread_ts.into()),
        }
    }
}

/// Identity of the bot user, as reported by `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpen {
    url: String,
}

/// High-level Slack Web API wrapper.
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    app_token: String,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl SlackClient {
    /// Creates a client for the given configuration.
    pub fn new(config: &SlackConfig, min_post_interval: Duration) -> Result<Self, SlackError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
            rate_limiter: RateLimiter::new(min_post_interval),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy used for posting messages.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Requests a Socket Mode websocket URL (`apps.connections.open`).
    pub async fn open_connection(&self) -> Result<String, SlackError> {
        let opened: ConnectionsOpen = self
            .call("apps.connections.open", &self.app_token, None)
            .await?;
        debug!("Obtained Socket Mode URL");
        Ok(opened.url)
    }

    /// Identifies the bot user (`auth.test`).
    pub async fn auth_test(&self) -> Result<BotIdentity, SlackError> {
        let identity: BotIdentity = self.call("auth.test", &self.bot_token, None).await?;
        info!(
            user_id = %identity.user_id,
            team = identity.team.as_deref().unwrap_or("unknown"),
            "Authenticated with Slack"
        );
        Ok(identity)
    }

    /// Posts a message (`chat.postMessage`), retrying transient failures.
    pub async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SlackError> {
        let body = serde_json::to_value(message)?;
        let body = &body;

        self.retry
            .run("chat.postMessage", move || async move {
                self.rate_limiter.wait_and_acquire().await;
                let result: Result<Value, SlackError> =
                    self.call("chat.postMessage", &self.bot_token, Some(body)).await;
                if let Err(SlackError::RateLimited(secs)) = &result {
                    self.rate_limiter.handle_retry_after(*secs).await;
                }
                result
            })
            .await?;

        debug!(channel = %message.channel, "Message posted");
        Ok(())
    }

    /// Calls a Web API method and decodes a successful response.
    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<R, SlackError> {
        let url = format!("{}/{method}", self.base_url);

        let mut request = self.http.post(&url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(SlackError::RateLimited(retry_after));
        }

        let value: Value = response.error_for_status()?.json().await?;

        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(SlackError::Api(code.to_owned()));
        }

        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("rate_limiter", &self.rate_limiter)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
