//! Socket Mode envelopes and the Slack events the bot reacts to.

use serde::{Deserialize, Serialize};

/// Kind of a Socket Mode envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Hello,
    EventsApi,
    Disconnect,
    SlashCommands,
    Interactive,
    #[serde(other)]
    Unknown,
}

/// A frame received over a Socket Mode websocket.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,

    /// Must be acknowledged within 3 seconds.
    #[serde(default)]
    pub envelope_id: Option<String>,

    #[serde(default)]
    pub payload: Option<serde_json::Value>,

    /// Set on `disconnect` envelopes (e.g. `refresh_requested`).
    #[serde(default)]
    pub reason: Option<String>,
}

impl Envelope {
    /// Extracts the inner event of an `events_api` envelope.
    ///
    /// Returns `None` for other envelope kinds or payloads without an event.
    pub fn event(&self) -> Option<SlackEvent> {
        if self.kind != EnvelopeKind::EventsApi {
            return None;
        }
        let payload = self.payload.as_ref()?;
        let callback: EventCallback = serde_json::from_value(payload.clone()).ok()?;
        Some(callback.event)
    }
}

/// Acknowledgement sent back for every envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Acknowledgement<'a> {
    pub envelope_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct EventCallback {
    event: SlackEvent,
}

/// Events the bot subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    /// A message posted in a channel the bot is in.
    Message(MessageEvent),

    /// A message mentioning the bot.
    AppMention(MessageEvent),

    #[serde(other)]
    Other,
}

/// Fields shared by `message` and `app_mention` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub channel: String,

    #[serde(default)]
    pub ts: String,

    #[serde(default)]
    pub thread_ts: Option<String>,

    #[serde(default)]
    pub bot_id: Option<String>,

    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Timestamp of the thread replies belong to.
    #[must_use]
    pub fn reply_thread(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// Message text, empty if absent.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Decodes a Socket Mode frame.
pub fn parse_envelope(frame: &str) -> Result<Envelope, serde_json::Error> {
    serde_json::from_str(frame)
}
