//! Slack client module.
//!
//! Provides the Web API client used to post replies, the Socket Mode
//! connection that delivers events, and the event types themselves.

mod client;
mod events;
mod rate_limiter;
mod socket;

pub use client::{BotIdentity, OutgoingMessage, SlackClient, SlackError};
pub use events::{Envelope, EnvelopeKind, MessageEvent, SlackEvent, parse_envelope};
pub use rate_limiter::RateLimiter;
pub use socket::{SocketConnection, SocketEvent, SocketModeClient};
