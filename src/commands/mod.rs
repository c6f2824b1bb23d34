//! Command handling module.
//!
//! Finds `<@user> ++` kudos in channel messages and answers mentions of
//! the bot (`leaderboard`, `stats`, help).

mod handler;
mod types;

pub use handler::EventHandler;
pub use types::{BotCommand, KudosGrant, parse_grants};
