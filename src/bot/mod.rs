//! Bot runtime module.
//!
//! Owns the Socket Mode connection and hands each event to the command
//! handler on its own task.

mod runner;

pub use runner::{BotMessage, KudosBot};
