//! Celebration message generation.
//!
//! Asks Google Gemini for a short celebratory line to go with each kudos,
//! falling back to a fixed list when no API key is configured or the
//! request fails.

mod client;
mod fallback;

pub use client::{GeminiClient, GeminiError, KudosContext, build_prompt};
pub use fallback::{FALLBACK_MESSAGES, fallback_message};
