//! Canned celebration lines used when Gemini is unavailable.

use rand::seq::SliceRandom;

/// Lines picked from when generation is disabled or fails.
pub const FALLBACK_MESSAGES: &[&str] = &[
    "Keep up the amazing work! 🌟",
    "You're crushing it! 🚀",
    "Excellence recognized! 👏",
    "Your awesomeness is showing! ✨",
    "Making magic happen! 🎯",
    "Stellar performance! ⭐",
    "You're on fire! 🔥",
    "Absolutely brilliant! 💎",
    "Shining bright! 💫",
    "Legendary work! 🏆",
];

/// Returns a random fallback line.
pub fn fallback_message() -> &'static str {
    FALLBACK_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Keep up the amazing work! 🌟")
}
