//! Kudos grants and mention commands.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Matches a kudos marker: `<@U12345> ++`.
#[allow(clippy::expect_used)]
static GRANT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([A-Z0-9]+)>\s*\+\+").expect("valid regex"));

/// A single kudos found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KudosGrant {
    /// User receiving the kudos.
    pub receiver: String,

    /// Text following the marker, if any.
    pub message: Option<String>,
}

/// Finds every kudos grant in a message.
///
/// A grant's message runs from its marker to the next marker (or the end
/// of the text), so `<@U1> ++ great work <@U2> ++ awesome job` yields two
/// grants with their own messages.
#[must_use]
pub fn parse_grants(text: &str) -> Vec<KudosGrant> {
    let markers: Vec<_> = GRANT_MARKER.captures_iter(text).collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let marker = caps.get(0)?;
            let receiver = caps.get(1)?.as_str().to_owned();
            let message_end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |next| next.start());
            let message = text[marker.end()..message_end].trim();

            Some(KudosGrant {
                receiver,
                message: (!message.is_empty()).then(|| message.to_owned()),
            })
        })
        .collect()
}

/// Commands understood when the bot is mentioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Show the top users.
    Leaderboard,

    /// Show the caller's own kudos.
    Stats,

    /// Show usage help.
    Help,
}

impl BotCommand {
    /// Parses a command from the text of a mention.
    ///
    /// Anything that isn't a known command is treated as a request for help.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.to_lowercase();

        if text.contains("leaderboard") {
            Self::Leaderboard
        } else if text
            .split_whitespace()
            .any(|word| word.trim_matches(|c: char| c.is_ascii_punctuation()) == "stats")
        {
            Self::Stats
        } else {
            Self::Help
        }
    }

    /// Returns the command name as it appears in help.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Leaderboard => "leaderboard",
            Self::Stats => "stats",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
