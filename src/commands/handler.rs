//! Event handler implementation.

use tracing::{debug, error, info};

use super::types::{BotCommand, KudosGrant, parse_grants};
use crate::gemini::{GeminiClient, KudosContext};
use crate::slack::{MessageEvent, OutgoingMessage, SlackEvent};
use crate::storage::{Database, DbError, KudosRecord, LeaderboardEntry};

/// Number of received kudos listed by `stats`.
const STATS_RECENT_LIMIT: u32 = 5;

const HELP_TEXT: &str = "Hey there! 👋\n\
    Give someone kudos with `@username ++`\n\
    Or mention me with `leaderboard` to see the top users.\n\
    Mention me with `stats` to see your own kudos.";

const EMPTY_LEADERBOARD_TEXT: &str =
    "No kudos given yet! Be the first to appreciate someone with `@user ++` 🎉";

const STORAGE_ERROR_TEXT: &str = "Sorry, I couldn't reach the kudos database. Please try again later.";

/// Turns Slack events into replies, recording kudos along the way.
pub struct EventHandler {
    db: Database,
    generator: GeminiClient,
    leaderboard_limit: u32,
    bot_user_id: Option<String>,
}

impl EventHandler {
    /// Creates a new event handler.
    #[must_use]
    pub const fn new(db: Database, generator: GeminiClient, leaderboard_limit: u32) -> Self {
        Self {
            db,
            generator,
            leaderboard_limit,
            bot_user_id: None,
        }
    }

    /// Ignores messages posted by the given user (the bot itself).
    #[must_use]
    pub fn with_bot_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.bot_user_id = Some(user_id.into());
        self
    }

    /// Handles one event and returns the replies to post, in order.
    pub async fn handle_event(&self, event: &SlackEvent) -> Vec<OutgoingMessage> {
        match event {
            SlackEvent::Message(message) => self.handle_message(message).await,
            SlackEvent::AppMention(mention) => self.handle_mention(mention).await.into_iter().collect(),
            SlackEvent::Other => Vec::new(),
        }
    }

    async fn handle_message(&self, event: &MessageEvent) -> Vec<OutgoingMessage> {
        let Some(giver) = event.user.as_deref() else {
            return Vec::new();
        };
        let text = event.text();
        if text.is_empty() || self.bot_user_id.as_deref() == Some(giver) {
            return Vec::new();
        }

        let grants = parse_grants(text);
        if !grants.is_empty() {
            debug!(giver, grants = grants.len(), "Found kudos in message");
        }

        let mut replies = Vec::with_capacity(grants.len());
        for grant in grants {
            let reply_text = if grant.receiver == giver {
                info!(user = giver, "Refused self-kudos");
                format_self_kudos(giver)
            } else {
                match self.award(giver, &grant).await {
                    Ok(text) => text,
                    Err(e) => {
                        error!(receiver = %grant.receiver, error = %e, "Failed to record kudos");
                        continue;
                    }
                }
            };

            replies.push(OutgoingMessage::in_thread(
                &event.channel,
                event.reply_thread(),
                reply_text,
            ));
        }

        replies
    }

    async fn handle_mention(&self, event: &MessageEvent) -> Option<OutgoingMessage> {
        let command = BotCommand::parse(event.text());
        debug!(%command, "Handling mention");

        let result = match command {
            BotCommand::Leaderboard => self.leaderboard_text().await,
            BotCommand::Stats => match event.user.as_deref() {
                Some(user) => self.stats_text(user).await,
                None => return None,
            },
            BotCommand::Help => Ok(HELP_TEXT.to_owned()),
        };

        let text = result.unwrap_or_else(|e| {
            error!(%command, error = %e, "Failed to answer mention");
            STORAGE_ERROR_TEXT.to_owned()
        });

        Some(OutgoingMessage::in_thread(
            &event.channel,
            event.reply_thread(),
            text,
        ))
    }

    /// Records a kudos and builds the announcement.
    async fn award(&self, giver: &str, grant: &KudosGrant) -> Result<String, DbError> {
        let count = self
            .db
            .kudos()
            .give(&grant.receiver, Some(giver), grant.message.as_deref())
            .await?;

        info!(receiver = %grant.receiver, giver, count, "Kudos given");

        let celebration = self
            .generator
            .generate(&KudosContext {
                message: grant.message.clone(),
                count: Some(count),
                ..KudosContext::default()
            })
            .await;

        Ok(format_award(&grant.receiver, count, &celebration))
    }

    async fn leaderboard_text(&self) -> Result<String, DbError> {
        let entries = self.db.kudos().leaderboard(self.leaderboard_limit).await?;
        Ok(format_leaderboard(&entries))
    }

    async fn stats_text(&self, user: &str) -> Result<String, DbError> {
        let repo = self.db.kudos();
        let count = repo.count(user).await?;
        let recent = repo.received(user, STATS_RECENT_LIMIT).await?;
        Ok(format_stats(user, count, &recent))
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("generator", &self.generator)
            .field("leaderboard_limit", &self.leaderboard_limit)
            .field("bot_user_id", &self.bot_user_id)
            .finish_non_exhaustive()
    }
}

fn format_self_kudos(user: &str) -> String {
    format!("Nice try <@{user}> 😜 You can’t give kudos to yourself!")
}

fn format_award(receiver: &str, count: i64, celebration: &str) -> String {
    format!(":sparkles: <@{receiver}> now has *{count}* kudos! {celebration}")
}

fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_LEADERBOARD_TEXT.to_owned();
    }

    let mut text = ":trophy: *Kudos Leaderboard:*\n".to_owned();
    for (rank, entry) in entries.iter().enumerate() {
        text.push_str(&format!(
            "{}. <@{}> — {} kudos\n",
            rank + 1,
            entry.user_id,
            entry.count
        ));
    }
    text
}

fn format_stats(user: &str, count: i64, recent: &[KudosRecord]) -> String {
    let mut lines = vec![format!("<@{user}> has *{count}* kudos.")];
    if !recent.is_empty() {
        lines.push("Recent kudos:".to_owned());
        for record in recent {
            lines.push(match &record.message {
                Some(message) => format!("• from <@{}>: {message}", record.giver_id),
                None => format!("• from <@{}>", record.giver_id),
            });
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;
    use crate::gemini::FALLBACK_MESSAGES;

    async fn test_handler() -> EventHandler {
        let db = Database::new(":memory:").await.unwrap();
        let generator = GeminiClient::new(&GeminiConfig::default()).unwrap();
        EventHandler::new(db, generator, 10).with_bot_user_id("UBOT")
    }

    fn message(user: &str, text: &str) -> MessageEvent {
        MessageEvent {
            user: Some(user.to_owned()),
            text: Some(text.to_owned()),
            channel: "C1".to_owned(),
            ts: "100.1".to_owned(),
            ..MessageEvent::default()
        }
    }

    #[test]
    fn test_format_leaderboard() {
        let entries = vec![
            LeaderboardEntry {
                user_id: "U1".to_owned(),
                count: 5,
            },
            LeaderboardEntry {
                user_id: "U2".to_owned(),
                count: 2,
            },
        ];
        assert_eq!(
            format_leaderboard(&entries),
            ":trophy: *Kudos Leaderboard:*\n1. <@U1> — 5 kudos\n2. <@U2> — 2 kudos\n"
        );
    }

    #[test]
    fn test_format_leaderboard_empty() {
        assert_eq!(format_leaderboard(&[]), EMPTY_LEADERBOARD_TEXT);
    }

    #[test]
    fn test_format_stats_lists_recent() {
        let recent = vec![
            KudosRecord {
                id: 2,
                receiver_id: "U1".to_owned(),
                giver_id: "U2".to_owned(),
                message: Some("great demo".to_owned()),
                given_at: None,
            },
            KudosRecord {
                id: 1,
                receiver_id: "U1".to_owned(),
                giver_id: "U3".to_owned(),
                message: None,
                given_at: None,
            },
        ];
        assert_eq!(
            format_stats("U1", 2, &recent),
            "<@U1> has *2* kudos.\nRecent kudos:\n• from <@U2>: great demo\n• from <@U3>"
        );
    }

    #[tokio::test]
    async fn test_kudos_message_records_and_replies_in_thread() {
        let handler = test_handler().await;

        let replies = handler
            .handle_event(&SlackEvent::Message(message("U1", "<@U2> ++ thanks!")))
            .await;

        assert_eq!(replies.len(), 1);
        let reply = &replies[0];
        assert_eq!(reply.channel, "C1");
        assert_eq!(reply.thread_ts.as_deref(), Some("100.1"));
        let prefix = ":sparkles: <@U2> now has *1* kudos! ";
        assert!(reply.text.starts_with(prefix));
        assert!(FALLBACK_MESSAGES.contains(&&reply.text[prefix.len()..]));

        let log = handler.db.kudos().received("U2", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].giver_id, "U1");
        assert_eq!(log[0].message.as_deref(), Some("thanks!"));
    }

    #[tokio::test]
    async fn test_multiple_grants_with_self_kudos() {
        let handler = test_handler().await;

        let replies = handler
            .handle_event(&SlackEvent::Message(message(
                "U1",
                "<@U1> ++ me <@U2> ++ you <@U2> ++ again",
            )))
            .await;

        assert_eq!(replies.len(), 3);
        assert_eq!(
            replies[0].text,
            "Nice try <@U1> 😜 You can’t give kudos to yourself!"
        );
        assert!(replies[1].text.starts_with(":sparkles: <@U2> now has *1* kudos!"));
        assert!(replies[2].text.starts_with(":sparkles: <@U2> now has *2* kudos!"));
        assert_eq!(handler.db.kudos().count("U1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_grant_is_skipped() {
        let handler = test_handler().await;
        sqlx::query(
            r"
            CREATE TRIGGER reject_u3 BEFORE INSERT ON kudos
            WHEN NEW.user_id = 'U3'
            BEGIN
                SELECT RAISE(ABORT, 'rejected');
            END
            ",
        )
        .execute(handler.db.pool())
        .await
        .unwrap();

        let replies = handler
            .handle_event(&SlackEvent::Message(message(
                "U1",
                "<@U2> ++ one <@U3> ++ two <@U4> ++ three",
            )))
            .await;

        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.starts_with(":sparkles: <@U2> now has *1* kudos!"));
        assert!(replies[1].text.starts_with(":sparkles: <@U4> now has *1* kudos!"));

        let kudos = handler.db.kudos();
        assert_eq!(kudos.count("U3").await.unwrap(), 0);
        assert!(kudos.received("U3", 10).await.unwrap().is_empty());
        assert_eq!(kudos.count("U4").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reply_uses_existing_thread() {
        let handler = test_handler().await;
        let mut event = message("U1", "<@U2> ++");
        event.thread_ts = Some("50.0".to_owned());

        let replies = handler.handle_event(&SlackEvent::Message(event)).await;

        assert_eq!(replies[0].thread_ts.as_deref(), Some("50.0"));
    }

    #[tokio::test]
    async fn test_ignored_messages() {
        let handler = test_handler().await;

        let mut no_user = message("U1", "<@U2> ++");
        no_user.user = None;
        assert!(handler.handle_event(&SlackEvent::Message(no_user)).await.is_empty());

        let empty = message("U1", "");
        assert!(handler.handle_event(&SlackEvent::Message(empty)).await.is_empty());

        let from_bot = message("UBOT", "<@U2> ++");
        assert!(handler.handle_event(&SlackEvent::Message(from_bot)).await.is_empty());

        let plain = message("U1", "just chatting");
        assert!(handler.handle_event(&SlackEvent::Message(plain)).await.is_empty());

        assert!(handler.handle_event(&SlackEvent::Other).await.is_empty());
        assert_eq!(handler.db.kudos().count("U2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mention_leaderboard() {
        let handler = test_handler().await;

        let replies = handler
            .handle_event(&SlackEvent::AppMention(message("U1", "<@UBOT> leaderboard")))
            .await;
        assert_eq!(replies[0].text, EMPTY_LEADERBOARD_TEXT);

        handler
            .handle_event(&SlackEvent::Message(message("U1", "<@U2> ++ <@U3> ++")))
            .await;
        handler
            .handle_event(&SlackEvent::Message(message("U3", "<@U2> ++")))
            .await;

        let replies = handler
            .handle_event(&SlackEvent::AppMention(message("U1", "<@UBOT> Leaderboard")))
            .await;
        assert_eq!(
            replies[0].text,
            ":trophy: *Kudos Leaderboard:*\n1. <@U2> — 2 kudos\n2. <@U3> — 1 kudos\n"
        );
        assert_eq!(replies[0].thread_ts.as_deref(), Some("100.1"));
    }

    #[tokio::test]
    async fn test_mention_stats() {
        let handler = test_handler().await;
        handler
            .handle_event(&SlackEvent::Message(message("U2", "<@U1> ++ nice fix")))
            .await;

        let replies = handler
            .handle_event(&SlackEvent::AppMention(message("U1", "<@UBOT> stats")))
            .await;

        assert_eq!(
            replies[0].text,
            "<@U1> has *1* kudos.\nRecent kudos:\n• from <@U2>: nice fix"
        );
    }

    #[tokio::test]
    async fn test_mention_help() {
        let handler = test_handler().await;

        let replies = handler
            .handle_event(&SlackEvent::AppMention(message("U1", "<@UBOT> hello")))
            .await;

        assert_eq!(replies.len(), 1);
        assert!(replies[0].text.starts_with("Hey there! 👋\nGive someone kudos with `@username ++`"));
    }
}
