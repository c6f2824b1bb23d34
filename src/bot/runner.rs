//! Kudos bot runner.
//!
//! The runner follows a simple loop:
//! 1. Open a Socket Mode connection (retried, fails hard when exhausted)
//! 2. For each event, spawn a task that runs the handler and posts replies
//! 3. On `disconnect` or a dropped websocket, go back to step 1
//! 4. On shutdown, close the websocket and wait for in-flight replies

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::commands::EventHandler;
use crate::slack::{SlackClient, SlackError, SlackEvent, SocketEvent, SocketModeClient};

/// Messages that can be sent to the runner.
#[derive(Debug, Clone)]
pub enum BotMessage {
    /// Stop the bot.
    Shutdown,
}

/// Connects to Slack and dispatches events to the handler.
pub struct KudosBot {
    slack: Arc<SlackClient>,
    socket: SocketModeClient,
    handler: Arc<EventHandler>,
}

impl KudosBot {
    /// Creates a new runner.
    #[must_use]
    pub fn new(slack: Arc<SlackClient>, handler: Arc<EventHandler>) -> Self {
        Self {
            socket: SocketModeClient::new(Arc::clone(&slack)),
            slack,
            handler,
        }
    }

    /// Runs until shutdown is requested or a connection cannot be established.
    pub async fn run(&self, mut rx: mpsc::Receiver<BotMessage>) -> Result<(), SlackError> {
        info!("Kudos bot started");

        let mut tasks = JoinSet::new();

        loop {
            let connected = tokio::select! {
                conn = self.socket.connect() => conn,
                _ = rx.recv() => {
                    info!("Shutdown requested while connecting");
                    break;
                }
            };

            let mut conn = match connected {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "Could not connect to Slack");
                    drain(&mut tasks).await;
                    return Err(e);
                }
            };

            loop {
                tokio::select! {
                    event = conn.next_event() => match event {
                        Ok(Some(SocketEvent::Event(event))) => self.dispatch(&mut tasks, event),
                        Ok(Some(SocketEvent::Disconnect(reason))) => {
                            info!(reason = %reason, "Reconnecting at Slack's request");
                            conn.close().await;
                            break;
                        }
                        Ok(None) => {
                            warn!("Socket Mode connection closed, reconnecting");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Socket Mode connection failed, reconnecting");
                            break;
                        }
                    },
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(e) = joined {
                            error!(error = %e, "Event task panicked");
                        }
                    }
                    msg = rx.recv() => match msg {
                        Some(BotMessage::Shutdown) | None => {
                            info!("Kudos bot shutting down");
                            conn.close().await;
                            drain(&mut tasks).await;
                            return Ok(());
                        }
                    },
                }
            }
        }

        drain(&mut tasks).await;
        Ok(())
    }

    fn dispatch(&self, tasks: &mut JoinSet<()>, event: SlackEvent) {
        let handler = Arc::clone(&self.handler);
        let slack = Arc::clone(&self.slack);

        tasks.spawn(async move {
            for reply in handler.handle_event(&event).await {
                if let Err(e) = slack.post_message(&reply).await {
                    error!(channel = %reply.channel, error = %e, "Failed to post reply");
                }
            }
        });
    }
}

/// Waits for in-flight event tasks.
async fn drain(tasks: &mut JoinSet<()>) {
    if !tasks.is_empty() {
        debug!(pending = tasks.len(), "Waiting for in-flight replies");
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Event task panicked");
        }
    }
}

impl std::fmt::Debug for KudosBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KudosBot")
            .field("slack", &self.slack)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}
