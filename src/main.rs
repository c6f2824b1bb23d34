//! Kudos Bot - Main Entry Point
//!
//! A Slack bot that lets people give each other kudos with `@user ++`
//! and keeps a leaderboard.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use kudos_bot::bot::{BotMessage, KudosBot};
use kudos_bot::commands::EventHandler;
use kudos_bot::config::{BotSettings, GeminiConfig, SlackConfig};
use kudos_bot::gemini::GeminiClient;
use kudos_bot::slack::SlackClient;
use kudos_bot::storage::Database;

/// Slack bot for giving and tracking kudos.
#[derive(Parser, Debug)]
#[command(name = "kudos_bot")]
#[command(about = "Give your teammates kudos on Slack with @user ++")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level or filter directives (overrides RUST_LOG).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Path to the SQLite database (overrides DB_PATH).
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables first so RUST_LOG from .env applies
    let env_loaded = dotenvy::from_filename(&args.env_file);
    let settings = BotSettings::from_env_with_defaults();

    // Initialize logging
    init_logging(log_filter(args.log_level.as_deref(), &settings));

    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let slack_config =
        SlackConfig::from_env().context("Failed to load Slack configuration from environment")?;
    let gemini_config = GeminiConfig::from_env();

    let db_path = args
        .db_path
        .unwrap_or_else(|| settings.db_path.display().to_string());
    info!("Running with DB_PATH: {}", db_path);

    let db = Database::new(&db_path)
        .await
        .context("Failed to open kudos database")?;

    let slack = SlackClient::new(
        &slack_config,
        Duration::from_millis(settings.min_post_interval_ms),
    )
    .context("Failed to create Slack client")?;

    let generator = GeminiClient::new(&gemini_config).context("Failed to create Gemini client")?;
    if gemini_config.is_enabled() {
        info!("Celebration messages from Gemini model {}", generator.model());
    } else {
        warn!("GEMINI_API_KEY not set, celebration messages will use fallbacks");
    }

    let mut handler = EventHandler::new(db.clone(), generator, settings.leaderboard_limit);
    match slack.auth_test().await {
        Ok(identity) => handler = handler.with_bot_user_id(identity.user_id),
        Err(e) => warn!("Could not identify bot user: {}. Own messages won't be filtered.", e),
    }

    let bot = KudosBot::new(Arc::new(slack), Arc::new(handler));
    let (bot_tx, bot_rx) = mpsc::channel::<BotMessage>(1);

    info!("🚀 Kudos bot is running (Socket Mode)...");
    let mut bot_handle = tokio::spawn(async move { bot.run(bot_rx).await });

    let result = tokio::select! {
        joined = &mut bot_handle => joined.context("Bot task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            let _ = bot_tx.send(BotMessage::Shutdown).await;
            bot_handle.await.context("Bot task panicked")?
        }
    };

    db.close().await;

    result.context("Lost connection to Slack")
}

/// Picks the log filter: `--log-level`, then `RUST_LOG`, then `info`.
fn log_filter(cli_level: Option<&str>, settings: &BotSettings) -> EnvFilter {
    let directives = cli_level.unwrap_or(settings.log_level.as_str());
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {directives:?} ({e}), using info");
        EnvFilter::new("info")
    })
}

/// Initializes the logging subsystem.
fn init_logging(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
