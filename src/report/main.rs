//! Standalone report tool for the kudos database.
//!
//! Prints the leaderboard, a single user's kudos, or the latest kudos
//! straight from the SQLite file, without connecting to Slack.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use kudos_bot::config::BotSettings;
use kudos_bot::storage::{Database, KudosRecord};

/// Kudos database report tool.
#[derive(Parser, Debug)]
#[command(name = "kudos_report")]
#[command(about = "Prints kudos statistics from the bot's SQLite database")]
#[command(version)]
struct Args {
    /// Path to the SQLite database (defaults to DB_PATH).
    #[arg(short, long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Report,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Show the top users.
    Leaderboard {
        /// Number of users to show.
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Show one user's total and the kudos they received.
    User {
        /// Slack user ID (e.g. U12345).
        user_id: String,

        /// Number of log entries to show.
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Show the most recent kudos.
    Log {
        /// Number of log entries to show.
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _ = dotenvy::dotenv();
    let db_path = args
        .db
        .unwrap_or_else(|| BotSettings::from_env_with_defaults().db_path.display().to_string());

    let db = match Database::new(&db_path).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("✗ Failed to open database {db_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Report::Leaderboard { limit } => print_leaderboard(&db, limit).await,
        Report::User { user_id, limit } => print_user(&db, &user_id, limit).await,
        Report::Log { limit } => print_log(&db, limit).await,
    };

    db.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ Query failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn print_leaderboard(db: &Database, limit: u32) -> Result<(), kudos_bot::storage::DbError> {
    let entries = db.kudos().leaderboard(limit).await?;

    if entries.is_empty() {
        println!("No kudos given yet.");
        return Ok(());
    }

    println!("Kudos leaderboard (top {limit}):");
    for (rank, entry) in entries.iter().enumerate() {
        println!("{:>3}. {:<12} {:>5}", rank + 1, entry.user_id, entry.count);
    }
    Ok(())
}

async fn print_user(
    db: &Database,
    user_id: &str,
    limit: u32,
) -> Result<(), kudos_bot::storage::DbError> {
    let repo = db.kudos();
    let count = repo.count(user_id).await?;
    let records = repo.received(user_id, limit).await?;

    println!("{user_id}: {count} kudos");
    if !records.is_empty() {
        println!("\nReceived:");
        for record in &records {
            println!("  {}", format_record(record));
        }
    }
    Ok(())
}

async fn print_log(db: &Database, limit: u32) -> Result<(), kudos_bot::storage::DbError> {
    let records = db.kudos().recent(limit).await?;

    if records.is_empty() {
        println!("No kudos logged yet.");
        return Ok(());
    }

    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}

fn format_record(record: &KudosRecord) -> String {
    let when = record
        .given_at
        .map_or_else(|| "unknown time".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
    let message = record
        .message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default();

    format!(
        "[{when}] {} → {}{message}",
        record.giver_id, record.receiver_id
    )
}
