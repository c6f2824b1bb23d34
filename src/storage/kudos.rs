//! Kudos repository: aggregated counters and the kudos log.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use super::DbError;

/// Format SQLite uses for `CURRENT_TIMESTAMP`.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A user's position on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub count: i64,
}

/// A single logged kudos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KudosRecord {
    pub id: i64,
    pub receiver_id: String,
    pub giver_id: String,
    pub message: Option<String>,
    /// UTC time the kudos was recorded.
    pub given_at: Option<NaiveDateTime>,
}

type KudosRow = (i64, String, String, Option<String>, Option<String>);

impl From<KudosRow> for KudosRecord {
    fn from((id, receiver_id, giver_id, message, timestamp): KudosRow) -> Self {
        Self {
            id,
            receiver_id,
            giver_id,
            message,
            given_at: timestamp
                .and_then(|ts| NaiveDateTime::parse_from_str(&ts, SQLITE_TIMESTAMP_FORMAT).ok()),
        }
    }
}

/// Repository for kudos operations.
pub struct KudosRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KudosRepository<'a> {
    /// Create a new kudos repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Gives one kudos to `receiver` and returns their new total.
    ///
    /// The counter update and the log entry are written in one transaction.
    /// A log entry is only written when the giver is known.
    pub async fn give(
        &self,
        receiver: &str,
        giver: Option<&str>,
        message: Option<&str>,
    ) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO kudos (user_id, count)
            VALUES (?, 1)
            ON CONFLICT(user_id)
            DO UPDATE SET count = count + 1
            ",
        )
        .bind(receiver)
        .execute(&mut *tx)
        .await?;

        if let Some(giver) = giver {
            sqlx::query(
                r"
                INSERT INTO kudos_log (receiver_id, giver_id, message)
                VALUES (?, ?, ?)
                ",
            )
            .bind(receiver)
            .bind(giver)
            .bind(message)
            .execute(&mut *tx)
            .await?;
        }

        let count: i64 = sqlx::query_scalar("SELECT count FROM kudos WHERE user_id = ?")
            .bind(receiver)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(count)
    }

    /// Returns the current kudos count for a user (0 if they have none).
    pub async fn count(&self, user_id: &str) -> Result<i64, DbError> {
        let count: Option<i64> = sqlx::query_scalar("SELECT count FROM kudos WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(count.unwrap_or(0))
    }

    /// Returns the top `limit` users by kudos count.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT user_id, count FROM kudos
            ORDER BY count DESC, user_id ASC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, count)| LeaderboardEntry { user_id, count })
            .collect())
    }

    /// Returns the most recent kudos received by a user, newest first.
    pub async fn received(&self, user_id: &str, limit: u32) -> Result<Vec<KudosRecord>, DbError> {
        let rows: Vec<KudosRow> = sqlx::query_as(
            r"
            SELECT id, receiver_id, giver_id, message, CAST(timestamp AS TEXT)
            FROM kudos_log
            WHERE receiver_id = ?
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(KudosRecord::from).collect())
    }

    /// Returns the most recent kudos overall, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<KudosRecord>, DbError> {
        let rows: Vec<KudosRow> = sqlx::query_as(
            r"
            SELECT id, receiver_id, giver_id, message, CAST(timestamp AS TEXT)
            FROM kudos_log
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(KudosRecord::from).collect())
    }
}
