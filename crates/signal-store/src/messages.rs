use chrono::{DateTime, Utc};
use tracker_core::{RawMessage, Result};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct RawMessageRow {
    id: i64,
    channel_id: i64,
    message_id: i64,
    timestamp: DateTime<Utc>,
    text: String,
    author_username: Option<String>,
    is_processed: bool,
    parse_success: Option<bool>,
}

impl RawMessageRow {
    fn into_message(self) -> RawMessage {
        RawMessage {
            id: self.id,
            channel_id: self.channel_id,
            message_id: self.message_id,
            timestamp: self.timestamp,
            text: self.text,
            author: self.author_username,
            is_processed: self.is_processed,
            parse_success: self.parse_success,
        }
    }
}

impl SignalStore {
    /// Upsert a raw message from the scraper. A replay of the same
    /// `(channel_id, message_id)` with changed text replaces the text and
    /// re-queues the message for parsing; unchanged replays are no-ops.
    pub async fn save_raw_message(
        &self,
        channel_id: i64,
        message_id: i64,
        timestamp: DateTime<Utc>,
        text: &str,
        author: Option<&str>,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO raw_messages (channel_id, message_id, timestamp, text, author_username)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (channel_id, message_id) DO UPDATE SET
                 text = EXCLUDED.text,
                 is_processed = CASE
                     WHEN raw_messages.text IS DISTINCT FROM EXCLUDED.text THEN FALSE
                     ELSE raw_messages.is_processed
                 END,
                 parse_success = CASE
                     WHEN raw_messages.text IS DISTINCT FROM EXCLUDED.text THEN NULL
                     ELSE raw_messages.parse_success
                 END
             RETURNING id",
        )
        .bind(channel_id)
        .bind(message_id)
        .bind(timestamp)
        .bind(text)
        .bind(author)
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(id)
    }

    /// Messages not yet seen by the parsing service, newest first.
    pub async fn get_unparsed_messages(&self, limit: i64) -> Result<Vec<RawMessage>> {
        let rows = sqlx::query_as::<_, RawMessageRow>(
            "SELECT id, channel_id, message_id, timestamp, text, author_username,
                    is_processed, parse_success
             FROM raw_messages
             WHERE is_processed = FALSE
             ORDER BY timestamp DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(RawMessageRow::into_message).collect())
    }

    pub async fn unparsed_count(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM raw_messages WHERE is_processed = FALSE")
                .fetch_one(self.pool())
                .await
                .map_err(map_db_err)?;
        Ok(count)
    }

    pub async fn mark_message_processed(&self, id: i64, success: bool) -> Result<()> {
        sqlx::query(
            "UPDATE raw_messages SET is_processed = TRUE, parse_success = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(success)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    /// Clear processing flags on every message so a full reparse can run.
    pub async fn reset_message_processed(&self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE raw_messages SET is_processed = FALSE, parse_success = NULL")
                .execute(self.pool())
                .await
                .map_err(map_db_err)?;
        Ok(result.rows_affected())
    }
}
