use tracker_core::{Channel, Result};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct ChannelRow {
    channel_id: i64,
    name: String,
    username: Option<String>,
    is_enabled: bool,
    messages_count: i64,
    last_message_id: Option<i64>,
}

impl ChannelRow {
    fn into_channel(self) -> Channel {
        Channel {
            channel_id: self.channel_id,
            name: self.name,
            username: self.username,
            is_enabled: self.is_enabled,
            messages_count: self.messages_count,
            last_message_id: self.last_message_id,
        }
    }
}

impl SignalStore {
    pub async fn get_channels(&self, enabled_only: bool) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT channel_id, name, username, is_enabled, messages_count, last_message_id
             FROM channels
             WHERE ($1 = FALSE OR is_enabled = TRUE)
             ORDER BY name",
        )
        .bind(enabled_only)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(ChannelRow::into_channel).collect())
    }

    pub async fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT channel_id, name, username, is_enabled, messages_count, last_message_id
             FROM channels WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(ChannelRow::into_channel))
    }

    /// Register a channel for scraping; re-registering updates the name and
    /// username without touching counters.
    pub async fn create_channel(
        &self,
        channel_id: i64,
        name: &str,
        username: Option<&str>,
        is_enabled: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO channels (channel_id, name, username, is_enabled)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (channel_id) DO UPDATE SET
                 name = EXCLUDED.name,
                 username = EXCLUDED.username,
                 is_enabled = EXCLUDED.is_enabled",
        )
        .bind(channel_id)
        .bind(name)
        .bind(username)
        .bind(is_enabled)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    pub async fn set_channel_enabled(&self, channel_id: i64, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE channels SET is_enabled = $2 WHERE channel_id = $1")
            .bind(channel_id)
            .bind(enabled)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump the scraped-message counter and high-water mark after a scrape
    /// pass.
    pub async fn record_channel_progress(
        &self,
        channel_id: i64,
        new_messages: i64,
        last_message_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE channels SET
                 messages_count = messages_count + $2,
                 last_message_id = GREATEST(COALESCE(last_message_id, 0), $3)
             WHERE channel_id = $1",
        )
        .bind(channel_id)
        .bind(new_messages)
        .bind(last_message_id)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }
}
