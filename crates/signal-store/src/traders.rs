use tracker_core::{Result, Trader};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct TraderRow {
    id: i64,
    name: String,
    channel_id: Option<i64>,
    is_active: bool,
}

impl TraderRow {
    fn into_trader(self) -> Trader {
        Trader {
            id: self.id,
            name: self.name,
            channel_id: self.channel_id,
            is_active: self.is_active,
        }
    }
}

impl SignalStore {
    /// Create a trader profile; re-creating an existing name re-activates it
    /// and updates the channel association.
    pub async fn create_trader(&self, name: &str, channel_id: Option<i64>) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO traders (name, channel_id, is_active)
             VALUES ($1, $2, TRUE)
             ON CONFLICT (name) DO UPDATE SET
                 channel_id = EXCLUDED.channel_id,
                 is_active = TRUE
             RETURNING id",
        )
        .bind(name)
        .bind(channel_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(id)
    }

    pub async fn get_trader(&self, id: i64) -> Result<Option<Trader>> {
        let row = sqlx::query_as::<_, TraderRow>(
            "SELECT id, name, channel_id, is_active FROM traders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(TraderRow::into_trader))
    }

    pub async fn get_traders(&self, active_only: bool) -> Result<Vec<Trader>> {
        let rows = sqlx::query_as::<_, TraderRow>(
            "SELECT id, name, channel_id, is_active FROM traders
             WHERE ($1 = FALSE OR is_active = TRUE)
             ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(TraderRow::into_trader).collect())
    }

    pub async fn set_trader_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE traders SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}
