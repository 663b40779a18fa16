use chrono::{DateTime, Utc};
use serde::Serialize;
use tracker_core::{ConsensusEvent, ConsensusSignal, Result, TrackerError};
use uuid::Uuid;

use crate::db::{map_db_err, SignalStore};

/// Aggregate view over detected events. The aggregate filters mirror the row
/// filters exactly.
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusStatsReport {
    pub total: i64,
    pub active: i64,
    pub closed: i64,
    pub expired: i64,
    pub avg_strength: f64,
    pub period_days: i64,
    pub ticker: Option<String>,
}

impl SignalStore {
    /// Whether a signal already belongs to any consensus event. The detector
    /// checks this before evaluating a window.
    pub async fn consensus_signal_exists(&self, signal_id: Uuid) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM consensus_signals WHERE signal_id = $1)",
        )
        .bind(signal_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(exists)
    }

    /// Persist an event together with its membership rows in one
    /// transaction, so two concurrent detections cannot both absorb the same
    /// signal. The `(consensus_id, signal_id)` primary key is the second
    /// line of defense.
    pub async fn save_consensus_event(
        &self,
        event: &ConsensusEvent,
        members: &[ConsensusSignal],
    ) -> Result<Uuid> {
        let metadata = serde_json::to_value(&event.metadata)
            .map_err(|e| TrackerError::Validation(e.to_string()))?;

        let mut tx = self.pool().begin().await.map_err(map_db_err)?;

        sqlx::query(
            "INSERT INTO consensus_events (
                id, ticker, direction, traders_count, window_minutes, rule_id,
                first_signal_at, last_signal_at, detected_at,
                avg_entry_price, min_entry_price, max_entry_price,
                price_spread_pct, consensus_strength, status, consensus_metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(event.id)
        .bind(&event.ticker)
        .bind(event.direction.as_str())
        .bind(event.traders_count)
        .bind(event.window_minutes)
        .bind(event.rule_id)
        .bind(event.first_signal_at)
        .bind(event.last_signal_at)
        .bind(event.detected_at)
        .bind(event.avg_entry_price)
        .bind(event.min_entry_price)
        .bind(event.max_entry_price)
        .bind(event.price_spread_pct)
        .bind(event.consensus_strength)
        .bind(event.status.as_str())
        .bind(metadata)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        for member in members {
            sqlx::query(
                "INSERT INTO consensus_signals (consensus_id, signal_id, is_initiator)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (consensus_id, signal_id) DO NOTHING",
            )
            .bind(member.consensus_id)
            .bind(member.signal_id)
            .bind(member.is_initiator)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;

        tracing::info!(
            consensus_id = %event.id,
            ticker = %event.ticker,
            direction = %event.direction,
            traders = event.traders_count,
            strength = event.consensus_strength,
            "Consensus event saved"
        );
        Ok(event.id)
    }

    /// Event statistics over a lookback period. One query; the `FILTER`
    /// aggregates apply the same predicate as the row count.
    pub async fn consensus_stats(
        &self,
        ticker: Option<&str>,
        days_back: i64,
    ) -> Result<ConsensusStatsReport> {
        let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::days(days_back);

        let row: (i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'active'),
                    COUNT(*) FILTER (WHERE status = 'closed'),
                    COUNT(*) FILTER (WHERE status = 'expired'),
                    AVG(consensus_strength::float8)
             FROM consensus_events
             WHERE ($1::text IS NULL OR ticker = $1)
               AND detected_at >= $2",
        )
        .bind(ticker)
        .bind(cutoff)
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(ConsensusStatsReport {
            total: row.0,
            active: row.1,
            closed: row.2,
            expired: row.3,
            avg_strength: row.4.unwrap_or(0.0),
            period_days: days_back,
            ticker: ticker.map(str::to_string),
        })
    }
}
