use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracker_core::{Candle, CandleInterval, Result};

use crate::db::{map_db_err, SignalStore};

const CANDLE_BATCH_SIZE: usize = 500;

#[derive(sqlx::FromRow)]
struct CandleRow {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl CandleRow {
    fn into_candle(self) -> Candle {
        Candle {
            time: self.time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Outcome of a batch candle write.
#[derive(Debug, Clone, Serialize)]
pub struct CandleSaveReport {
    pub saved: usize,
    pub errors: usize,
}

impl SignalStore {
    /// Batch-upsert candles for one instrument/interval. Bars failing the
    /// OHLC invariant count as errors and are skipped; in-batch duplicates on
    /// `time` keep the first occurrence; the database upsert handles
    /// collisions with already-stored rows.
    pub async fn save_candles(
        &self,
        figi: &str,
        interval: CandleInterval,
        candles: &[Candle],
    ) -> Result<CandleSaveReport> {
        if candles.is_empty() {
            tracing::warn!(figi, "save_candles called with empty data");
            return Ok(CandleSaveReport { saved: 0, errors: 0 });
        }

        let mut seen_times: HashSet<DateTime<Utc>> = HashSet::new();
        let mut valid: Vec<&Candle> = Vec::with_capacity(candles.len());
        let mut errors = 0usize;

        for candle in candles {
            if !candle.is_valid() {
                tracing::warn!(figi, time = %candle.time, "Skipping candle with invalid OHLC");
                errors += 1;
                continue;
            }
            if !seen_times.insert(candle.time) {
                tracing::debug!(figi, time = %candle.time, "Skipping duplicate candle");
                continue;
            }
            valid.push(candle);
        }

        let mut saved = 0usize;
        for batch in valid.chunks(CANDLE_BATCH_SIZE) {
            let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
                "INSERT INTO candles (instrument_id, interval, time, open, high, low, close, volume) ",
            );
            builder.push_values(batch, |mut row, candle| {
                row.push_bind(figi)
                    .push_bind(interval.as_str())
                    .push_bind(candle.time)
                    .push_bind(candle.open)
                    .push_bind(candle.high)
                    .push_bind(candle.low)
                    .push_bind(candle.close)
                    .push_bind(candle.volume);
            });
            builder.push(
                " ON CONFLICT (instrument_id, interval, time) DO UPDATE SET
                     open = EXCLUDED.open,
                     high = EXCLUDED.high,
                     low = EXCLUDED.low,
                     close = EXCLUDED.close,
                     volume = EXCLUDED.volume",
            );

            builder
                .build()
                .execute(self.pool())
                .await
                .map_err(map_db_err)?;
            saved += batch.len();
        }

        tracing::info!(figi, saved, errors, "Candle batch saved");
        Ok(CandleSaveReport { saved, errors })
    }

    /// Candles in an optional closed range, ascending by time.
    pub async fn get_candles(
        &self,
        figi: &str,
        interval: CandleInterval,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument_id = $1
               AND interval = $2
               AND ($3::timestamptz IS NULL OR time >= $3)
               AND ($4::timestamptz IS NULL OR time <= $4)
             ORDER BY time
             LIMIT $5",
        )
        .bind(figi)
        .bind(interval.as_str())
        .bind(from)
        .bind(to)
        .bind(limit.unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(CandleRow::into_candle).collect())
    }

    /// The most recent `limit` candles at or before `until`, returned in
    /// ascending order ready for indicator computation.
    pub async fn candles_ending_at(
        &self,
        figi: &str,
        interval: CandleInterval,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument_id = $1 AND interval = $2 AND time <= $3
             ORDER BY time DESC
             LIMIT $4",
        )
        .bind(figi)
        .bind(interval.as_str())
        .bind(until)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        let mut candles: Vec<Candle> = rows.into_iter().map(CandleRow::into_candle).collect();
        candles.reverse();
        Ok(candles)
    }

    /// Earliest candle with `time >= at`; the backtester's entry bar.
    pub async fn first_candle_at_or_after(
        &self,
        figi: &str,
        interval: CandleInterval,
        at: DateTime<Utc>,
    ) -> Result<Option<Candle>> {
        let row = sqlx::query_as::<_, CandleRow>(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument_id = $1 AND interval = $2 AND time >= $3
             ORDER BY time
             LIMIT 1",
        )
        .bind(figi)
        .bind(interval.as_str())
        .bind(at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(CandleRow::into_candle))
    }

    /// Candles strictly after `after` and at or before `until`, ascending;
    /// the backtester's holding-period walk.
    pub async fn candles_between(
        &self,
        figi: &str,
        interval: CandleInterval,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let rows = sqlx::query_as::<_, CandleRow>(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument_id = $1 AND interval = $2 AND time > $3 AND time <= $4
             ORDER BY time",
        )
        .bind(figi)
        .bind(interval.as_str())
        .bind(after)
        .bind(until)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(rows.into_iter().map(CandleRow::into_candle).collect())
    }

    /// Latest candle strictly after `after`; the timeout fallback when no
    /// bars exist inside the holding horizon.
    pub async fn last_candle_after(
        &self,
        figi: &str,
        interval: CandleInterval,
        after: DateTime<Utc>,
    ) -> Result<Option<Candle>> {
        let row = sqlx::query_as::<_, CandleRow>(
            "SELECT time, open, high, low, close, volume FROM candles
             WHERE instrument_id = $1 AND interval = $2 AND time > $3
             ORDER BY time DESC
             LIMIT 1",
        )
        .bind(figi)
        .bind(interval.as_str())
        .bind(after)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(CandleRow::into_candle))
    }
}
