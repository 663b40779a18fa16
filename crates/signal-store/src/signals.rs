use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracker_core::{Direction, ParsedSignal, Result, SignalDraft, SignalType};
use uuid::Uuid;

use crate::db::{map_db_err, SignalStore};

/// Filterable signal listing, the read surface admin and API collaborators
/// consume. Unset fields do not constrain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalQuery {
    pub ticker: Option<String>,
    pub trader_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub direction: Option<Direction>,
    pub signal_type: Option<SignalType>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub min_confidence: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct SignalRow {
    id: Uuid,
    raw_message_id: Option<i64>,
    timestamp: DateTime<Utc>,
    channel_id: i64,
    trader_id: Option<i64>,
    author: Option<String>,
    ticker: String,
    figi: Option<String>,
    direction: String,
    signal_type: String,
    target_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    confidence_score: f64,
    parser_version: String,
    original_text: String,
    extracted_data: Option<serde_json::Value>,
}

impl SignalRow {
    pub(crate) fn into_signal(self) -> Result<ParsedSignal> {
        Ok(ParsedSignal {
            id: self.id,
            raw_message_id: self.raw_message_id,
            timestamp: self.timestamp,
            channel_id: self.channel_id,
            trader_id: self.trader_id,
            author: self.author,
            ticker: self.ticker,
            figi: self.figi,
            direction: self.direction.parse::<Direction>()?,
            signal_type: self.signal_type.parse::<SignalType>()?,
            target_price: self.target_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            confidence_score: self.confidence_score,
            parser_version: self.parser_version,
            original_text: self.original_text,
            extracted_data: self.extracted_data,
        })
    }
}

const SIGNAL_COLUMNS: &str = "id, raw_message_id, timestamp, channel_id, trader_id, author, \
                              ticker, figi, direction, signal_type, target_price, stop_loss, \
                              take_profit, confidence_score, parser_version, original_text, \
                              extracted_data";

impl SignalStore {
    /// Persist a parsed signal, resolving the trader association: active
    /// trader by exact author name first, then by channel.
    pub async fn save_signal(&self, draft: &SignalDraft) -> Result<Uuid> {
        let mut trader_id: Option<i64> = None;

        if let Some(author) = draft.author.as_deref() {
            trader_id = sqlx::query_as::<_, (i64,)>(
                "SELECT id FROM traders WHERE name = $1 AND is_active = TRUE",
            )
            .bind(author)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?
            .map(|(id,)| id);
        }

        if trader_id.is_none() {
            trader_id = sqlx::query_as::<_, (i64,)>(
                "SELECT id FROM traders WHERE channel_id = $1 AND is_active = TRUE",
            )
            .bind(draft.channel_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_db_err)?
            .map(|(id,)| id);
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO parsed_signals (
                id, raw_message_id, timestamp, channel_id, trader_id, author,
                ticker, direction, signal_type, target_price, stop_loss,
                take_profit, confidence_score, parser_version, original_text,
                extracted_data
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(id)
        .bind(draft.raw_message_id)
        .bind(draft.timestamp)
        .bind(draft.channel_id)
        .bind(trader_id)
        .bind(draft.author.as_deref())
        .bind(&draft.ticker)
        .bind(draft.direction.as_str())
        .bind(draft.signal_type.as_str())
        .bind(draft.target_price)
        .bind(draft.stop_loss)
        .bind(draft.take_profit)
        .bind(draft.confidence_score)
        .bind(&draft.parser_version)
        .bind(&draft.original_text)
        .bind(draft.extracted_data.as_ref())
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;

        tracing::debug!(signal_id = %id, trader_id = ?trader_id, ticker = %draft.ticker, "Signal saved");
        Ok(id)
    }

    pub async fn get_signal(&self, id: Uuid) -> Result<Option<ParsedSignal>> {
        let row = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM parsed_signals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        row.map(SignalRow::into_signal).transpose()
    }

    /// Entry signals on one ticker inside a closed time window, in
    /// chronological order. This is the detector's window query.
    pub async fn signals_in_window(
        &self,
        ticker: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ParsedSignal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM parsed_signals
             WHERE ticker = $1
               AND signal_type = 'entry'
               AND timestamp >= $2
               AND timestamp <= $3
             ORDER BY timestamp",
        ))
        .bind(ticker)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    /// Entry signals over a period, optionally narrowed to a ticker set, in
    /// chronological order. This is the backtester's replay query.
    pub async fn entry_signals_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tickers: Option<&[String]>,
    ) -> Result<Vec<ParsedSignal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM parsed_signals
             WHERE signal_type = 'entry'
               AND timestamp >= $1
               AND timestamp <= $2
               AND ($3::text[] IS NULL OR ticker = ANY($3))
             ORDER BY timestamp",
        ))
        .bind(start)
        .bind(end)
        .bind(tickers)
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    /// Filtered signal listing, newest first.
    pub async fn get_signals(&self, query: &SignalQuery) -> Result<Vec<ParsedSignal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM parsed_signals
             WHERE ($1::text IS NULL OR ticker = $1)
               AND ($2::bigint IS NULL OR trader_id = $2)
               AND ($3::bigint IS NULL OR channel_id = $3)
               AND ($4::text IS NULL OR direction = $4)
               AND ($5::text IS NULL OR signal_type = $5)
               AND ($6::timestamptz IS NULL OR timestamp >= $6)
               AND ($7::timestamptz IS NULL OR timestamp <= $7)
               AND ($8::float8 IS NULL OR confidence_score >= $8)
             ORDER BY timestamp DESC
             LIMIT $9 OFFSET $10",
        ))
        .bind(query.ticker.as_deref())
        .bind(query.trader_id)
        .bind(query.channel_id)
        .bind(query.direction.map(|d| d.as_str()))
        .bind(query.signal_type.map(|t| t.as_str()))
        .bind(query.from_date)
        .bind(query.to_date)
        .bind(query.min_confidence)
        .bind(query.limit.unwrap_or(100))
        .bind(query.offset.unwrap_or(0))
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(SignalRow::into_signal).collect()
    }

    /// Delete every parsed signal. Only used by the forced full reparse.
    pub async fn delete_all_signals(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM parsed_signals")
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all_signal_results(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM signal_results")
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected())
    }

}
