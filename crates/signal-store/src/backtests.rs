use chrono::{DateTime, Utc};
use tracker_core::{BacktestStatus, ConsensusBacktestRecord, Result};
use uuid::Uuid;

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct BacktestRow {
    id: Uuid,
    rule_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    tickers: Option<String>,
    total_consensus_found: i32,
    profitable_count: i32,
    loss_count: i32,
    win_rate: f64,
    avg_profit_pct: f64,
    avg_loss_pct: f64,
    max_profit_pct: f64,
    max_loss_pct: f64,
    total_return_pct: f64,
    total_profit_abs: f64,
    results_by_ticker: Option<serde_json::Value>,
    consensus_details: Option<serde_json::Value>,
    execution_time_seconds: f64,
    status: String,
}

impl BacktestRow {
    fn into_record(self) -> Result<ConsensusBacktestRecord> {
        Ok(ConsensusBacktestRecord {
            id: self.id,
            rule_id: self.rule_id,
            start_date: self.start_date,
            end_date: self.end_date,
            tickers: self.tickers,
            total_consensus_found: self.total_consensus_found,
            profitable_count: self.profitable_count,
            loss_count: self.loss_count,
            win_rate: self.win_rate,
            avg_profit_pct: self.avg_profit_pct,
            avg_loss_pct: self.avg_loss_pct,
            max_profit_pct: self.max_profit_pct,
            max_loss_pct: self.max_loss_pct,
            total_return_pct: self.total_return_pct,
            total_profit_abs: self.total_profit_abs,
            results_by_ticker: self.results_by_ticker.unwrap_or(serde_json::Value::Null),
            consensus_details: self.consensus_details.unwrap_or(serde_json::Value::Null),
            execution_time_seconds: self.execution_time_seconds,
            status: self.status.parse::<BacktestStatus>()?,
        })
    }
}

impl SignalStore {
    pub async fn save_consensus_backtest(
        &self,
        record: &ConsensusBacktestRecord,
    ) -> Result<Uuid> {
        sqlx::query(
            "INSERT INTO consensus_backtests (
                id, rule_id, start_date, end_date, tickers,
                total_consensus_found, profitable_count, loss_count,
                win_rate, avg_profit_pct, avg_loss_pct, max_profit_pct,
                max_loss_pct, total_return_pct, total_profit_abs,
                results_by_ticker, consensus_details, execution_time_seconds, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                      $16, $17, $18, $19)",
        )
        .bind(record.id)
        .bind(record.rule_id)
        .bind(record.start_date)
        .bind(record.end_date)
        .bind(record.tickers.as_deref())
        .bind(record.total_consensus_found)
        .bind(record.profitable_count)
        .bind(record.loss_count)
        .bind(record.win_rate)
        .bind(record.avg_profit_pct)
        .bind(record.avg_loss_pct)
        .bind(record.max_profit_pct)
        .bind(record.max_loss_pct)
        .bind(record.total_return_pct)
        .bind(record.total_profit_abs)
        .bind(&record.results_by_ticker)
        .bind(&record.consensus_details)
        .bind(record.execution_time_seconds)
        .bind(record.status.as_str())
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(record.id)
    }

    pub async fn get_consensus_backtest(
        &self,
        id: Uuid,
    ) -> Result<Option<ConsensusBacktestRecord>> {
        let row = sqlx::query_as::<_, BacktestRow>(
            "SELECT id, rule_id, start_date, end_date, tickers,
                    total_consensus_found, profitable_count, loss_count,
                    win_rate, avg_profit_pct, avg_loss_pct, max_profit_pct,
                    max_loss_pct, total_return_pct, total_profit_abs,
                    results_by_ticker, consensus_details, execution_time_seconds, status
             FROM consensus_backtests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        row.map(BacktestRow::into_record).transpose()
    }
}
