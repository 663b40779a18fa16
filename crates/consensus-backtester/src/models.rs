use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracker_core::{Direction, ExitReason, Result, TrackerError};
use uuid::Uuid;

/// Inputs to one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestParams {
    pub rule_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Narrowed to the rule's ticker filter when unset.
    #[serde(default)]
    pub tickers: Option<Vec<String>>,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub holding_hours: i64,
    pub initial_capital: f64,
    pub position_size_pct: f64,
}

impl BacktestParams {
    pub fn new(rule_id: i64, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            rule_id,
            start_date,
            end_date,
            tickers: None,
            take_profit_pct: 5.0,
            stop_loss_pct: 3.0,
            holding_hours: 24,
            initial_capital: 100_000.0,
            position_size_pct: 10.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rule_id <= 0 {
            return Err(TrackerError::Validation(format!(
                "Invalid rule_id: {}",
                self.rule_id
            )));
        }
        if self.start_date >= self.end_date {
            return Err(TrackerError::Validation(format!(
                "start_date ({}) must be before end_date ({})",
                self.start_date, self.end_date
            )));
        }
        if !(0.0..=100.0).contains(&self.take_profit_pct) || self.take_profit_pct == 0.0 {
            return Err(TrackerError::Validation(format!(
                "Invalid take_profit_pct: {}",
                self.take_profit_pct
            )));
        }
        if !(0.0..=100.0).contains(&self.stop_loss_pct) || self.stop_loss_pct == 0.0 {
            return Err(TrackerError::Validation(format!(
                "Invalid stop_loss_pct: {}",
                self.stop_loss_pct
            )));
        }
        if self.holding_hours <= 0 {
            return Err(TrackerError::Validation(format!(
                "Invalid holding_hours: {}",
                self.holding_hours
            )));
        }
        if self.initial_capital <= 0.0 {
            return Err(TrackerError::Validation(format!(
                "Invalid initial_capital: {}",
                self.initial_capital
            )));
        }
        if !(0.0..=100.0).contains(&self.position_size_pct) || self.position_size_pct == 0.0 {
            return Err(TrackerError::Validation(format!(
                "Invalid position_size_pct: {}",
                self.position_size_pct
            )));
        }
        Ok(())
    }
}

/// One consensus detected during replay, before simulation.
#[derive(Debug, Clone)]
pub struct ReplayEvent {
    pub ticker: String,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub traders_count: i32,
    pub avg_price: Option<f64>,
    pub signal_ids: Vec<Uuid>,
}

/// One simulated round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: i64,
    pub position_value: f64,
    pub pnl_pct: f64,
    pub profit_abs: f64,
    pub exit_reason: ExitReason,
    pub traders_count: i32,
    /// Running capital after this trade settles.
    pub capital_after: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerStats {
    pub count: usize,
    pub profitable: usize,
    pub total_pnl_pct: f64,
    pub total_profit_abs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestStatistics {
    pub profitable_count: usize,
    pub loss_count: usize,
    pub win_rate: f64,
    pub avg_profit_pct: f64,
    pub avg_loss_pct: f64,
    pub max_profit_pct: f64,
    pub max_loss_pct: f64,
    pub total_return_pct: f64,
    pub total_profit_abs: f64,
    pub by_ticker: HashMap<String, TickerStats>,
}

/// Full in-memory result of a run; the persisted record is derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub backtest_id: Uuid,
    pub stats: BacktestStatistics,
    pub trades: Vec<TradeRecord>,
    pub total_consensus_found: usize,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub execution_time_seconds: f64,
}
