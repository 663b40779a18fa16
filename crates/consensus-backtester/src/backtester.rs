use std::collections::HashSet;
use std::time::Instant;

use chrono::Duration;
use consensus_detector::gate::indicator_conditions_met;
use consensus_detector::window::{evaluate_window, WindowParams};
use signal_store::SignalStore;
use tracker_core::{
    BacktestStatus, CandleInterval, ConsensusBacktestRecord, Result, TrackerError,
};
use uuid::Uuid;

use crate::models::{BacktestParams, BacktestReport, ReplayEvent, TradeRecord};
use crate::simulate::simulate_trade;
use crate::stats::calculate_statistics;

/// Replays consensus detection over a historical period and simulates one
/// trade per detected event, threading capital sequentially.
#[derive(Clone)]
pub struct ConsensusBacktester {
    db: SignalStore,
}

impl ConsensusBacktester {
    pub fn new(db: SignalStore) -> Self {
        Self { db }
    }

    pub async fn run_backtest(&self, params: &BacktestParams) -> Result<BacktestReport> {
        params.validate()?;
        let started = Instant::now();

        let rule = self
            .db
            .get_rule(params.rule_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("Rule {} not found", params.rule_id)))?;

        tracing::info!(
            rule = %rule.name,
            start = %params.start_date,
            end = %params.end_date,
            "Starting backtest"
        );

        // Narrow to the rule's ticker filter when the caller did not pick
        let tickers: Option<Vec<String>> = params.tickers.clone().or_else(|| {
            let filtered = rule.filter_tickers();
            (!filtered.is_empty()).then_some(filtered)
        });

        let signals = self
            .db
            .entry_signals_between(params.start_date, params.end_date, tickers.as_deref())
            .await?;
        tracing::info!(count = signals.len(), "Found signals in period");

        let window_params = WindowParams {
            window_minutes: rule.window_minutes,
            min_traders: rule.min_traders,
            strict: rule.strict_consensus,
            min_confidence: rule.min_confidence,
        };

        // Replay detection chronologically; signals absorbed into an event
        // are skipped as triggers for later windows.
        let mut processed: HashSet<Uuid> = HashSet::new();
        let mut events: Vec<ReplayEvent> = Vec::new();

        for signal in &signals {
            if processed.contains(&signal.id) {
                continue;
            }

            let (window_start, window_end) = window_params.bounds(signal.timestamp);
            let window_signals = self
                .db
                .signals_in_window(&signal.ticker, window_start, window_end)
                .await?;

            let Some(window) = evaluate_window(signal, &window_signals, &window_params) else {
                continue;
            };

            if let Some(conditions) = rule.indicator_conditions.as_ref() {
                if !indicator_conditions_met(&self.db, &signal.ticker, signal.timestamp, conditions)
                    .await?
                {
                    continue;
                }
            }

            for member in &window.signals {
                processed.insert(member.id);
            }

            let prices: Vec<f64> = window.signals.iter().filter_map(|s| s.target_price).collect();
            let avg_price =
                (!prices.is_empty()).then(|| prices.iter().sum::<f64>() / prices.len() as f64);

            events.push(ReplayEvent {
                ticker: signal.ticker.clone(),
                direction: window.direction,
                timestamp: signal.timestamp,
                traders_count: window.authors.len() as i32,
                avg_price,
                signal_ids: window.signals.iter().map(|s| s.id).collect(),
            });
        }

        tracing::info!(count = events.len(), "Detected consensus events");

        // Simulate trades sequentially, threading capital
        let mut capital = params.initial_capital;
        let mut trades: Vec<TradeRecord> = Vec::new();

        for event in &events {
            if let Some(mut trade) = self.simulate_event(event, params, capital).await? {
                capital += trade.profit_abs;
                trade.capital_after = capital;
                trades.push(trade);
            }
        }

        let stats = calculate_statistics(&trades, params.initial_capital);
        let execution_time_seconds = started.elapsed().as_secs_f64();

        let record = ConsensusBacktestRecord {
            id: Uuid::new_v4(),
            rule_id: params.rule_id,
            start_date: params.start_date,
            end_date: params.end_date,
            tickers: tickers.as_ref().map(|t| t.join(",")),
            total_consensus_found: events.len() as i32,
            profitable_count: stats.profitable_count as i32,
            loss_count: stats.loss_count as i32,
            win_rate: stats.win_rate,
            avg_profit_pct: stats.avg_profit_pct,
            avg_loss_pct: stats.avg_loss_pct,
            max_profit_pct: stats.max_profit_pct,
            max_loss_pct: stats.max_loss_pct,
            total_return_pct: stats.total_return_pct,
            total_profit_abs: stats.total_profit_abs,
            results_by_ticker: serde_json::to_value(&stats.by_ticker)
                .map_err(|e| TrackerError::Validation(e.to_string()))?,
            consensus_details: serde_json::to_value(&trades)
                .map_err(|e| TrackerError::Validation(e.to_string()))?,
            execution_time_seconds,
            status: BacktestStatus::Completed,
        };
        self.db.save_consensus_backtest(&record).await?;

        tracing::info!(
            backtest_id = %record.id,
            wins = stats.profitable_count,
            losses = stats.loss_count,
            win_rate = stats.win_rate,
            final_capital = capital,
            "Backtest completed"
        );

        Ok(BacktestReport {
            backtest_id: record.id,
            stats,
            trades,
            total_consensus_found: events.len(),
            initial_capital: params.initial_capital,
            final_capital: capital,
            execution_time_seconds,
        })
    }

    /// Load the candles one event needs and run the pure simulation.
    async fn simulate_event(
        &self,
        event: &ReplayEvent,
        params: &BacktestParams,
        capital: f64,
    ) -> Result<Option<TradeRecord>> {
        let Some(figi) = self.db.figi_for_ticker(&event.ticker).await? else {
            tracing::debug!(ticker = %event.ticker, "No FIGI found, skipping trade");
            return Ok(None);
        };

        let Some(entry_candle) = self
            .db
            .first_candle_at_or_after(&figi, CandleInterval::Hour, event.timestamp)
            .await?
        else {
            tracing::debug!(ticker = %event.ticker, at = %event.timestamp, "No entry candle");
            return Ok(None);
        };

        let horizon = event.timestamp + Duration::hours(params.holding_hours);
        let walk = self
            .db
            .candles_between(&figi, CandleInterval::Hour, entry_candle.time, horizon)
            .await?;

        let fallback = if walk.is_empty() {
            self.db
                .last_candle_after(&figi, CandleInterval::Hour, entry_candle.time)
                .await?
        } else {
            None
        };

        Ok(simulate_trade(
            event,
            &entry_candle,
            &walk,
            fallback.as_ref(),
            params,
            capital,
        ))
    }

    /// Fetch a persisted backtest by id.
    pub async fn get_backtest_results(&self, id: Uuid) -> Result<Option<ConsensusBacktestRecord>> {
        self.db.get_consensus_backtest(id).await
    }
}
