use tracker_core::{Candle, Direction, ExitReason};

use crate::models::{BacktestParams, ReplayEvent, TradeRecord};

/// Simulate one trade for a consensus event, walking the candles inside the
/// holding horizon.
///
/// `entry_candle` is the first hourly bar at or after the event;
/// `walk` holds the bars strictly after it up to the horizon, in order;
/// `fallback` is the latest bar beyond the horizon, consulted only when
/// `walk` is empty. Returns `None` when the trade cannot be sized or no
/// exit bar exists at all.
///
/// Within a single bar take-profit is checked before stop-loss. High-low
/// ordering inside a bar is unknowable from OHLC data, and TP-first favors
/// the strategy on volatile bars; results read as optimistic bounds there.
pub fn simulate_trade(
    event: &ReplayEvent,
    entry_candle: &Candle,
    walk: &[Candle],
    fallback: Option<&Candle>,
    params: &BacktestParams,
    capital: f64,
) -> Option<TradeRecord> {
    let entry_price = entry_candle.close;
    if entry_price <= 0.0 {
        return None;
    }

    let position_value = capital * (params.position_size_pct / 100.0);
    let shares = (position_value / entry_price).floor() as i64;
    if shares <= 0 {
        tracing::debug!(
            ticker = %event.ticker,
            capital,
            entry_price,
            "Position too small to open"
        );
        return None;
    }

    let is_long = event.direction == Direction::Long;
    let (take_profit_price, stop_loss_price) = if is_long {
        (
            entry_price * (1.0 + params.take_profit_pct / 100.0),
            entry_price * (1.0 - params.stop_loss_pct / 100.0),
        )
    } else {
        (
            entry_price * (1.0 - params.take_profit_pct / 100.0),
            entry_price * (1.0 + params.stop_loss_pct / 100.0),
        )
    };

    let mut exit_reason = ExitReason::Timeout;
    let mut exit_price = entry_price;
    let mut exit_time = entry_candle.time;

    if walk.is_empty() {
        // No bars inside the horizon; settle on the latest later bar or
        // skip the trade when the history simply ends here.
        match fallback {
            Some(last) => {
                exit_price = last.close;
                exit_time = last.time;
            }
            None => {
                tracing::warn!(
                    ticker = %event.ticker,
                    after = %entry_candle.time,
                    "No candles after entry, skipping trade"
                );
                return None;
            }
        }
    } else {
        for candle in walk {
            if is_long {
                if candle.high >= take_profit_price {
                    exit_price = take_profit_price;
                    exit_reason = ExitReason::TakeProfit;
                    exit_time = candle.time;
                    break;
                }
                if candle.low <= stop_loss_price {
                    exit_price = stop_loss_price;
                    exit_reason = ExitReason::StopLoss;
                    exit_time = candle.time;
                    break;
                }
            } else {
                if candle.low <= take_profit_price {
                    exit_price = take_profit_price;
                    exit_reason = ExitReason::TakeProfit;
                    exit_time = candle.time;
                    break;
                }
                if candle.high >= stop_loss_price {
                    exit_price = stop_loss_price;
                    exit_reason = ExitReason::StopLoss;
                    exit_time = candle.time;
                    break;
                }
            }

            // Carry the close while no stop fires
            exit_price = candle.close;
            exit_time = candle.time;
        }
    }

    let pnl_pct = if is_long {
        (exit_price - entry_price) / entry_price * 100.0
    } else {
        (entry_price - exit_price) / entry_price * 100.0
    };
    let profit_abs = shares as f64 * entry_price * (pnl_pct / 100.0);

    Some(TradeRecord {
        ticker: event.ticker.clone(),
        direction: event.direction,
        entry_time: event.timestamp,
        exit_time,
        entry_price,
        exit_price,
        shares,
        position_value: shares as f64 * entry_price,
        pnl_pct,
        profit_abs,
        exit_reason,
        traders_count: event.traders_count,
        capital_after: 0.0,
    })
}
