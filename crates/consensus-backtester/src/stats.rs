use std::collections::HashMap;

use crate::models::{BacktestStatistics, TickerStats, TradeRecord};

/// Aggregate per-trade results. A trade with zero P&L counts as a loss, so
/// wins are strictly positive.
pub fn calculate_statistics(trades: &[TradeRecord], initial_capital: f64) -> BacktestStatistics {
    if trades.is_empty() {
        return BacktestStatistics::default();
    }

    let profits: Vec<&TradeRecord> = trades.iter().filter(|t| t.pnl_pct > 0.0).collect();
    let losses: Vec<&TradeRecord> = trades.iter().filter(|t| t.pnl_pct <= 0.0).collect();

    let win_rate = profits.len() as f64 / trades.len() as f64 * 100.0;

    let avg_profit_pct = if profits.is_empty() {
        0.0
    } else {
        profits.iter().map(|t| t.pnl_pct).sum::<f64>() / profits.len() as f64
    };
    let avg_loss_pct = if losses.is_empty() {
        0.0
    } else {
        losses.iter().map(|t| t.pnl_pct).sum::<f64>() / losses.len() as f64
    };

    let max_profit_pct = trades.iter().map(|t| t.pnl_pct).fold(0.0, f64::max);
    let max_loss_pct = trades.iter().map(|t| t.pnl_pct).fold(0.0, f64::min);

    let total_profit_abs: f64 = trades.iter().map(|t| t.profit_abs).sum();
    let total_return_pct = if initial_capital > 0.0 {
        total_profit_abs / initial_capital * 100.0
    } else {
        0.0
    };

    let mut by_ticker: HashMap<String, TickerStats> = HashMap::new();
    for trade in trades {
        let entry = by_ticker.entry(trade.ticker.clone()).or_default();
        entry.count += 1;
        if trade.pnl_pct > 0.0 {
            entry.profitable += 1;
        }
        entry.total_pnl_pct += trade.pnl_pct;
        entry.total_profit_abs += trade.profit_abs;
    }

    BacktestStatistics {
        profitable_count: profits.len(),
        loss_count: losses.len(),
        win_rate,
        avg_profit_pct,
        avg_loss_pct,
        max_profit_pct,
        max_loss_pct,
        total_return_pct,
        total_profit_abs,
        by_ticker,
    }
}
