use chrono::{DateTime, Utc};
use signal_store::SignalStore;
use technical_analysis::{signals_from_frame, IndicatorFrame};
use tracker_core::{Candle, CandleInterval, IndicatorConditions, Result};

/// Below this many candles the indicator gate is skipped entirely and the
/// predicate passes: indicator gating is opt-out when data is absent.
pub const MIN_CANDLES_FOR_GATE: usize = 30;

/// How much hourly history the gate loads at most.
const GATE_CANDLE_LIMIT: i64 = 100;

/// Pure predicate evaluation over a candle history ending at the trigger
/// time. All enabled conditions must hold (logical AND); a condition whose
/// indicator cannot be computed passes.
pub fn evaluate_conditions(candles: &[Candle], conditions: &IndicatorConditions) -> bool {
    if conditions.is_empty() {
        return true;
    }
    if candles.len() < MIN_CANDLES_FOR_GATE {
        tracing::debug!(
            candles = candles.len(),
            "Not enough candles for indicator gate, passing"
        );
        return true;
    }

    let Ok(frame) = IndicatorFrame::compute(candles) else {
        return true;
    };
    let signals = signals_from_frame(&frame);

    if let Some(rsi) = conditions.rsi.as_ref().filter(|c| c.enabled) {
        if let Some(value) = frame.latest_rsi() {
            if rsi.min.is_some_and(|min| value < min) {
                tracing::debug!(rsi = value, min = ?rsi.min, "RSI below bound");
                return false;
            }
            if rsi.max.is_some_and(|max| value > max) {
                tracing::debug!(rsi = value, max = ?rsi.max, "RSI above bound");
                return false;
            }
        }
    }

    if let Some(expected) = enabled_signal(&conditions.macd) {
        if let Some(actual) = signals.macd {
            if actual.as_str() != expected {
                tracing::debug!(actual = actual.as_str(), expected, "MACD signal mismatch");
                return false;
            }
        }
    }

    if let Some(expected) = enabled_signal(&conditions.bollinger) {
        if let Some(actual) = signals.bollinger {
            if actual.as_str() != expected {
                tracing::debug!(
                    actual = actual.as_str(),
                    expected,
                    "Bollinger signal mismatch"
                );
                return false;
            }
        }
    }

    if let Some(expected) = enabled_signal(&conditions.obv) {
        if let Some(actual) = signals.obv {
            if actual.as_str() != expected {
                tracing::debug!(actual = actual.as_str(), expected, "OBV signal mismatch");
                return false;
            }
        }
    }

    true
}

fn enabled_signal(condition: &Option<tracker_core::SignalCondition>) -> Option<&str> {
    condition
        .as_ref()
        .filter(|c| c.enabled)
        .and_then(|c| c.signal.as_deref())
}

/// Load hourly candles for the ticker ending at the trigger time and apply
/// [`evaluate_conditions`]. An unknown instrument means no candle history,
/// which passes like any other insufficient-data case.
pub async fn indicator_conditions_met(
    db: &SignalStore,
    ticker: &str,
    at: DateTime<Utc>,
    conditions: &IndicatorConditions,
) -> Result<bool> {
    if conditions.is_empty() {
        return Ok(true);
    }

    let Some(figi) = db.figi_for_ticker(ticker).await? else {
        tracing::debug!(ticker, "No instrument mapping, skipping indicator gate");
        return Ok(true);
    };

    let candles = db
        .candles_ending_at(&figi, CandleInterval::Hour, at, GATE_CANDLE_LIMIT)
        .await?;

    Ok(evaluate_conditions(&candles, conditions))
}
