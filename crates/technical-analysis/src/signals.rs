use serde::{Deserialize, Serialize};
use tracker_core::Candle;

use crate::frame::{IndicatorFrame, OBV_TREND_BARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsiSignal::Overbought => "overbought",
            RsiSignal::Oversold => "oversold",
            RsiSignal::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdSignal {
    BullishCrossover,
    BearishCrossover,
    Bullish,
    Bearish,
}

impl MacdSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacdSignal::BullishCrossover => "bullish_crossover",
            MacdSignal::BearishCrossover => "bearish_crossover",
            MacdSignal::Bullish => "bullish",
            MacdSignal::Bearish => "bearish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BollingerSignal {
    AtUpperBand,
    AtLowerBand,
    WithinBands,
}

impl BollingerSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            BollingerSignal::AtUpperBand => "at_upper_band",
            BollingerSignal::AtLowerBand => "at_lower_band",
            BollingerSignal::WithinBands => "within_bands",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObvSignal {
    Accumulation,
    Distribution,
    Neutral,
}

impl ObvSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObvSignal::Accumulation => "accumulation",
            ObvSignal::Distribution => "distribution",
            ObvSignal::Neutral => "neutral",
        }
    }
}

/// Categorical reading of each indicator at the latest bar. An indicator
/// whose lookback is not met stays `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSignals {
    pub rsi: Option<RsiSignal>,
    pub macd: Option<MacdSignal>,
    pub bollinger: Option<BollingerSignal>,
    pub obv: Option<ObvSignal>,
}

/// Derive the categorical signals from the latest bar of a candle history.
pub fn indicator_signals(candles: &[Candle]) -> IndicatorSignals {
    match IndicatorFrame::compute(candles) {
        Ok(frame) => signals_from_frame(&frame),
        Err(_) => IndicatorSignals::default(),
    }
}

/// Same derivation over an already-computed frame.
pub fn signals_from_frame(frame: &IndicatorFrame) -> IndicatorSignals {
    let mut signals = IndicatorSignals::default();
    let n = frame.len();
    if n < 2 {
        return signals;
    }

    if let Some(value) = frame.latest_rsi() {
        signals.rsi = Some(if value > 70.0 {
            RsiSignal::Overbought
        } else if value < 30.0 {
            RsiSignal::Oversold
        } else {
            RsiSignal::Neutral
        });
    }

    let (macd_prev, macd_now) = (frame.macd[n - 2], frame.macd[n - 1]);
    let (sig_prev, sig_now) = (frame.macd_signal[n - 2], frame.macd_signal[n - 1]);
    signals.macd = Some(if macd_prev <= sig_prev && macd_now > sig_now {
        MacdSignal::BullishCrossover
    } else if macd_prev >= sig_prev && macd_now < sig_now {
        MacdSignal::BearishCrossover
    } else if macd_now > sig_now {
        MacdSignal::Bullish
    } else {
        MacdSignal::Bearish
    });

    if let (Some(upper), Some(lower)) = (frame.bb_upper[n - 1], frame.bb_lower[n - 1]) {
        let close = frame.close[n - 1];
        signals.bollinger = Some(if close >= upper {
            BollingerSignal::AtUpperBand
        } else if close <= lower {
            BollingerSignal::AtLowerBand
        } else {
            BollingerSignal::WithinBands
        });
    }

    if n >= OBV_TREND_BARS {
        let obv_now = frame.obv[n - 1];
        let obv_avg =
            frame.obv[n - OBV_TREND_BARS..].iter().sum::<f64>() / OBV_TREND_BARS as f64;
        signals.obv = Some(if obv_now > obv_avg * 1.05 {
            ObvSignal::Accumulation
        } else if obv_now < obv_avg * 0.95 {
            ObvSignal::Distribution
        } else {
            ObvSignal::Neutral
        });
    }

    signals
}
