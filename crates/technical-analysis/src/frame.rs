use chrono::{DateTime, Utc};
use serde::Serialize;
use tracker_core::{Candle, Result};

use crate::indicators::{bollinger_bands, closes, macd, obv, rsi};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const OBV_TREND_BARS: usize = 10;

/// All indicator columns computed over one candle history, aligned with the
/// input bars. Columns whose lookback exceeds the history are `None` for the
/// leading bars (RSI, Bollinger) or for the whole frame.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorFrame {
    pub time: Vec<DateTime<Utc>>,
    pub close: Vec<f64>,
    pub obv: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub macd_histogram: Vec<f64>,
    pub rsi: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub bb_bandwidth: Vec<Option<f64>>,
    pub bb_percent_b: Vec<Option<f64>>,
}

impl IndicatorFrame {
    /// Compute every column with the default parameters. Needs at least one
    /// bar; short histories leave the longer-lookback columns `None`.
    pub fn compute(candles: &[Candle]) -> Result<IndicatorFrame> {
        let close = closes(candles);
        let n = close.len();

        let obv_values = obv(candles)?;
        let macd_result = macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;

        // RSI values start at bar RSI_PERIOD; pad the warm-up with None.
        let rsi_column = match rsi(&close, RSI_PERIOD) {
            Ok(values) => {
                let mut col: Vec<Option<f64>> = vec![None; n - values.len()];
                col.extend(values.into_iter().map(Some));
                col
            }
            Err(_) => vec![None; n],
        };

        let (bb_upper, bb_middle, bb_lower, bb_bandwidth, bb_percent_b) =
            match bollinger_bands(&close, BOLLINGER_PERIOD, BOLLINGER_STD) {
                Ok(bands) => {
                    let pad = n - bands.middle.len();
                    (
                        pad_column(bands.upper, pad),
                        pad_column(bands.middle, pad),
                        pad_column(bands.lower, pad),
                        pad_column(bands.bandwidth, pad),
                        pad_column(bands.percent_b, pad),
                    )
                }
                Err(_) => (
                    vec![None; n],
                    vec![None; n],
                    vec![None; n],
                    vec![None; n],
                    vec![None; n],
                ),
            };

        Ok(IndicatorFrame {
            time: candles.iter().map(|c| c.time).collect(),
            close,
            obv: obv_values,
            macd: macd_result.macd_line,
            macd_signal: macd_result.signal_line,
            macd_histogram: macd_result.histogram,
            rsi: rsi_column,
            bb_upper,
            bb_middle,
            bb_lower,
            bb_bandwidth,
            bb_percent_b,
        })
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// RSI at the latest bar, when the lookback is satisfied.
    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().flatten()
    }
}

fn pad_column(values: Vec<f64>, pad: usize) -> Vec<Option<f64>> {
    let mut col: Vec<Option<f64>> = vec![None; pad];
    col.extend(values.into_iter().map(Some));
    col
}
