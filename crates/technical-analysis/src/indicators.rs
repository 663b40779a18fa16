use tracker_core::{Candle, Result, TrackerError};

/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

fn require_bars(have: usize, need: usize, what: &str) -> Result<()> {
    if have < need {
        return Err(TrackerError::InsufficientData(format!(
            "{what} requires {need} bars, got {have}"
        )));
    }
    Ok(())
}

/// Simple Moving Average. Output holds one value per full window, i.e.
/// `data.len() - period + 1` entries starting at bar `period - 1`.
pub fn sma(data: &[f64], period: usize) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(TrackerError::Validation("SMA period must be > 0".into()));
    }
    require_bars(data.len(), period, "SMA")?;

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(finite_or(sum / period as f64, 0.0));
    }
    Ok(result)
}

/// Exponential Moving Average, recursive form seeded at bar 0
/// (`ema[0] = data[0]`, then `ema[i] = alpha * x + (1 - alpha) * prev` with
/// `alpha = 2 / (period + 1)`). Output length equals input length.
pub fn ema(data: &[f64], period: usize) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(TrackerError::Validation("EMA period must be > 0".into()));
    }
    require_bars(data.len(), 1, "EMA")?;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len());
    result.push(data[0]);

    for &x in &data[1..] {
        let prev = result[result.len() - 1];
        result.push(finite_or(alpha * x + (1.0 - alpha) * prev, prev));
    }
    Ok(result)
}

/// Relative Strength Index with Wilder smoothing. The seed is the plain
/// average of the first `period` gains/losses; output starts at bar `period`
/// (`data.len() - period` entries). A window with zero losses reads 100.
pub fn rsi(data: &[f64], period: usize) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(TrackerError::Validation("RSI period must be > 0".into()));
    }
    require_bars(data.len(), period + 1, "RSI")?;

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(data.len() - period);
    values.push(rsi_point(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        values.push(rsi_point(avg_gain, avg_loss));
    }

    Ok(values)
}

fn rsi_point(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    finite_or(100.0 - 100.0 / (1.0 + rs), 50.0)
}

/// MACD (Moving Average Convergence Divergence). All three series are
/// full-length and aligned with the input.
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(
    data: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Result<MacdResult> {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return Err(TrackerError::Validation(format!(
            "Invalid MACD periods: fast={fast_period}, slow={slow_period}, signal={signal_period}"
        )));
    }
    require_bars(data.len(), 1, "MACD")?;

    let ema_fast = ema(data, fast_period)?;
    let ema_slow = ema(data, slow_period)?;

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd_line, signal_period)?;
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    Ok(MacdResult {
        macd_line,
        signal_line,
        histogram,
    })
}

/// Bollinger Bands over sample standard deviation (n - 1 denominator).
/// Series hold `data.len() - period + 1` entries starting at bar
/// `period - 1`, aligned with [`sma`] output.
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub bandwidth: Vec<f64>,
    pub percent_b: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> Result<BollingerBands> {
    if period < 2 {
        return Err(TrackerError::Validation(
            "Bollinger period must be >= 2".into(),
        ));
    }
    require_bars(data.len(), period, "Bollinger Bands")?;

    let middle = sma(data, period)?;
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());
    let mut bandwidth = Vec::with_capacity(middle.len());
    let mut percent_b = Vec::with_capacity(middle.len());

    for i in period - 1..data.len() {
        let slice = &data[i + 1 - period..=i];
        let mean = middle[i + 1 - period];
        let variance: f64 =
            slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        let std = variance.sqrt();

        let up = finite_or(mean + std_dev * std, mean);
        let low = finite_or(mean - std_dev * std, mean);
        upper.push(up);
        lower.push(low);
        bandwidth.push(finite_or((up - low) / mean * 100.0, 0.0));
        percent_b.push(finite_or((data[i] - low) / (up - low), 0.5));
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
        bandwidth,
        percent_b,
    })
}

/// On-Balance Volume. `obv[0] = volume[0]`; later bars add volume on an up
/// close, subtract it on a down close, and carry on an unchanged close.
pub fn obv(candles: &[Candle]) -> Result<Vec<f64>> {
    require_bars(candles.len(), 1, "OBV")?;

    let mut values = Vec::with_capacity(candles.len());
    values.push(candles[0].volume as f64);

    for i in 1..candles.len() {
        let prev = values[i - 1];
        let next = if candles[i].close > candles[i - 1].close {
            prev + candles[i].volume as f64
        } else if candles[i].close < candles[i - 1].close {
            prev - candles[i].volume as f64
        } else {
            prev
        };
        values.push(next);
    }

    Ok(values)
}

/// Closes of a candle slice, in order.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
