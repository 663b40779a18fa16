mod tests {
    use crate::frame::IndicatorFrame;
    use crate::indicators::*;
    use crate::signals::*;
    use chrono::{Duration, Utc};
    use tracker_core::{Candle, TrackerError};

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to build candles from close prices
    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc::now() - Duration::hours(closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: start + Duration::hours(i as i64),
                open: close,
                high: close + 1.0,
                low: (close - 1.0).max(0.01),
                close,
                volume: 1_000_000,
            })
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3).unwrap();

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[1] - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
        assert!((result[2] - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert!(matches!(result, Err(TrackerError::InsufficientData(_))));
    }

    #[test]
    fn test_ema_recursive_seed() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3).unwrap();

        assert_eq!(result.len(), data.len());
        // Recursive form is seeded at bar 0
        assert!((result[0] - 22.0).abs() < 1e-9);
        // ema[1] = 0.5 * 24 + 0.5 * 22 = 23
        assert!((result[1] - 23.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_empty_data() {
        let data: Vec<f64> = vec![];
        assert!(ema(&data, 5).is_err());
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = ema(&data, 3).unwrap();

        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_rsi_basic() {
        let prices = sample_prices();
        let result = rsi(&prices, 14).unwrap();

        assert_eq!(result.len(), prices.len() - 14);
        for &value in &result {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            rsi(&data, 14),
            Err(TrackerError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_rsi_pure_uptrend_reads_100() {
        let mut uptrend = vec![100.0];
        for i in 1..20 {
            uptrend.push(100.0 + i as f64);
        }

        let result = rsi(&uptrend, 14).unwrap();
        // No losing bars at all, so avg_loss stays 0
        assert!((result.last().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_downtrend_is_oversold() {
        let mut downtrend = vec![100.0];
        for i in 1..20 {
            downtrend.push(100.0 - i as f64);
        }

        let result = rsi(&downtrend, 14).unwrap();
        assert!(*result.last().unwrap() < 30.0);
    }

    #[test]
    fn test_macd_alignment() {
        let prices = sample_prices();
        let result = macd(&prices, 12, 26, 9).unwrap();

        assert_eq!(result.macd_line.len(), prices.len());
        assert_eq!(result.signal_line.len(), prices.len());
        assert_eq!(result.histogram.len(), prices.len());

        // Histogram is macd_line - signal_line at every bar
        for i in 0..prices.len() {
            let expected = result.macd_line[i] - result.signal_line[i];
            assert!((result.histogram[i] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let prices = sample_prices();
        assert!(macd(&prices, 26, 12, 9).is_err());
    }

    #[test]
    fn test_bollinger_bands_ordering() {
        let prices = sample_prices();
        let result = bollinger_bands(&prices, 10, 2.0).unwrap();

        assert_eq!(result.upper.len(), prices.len() - 9);
        for i in 0..result.upper.len() {
            assert!(result.upper[i] > result.middle[i]);
            assert!(result.middle[i] > result.lower[i]);
        }
    }

    #[test]
    fn test_bollinger_sample_stdev() {
        // Closes 1..=5, period 5: mean 3, sample variance 2.5
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = bollinger_bands(&data, 5, 2.0).unwrap();

        let std = (2.5f64).sqrt();
        assert!((result.middle[0] - 3.0).abs() < 1e-9);
        assert!((result.upper[0] - (3.0 + 2.0 * std)).abs() < 1e-9);
        assert!((result.lower[0] - (3.0 - 2.0 * std)).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_bandwidth_and_percent_b() {
        let prices = sample_prices();
        let result = bollinger_bands(&prices, 10, 2.0).unwrap();

        for i in 0..result.upper.len() {
            let width = (result.upper[i] - result.lower[i]) / result.middle[i] * 100.0;
            assert!((result.bandwidth[i] - width).abs() < 1e-9);
            let pb = (prices[i + 9] - result.lower[i]) / (result.upper[i] - result.lower[i]);
            assert!((result.percent_b[i] - pb).abs() < 1e-9);
        }
    }

    #[test]
    fn test_obv_basic() {
        let candles = candles_from_closes(&sample_prices());
        let result = obv(&candles).unwrap();

        assert_eq!(result.len(), candles.len());
        assert!((result[0] - 1_000_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_obv_follows_close_direction() {
        let up = candles_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let result = obv(&up).unwrap();
        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }

        let down = candles_from_closes(&[4.0, 3.0, 2.0, 1.0]);
        let result = obv(&down).unwrap();
        for i in 1..result.len() {
            assert!(result[i] < result[i - 1]);
        }
    }

    #[test]
    fn test_obv_flat_close_carries() {
        let flat = candles_from_closes(&[5.0, 5.0, 5.0]);
        let result = obv(&flat).unwrap();
        assert_eq!(result, vec![1_000_000.0, 1_000_000.0, 1_000_000.0]);
    }

    #[test]
    fn test_frame_pads_warmup_with_none() {
        let candles = candles_from_closes(&sample_prices());
        let frame = IndicatorFrame::compute(&candles).unwrap();

        assert_eq!(frame.len(), candles.len());
        assert!(frame.rsi[13].is_none());
        assert!(frame.rsi[14].is_some());
        assert!(frame.bb_upper[18].is_none());
        assert!(frame.bb_upper[19].is_some());
    }

    #[test]
    fn test_frame_short_history_leaves_columns_none() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let frame = IndicatorFrame::compute(&candles).unwrap();

        assert!(frame.rsi.iter().all(Option::is_none));
        assert!(frame.bb_upper.iter().all(Option::is_none));
        // OBV and MACD compute regardless of length
        assert_eq!(frame.obv.len(), 3);
        assert_eq!(frame.macd.len(), 3);
    }

    #[test]
    fn test_signals_overbought_on_uptrend() {
        let mut closes = vec![100.0];
        for i in 1..40 {
            closes.push(100.0 + i as f64 * 0.5);
        }
        let candles = candles_from_closes(&closes);
        let signals = indicator_signals(&candles);

        assert_eq!(signals.rsi, Some(RsiSignal::Overbought));
        assert!(matches!(
            signals.macd,
            Some(MacdSignal::Bullish) | Some(MacdSignal::BullishCrossover)
        ));
    }

    #[test]
    fn test_signals_oversold_after_plunge() {
        // Flat history with one sharp drop at the end: the last close falls
        // through the lower band and RSI collapses
        let mut closes = vec![100.0; 39];
        closes.push(90.0);
        let candles = candles_from_closes(&closes);
        let signals = indicator_signals(&candles);

        assert_eq!(signals.rsi, Some(RsiSignal::Oversold));
        assert_eq!(signals.bollinger, Some(BollingerSignal::AtLowerBand));
    }

    #[test]
    fn test_signals_obv_accumulation() {
        // Rising closes with growing volume push OBV above its 10-bar mean
        let start = Utc::now() - Duration::hours(40);
        let candles: Vec<Candle> = (0..40)
            .map(|i| Candle {
                time: start + Duration::hours(i),
                open: 100.0 + i as f64,
                high: 101.5 + i as f64,
                low: 99.5 + i as f64,
                close: 100.0 + i as f64,
                volume: 1_000_000 + i * 200_000,
            })
            .collect();

        let signals = indicator_signals(&candles);
        assert_eq!(signals.obv, Some(ObvSignal::Accumulation));
    }

    #[test]
    fn test_signals_empty_history() {
        let signals = indicator_signals(&[]);
        assert!(signals.rsi.is_none());
        assert!(signals.macd.is_none());
        assert!(signals.bollinger.is_none());
        assert!(signals.obv.is_none());
    }

    #[test]
    fn test_signal_wire_names() {
        assert_eq!(MacdSignal::BullishCrossover.as_str(), "bullish_crossover");
        assert_eq!(BollingerSignal::AtLowerBand.as_str(), "at_lower_band");
        assert_eq!(ObvSignal::Accumulation.as_str(), "accumulation");
        assert_eq!(RsiSignal::Overbought.as_str(), "overbought");
    }
}
