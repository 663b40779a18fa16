mod tests {
    use crate::gate::evaluate_conditions;
    use crate::window::{build_event, calculate_strength, evaluate_window, WindowParams};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tracker_core::{
        Candle, Direction, IndicatorConditions, ParsedSignal, RsiCondition, SignalCondition,
        SignalType,
    };
    use uuid::Uuid;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn signal(
        ticker: &str,
        author: &str,
        direction: Direction,
        offset_minutes: i64,
        target_price: Option<f64>,
    ) -> ParsedSignal {
        ParsedSignal {
            id: Uuid::new_v4(),
            raw_message_id: None,
            timestamp: base_time() + Duration::minutes(offset_minutes),
            channel_id: 1,
            trader_id: None,
            author: Some(author.to_string()),
            ticker: ticker.to_string(),
            figi: None,
            direction,
            signal_type: SignalType::Entry,
            target_price,
            stop_loss: None,
            take_profit: None,
            confidence_score: 0.9,
            parser_version: "1.0.0".to_string(),
            original_text: format!("{direction:?} {ticker}"),
            extracted_data: None,
        }
    }

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = base_time() - Duration::hours(closes.len() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: start + Duration::hours(i as i64),
                open: close,
                high: close + 0.5,
                low: (close - 0.5).max(0.01),
                close,
                volume: 1_000_000,
            })
            .collect()
    }

    #[test]
    fn consensus_fires_on_two_distinct_authors() {
        // Three signals by two authors: A at t, B at t+2m, B again at t+4m
        let signals = vec![
            signal("ABC", "A", Direction::Long, 0, Some(100.0)),
            signal("ABC", "B", Direction::Long, 2, Some(100.5)),
            signal("ABC", "B", Direction::Long, 4, Some(101.0)),
        ];
        let trigger = signals[2].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        };

        let window = evaluate_window(&trigger, &signals, &params).expect("consensus expected");
        assert_eq!(window.direction, Direction::Long);
        assert_eq!(window.authors, vec!["A", "B"]);
        assert_eq!(window.signals.len(), 3);

        let (event, members) = build_event(&trigger, &window, None, base_time());
        assert_eq!(event.traders_count, 2);
        assert_eq!(event.direction, Direction::Long);
        assert_eq!(event.metadata.authors.len(), 2);
        assert_eq!(event.metadata.trigger_signal_id, trigger.id);
        assert_eq!(members.len(), 3);
        assert_eq!(
            members.iter().filter(|m| m.is_initiator).count(),
            1,
            "exactly one initiator"
        );
        assert!(members
            .iter()
            .find(|m| m.signal_id == trigger.id)
            .unwrap()
            .is_initiator);
    }

    #[test]
    fn mixed_directions_reject_in_strict_mode() {
        let signals = vec![
            signal("XYZ", "A", Direction::Long, 0, None),
            signal("XYZ", "B", Direction::Long, 2, None),
            signal("XYZ", "C", Direction::Short, 4, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        };

        assert!(evaluate_window(&trigger, &signals, &params).is_none());
    }

    #[test]
    fn non_strict_picks_dominant_direction() {
        let signals = vec![
            signal("XYZ", "A", Direction::Long, 0, None),
            signal("XYZ", "B", Direction::Long, 2, None),
            signal("XYZ", "C", Direction::Short, 4, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: false,
            min_confidence: None,
        };

        let window = evaluate_window(&trigger, &signals, &params).expect("dominant group");
        assert_eq!(window.direction, Direction::Long);
        assert_eq!(window.signals.len(), 2);
    }

    #[test]
    fn non_strict_tie_keeps_first_encountered_direction() {
        let signals = vec![
            signal("XYZ", "A", Direction::Short, 0, None),
            signal("XYZ", "B", Direction::Short, 1, None),
            signal("XYZ", "C", Direction::Long, 2, None),
            signal("XYZ", "D", Direction::Long, 3, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: false,
            min_confidence: None,
        };

        let window = evaluate_window(&trigger, &signals, &params).unwrap();
        assert_eq!(window.direction, Direction::Short);
    }

    #[test]
    fn repeated_author_does_not_count_twice() {
        let signals = vec![
            signal("ABC", "A", Direction::Long, 0, None),
            signal("ABC", "A", Direction::Long, 2, None),
            signal("ABC", "A", Direction::Long, 4, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        };

        assert!(evaluate_window(&trigger, &signals, &params).is_none());
    }

    #[test]
    fn authorless_signals_do_not_satisfy_min_traders() {
        let mut anonymous = signal("ABC", "A", Direction::Long, 0, None);
        anonymous.author = None;
        let signals = vec![anonymous, signal("ABC", "B", Direction::Long, 2, None)];
        let trigger = signals[1].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        };

        assert!(evaluate_window(&trigger, &signals, &params).is_none());
    }

    #[test]
    fn min_confidence_filters_window_signals() {
        let mut weak = signal("ABC", "B", Direction::Long, 2, None);
        weak.confidence_score = 0.2;
        let signals = vec![
            signal("ABC", "A", Direction::Long, 0, None),
            weak,
            signal("ABC", "C", Direction::Long, 4, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 3,
            strict: true,
            min_confidence: Some(0.5),
        };

        // B falls below the confidence floor, leaving only two authors
        assert!(evaluate_window(&trigger, &signals, &params).is_none());
    }

    #[test]
    fn window_containment_and_spread() {
        let signals = vec![
            signal("ABC", "A", Direction::Long, 0, Some(99.0)),
            signal("ABC", "B", Direction::Long, 3, Some(101.0)),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        };

        let window = evaluate_window(&trigger, &signals, &params).unwrap();
        let (event, _) = build_event(&trigger, &window, Some(7), base_time());

        assert_eq!(event.rule_id, Some(7));
        assert_eq!(event.first_signal_at, signals[0].timestamp);
        assert_eq!(event.last_signal_at, signals[1].timestamp);
        for member_signal in &window.signals {
            assert!(member_signal.timestamp >= event.first_signal_at);
            assert!(member_signal.timestamp <= event.last_signal_at);
        }

        assert_eq!(event.avg_entry_price, Some(100.0));
        assert_eq!(event.min_entry_price, Some(99.0));
        assert_eq!(event.max_entry_price, Some(101.0));
        assert!((event.price_spread_pct.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn event_without_target_prices_has_no_spread() {
        let signals = vec![
            signal("ABC", "A", Direction::Long, 0, None),
            signal("ABC", "B", Direction::Long, 1, None),
        ];
        let trigger = signals[0].clone();
        let params = WindowParams::default_rule();

        let window = evaluate_window(&trigger, &signals, &params).unwrap();
        let (event, _) = build_event(&trigger, &window, None, base_time());

        assert_eq!(event.avg_entry_price, None);
        assert_eq!(event.price_spread_pct, None);
    }

    #[test]
    fn strength_stays_in_bounds() {
        // Best case: many authors, tight prices, tight timing
        assert_eq!(calculate_strength(6, Some(0.5), Some(5.0)), 100);
        // Worst case: wide spread
        assert_eq!(calculate_strength(2, Some(10.0), Some(30.0)), 40);
        // Base case
        assert_eq!(calculate_strength(2, None, None), 50);
        // Bonus tiers
        assert_eq!(calculate_strength(4, None, None), 60);
        assert_eq!(calculate_strength(5, None, None), 70);

        for traders in 0..8 {
            for spread in [None, Some(0.0), Some(1.5), Some(3.0), Some(50.0)] {
                for span in [None, Some(0.0), Some(15.0), Some(120.0)] {
                    let s = calculate_strength(traders, spread, span);
                    assert!((0..=100).contains(&s));
                }
            }
        }
    }

    #[test]
    fn strength_rewards_compact_windows() {
        let tight = calculate_strength(2, Some(0.5), Some(4.0));
        let loose = calculate_strength(2, Some(0.5), Some(25.0));
        assert!(tight > loose);
    }

    #[test]
    fn default_rule_window_bounds_are_symmetric() {
        let params = WindowParams::default_rule();
        let at = base_time();
        let (start, end) = params.bounds(at);
        assert_eq!(at - start, end - at);
        assert_eq!((end - start).num_minutes(), 10);
    }

    #[test]
    fn gate_passes_with_insufficient_candles() {
        let conditions = IndicatorConditions {
            rsi: Some(RsiCondition {
                enabled: true,
                min: Some(30.0),
                max: Some(70.0),
            }),
            ..Default::default()
        };
        let candles = candles_from_closes(&[100.0; 20]);
        assert!(evaluate_conditions(&candles, &conditions));
    }

    #[test]
    fn gate_rejects_overbought_rsi() {
        let conditions = IndicatorConditions {
            rsi: Some(RsiCondition {
                enabled: true,
                min: None,
                max: Some(50.0),
            }),
            ..Default::default()
        };
        // Pure uptrend drives RSI to 100, above the bound
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        assert!(!evaluate_conditions(&candles_from_closes(&closes), &conditions));

        // Pure downtrend drives RSI to 0, inside the bound
        let closes: Vec<f64> = (0..40).map(|i| 140.0 - i as f64).collect();
        assert!(evaluate_conditions(&candles_from_closes(&closes), &conditions));
    }

    #[test]
    fn gate_checks_macd_signal_name() {
        let conditions = IndicatorConditions {
            macd: Some(SignalCondition {
                enabled: true,
                signal: Some("bullish".to_string()),
            }),
            ..Default::default()
        };
        let uptrend: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        assert!(evaluate_conditions(&candles_from_closes(&uptrend), &conditions));

        let bearish = IndicatorConditions {
            macd: Some(SignalCondition {
                enabled: true,
                signal: Some("bearish".to_string()),
            }),
            ..Default::default()
        };
        assert!(!evaluate_conditions(&candles_from_closes(&uptrend), &bearish));
    }

    #[test]
    fn gate_with_disabled_conditions_passes() {
        let conditions = IndicatorConditions {
            rsi: Some(RsiCondition {
                enabled: false,
                min: Some(99.0),
                max: Some(99.5),
            }),
            obv: Some(SignalCondition {
                enabled: false,
                signal: Some("distribution".to_string()),
            }),
            ..Default::default()
        };
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        assert!(evaluate_conditions(&candles_from_closes(&closes), &conditions));
    }
}
