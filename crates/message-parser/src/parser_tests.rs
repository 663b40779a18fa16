mod tests {
    use crate::parser::{MessageParser, ParseRejection, PARSER_VERSION};
    use crate::pattern_store::{test_pattern, PatternSet};
    use chrono::{TimeZone, Utc};
    use tracker_core::{
        Direction, ParsingPattern, PatternCategory, RawMessage, SignalType, TrackerError,
    };

    fn pattern(id: i64, category: PatternCategory, source: &str, priority: i32) -> ParsingPattern {
        ParsingPattern {
            id,
            name: format!("{}_{id}", category.as_str()),
            category,
            pattern: source.to_string(),
            priority,
            is_active: true,
            description: None,
        }
    }

    /// A pattern set close to what production channels run on.
    fn default_patterns() -> PatternSet {
        PatternSet::from_patterns(vec![
            pattern(1, PatternCategory::Author, r"#([A-Za-z][A-Za-z0-9_]{2,})", 100),
            pattern(10, PatternCategory::Ticker, r"\$([A-Z]{2,6})\b", 100),
            pattern(11, PatternCategory::Ticker, r"\b([A-Z]{3,6})\b", 50),
            pattern(
                20,
                PatternCategory::TradingKeyword,
                r"(?:лонг|шорт|long|short|вход|сделка|сигнал|покупа|прода)",
                100,
            ),
            pattern(
                30,
                PatternCategory::OperationExit,
                r"(?:закрываю|фиксирую|выхожу|close|exit)\s*(?:лонг|шорт|long|short)?",
                100,
            ),
            pattern(40, PatternCategory::DirectionLong, r"(?:покупаю|лонгую|buy)", 100),
            pattern(41, PatternCategory::DirectionShort, r"(?:шорчу|продаю|sell)", 100),
            pattern(
                50,
                PatternCategory::PriceTarget,
                r"(?:по|цель|target|@)\s*(\d+(?:[.,]\d+)?)",
                100,
            ),
            pattern(
                51,
                PatternCategory::PriceStop,
                r"(?:стоп\w*|sl|stop)\s*:?\s*(\d+(?:[.,]\d+)?)",
                100,
            ),
            pattern(
                52,
                PatternCategory::PriceTake,
                r"(?:тейк|tp|take)\s*:?\s*(\d+(?:[.,]\d+)?)",
                100,
            ),
        ])
    }

    fn message(text: &str) -> RawMessage {
        RawMessage {
            id: 1,
            channel_id: 10,
            message_id: 100,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            text: text.to_string(),
            author: None,
            is_processed: false,
            parse_success: None,
        }
    }

    #[test]
    fn author_extraction_precedes_cleaning() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("#ProfitKing – long ABC по 100"), &default_patterns())
            .expect("should parse");

        assert_eq!(draft.author.as_deref(), Some("ProfitKing"));
        assert_eq!(draft.ticker, "ABC");
        assert_eq!(draft.direction, Direction::Long);
        assert_eq!(draft.signal_type, SignalType::Entry);
        assert_eq!(draft.target_price, Some(100.0));
        assert_eq!(draft.parser_version, PARSER_VERSION);
    }

    #[test]
    fn author_falls_back_to_message_field() {
        let parser = MessageParser::new();
        let mut msg = message("лонг SBER по 250");
        msg.author = Some("channel_bot".to_string());

        let draft = parser.parse(&msg, &default_patterns()).unwrap();
        assert_eq!(draft.author.as_deref(), Some("channel_bot"));
    }

    #[test]
    fn author_defaults_to_unknown() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("лонг SBER по 250"), &default_patterns())
            .unwrap();
        assert_eq!(draft.author.as_deref(), Some("Unknown"));
    }

    #[test]
    fn empty_text_is_rejected() {
        let parser = MessageParser::new();
        let err = parser
            .parse(&message("   \n  "), &default_patterns())
            .unwrap_err();
        assert_eq!(err, ParseRejection::EmptyText);
        assert_eq!(err.message(), "Empty message text");
    }

    #[test]
    fn chatter_is_not_a_trading_message() {
        let parser = MessageParser::new();
        let err = parser
            .parse(&message("привет, как дела?"), &default_patterns())
            .unwrap_err();
        assert_eq!(err, ParseRejection::NotTrading);
        assert!(err.is_non_trading());
    }

    #[test]
    fn emoji_marks_trading_but_ticker_still_required() {
        let parser = MessageParser::new();
        let err = parser
            .parse(&message("🔥 взлетаем!"), &default_patterns())
            .unwrap_err();
        assert_eq!(err, ParseRejection::NoTicker);
    }

    #[test]
    fn exit_pattern_with_side_classifies_exit_long() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("закрываю лонг SBER"), &default_patterns())
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Exit);
        assert_eq!(draft.direction, Direction::Long);
    }

    #[test]
    fn exit_pattern_without_side_is_mixed() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("фиксирую SBER полностью"), &default_patterns())
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Exit);
        assert_eq!(draft.direction, Direction::Mixed);
    }

    #[test]
    fn short_entry_via_direction_pattern() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("шорчу GAZP со стопом 180"), &default_patterns())
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Entry);
        assert_eq!(draft.direction, Direction::Short);
        assert_eq!(draft.stop_loss, Some(180.0));
    }

    #[test]
    fn loose_word_check_catches_unpatterned_direction() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("SHORT появился на TSLA"), &default_patterns())
            .unwrap();
        assert_eq!(draft.direction, Direction::Short);
        assert_eq!(draft.signal_type, SignalType::Entry);
    }

    #[test]
    fn no_direction_yields_mixed_entry() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("вход по TSLA"), &default_patterns())
            .unwrap();
        assert_eq!(draft.direction, Direction::Mixed);
        assert_eq!(draft.signal_type, SignalType::Entry);
        // 0.4 ticker + 0.2 operation, no direction bonus, 3 words
        assert!((draft.confidence_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn confidence_reaches_cap_with_all_components() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(
                &message("сигнал: лонг ABC цель 100 стоп 95"),
                &default_patterns(),
            )
            .unwrap();
        assert!((draft.confidence_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decimal_comma_parses_as_point() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(
                &message("лонг SBER цель 250,5 стоп 240 тейк 260,75"),
                &default_patterns(),
            )
            .unwrap();
        assert_eq!(draft.target_price, Some(250.5));
        assert_eq!(draft.stop_loss, Some(240.0));
        assert_eq!(draft.take_profit, Some(260.75));
    }

    #[test]
    fn out_of_range_price_is_dropped() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("лонг ABC цель 500000"), &default_patterns())
            .unwrap();
        assert_eq!(draft.target_price, None);
    }

    #[test]
    fn higher_priority_ticker_pattern_wins() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("лонг $TS по 10, обсуждали ABCD"), &default_patterns())
            .unwrap();
        // The $-prefixed pattern has priority 100 and matches first
        assert_eq!(draft.ticker, "TS");
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let parser = MessageParser::new();
        let mut patterns = vec![pattern(99, PatternCategory::Ticker, r"([unclosed", 200)];
        patterns.push(pattern(11, PatternCategory::Ticker, r"\b([A-Z]{3,6})\b", 50));
        patterns.push(pattern(
            20,
            PatternCategory::TradingKeyword,
            r"(?:лонг|long)",
            100,
        ));
        let set = PatternSet::from_patterns(patterns);

        let draft = parser.parse(&message("лонг SBER"), &set).unwrap();
        assert_eq!(draft.ticker, "SBER");
    }

    #[test]
    fn full_match_fallback_when_pattern_has_no_group() {
        let parser = MessageParser::new();
        let set = PatternSet::from_patterns(vec![
            pattern(11, PatternCategory::Ticker, r"[A-Z]{3,6}", 50),
            pattern(20, PatternCategory::TradingKeyword, r"лонг", 100),
            pattern(50, PatternCategory::PriceTarget, r"\d+[.,]\d+", 100),
        ]);

        let draft = parser.parse(&message("лонг SBER 250,5"), &set).unwrap();
        assert_eq!(draft.ticker, "SBER");
        assert_eq!(draft.target_price, Some(250.5));
    }

    #[test]
    fn parser_is_idempotent_over_original_text() {
        let parser = MessageParser::new();
        let patterns = default_patterns();
        let first = parser
            .parse(&message("#Trader_1 шорчу GAZP цель 170,5"), &patterns)
            .unwrap();

        let mut replay = message(&first.original_text);
        replay.id = 2;
        let second = parser.parse(&replay, &patterns).unwrap();

        assert_eq!(first.ticker, second.ticker);
        assert_eq!(first.direction, second.direction);
        assert_eq!(first.signal_type, second.signal_type);
        assert_eq!(first.author, second.author);
        assert_eq!(first.target_price, second.target_price);
        assert_eq!(first.confidence_score, second.confidence_score);
    }

    #[test]
    fn extracted_data_carries_debug_payload() {
        let parser = MessageParser::new();
        let draft = parser
            .parse(&message("лонг SBER по 250 и GAZP"), &default_patterns())
            .unwrap();

        let data = draft.extracted_data.expect("debug payload");
        let tickers: Vec<String> = data["all_tickers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(tickers.contains(&"SBER".to_string()));
        assert!(tickers.contains(&"GAZP".to_string()));
        assert_eq!(data["all_prices"][0].as_f64(), Some(250.0));
        assert_eq!(data["raw_message_id"].as_i64(), Some(1));
    }

    #[test]
    fn pattern_set_orders_by_priority() {
        let set = PatternSet::from_patterns(vec![
            pattern(1, PatternCategory::Ticker, "low", 10),
            pattern(2, PatternCategory::Ticker, "high", 90),
            pattern(3, PatternCategory::Ticker, "mid", 50),
        ]);

        let priorities: Vec<i32> = set
            .category(PatternCategory::Ticker)
            .iter()
            .map(|p| p.priority)
            .collect();
        assert_eq!(priorities, vec![90, 50, 10]);
        assert!(set.category(PatternCategory::Author).is_empty());
        assert_eq!(set.total(), 3);
    }

    #[test]
    fn test_pattern_reports_matches_and_groups() {
        let matches = test_pattern(r"цель\s*(\d+)", "Лонг SBER, цель 250").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched, "цель 250");
        assert_eq!(matches[0].groups, vec![Some("250".to_string())]);

        let err = test_pattern(r"(broken", "text").unwrap_err();
        assert!(matches!(err, TrackerError::PatternCompile { .. }));
    }
}
