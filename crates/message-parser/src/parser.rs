use dashmap::DashMap;
use regex::Regex;
use serde_json::json;
use tracker_core::{Direction, ParsingPattern, PatternCategory, RawMessage, SignalDraft, SignalType};

use crate::pattern_store::PatternSet;

pub const PARSER_VERSION: &str = "1.0.0";

/// Glyphs that mark a message as trade-related even without keywords.
const TRADING_EMOJIS: [&str; 5] = ["🔥", "🎪", "📈", "📉", "⭐"];

/// Candidate tickers matching these words are discarded from the debug list.
const TICKER_STOP_WORDS: [&str; 7] = ["VIP", "BOT", "NEW", "TOP", "WIN", "BUY", "SELL"];

/// Tokens that nudge parse confidence up.
const CONFIDENCE_TOKENS: [&str; 6] = ["сделка", "позиция", "сигнал", "deal", "position", "signal"];

const PRICE_MIN: f64 = 0.01;
const PRICE_MAX: f64 = 100_000.0;

/// Why a message produced no signal. `NotTrading` is ordinary traffic, the
/// others are parse failures worth surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseRejection {
    EmptyText,
    NotTrading,
    NoTicker,
}

impl ParseRejection {
    pub fn message(&self) -> &'static str {
        match self {
            ParseRejection::EmptyText => "Empty message text",
            ParseRejection::NotTrading => "Not a trading message",
            ParseRejection::NoTicker => "No ticker found",
        }
    }

    pub fn is_non_trading(&self) -> bool {
        matches!(self, ParseRejection::NotTrading)
    }
}

/// Stateless signal parser. Patterns come in as a snapshot per call, so the
/// parser is reentrant and safe for parallel invocation; the only shared
/// state is the compile cache keyed by pattern id.
pub struct MessageParser {
    compiled: DashMap<i64, Regex>,
    number_re: Regex,
    long_word_re: Regex,
    short_word_re: Regex,
}

impl MessageParser {
    pub fn new() -> Self {
        Self {
            compiled: DashMap::new(),
            number_re: Regex::new(r"\d+(?:[.,]\d+)?").expect("static regex"),
            long_word_re: Regex::new(r"(?i)\b(лонг|long)\b").expect("static regex"),
            short_word_re: Regex::new(r"(?i)\b(шорт|short)\b").expect("static regex"),
        }
    }

    /// Drop compiled regexes, e.g. after a pattern reload changed sources
    /// under existing ids.
    pub fn clear_compiled(&self) {
        self.compiled.clear();
    }

    /// Parse one raw message into a signal draft.
    pub fn parse(
        &self,
        message: &RawMessage,
        patterns: &PatternSet,
    ) -> Result<SignalDraft, ParseRejection> {
        let text = message.text.as_str();
        if text.trim().is_empty() {
            return Err(ParseRejection::EmptyText);
        }

        // Author comes out of the original text, before any cleaning;
        // hashtag-style signatures live at the top of the raw message.
        let author = self.extract_author(text, message.author.as_deref(), patterns);

        let cleaned = text.trim();

        if !self.is_trading_message(cleaned, patterns) {
            return Err(ParseRejection::NotTrading);
        }

        let ticker = self
            .extract_ticker(cleaned, patterns)
            .ok_or(ParseRejection::NoTicker)?;

        let (signal_type, direction) = self.analyze_operation(cleaned, patterns);
        let prices = self.extract_prices(cleaned, patterns);
        let confidence = self.calculate_confidence(cleaned, direction);

        let extracted_data = json!({
            "cleaned_text": cleaned,
            "operation_analysis": self.operation_debug(cleaned, patterns),
            "all_tickers": self.extract_all_tickers(cleaned, patterns),
            "all_prices": self.extract_all_numbers(cleaned),
            "raw_message_id": message.id,
        });

        tracing::debug!(
            message_id = message.id,
            ticker = %ticker,
            direction = %direction,
            signal_type = signal_type.as_str(),
            author = %author,
            confidence,
            "Parsed message"
        );

        Ok(SignalDraft {
            raw_message_id: message.id,
            timestamp: message.timestamp,
            channel_id: message.channel_id,
            author: Some(author),
            ticker,
            direction,
            signal_type,
            target_price: prices.target,
            stop_loss: prices.stop_loss,
            take_profit: prices.take_profit,
            confidence_score: confidence,
            parser_version: PARSER_VERSION.to_string(),
            original_text: text.to_string(),
            extracted_data: Some(extracted_data),
        })
    }

    /// Compiled regex for a stored pattern, from the cache when warm.
    /// Ticker and author patterns match case-sensitively (tickers are
    /// uppercase by convention, signatures are literal); every other
    /// category is case-insensitive. Patterns that fail to compile are
    /// skipped with a warning.
    fn regex_for(&self, pattern: &ParsingPattern) -> Option<Regex> {
        if let Some(re) = self.compiled.get(&pattern.id) {
            return Some(re.clone());
        }

        let source = if case_insensitive(pattern.category) {
            format!("(?i){}", pattern.pattern)
        } else {
            pattern.pattern.clone()
        };

        match Regex::new(&source) {
            Ok(re) => {
                self.compiled.insert(pattern.id, re.clone());
                Some(re)
            }
            Err(e) => {
                tracing::warn!(
                    pattern = %pattern.name,
                    error = %e,
                    "Skipping pattern that fails to compile"
                );
                None
            }
        }
    }

    fn extract_author(
        &self,
        text: &str,
        fallback: Option<&str>,
        patterns: &PatternSet,
    ) -> String {
        for pattern in patterns.category(PatternCategory::Author) {
            let Some(re) = self.regex_for(pattern) else {
                continue;
            };
            if let Some(caps) = re.captures(text) {
                let matched = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string());
                if let Some(author) = matched {
                    tracing::debug!(author = %author, pattern = %pattern.name, "Found author");
                    return author;
                }
            }
        }

        fallback.unwrap_or("Unknown").to_string()
    }

    /// A message counts as trading when it carries a trading keyword, a
    /// ticker, or one of the known glyphs.
    fn is_trading_message(&self, text: &str, patterns: &PatternSet) -> bool {
        let has_keyword = patterns
            .category(PatternCategory::TradingKeyword)
            .iter()
            .filter_map(|p| self.regex_for(p))
            .any(|re| re.is_match(text));

        let has_ticker = patterns
            .category(PatternCategory::Ticker)
            .iter()
            .filter_map(|p| self.regex_for(p))
            .any(|re| re.is_match(text));

        let has_emoji = TRADING_EMOJIS.iter().any(|emoji| text.contains(emoji));

        has_keyword || has_ticker || has_emoji
    }

    /// First ticker by pattern priority; group 1 when the pattern captures,
    /// the whole match otherwise.
    fn extract_ticker(&self, text: &str, patterns: &PatternSet) -> Option<String> {
        for pattern in patterns.category(PatternCategory::Ticker) {
            let Some(re) = self.regex_for(pattern) else {
                continue;
            };
            if let Some(caps) = re.captures(text) {
                let matched = caps.get(1).or_else(|| caps.get(0))?;
                let ticker = matched.as_str().to_uppercase();
                tracing::debug!(ticker = %ticker, pattern = %pattern.name, "Found ticker");
                return Some(ticker);
            }
        }
        None
    }

    /// Classify operation and direction. Exit patterns are probed first;
    /// the matched fragment decides which side was closed.
    fn analyze_operation(&self, text: &str, patterns: &PatternSet) -> (SignalType, Direction) {
        for pattern in patterns.category(PatternCategory::OperationExit) {
            let Some(re) = self.regex_for(pattern) else {
                continue;
            };
            if let Some(caps) = re.captures(text) {
                let fragment = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                tracing::debug!(pattern = %pattern.name, fragment, "Found exit pattern");
                return if self.long_word_re.is_match(fragment) {
                    (SignalType::Exit, Direction::Long)
                } else if self.short_word_re.is_match(fragment) {
                    (SignalType::Exit, Direction::Short)
                } else {
                    (SignalType::Exit, Direction::Mixed)
                };
            }
        }

        for pattern in patterns.category(PatternCategory::DirectionLong) {
            if self.regex_for(pattern).is_some_and(|re| re.is_match(text)) {
                return (SignalType::Entry, Direction::Long);
            }
        }
        for pattern in patterns.category(PatternCategory::DirectionShort) {
            if self.regex_for(pattern).is_some_and(|re| re.is_match(text)) {
                return (SignalType::Entry, Direction::Short);
            }
        }

        // Loose word check when no configured pattern hits
        if self.long_word_re.is_match(text) {
            (SignalType::Entry, Direction::Long)
        } else if self.short_word_re.is_match(text) {
            (SignalType::Entry, Direction::Short)
        } else {
            (SignalType::Entry, Direction::Mixed)
        }
    }

    fn extract_prices(&self, text: &str, patterns: &PatternSet) -> ExtractedPrices {
        ExtractedPrices {
            target: self.extract_price(text, patterns, PatternCategory::PriceTarget),
            stop_loss: self.extract_price(text, patterns, PatternCategory::PriceStop),
            take_profit: self.extract_price(text, patterns, PatternCategory::PriceTake),
        }
    }

    /// First parseable in-range number across the category's patterns.
    /// Decimal comma and point both parse.
    fn extract_price(
        &self,
        text: &str,
        patterns: &PatternSet,
        category: PatternCategory,
    ) -> Option<f64> {
        for pattern in patterns.category(category) {
            let Some(re) = self.regex_for(pattern) else {
                continue;
            };
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
            if let Ok(price) = raw.replace(',', ".").parse::<f64>() {
                if (PRICE_MIN..=PRICE_MAX).contains(&price) {
                    return Some(price);
                }
            }
        }
        None
    }

    fn calculate_confidence(&self, text: &str, direction: Direction) -> f64 {
        let mut confidence = 0.0;

        // Reaching this point means a ticker was found and an operation
        // classified
        confidence += 0.4;
        confidence += 0.2;

        if direction != Direction::Mixed {
            confidence += 0.3;
        }
        if text.split_whitespace().count() > 3 {
            confidence += 0.05;
        }
        let lower = text.to_lowercase();
        if CONFIDENCE_TOKENS.iter().any(|token| lower.contains(token)) {
            confidence += 0.05;
        }

        f64::min(confidence, 1.0)
    }

    /// Every plausible ticker in the text, for the debug payload.
    fn extract_all_tickers(&self, text: &str, patterns: &PatternSet) -> Vec<String> {
        let mut tickers: Vec<String> = Vec::new();
        for pattern in patterns.category(PatternCategory::Ticker) {
            let Some(re) = self.regex_for(pattern) else {
                continue;
            };
            for caps in re.captures_iter(text) {
                let Some(matched) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let candidate = matched.as_str().to_uppercase();
                if (3..=6).contains(&candidate.len())
                    && candidate.chars().all(|c| c.is_ascii_alphabetic())
                    && !TICKER_STOP_WORDS.contains(&candidate.as_str())
                    && !tickers.contains(&candidate)
                {
                    tickers.push(candidate);
                }
            }
        }
        tickers
    }

    fn extract_all_numbers(&self, text: &str) -> Vec<f64> {
        self.number_re
            .find_iter(text)
            .filter_map(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
            .filter(|n| (PRICE_MIN..=PRICE_MAX).contains(n))
            .collect()
    }

    /// Per-category pattern hits, kept in `extracted_data` for diagnosis.
    fn operation_debug(&self, text: &str, patterns: &PatternSet) -> serde_json::Value {
        let collect = |category: PatternCategory| -> Vec<serde_json::Value> {
            patterns
                .category(category)
                .iter()
                .filter_map(|pattern| {
                    let re = self.regex_for(pattern)?;
                    let matches: Vec<String> = re
                        .find_iter(text)
                        .map(|m| m.as_str().to_string())
                        .collect();
                    (!matches.is_empty())
                        .then(|| json!({"pattern": pattern.name, "matches": matches}))
                })
                .collect()
        };

        let direction_words: Vec<String> = self
            .long_word_re
            .find_iter(text)
            .chain(self.short_word_re.find_iter(text))
            .map(|m| m.as_str().to_string())
            .collect();

        json!({
            "exit_matches": collect(PatternCategory::OperationExit),
            "long_matches": collect(PatternCategory::DirectionLong),
            "short_matches": collect(PatternCategory::DirectionShort),
            "direction_words": direction_words,
        })
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

fn case_insensitive(category: PatternCategory) -> bool {
    !matches!(
        category,
        PatternCategory::Ticker | PatternCategory::Author
    )
}

struct ExtractedPrices {
    target: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}
