use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrackerError;

/// Trade side extracted from a message. `Mixed` means the text did not commit
/// to a side (or an exit closed both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Mixed,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
            Direction::Mixed => "mixed",
        }
    }
}

impl FromStr for Direction {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            "mixed" => Ok(Direction::Mixed),
            other => Err(TrackerError::Validation(format!(
                "Unknown direction: {other}"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Entry,
    Exit,
    Update,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Entry => "entry",
            SignalType::Exit => "exit",
            SignalType::Update => "update",
        }
    }
}

impl FromStr for SignalType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(SignalType::Entry),
            "exit" => Ok(SignalType::Exit),
            "update" => Ok(SignalType::Update),
            other => Err(TrackerError::Validation(format!(
                "Unknown signal type: {other}"
            ))),
        }
    }
}

/// Candle timeframe. The closed set the market-data vendor delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
}

impl CandleInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Min1 => "1min",
            CandleInterval::Min5 => "5min",
            CandleInterval::Hour => "hour",
            CandleInterval::Day => "day",
        }
    }
}

impl FromStr for CandleInterval {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(CandleInterval::Min1),
            "5min" => Ok(CandleInterval::Min5),
            "hour" => Ok(CandleInterval::Hour),
            "day" => Ok(CandleInterval::Day),
            other => Err(TrackerError::Validation(format!(
                "Unknown candle interval: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusStatus {
    Active,
    Closed,
    Expired,
}

impl ConsensusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusStatus::Active => "active",
            ConsensusStatus::Closed => "closed",
            ConsensusStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Timeout,
    Manual,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Timeout => "timeout",
            ExitReason::Manual => "manual",
        }
    }
}

/// One raw chat message as the scraper stored it. Unique on
/// `(channel_id, message_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub author: Option<String>,
    pub is_processed: bool,
    pub parse_success: Option<bool>,
}

/// A parsed trade signal. Immutable once saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSignal {
    pub id: Uuid,
    pub raw_message_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub channel_id: i64,
    pub trader_id: Option<i64>,
    pub author: Option<String>,
    pub ticker: String,
    pub figi: Option<String>,
    pub direction: Direction,
    pub signal_type: SignalType,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub confidence_score: f64,
    pub parser_version: String,
    pub original_text: String,
    pub extracted_data: Option<serde_json::Value>,
}

/// Parser output before persistence assigns an id and resolves the trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDraft {
    pub raw_message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub channel_id: i64,
    pub author: Option<String>,
    pub ticker: String,
    pub direction: Direction,
    pub signal_type: SignalType,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub confidence_score: f64,
    pub parser_version: String,
    pub original_text: String,
    pub extracted_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trader {
    pub id: i64,
    pub name: String,
    pub channel_id: Option<i64>,
    pub is_active: bool,
}

/// A chat channel the scraper follows. The registry lives here so ingestion
/// and parsing share one source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: i64,
    pub name: String,
    pub username: Option<String>,
    pub is_enabled: bool,
    pub messages_count: i64,
    pub last_message_id: Option<i64>,
}

/// A tradable instrument keyed by FIGI so price data survives ticker renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub figi: String,
    pub ticker: String,
    pub name: String,
    pub instrument_type: String,
    pub currency: Option<String>,
    pub lot: Option<i32>,
    pub is_active: bool,
}

/// OHLCV bar. Prices are positive and `low <= min(open, close)`,
/// `high >= max(open, close)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Candle {
    pub fn is_valid(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        self.low > 0.0 && self.low <= body_low && body_high <= self.high
    }
}

/// Categories of parsing patterns the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Ticker,
    TradingKeyword,
    Author,
    OperationExit,
    DirectionLong,
    DirectionShort,
    PriceTarget,
    PriceStop,
    PriceTake,
    Garbage,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Ticker => "ticker",
            PatternCategory::TradingKeyword => "trading_keyword",
            PatternCategory::Author => "author",
            PatternCategory::OperationExit => "operation_exit",
            PatternCategory::DirectionLong => "direction_long",
            PatternCategory::DirectionShort => "direction_short",
            PatternCategory::PriceTarget => "price_target",
            PatternCategory::PriceStop => "price_stop",
            PatternCategory::PriceTake => "price_take",
            PatternCategory::Garbage => "garbage",
        }
    }
}

impl FromStr for PatternCategory {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticker" => Ok(PatternCategory::Ticker),
            "trading_keyword" => Ok(PatternCategory::TradingKeyword),
            "author" => Ok(PatternCategory::Author),
            "operation_exit" => Ok(PatternCategory::OperationExit),
            "direction_long" => Ok(PatternCategory::DirectionLong),
            "direction_short" => Ok(PatternCategory::DirectionShort),
            "price_target" => Ok(PatternCategory::PriceTarget),
            "price_stop" => Ok(PatternCategory::PriceStop),
            "price_take" => Ok(PatternCategory::PriceTake),
            "garbage" => Ok(PatternCategory::Garbage),
            other => Err(TrackerError::Validation(format!(
                "Unknown pattern category: {other}"
            ))),
        }
    }
}

/// A database-resident regular expression. Stored uncompiled; the parser
/// compiles lazily at match time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingPattern {
    pub id: i64,
    pub name: String,
    pub category: PatternCategory,
    pub pattern: String,
    pub priority: i32,
    pub is_active: bool,
    pub description: Option<String>,
}

/// Per-indicator predicate attached to a consensus rule. Absent or disabled
/// sections pass trivially.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<RsiCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<SignalCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<SignalCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obv: Option<SignalCondition>,
}

impl IndicatorConditions {
    /// True when no enabled predicate exists, i.e. the gate passes trivially.
    pub fn is_empty(&self) -> bool {
        !self.rsi.as_ref().is_some_and(|c| c.enabled)
            && !self.macd.as_ref().is_some_and(|c| c.enabled)
            && !self.bollinger.as_ref().is_some_and(|c| c.enabled)
            && !self.obv.as_ref().is_some_and(|c| c.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiCondition {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCondition {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// A consensus detection rule. Rules are evaluated in priority order; the
/// first match owns the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRule {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub priority: i32,
    pub min_traders: i32,
    pub window_minutes: i32,
    pub strict_consensus: bool,
    pub ticker_filter: Option<String>,
    pub direction_filter: Option<Direction>,
    pub min_confidence: Option<f64>,
    pub min_strength: Option<i32>,
    pub indicator_conditions: Option<IndicatorConditions>,
    pub notification_settings: Option<serde_json::Value>,
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ConsensusRule {
    /// Tickers from the CSV filter, uppercased. Empty when no filter is set.
    pub fn filter_tickers(&self) -> Vec<String> {
        self.ticker_filter
            .as_deref()
            .map(|csv| {
                csv.split(',')
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusMetadata {
    pub authors: Vec<String>,
    pub trigger_signal_id: Uuid,
    pub total_signals: usize,
}

/// A detected consensus: several distinct authors on the same side of the
/// same ticker within one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusEvent {
    pub id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub traders_count: i32,
    pub window_minutes: i32,
    pub rule_id: Option<i64>,
    pub first_signal_at: DateTime<Utc>,
    pub last_signal_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub avg_entry_price: Option<f64>,
    pub min_entry_price: Option<f64>,
    pub max_entry_price: Option<f64>,
    pub price_spread_pct: Option<f64>,
    pub consensus_strength: i32,
    pub status: ConsensusStatus,
    pub metadata: ConsensusMetadata,
}

/// Junction row tying a signal into a consensus event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSignal {
    pub consensus_id: Uuid,
    pub signal_id: Uuid,
    pub is_initiator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacktestStatus {
    Running,
    Completed,
    Failed,
}

impl BacktestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BacktestStatus::Running => "running",
            BacktestStatus::Completed => "completed",
            BacktestStatus::Failed => "failed",
        }
    }
}

impl FromStr for BacktestStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(BacktestStatus::Running),
            "completed" => Ok(BacktestStatus::Completed),
            "failed" => Ok(BacktestStatus::Failed),
            other => Err(TrackerError::Validation(format!(
                "Unknown backtest status: {other}"
            ))),
        }
    }
}

/// Persisted outcome of one backtest run. `consensus_details` holds the
/// per-trade records, `results_by_ticker` the per-ticker rollups, both as
/// JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusBacktestRecord {
    pub id: Uuid,
    pub rule_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub tickers: Option<String>,
    pub total_consensus_found: i32,
    pub profitable_count: i32,
    pub loss_count: i32,
    pub win_rate: f64,
    pub avg_profit_pct: f64,
    pub avg_loss_pct: f64,
    pub max_profit_pct: f64,
    pub max_loss_pct: f64,
    pub total_return_pct: f64,
    pub total_profit_abs: f64,
    pub results_by_ticker: serde_json::Value,
    pub consensus_details: serde_json::Value,
    pub execution_time_seconds: f64,
    pub status: BacktestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_str() {
        for d in [Direction::Long, Direction::Short, Direction::Mixed] {
            assert_eq!(d.as_str().parse::<Direction>().unwrap(), d);
        }
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn interval_round_trips_through_str() {
        for i in [
            CandleInterval::Min1,
            CandleInterval::Min5,
            CandleInterval::Hour,
            CandleInterval::Day,
        ] {
            assert_eq!(i.as_str().parse::<CandleInterval>().unwrap(), i);
        }
    }

    #[test]
    fn candle_validity() {
        let candle = Candle {
            time: Utc::now(),
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 101.0,
            volume: 1000,
        };
        assert!(candle.is_valid());

        let inverted = Candle {
            high: 99.5,
            ..candle.clone()
        };
        assert!(!inverted.is_valid());

        let negative = Candle {
            low: -1.0,
            ..candle
        };
        assert!(!negative.is_valid());
    }

    #[test]
    fn indicator_conditions_empty_when_disabled() {
        let mut conditions = IndicatorConditions::default();
        assert!(conditions.is_empty());

        conditions.rsi = Some(RsiCondition {
            enabled: false,
            min: Some(30.0),
            max: Some(70.0),
        });
        assert!(conditions.is_empty());

        conditions.rsi.as_mut().unwrap().enabled = true;
        assert!(!conditions.is_empty());
    }

    #[test]
    fn rule_filter_tickers_parses_csv() {
        let rule = ConsensusRule {
            id: 1,
            name: "test".to_string(),
            is_active: true,
            priority: 100,
            min_traders: 2,
            window_minutes: 10,
            strict_consensus: true,
            ticker_filter: Some("sber, GAZP ,tsla".to_string()),
            direction_filter: None,
            min_confidence: None,
            min_strength: None,
            indicator_conditions: None,
            notification_settings: None,
            config: None,
            created_at: Utc::now(),
        };
        assert_eq!(rule.filter_tickers(), vec!["SBER", "GAZP", "TSLA"]);
    }

    #[test]
    fn indicator_conditions_deserialize_from_rule_json() {
        let raw = serde_json::json!({
            "rsi": {"enabled": true, "min": 30, "max": 70},
            "macd": {"enabled": true, "signal": "bullish_crossover"}
        });
        let conditions: IndicatorConditions = serde_json::from_value(raw).unwrap();
        assert!(!conditions.is_empty());
        assert_eq!(conditions.rsi.unwrap().max, Some(70.0));
        assert_eq!(
            conditions.macd.unwrap().signal.as_deref(),
            Some("bullish_crossover")
        );
        assert!(conditions.bollinger.is_none());
    }
}
