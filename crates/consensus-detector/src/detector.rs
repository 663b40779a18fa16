use serde::Serialize;
use signal_store::{ConsensusStatsReport, SignalStore};
use tracker_core::time::now_utc;
use tracker_core::{ConsensusRule, Direction, ParsedSignal, Result, SignalType};
use uuid::Uuid;

use crate::gate::indicator_conditions_met;
use crate::window::{build_event, evaluate_window, WindowParams};

/// Summary handed back to callers when a detection fires.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedConsensus {
    pub consensus_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub traders_count: i32,
    pub window_minutes: i32,
    pub strength: i32,
    pub rule_id: Option<i64>,
}

/// Event-driven consensus detector. Each new entry signal triggers one scan
/// of the symmetric window around it, gated by the active rules.
#[derive(Clone)]
pub struct ConsensusDetector {
    db: SignalStore,
}

impl ConsensusDetector {
    pub fn new(db: SignalStore) -> Self {
        Self { db }
    }

    /// Check whether a freshly saved signal completes a consensus. Returns
    /// `Ok(None)` when nothing fires: non-entry signals, signals already
    /// absorbed into an event (idempotence), and windows that fail every
    /// rule all land there.
    pub async fn check_new_signal(&self, signal_id: Uuid) -> Result<Option<DetectedConsensus>> {
        let Some(signal) = self.db.get_signal(signal_id).await? else {
            tracing::warn!(%signal_id, "Signal not found");
            return Ok(None);
        };

        if signal.signal_type != SignalType::Entry {
            tracing::debug!(%signal_id, "Not an entry signal, skipping");
            return Ok(None);
        }

        if self.db.consensus_signal_exists(signal_id).await? {
            tracing::debug!(%signal_id, "Signal already in a consensus");
            return Ok(None);
        }

        tracing::info!(
            ticker = %signal.ticker,
            direction = %signal.direction,
            author = signal.author.as_deref().unwrap_or("Unknown"),
            "Checking consensus"
        );

        let rules = self.db.get_active_rules().await?;

        if rules.is_empty() {
            tracing::debug!("No active consensus rules, using defaults");
            return self
                .try_window(&signal, &WindowParams::default_rule(), None)
                .await;
        }

        for rule in &rules {
            if !rule_matches_signal(rule, &signal) {
                continue;
            }

            tracing::debug!(rule = %rule.name, priority = rule.priority, "Applying rule");

            let params = WindowParams {
                window_minutes: rule.window_minutes,
                min_traders: rule.min_traders,
                strict: rule.strict_consensus,
                min_confidence: rule.min_confidence,
            };

            if let Some(detected) = self.try_window(&signal, &params, Some(rule)).await? {
                return Ok(Some(detected));
            }
        }

        Ok(None)
    }

    /// Evaluate one rule's window around the trigger and persist the event
    /// if it qualifies.
    async fn try_window(
        &self,
        trigger: &ParsedSignal,
        params: &WindowParams,
        rule: Option<&ConsensusRule>,
    ) -> Result<Option<DetectedConsensus>> {
        let (window_start, window_end) = params.bounds(trigger.timestamp);
        let window_signals = self
            .db
            .signals_in_window(&trigger.ticker, window_start, window_end)
            .await?;

        let Some(window) = evaluate_window(trigger, &window_signals, params) else {
            return Ok(None);
        };

        if let Some(conditions) = rule.and_then(|r| r.indicator_conditions.as_ref()) {
            if !indicator_conditions_met(&self.db, &trigger.ticker, trigger.timestamp, conditions)
                .await?
            {
                tracing::debug!(ticker = %trigger.ticker, "Indicator conditions not met");
                return Ok(None);
            }
        }

        let rule_id = rule.map(|r| r.id);
        let (event, members) = build_event(trigger, &window, rule_id, now_utc());

        if let Some(min_strength) = rule.and_then(|r| r.min_strength) {
            if event.consensus_strength < min_strength {
                tracing::debug!(
                    strength = event.consensus_strength,
                    min_strength,
                    "Consensus below rule strength threshold"
                );
                return Ok(None);
            }
        }

        self.db.save_consensus_event(&event, &members).await?;

        tracing::info!(
            ticker = %event.ticker,
            direction = %event.direction,
            traders = event.traders_count,
            window_minutes = event.window_minutes,
            rule_id = ?rule_id,
            "CONSENSUS DETECTED"
        );

        Ok(Some(DetectedConsensus {
            consensus_id: event.id,
            ticker: event.ticker,
            direction: event.direction,
            traders_count: event.traders_count,
            window_minutes: event.window_minutes,
            strength: event.consensus_strength,
            rule_id,
        }))
    }

    /// Aggregate statistics over detected events.
    pub async fn consensus_stats(
        &self,
        ticker: Option<&str>,
        days_back: i64,
    ) -> Result<ConsensusStatsReport> {
        self.db.consensus_stats(ticker, days_back).await
    }
}

/// Rule-level gates applied before the window is evaluated.
fn rule_matches_signal(rule: &ConsensusRule, signal: &ParsedSignal) -> bool {
    if rule.ticker_filter.is_some() {
        let tickers = rule.filter_tickers();
        if !tickers.iter().any(|t| *t == signal.ticker.to_uppercase()) {
            return false;
        }
    }

    if let Some(filter) = rule.direction_filter {
        if signal.direction != filter {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tracker_core::SignalType;

    fn rule(ticker_filter: Option<&str>, direction_filter: Option<Direction>) -> ConsensusRule {
        ConsensusRule {
            id: 1,
            name: "test".to_string(),
            is_active: true,
            priority: 100,
            min_traders: 2,
            window_minutes: 10,
            strict_consensus: true,
            ticker_filter: ticker_filter.map(str::to_string),
            direction_filter,
            min_confidence: None,
            min_strength: None,
            indicator_conditions: None,
            notification_settings: None,
            config: None,
            created_at: Utc::now(),
        }
    }

    fn signal(ticker: &str, direction: Direction) -> ParsedSignal {
        ParsedSignal {
            id: Uuid::new_v4(),
            raw_message_id: None,
            timestamp: Utc::now(),
            channel_id: 1,
            trader_id: None,
            author: Some("A".to_string()),
            ticker: ticker.to_string(),
            figi: None,
            direction,
            signal_type: SignalType::Entry,
            target_price: None,
            stop_loss: None,
            take_profit: None,
            confidence_score: 0.9,
            parser_version: "1.0.0".to_string(),
            original_text: String::new(),
            extracted_data: None,
        }
    }

    #[test]
    fn unfiltered_rule_matches_everything() {
        assert!(rule_matches_signal(
            &rule(None, None),
            &signal("SBER", Direction::Long)
        ));
    }

    #[test]
    fn ticker_filter_is_case_insensitive_csv() {
        let r = rule(Some("sber, GAZP"), None);
        assert!(rule_matches_signal(&r, &signal("SBER", Direction::Long)));
        assert!(rule_matches_signal(&r, &signal("GAZP", Direction::Short)));
        assert!(!rule_matches_signal(&r, &signal("TSLA", Direction::Long)));
    }

    #[test]
    fn direction_filter_gates_signals() {
        let r = rule(None, Some(Direction::Long));
        assert!(rule_matches_signal(&r, &signal("SBER", Direction::Long)));
        assert!(!rule_matches_signal(&r, &signal("SBER", Direction::Short)));
        assert!(!rule_matches_signal(&r, &signal("SBER", Direction::Mixed)));
    }
}
