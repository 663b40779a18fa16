use chrono::{DateTime, Duration, Utc};
use tracker_core::time::minutes_between_f64;
use tracker_core::{
    ConsensusEvent, ConsensusMetadata, ConsensusSignal, ConsensusStatus, Direction, ParsedSignal,
};
use uuid::Uuid;

/// Parameters a rule (or the defaults) hands to window evaluation.
#[derive(Debug, Clone, Copy)]
pub struct WindowParams {
    pub window_minutes: i32,
    pub min_traders: i32,
    pub strict: bool,
    pub min_confidence: Option<f64>,
}

impl WindowParams {
    /// Fallback parameters when no active rule exists.
    pub fn default_rule() -> Self {
        Self {
            window_minutes: 10,
            min_traders: 2,
            strict: true,
            min_confidence: None,
        }
    }

    /// Symmetric window bounds around a trigger timestamp.
    pub fn bounds(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let half = Duration::seconds(self.window_minutes as i64 * 60 / 2);
        (at - half, at + half)
    }
}

/// A qualifying consensus window: the chosen direction group and its
/// distinct authors.
#[derive(Debug, Clone)]
pub struct ConsensusWindow {
    pub signals: Vec<ParsedSignal>,
    pub direction: Direction,
    pub authors: Vec<String>,
    pub window_minutes: i32,
}

/// Evaluate one window of entry signals around a trigger. Returns `None`
/// when the window does not qualify: too few signals, mixed directions under
/// strict mode, or too few distinct authors in the chosen group.
///
/// Pure over its inputs so the backtester can replay it against historical
/// signal sets.
pub fn evaluate_window(
    trigger: &ParsedSignal,
    window_signals: &[ParsedSignal],
    params: &WindowParams,
) -> Option<ConsensusWindow> {
    let eligible: Vec<&ParsedSignal> = window_signals
        .iter()
        .filter(|s| {
            params
                .min_confidence
                .map_or(true, |min| s.confidence_score >= min)
        })
        .collect();

    if (eligible.len() as i32) < params.min_traders {
        tracing::debug!(
            ticker = %trigger.ticker,
            signals = eligible.len(),
            min = params.min_traders,
            "Not enough signals in window"
        );
        return None;
    }

    // Group by direction, preserving first-encounter order so non-strict
    // ties resolve deterministically.
    let mut groups: Vec<(Direction, Vec<&ParsedSignal>)> = Vec::new();
    for &signal in &eligible {
        match groups.iter_mut().find(|(d, _)| *d == signal.direction) {
            Some((_, members)) => members.push(signal),
            None => groups.push((signal.direction, vec![signal])),
        }
    }

    let (direction, members) = if params.strict {
        if groups.len() > 1 {
            tracing::debug!(
                ticker = %trigger.ticker,
                directions = groups.len(),
                "Mixed directions under strict consensus"
            );
            return None;
        }
        groups.into_iter().next()?
    } else {
        // Dominant group; a tie keeps the first-encountered direction
        let mut best: Option<(Direction, Vec<&ParsedSignal>)> = None;
        for group in groups {
            if best.as_ref().map_or(true, |(_, members)| group.1.len() > members.len()) {
                best = Some(group);
            }
        }
        best?
    };

    let mut authors: Vec<String> = Vec::new();
    for signal in &members {
        if let Some(author) = signal.author.as_deref() {
            if !authors.iter().any(|a| a == author) {
                authors.push(author.to_string());
            }
        }
    }

    if (authors.len() as i32) < params.min_traders {
        tracing::debug!(
            ticker = %trigger.ticker,
            authors = authors.len(),
            min = params.min_traders,
            "Not enough distinct authors"
        );
        return None;
    }

    Some(ConsensusWindow {
        signals: members.into_iter().cloned().collect(),
        direction,
        authors,
        window_minutes: params.window_minutes,
    })
}

/// Consensus strength on a 0-100 scale: base 50, adjusted for author count,
/// price dispersion, and temporal compactness.
pub fn calculate_strength(
    traders_count: usize,
    price_spread_pct: Option<f64>,
    time_span_minutes: Option<f64>,
) -> i32 {
    let mut strength: i32 = 50;

    if traders_count >= 5 {
        strength += 20;
    } else if traders_count >= 4 {
        strength += 10;
    }

    if let Some(spread) = price_spread_pct {
        if spread < 1.0 {
            strength += 15;
        } else if spread < 2.0 {
            strength += 5;
        } else if spread > 5.0 {
            strength -= 10;
        }
    }

    if let Some(span) = time_span_minutes {
        if span < 10.0 {
            strength += 15;
        } else if span < 20.0 {
            strength += 5;
        }
    }

    strength.clamp(0, 100)
}

/// Assemble the persistable event and membership rows from a qualifying
/// window. The trigger's membership row carries `is_initiator`.
pub fn build_event(
    trigger: &ParsedSignal,
    window: &ConsensusWindow,
    rule_id: Option<i64>,
    detected_at: DateTime<Utc>,
) -> (ConsensusEvent, Vec<ConsensusSignal>) {
    let mut signals = window.signals.clone();
    signals.sort_by_key(|s| s.timestamp);

    let first_signal_at = signals.first().map(|s| s.timestamp).unwrap_or(detected_at);
    let last_signal_at = signals.last().map(|s| s.timestamp).unwrap_or(detected_at);

    let prices: Vec<f64> = signals.iter().filter_map(|s| s.target_price).collect();
    let (avg_price, min_price, max_price) = if prices.is_empty() {
        (None, None, None)
    } else {
        let avg = prices.iter().sum::<f64>() / prices.len() as f64;
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (Some(avg), Some(min), Some(max))
    };

    let price_spread_pct = match (avg_price, min_price, max_price) {
        (Some(avg), Some(min), Some(max)) if avg > 0.0 => Some((max - min) / avg * 100.0),
        _ => None,
    };

    let time_span = if signals.len() > 1 {
        Some(minutes_between_f64(first_signal_at, last_signal_at))
    } else {
        None
    };

    let strength = calculate_strength(window.authors.len(), price_spread_pct, time_span);

    let event_id = Uuid::new_v4();
    let event = ConsensusEvent {
        id: event_id,
        ticker: trigger.ticker.clone(),
        direction: window.direction,
        traders_count: window.authors.len() as i32,
        window_minutes: window.window_minutes,
        rule_id,
        first_signal_at,
        last_signal_at,
        detected_at,
        avg_entry_price: avg_price,
        min_entry_price: min_price,
        max_entry_price: max_price,
        price_spread_pct,
        consensus_strength: strength,
        status: ConsensusStatus::Active,
        metadata: ConsensusMetadata {
            authors: window.authors.clone(),
            trigger_signal_id: trigger.id,
            total_signals: signals.len(),
        },
    };

    let members = signals
        .iter()
        .map(|s| ConsensusSignal {
            consensus_id: event_id,
            signal_id: s.id,
            is_initiator: s.id == trigger.id,
        })
        .collect();

    (event, members)
}
