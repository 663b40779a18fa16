use consensus_detector::ConsensusDetector;
use serde::Serialize;
use signal_store::SignalStore;
use tracker_core::{RawMessage, Result};

use crate::parser::MessageParser;
use crate::pattern_store::{CacheStats, PatternSet, PatternStore};

/// Messages pulled from the store per page.
const BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ParseErrorEntry {
    pub message_id: i64,
    pub error: String,
}

/// Aggregate outcome of one batch run. Non-trading messages are ordinary
/// traffic and are not listed under `errors`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsingStats {
    pub total_processed: usize,
    pub successful_parses: usize,
    pub failed_parses: usize,
    pub trading_messages: usize,
    pub non_trading_messages: usize,
    pub errors: Vec<ParseErrorEntry>,
}

/// Batch orchestrator: pulls unparsed messages, runs the parser, persists
/// signals, and triggers consensus detection per saved signal. Per-message
/// failures never abort the batch.
pub struct MessageParsingService {
    db: SignalStore,
    parser: MessageParser,
    patterns: PatternStore,
    detector: ConsensusDetector,
}

impl MessageParsingService {
    pub fn new(db: SignalStore) -> Self {
        Self {
            parser: MessageParser::new(),
            patterns: PatternStore::new(db.clone()),
            detector: ConsensusDetector::new(db.clone()),
            db,
        }
    }

    /// Parse every unprocessed message, up to `limit` when given, paging
    /// through the backlog in batches.
    pub async fn parse_all_unprocessed(&self, limit: Option<i64>) -> Result<ParsingStats> {
        let mut stats = ParsingStats::default();
        let mut remaining = limit;

        loop {
            let page = remaining.map_or(BATCH_SIZE, |r| r.min(BATCH_SIZE));
            if page <= 0 {
                break;
            }

            let messages = self.db.get_unparsed_messages(page).await?;
            if messages.is_empty() {
                break;
            }

            let snapshot = self.patterns.snapshot().await?;
            let mut marked = 0usize;

            for message in &messages {
                if self.process_message(message, &snapshot, &mut stats).await {
                    marked += 1;
                }
            }

            // Nothing in this page could be marked processed; bail rather
            // than pull the same rows forever.
            if marked == 0 {
                tracing::warn!("No messages could be marked processed, stopping batch");
                break;
            }

            if let Some(r) = remaining.as_mut() {
                *r -= messages.len() as i64;
                if *r <= 0 {
                    break;
                }
            }
        }

        tracing::info!(
            total = stats.total_processed,
            successful = stats.successful_parses,
            failed = stats.failed_parses,
            non_trading = stats.non_trading_messages,
            "Parsing completed"
        );
        Ok(stats)
    }

    /// Reparse the whole message history. With `force` the existing signals
    /// and signal results are deleted first; either way the processed flags
    /// are cleared and the batch flow re-runs.
    pub async fn reparse_all(&self, force: bool) -> Result<ParsingStats> {
        if force {
            let signals = self.db.delete_all_signals().await?;
            let results = self.db.delete_all_signal_results().await?;
            tracing::info!(signals, results, "Deleted existing signals for forced reparse");
        }

        let reset = self.db.reset_message_processed().await?;
        tracing::info!(reset, "Reset processing flags for reparse");

        self.parse_all_unprocessed(None).await
    }

    /// Parse one message without persisting anything. The diagnostics path.
    pub async fn parse_message(
        &self,
        message: &RawMessage,
    ) -> Result<std::result::Result<tracker_core::SignalDraft, crate::parser::ParseRejection>>
    {
        let snapshot = self.patterns.snapshot().await?;
        Ok(self.parser.parse(message, &snapshot))
    }

    /// Drop the pattern cache and compiled regexes; the next parse re-reads
    /// patterns from the database.
    pub fn reload_patterns(&self) -> Result<()> {
        self.patterns.reload()?;
        self.parser.clear_compiled();
        Ok(())
    }

    pub fn pattern_cache_stats(&self) -> Result<CacheStats> {
        self.patterns.cache_stats()
    }

    pub async fn unparsed_count(&self) -> Result<i64> {
        self.db.unparsed_count().await
    }

    /// Handle one message; returns whether its processed flag was set.
    async fn process_message(
        &self,
        message: &RawMessage,
        patterns: &PatternSet,
        stats: &mut ParsingStats,
    ) -> bool {
        stats.total_processed += 1;

        match self.parser.parse(message, patterns) {
            Ok(draft) => match self.db.save_signal(&draft).await {
                Ok(signal_id) => {
                    stats.successful_parses += 1;
                    stats.trading_messages += 1;
                    let marked = self.mark(message.id, true, stats).await;

                    // A detection failure must not fail the batch or mark a
                    // successfully parsed message as failed.
                    match self.detector.check_new_signal(signal_id).await {
                        Ok(Some(detected)) => {
                            tracing::info!(
                                consensus_id = %detected.consensus_id,
                                ticker = %detected.ticker,
                                "Consensus created"
                            );
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(
                                %signal_id,
                                error = %e,
                                "Failed to check consensus for signal"
                            );
                        }
                    }
                    marked
                }
                Err(e) => {
                    stats.failed_parses += 1;
                    stats.errors.push(ParseErrorEntry {
                        message_id: message.id,
                        error: e.to_string(),
                    });
                    self.mark(message.id, false, stats).await
                }
            },
            Err(rejection) => {
                stats.failed_parses += 1;
                if rejection.is_non_trading() {
                    stats.non_trading_messages += 1;
                } else {
                    stats.errors.push(ParseErrorEntry {
                        message_id: message.id,
                        error: rejection.message().to_string(),
                    });
                }
                self.mark(message.id, false, stats).await
            }
        }
    }

    async fn mark(&self, message_id: i64, success: bool, stats: &mut ParsingStats) -> bool {
        match self.db.mark_message_processed(message_id, success).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(message_id, error = %e, "Failed to mark message processed");
                stats.errors.push(ParseErrorEntry {
                    message_id,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
