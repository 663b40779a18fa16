use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use signal_store::SignalStore;
use tracker_core::{ParsingPattern, PatternCategory, Result, TrackerError};

/// An immutable snapshot of the active patterns, grouped by category and
/// ordered by priority descending within each group.
#[derive(Debug, Default)]
pub struct PatternSet {
    by_category: HashMap<PatternCategory, Vec<ParsingPattern>>,
}

impl PatternSet {
    pub fn from_patterns(patterns: Vec<ParsingPattern>) -> Self {
        let mut by_category: HashMap<PatternCategory, Vec<ParsingPattern>> = HashMap::new();
        for pattern in patterns {
            by_category.entry(pattern.category).or_default().push(pattern);
        }
        for group in by_category.values_mut() {
            group.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        Self { by_category }
    }

    /// Patterns of one category in priority order; empty when none exist.
    pub fn category(&self, category: PatternCategory) -> &[ParsingPattern] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn category_counts(&self) -> HashMap<&'static str, usize> {
        self.by_category
            .iter()
            .map(|(category, group)| (category.as_str(), group.len()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cache_loaded: bool,
    pub categories_count: usize,
    pub total_patterns: usize,
    pub categories: HashMap<&'static str, usize>,
}

/// Process-wide pattern cache. Loaded lazily on first read; `reload` clears
/// the cache and the next reader swaps in a fresh snapshot. Readers hold an
/// `Arc` snapshot, so a reload never blocks or invalidates parsing in
/// flight.
pub struct PatternStore {
    db: SignalStore,
    cache: RwLock<Option<Arc<PatternSet>>>,
}

impl PatternStore {
    pub fn new(db: SignalStore) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    /// Current snapshot, loading from the database when the cache is cold.
    pub async fn snapshot(&self) -> Result<Arc<PatternSet>> {
        if let Some(set) = self.read_cache()? {
            return Ok(set);
        }

        // Load outside the lock; a concurrent loader doing the same work is
        // harmless, last writer wins.
        let patterns = self.db.get_active_patterns().await?;
        let set = Arc::new(PatternSet::from_patterns(patterns));
        tracing::info!(total = set.total(), "Loaded parsing patterns into cache");

        let mut guard = self
            .cache
            .write()
            .map_err(|_| TrackerError::Fatal("Pattern cache lock poisoned".into()))?;
        *guard = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Drop the cached snapshot; the next `snapshot` call re-reads the
    /// database.
    pub fn reload(&self) -> Result<()> {
        let mut guard = self
            .cache
            .write()
            .map_err(|_| TrackerError::Fatal("Pattern cache lock poisoned".into()))?;
        *guard = None;
        tracing::info!("Pattern cache cleared, will reload on next access");
        Ok(())
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        let snapshot = self.read_cache()?;
        Ok(match snapshot {
            Some(set) => CacheStats {
                cache_loaded: true,
                categories_count: set.category_counts().len(),
                total_patterns: set.total(),
                categories: set.category_counts(),
            },
            None => CacheStats {
                cache_loaded: false,
                categories_count: 0,
                total_patterns: 0,
                categories: HashMap::new(),
            },
        })
    }

    fn read_cache(&self) -> Result<Option<Arc<PatternSet>>> {
        let guard = self
            .cache
            .read()
            .map_err(|_| TrackerError::Fatal("Pattern cache lock poisoned".into()))?;
        Ok(guard.clone())
    }
}

/// One match of a pattern against a test text, for the authoring surface.
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    pub matched: String,
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<String>>,
}

/// Run a candidate pattern against sample text, case-insensitively. Rejects
/// invalid regexes instead of silently matching nothing.
pub fn test_pattern(pattern: &str, text: &str) -> Result<Vec<PatternMatch>> {
    let re = regex::Regex::new(&format!("(?i){pattern}")).map_err(|e| {
        TrackerError::PatternCompile {
            name: "test".to_string(),
            message: e.to_string(),
        }
    })?;

    Ok(re
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).expect("group 0 always present");
            PatternMatch {
                matched: whole.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
                groups: caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|m| m.as_str().to_string()))
                    .collect(),
            }
        })
        .collect())
}
