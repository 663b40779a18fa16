use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracker_core::{ConsensusRule, Direction, IndicatorConditions, Result, TrackerError};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    name: String,
    is_active: bool,
    priority: i32,
    min_traders: i32,
    window_minutes: i32,
    strict_consensus: bool,
    ticker_filter: Option<String>,
    direction_filter: Option<String>,
    min_confidence: Option<f64>,
    min_strength: Option<i32>,
    indicator_conditions: Option<serde_json::Value>,
    notification_settings: Option<serde_json::Value>,
    config: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl RuleRow {
    fn into_rule(self) -> Result<ConsensusRule> {
        let direction_filter = self
            .direction_filter
            .as_deref()
            .map(str::parse::<Direction>)
            .transpose()?;
        let indicator_conditions = self
            .indicator_conditions
            .map(serde_json::from_value::<IndicatorConditions>)
            .transpose()
            .map_err(|e| {
                TrackerError::Validation(format!(
                    "Rule {} has malformed indicator_conditions: {e}",
                    self.id
                ))
            })?;

        Ok(ConsensusRule {
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            priority: self.priority,
            min_traders: self.min_traders,
            window_minutes: self.window_minutes,
            strict_consensus: self.strict_consensus,
            ticker_filter: self.ticker_filter,
            direction_filter,
            min_confidence: self.min_confidence,
            min_strength: self.min_strength,
            indicator_conditions,
            notification_settings: self.notification_settings,
            config: self.config,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
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
}

const RULE_COLUMNS: &str = "id, name, is_active, priority, min_traders, window_minutes, \
                            strict_consensus, ticker_filter, direction_filter, min_confidence, \
                            min_strength, indicator_conditions, notification_settings, config, \
                            created_at";

impl SignalStore {
    /// Active rules in evaluation order: priority descending, newest first on
    /// ties. The first matching rule owns a detected event.
    pub async fn get_active_rules(&self) -> Result<Vec<ConsensusRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM consensus_rules
             WHERE is_active = TRUE
             ORDER BY priority DESC, created_at DESC",
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(RuleRow::into_rule).collect()
    }

    pub async fn get_rule(&self, id: i64) -> Result<Option<ConsensusRule>> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM consensus_rules WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        row.map(RuleRow::into_rule).transpose()
    }

    pub async fn create_rule(&self, new: &NewRule) -> Result<i64> {
        if new.min_traders < 1 {
            return Err(TrackerError::Validation(
                "min_traders must be at least 1".into(),
            ));
        }
        if new.window_minutes < 1 {
            return Err(TrackerError::Validation(
                "window_minutes must be at least 1".into(),
            ));
        }

        let conditions = new
            .indicator_conditions
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| TrackerError::Validation(e.to_string()))?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO consensus_rules (
                name, is_active, priority, min_traders, window_minutes,
                strict_consensus, ticker_filter, direction_filter,
                min_confidence, min_strength, indicator_conditions,
                notification_settings, config
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id",
        )
        .bind(&new.name)
        .bind(new.is_active)
        .bind(new.priority)
        .bind(new.min_traders)
        .bind(new.window_minutes)
        .bind(new.strict_consensus)
        .bind(new.ticker_filter.as_deref())
        .bind(new.direction_filter.map(|d| d.as_str()))
        .bind(new.min_confidence)
        .bind(new.min_strength)
        .bind(conditions)
        .bind(new.notification_settings.as_ref())
        .bind(new.config.as_ref())
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(id)
    }

    pub async fn set_rule_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE consensus_rules SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}
