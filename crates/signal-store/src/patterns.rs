use serde::{Deserialize, Serialize};
use tracker_core::{ParsingPattern, PatternCategory, Result, TrackerError};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: i64,
    name: String,
    category: String,
    pattern: String,
    priority: i32,
    is_active: bool,
    description: Option<String>,
}

impl PatternRow {
    fn into_pattern(self) -> Result<ParsingPattern> {
        Ok(ParsingPattern {
            id: self.id,
            name: self.name,
            category: self.category.parse::<PatternCategory>()?,
            pattern: self.pattern,
            priority: self.priority,
            is_active: self.is_active,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPattern {
    pub name: String,
    pub category: PatternCategory,
    pub pattern: String,
    pub priority: i32,
    pub is_active: bool,
    pub description: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternUpdate {
    pub pattern: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

/// Creation and update reject regexes that do not compile; the parser never
/// sees an invalid pattern through the management path.
fn validate_regex(name: &str, pattern: &str) -> Result<()> {
    regex::Regex::new(pattern).map_err(|e| TrackerError::PatternCompile {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

impl SignalStore {
    /// All active patterns ordered by category, then priority descending.
    pub async fn get_active_patterns(&self) -> Result<Vec<ParsingPattern>> {
        let rows = sqlx::query_as::<_, PatternRow>(
            "SELECT id, name, category, pattern, priority, is_active, description
             FROM parsing_patterns
             WHERE is_active = TRUE
             ORDER BY category, priority DESC, name",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(PatternRow::into_pattern).collect()
    }

    pub async fn get_pattern(&self, id: i64) -> Result<Option<ParsingPattern>> {
        let row = sqlx::query_as::<_, PatternRow>(
            "SELECT id, name, category, pattern, priority, is_active, description
             FROM parsing_patterns WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        row.map(PatternRow::into_pattern).transpose()
    }

    pub async fn create_pattern(&self, new: &NewPattern) -> Result<i64> {
        validate_regex(&new.name, &new.pattern)?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO parsing_patterns (name, category, pattern, priority, is_active, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&new.name)
        .bind(new.category.as_str())
        .bind(&new.pattern)
        .bind(new.priority)
        .bind(new.is_active)
        .bind(new.description.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(id)
    }

    pub async fn update_pattern(&self, id: i64, update: &PatternUpdate) -> Result<bool> {
        if let Some(pattern) = update.pattern.as_deref() {
            validate_regex(&format!("pattern #{id}"), pattern)?;
        }

        let result = sqlx::query(
            "UPDATE parsing_patterns SET
                 pattern = COALESCE($2, pattern),
                 priority = COALESCE($3, priority),
                 is_active = COALESCE($4, is_active),
                 description = COALESCE($5, description),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.pattern.as_deref())
        .bind(update.priority)
        .bind(update.is_active)
        .bind(update.description.as_deref())
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_pattern(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM parsing_patterns WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip a pattern's active flag; returns the new state.
    pub async fn toggle_pattern(&self, id: i64) -> Result<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE parsing_patterns SET is_active = NOT is_active, updated_at = NOW()
             WHERE id = $1
             RETURNING is_active",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(|(active,)| active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_regex_is_rejected() {
        let err = validate_regex("broken", "[unclosed").unwrap_err();
        assert!(matches!(err, TrackerError::PatternCompile { .. }));
        assert!(validate_regex("ok", r"\b(long|short)\b").is_ok());
    }
}
