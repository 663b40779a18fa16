use sqlx::postgres::{PgPool, PgPoolOptions};
use tracker_core::{Result, TrackerError};

/// Persistence facade over the tracker schema. One concrete method per
/// operation the pipeline consumes; every mutation runs inside a scoped
/// transaction or a single statement.
#[derive(Clone)]
pub struct SignalStore {
    pool: PgPool,
}

impl SignalStore {
    /// Connect to Postgres and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| TrackerError::Fatal(format!("Database connection failed: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (tests, shared pools).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables if they don't exist. sqlx does not run multi-statement
    /// scripts, so the embedded schema is split and executed one by one.
    pub async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&self.pool)
                    .await
                    .map_err(map_db_err)?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Liveness probe plus row counts across the main tables.
    pub async fn health_check(&self) -> Result<SystemStatistics> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM raw_messages),
                    (SELECT COUNT(*) FROM raw_messages WHERE is_processed = FALSE),
                    (SELECT COUNT(*) FROM parsed_signals),
                    (SELECT COUNT(*) FROM traders WHERE is_active = TRUE),
                    (SELECT COUNT(*) FROM consensus_events),
                    (SELECT COUNT(*) FROM candles)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(SystemStatistics {
            total_messages: row.0,
            unparsed_messages: row.1,
            total_signals: row.2,
            active_traders: row.3,
            consensus_events: row.4,
            candles: row.5,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemStatistics {
    pub total_messages: i64,
    pub unparsed_messages: i64,
    pub total_signals: i64,
    pub active_traders: i64,
    pub consensus_events: i64,
    pub candles: i64,
}

/// Split database failures into the retryable and the fatal. Everything the
/// pool can recover from surfaces as `Transient`; connection loss and
/// misconfiguration propagate to the supervisor as `Fatal`.
pub(crate) fn map_db_err(err: sqlx::Error) -> TrackerError {
    match err {
        sqlx::Error::RowNotFound => TrackerError::NotFound("row not found".to_string()),
        sqlx::Error::PoolClosed | sqlx::Error::Configuration(_) => {
            TrackerError::Fatal(err.to_string())
        }
        other => TrackerError::Transient(other.to_string()),
    }
}
