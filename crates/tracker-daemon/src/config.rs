use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub database_url: String,
    /// Seconds between parsing sweeps.
    pub parse_interval_seconds: u64,
    /// Cap per sweep; unset drains the whole backlog.
    pub parse_batch_limit: Option<i64>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            parse_interval_seconds: env::var("PARSE_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("PARSE_INTERVAL_SECONDS must be an integer")?,
            parse_batch_limit: match env::var("PARSE_BATCH_LIMIT") {
                Ok(raw) => Some(raw.parse().context("PARSE_BATCH_LIMIT must be an integer")?),
                Err(_) => None,
            },
        };

        if config.parse_interval_seconds == 0 {
            anyhow::bail!("PARSE_INTERVAL_SECONDS must be positive");
        }
        if config.parse_batch_limit.is_some_and(|limit| limit <= 0) {
            anyhow::bail!("PARSE_BATCH_LIMIT must be positive when set");
        }

        Ok(config)
    }
}
