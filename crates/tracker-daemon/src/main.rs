use std::time::Duration;

use anyhow::Result;
use message_parser::MessageParsingService;
use signal_store::SignalStore;
use tokio::time;

mod config;

use config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting signal tracker daemon");

    let config = DaemonConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Parse interval: {}s", config.parse_interval_seconds);
    tracing::info!(
        "  Batch limit: {}",
        config
            .parse_batch_limit
            .map_or("unbounded".to_string(), |l| l.to_string())
    );

    let db = SignalStore::connect(&config.database_url).await?;
    tracing::info!("Database connected, schema ready");

    let service = MessageParsingService::new(db.clone());
    let backlog = service.unparsed_count().await?;
    tracing::info!(backlog, "Parsing service initialized");

    let mut ticker = time::interval(Duration::from_secs(config.parse_interval_seconds));
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.parse_all_unprocessed(config.parse_batch_limit).await {
                    Ok(stats) if stats.total_processed > 0 => {
                        tracing::info!(
                            processed = stats.total_processed,
                            signals = stats.successful_parses,
                            non_trading = stats.non_trading_messages,
                            errors = stats.errors.len(),
                            "Sweep finished"
                        );
                    }
                    Ok(_) => tracing::debug!("No unprocessed messages"),
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "Sweep failed, will retry next interval");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping");
                break;
            }
        }
    }

    Ok(())
}
