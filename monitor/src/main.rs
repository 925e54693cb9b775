//! Riskdash Monitor binary.
//!
//! Entry point for the headless monitor that keeps a live session against the
//! riskdash backend and logs portfolio state.

use std::sync::Arc;

use riskdash_monitor::{MonitorConfig, MonitorService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,riskdash_sdk=debug,riskdash_monitor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = MonitorConfig::from_env()?;

    tracing::info!("Starting riskdash monitor");
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("Stream URL: {}", config.ws_url);
    tracing::info!(
        "VaR: {} at {} over {} days, every {}s",
        config.var_method,
        config.var_alpha,
        config.var_lookback,
        config.var_refresh_secs
    );

    let service = Arc::new(MonitorService::new(config)?);

    let stopper = Arc::clone(&service);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutting down riskdash monitor");
        stopper.stop();
    });

    service.run().await?;

    let metrics = service.metrics().snapshot();
    tracing::info!(
        "Monitor stopped after {:?}: {} ticks, {} alerts, {} VaR refreshes ({} failed)",
        metrics.uptime,
        metrics.price_ticks,
        metrics.alerts,
        metrics.var_refreshes,
        metrics.var_failures
    );

    Ok(())
}
