//! Main monitor service.
//!
//! Activates a session, subscribes logging handlers and refreshes the VaR
//! panel until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use riskdash_sdk::registry::{ChannelPayload, HandlerError, SubscriptionHandle, CONNECTIVITY_CHANNEL};
use riskdash_sdk::types::{AlertSeverity, PnlSummary, Position, PriceTick, RiskAlert};
use riskdash_sdk::ws::{ConnectionState, ALERTS_CHANNEL, PRICES_CHANNEL};
use riskdash_sdk::{Domain, SdkError, Session};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ConfigError, MonitorConfig};
use super::metrics::MonitorMetrics;

/// The main monitor service.
pub struct MonitorService {
    /// Configuration.
    config: MonitorConfig,

    /// Metrics.
    metrics: Arc<MonitorMetrics>,

    /// Whether the service is running.
    running: Arc<AtomicBool>,

    /// Cancelled by [`stop`](Self::stop).
    shutdown: CancellationToken,
}

impl MonitorService {
    /// Creates a new monitor service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            metrics: Arc::new(MonitorMetrics::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns true if the service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the service.
    pub fn stop(&self) {
        self.shutdown.cancel();
        info!("Monitor stop requested");
    }

    /// Runs the monitor until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be activated.
    pub async fn run(&self) -> Result<(), SdkError> {
        let session = Session::activate(self.config.session_config()).await?;
        self.running.store(true, Ordering::Relaxed);
        info!("Monitor started, stream {}", session.connection_state());

        let handles = self.subscribe_loggers(&session).await;

        let mut pnl = session.watch(Domain::Pnl).await;
        let mut positions = session.watch(Domain::Positions).await;
        let mut var_timer = tokio::time::interval(self.config.var_refresh());
        let params = self.config.var_params();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = pnl.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = pnl.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        self.metrics.record_pnl_snapshot();
                        match snapshot.decode::<PnlSummary>() {
                            Ok(summary) => info!(
                                "P&L total={:.2} unrealized={:.2} realized={:.2} value={:.2} (at {})",
                                summary.total_pnl,
                                summary.unrealized_pnl,
                                summary.realized_pnl,
                                summary.portfolio_value,
                                snapshot.marker
                            ),
                            Err(e) => warn!("Unreadable P&L snapshot: {}", e),
                        }
                    }
                }
                changed = positions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = positions.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        self.metrics.record_position_snapshot();
                        match snapshot.decode::<Vec<Position>>() {
                            Ok(held) => {
                                let short = held.iter().filter(|p| p.is_short()).count();
                                info!("{} positions ({} short)", held.len(), short);
                            }
                            Err(e) => warn!("Unreadable positions snapshot: {}", e),
                        }
                    }
                }
                _ = var_timer.tick() => {
                    match session.refresh_var(&params).await {
                        Ok(var) => {
                            self.metrics.record_var(true);
                            info!(
                                "VaR {:.2} ({} at {:.0}%, {} days)",
                                var.var_value,
                                var.method,
                                var.confidence_level * 100.0,
                                var.lookback_days
                            );
                        }
                        Err(_) => self.metrics.record_var(false),
                    }
                }
            }
        }

        for handle in handles {
            session.unsubscribe(handle).await;
        }
        session.teardown().await;
        self.running.store(false, Ordering::Relaxed);
        info!("Monitor stopped");

        Ok(())
    }

    /// Subscribes the logging handlers for streamed channels.
    async fn subscribe_loggers(&self, session: &Session) -> Vec<SubscriptionHandle> {
        let mut handles = Vec::new();

        let metrics = Arc::clone(&self.metrics);
        handles.push(
            session
                .subscribe(PRICES_CHANNEL, move |payload: &ChannelPayload| {
                    let ticks: Vec<PriceTick> =
                        serde_json::from_value(payload.data.clone()).map_err(HandlerError::new)?;
                    metrics.record_ticks(ticks.len());
                    for tick in &ticks {
                        debug!("{} {}", tick.symbol, tick.price);
                    }
                    Ok(())
                })
                .await,
        );

        let metrics = Arc::clone(&self.metrics);
        handles.push(
            session
                .subscribe(ALERTS_CHANNEL, move |payload: &ChannelPayload| {
                    let alert: RiskAlert =
                        serde_json::from_value(payload.data.clone()).map_err(HandlerError::new)?;
                    metrics.record_alert();
                    match alert.severity {
                        AlertSeverity::High => warn!("Risk alert: {}", alert.message),
                        _ => info!("Risk alert ({:?}): {}", alert.severity, alert.message),
                    }
                    Ok(())
                })
                .await,
        );

        let metrics = Arc::clone(&self.metrics);
        handles.push(
            session
                .subscribe(CONNECTIVITY_CHANNEL, move |payload: &ChannelPayload| {
                    let state: ConnectionState =
                        serde_json::from_value(payload.data.clone()).map_err(HandlerError::new)?;
                    metrics.record_connectivity();
                    if state.is_offline() {
                        warn!("Live data unavailable: {}", state);
                    }
                    Ok(())
                })
                .await,
        );

        handles
    }
}
