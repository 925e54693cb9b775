//! Monitor metrics.
//!
//! Counters for what the monitor has seen since it started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the monitor service.
#[derive(Debug)]
pub struct MonitorMetrics {
    /// Price ticks received.
    price_ticks: AtomicU64,

    /// Risk alerts received.
    alerts: AtomicU64,

    /// Connection state changes observed.
    connectivity_changes: AtomicU64,

    /// Republished P&L snapshots.
    pnl_snapshots: AtomicU64,

    /// Republished position snapshots.
    position_snapshots: AtomicU64,

    /// Successful VaR refreshes.
    var_refreshes: AtomicU64,

    /// Failed VaR refreshes.
    var_failures: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            price_ticks: AtomicU64::new(0),
            alerts: AtomicU64::new(0),
            connectivity_changes: AtomicU64::new(0),
            pnl_snapshots: AtomicU64::new(0),
            position_snapshots: AtomicU64::new(0),
            var_refreshes: AtomicU64::new(0),
            var_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a batch of price ticks.
    pub fn record_ticks(&self, count: usize) {
        self.price_ticks.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Records a risk alert.
    pub fn record_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection state change.
    pub fn record_connectivity(&self) {
        self.connectivity_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a republished P&L snapshot.
    pub fn record_pnl_snapshot(&self) {
        self.pnl_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a republished positions snapshot.
    pub fn record_position_snapshot(&self) {
        self.position_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a VaR refresh outcome.
    pub fn record_var(&self, success: bool) {
        if success {
            self.var_refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.var_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns price ticks received.
    #[must_use]
    pub fn price_ticks(&self) -> u64 {
        self.price_ticks.load(Ordering::Relaxed)
    }

    /// Returns alerts received.
    #[must_use]
    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    /// Returns connection state changes observed.
    #[must_use]
    pub fn connectivity_changes(&self) -> u64 {
        self.connectivity_changes.load(Ordering::Relaxed)
    }

    /// Returns republished P&L snapshots.
    #[must_use]
    pub fn pnl_snapshots(&self) -> u64 {
        self.pnl_snapshots.load(Ordering::Relaxed)
    }

    /// Returns republished position snapshots.
    #[must_use]
    pub fn position_snapshots(&self) -> u64 {
        self.position_snapshots.load(Ordering::Relaxed)
    }

    /// Returns successful VaR refreshes.
    #[must_use]
    pub fn var_refreshes(&self) -> u64 {
        self.var_refreshes.load(Ordering::Relaxed)
    }

    /// Returns failed VaR refreshes.
    #[must_use]
    pub fn var_failures(&self) -> u64 {
        self.var_failures.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns price ticks per second.
    #[must_use]
    pub fn ticks_per_second(&self) -> f64 {
        let elapsed = self.uptime().as_secs_f64();
        if elapsed > 0.0 {
            self.price_ticks() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MonitorMetricsSnapshot {
        MonitorMetricsSnapshot {
            price_ticks: self.price_ticks(),
            alerts: self.alerts(),
            connectivity_changes: self.connectivity_changes(),
            pnl_snapshots: self.pnl_snapshots(),
            position_snapshots: self.position_snapshots(),
            var_refreshes: self.var_refreshes(),
            var_failures: self.var_failures(),
            uptime: self.uptime(),
            ticks_per_second: self.ticks_per_second(),
        }
    }
}

/// A point-in-time snapshot of monitor metrics.
#[derive(Debug, Clone)]
pub struct MonitorMetricsSnapshot {
    /// Price ticks received.
    pub price_ticks: u64,
    /// Alerts received.
    pub alerts: u64,
    /// Connection state changes.
    pub connectivity_changes: u64,
    /// P&L snapshots.
    pub pnl_snapshots: u64,
    /// Position snapshots.
    pub position_snapshots: u64,
    /// Successful VaR refreshes.
    pub var_refreshes: u64,
    /// Failed VaR refreshes.
    pub var_failures: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Price ticks per second.
    pub ticks_per_second: f64,
}
