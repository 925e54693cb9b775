//! Riskdash Monitor - headless consumer of a riskdash session.
//!
//! Keeps one live session against the backend and logs what a dashboard
//! would render: P&L and position snapshots as they are republished, price
//! and alert traffic, connectivity changes and a periodically refreshed VaR
//! figure.
//!
//! # Components
//!
//! - [`config`]: Monitor configuration loaded from the environment
//! - [`metrics`]: Monitor counters
//! - [`service`]: Main monitor service

pub mod config;
pub mod metrics;
pub mod service;

pub use config::{ConfigError, MonitorConfig};
pub use metrics::MonitorMetrics;
pub use service::MonitorService;
