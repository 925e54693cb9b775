//! P&L types.

use serde::{Deserialize, Serialize};

/// Portfolio P&L summary (`GET /pnl/summary`, `pnl_update` frames).
///
/// Streamed updates carry the day-change fields as well; the REST summary
/// does not, hence the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    /// Unrealized P&L.
    pub unrealized_pnl: f64,

    /// Realized P&L.
    pub realized_pnl: f64,

    /// Total P&L.
    pub total_pnl: f64,

    /// Portfolio market value.
    pub portfolio_value: f64,

    /// Account the figures belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Absolute change since the previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_change: Option<f64>,

    /// Percentage change since the previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_change_pct: Option<f64>,
}

/// One point of the P&L time series (`GET /pnl/timeseries`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    /// ISO date.
    pub date: String,
    /// Unrealized P&L.
    pub unrealized_pnl: f64,
    /// Realized P&L.
    pub realized_pnl: f64,
    /// Total P&L.
    pub total_pnl: f64,
    /// Portfolio market value.
    pub portfolio_value: f64,
}

/// A position's contribution to P&L (`GET /pnl/contributors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlContributor {
    /// Instrument symbol.
    pub symbol: String,
    /// Contribution to total P&L.
    #[serde(alias = "pnl")]
    pub contribution: f64,
    /// Any additional fields reported by the backend.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
