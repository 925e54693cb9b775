//! Payloads carried by the streaming channels.

use serde::{Deserialize, Serialize};

/// A single price tick from the `prices` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Instrument symbol.
    pub symbol: String,
    /// Last price.
    pub price: f64,
    /// Tick time (ISO 8601).
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Traded volume.
    #[serde(default)]
    pub volume: Option<u64>,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Needs attention.
    Medium,
    /// Limit breached.
    High,
    /// Severity not known to this client.
    #[serde(other)]
    Unknown,
}

/// A risk alert from the `alerts` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    /// Human-readable description.
    pub message: String,
    /// Severity.
    pub severity: AlertSeverity,
    /// Alert category, e.g. `var_threshold`.
    #[serde(default)]
    pub alert_type: Option<String>,
    /// Alert-specific figures.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
