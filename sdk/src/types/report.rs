//! Report and AI summary types.

use serde::{Deserialize, Serialize};

use super::risk::{DEFAULT_VAR_ALPHA, DEFAULT_VAR_LOOKBACK};

/// Body of `POST /llm/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    /// VaR confidence level.
    pub alpha: f64,
    /// VaR lookback in trading days.
    pub lookback_days: u32,
    /// Whether the backend should persist the summary as a report.
    pub save_report: bool,
}

impl Default for SummaryRequest {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_VAR_ALPHA,
            lookback_days: DEFAULT_VAR_LOOKBACK,
            save_report: true,
        }
    }
}

/// Response of `POST /llm/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    /// Generated summary text.
    pub summary: String,
    /// Account the summary covers.
    pub account_id: String,
    /// Generation time (ISO 8601).
    pub generated_at: String,
    /// Parameters used by the backend.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Identifier of the saved report, if any.
    #[serde(default)]
    pub report_id: Option<i64>,
}

/// A stored report (`GET /reports`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report identifier.
    pub id: i64,
    /// Owning account.
    pub account_id: String,
    /// Valuation date (ISO 8601).
    pub as_of_date: String,
    /// Report type, e.g. `llm_risk_summary`.
    pub report_type: String,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Summary text.
    #[serde(default)]
    pub summary_text: Option<String>,
    /// Producer of the report.
    #[serde(default)]
    pub generated_by: Option<String>,
    /// Creation time (ISO 8601).
    pub created_at: String,
}
