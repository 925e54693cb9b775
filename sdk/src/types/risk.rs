//! Risk types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::Query;

/// Default VaR confidence level.
pub const DEFAULT_VAR_ALPHA: f64 = 0.99;

/// Default VaR lookback in trading days.
pub const DEFAULT_VAR_LOOKBACK: u32 = 250;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarMethod {
    /// Historical simulation.
    #[default]
    Historical,
    /// Variance-covariance.
    Parametric,
    /// Exponentially weighted moving average.
    Ewma,
}

impl VarMethod {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::Parametric => "parametric",
            Self::Ewma => "ewma",
        }
    }

    /// Parses a wire name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "historical" => Some(Self::Historical),
            "parametric" => Some(Self::Parametric),
            "ewma" => Some(Self::Ewma),
            _ => None,
        }
    }
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for `GET /risk/var`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarParams {
    /// Estimation method.
    pub method: VarMethod,
    /// Confidence level.
    pub alpha: f64,
    /// Lookback window in trading days.
    pub lookback: u32,
}

impl Default for VarParams {
    fn default() -> Self {
        Self {
            method: VarMethod::Historical,
            alpha: DEFAULT_VAR_ALPHA,
            lookback: DEFAULT_VAR_LOOKBACK,
        }
    }
}

impl VarParams {
    /// Builds the query string parameters.
    #[must_use]
    pub fn to_query(&self) -> Query {
        Query::new()
            .param("method", self.method.as_str())
            .param("alpha", self.alpha)
            .param("lookback", self.lookback)
    }
}

/// VaR figure returned by `GET /risk/var`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarResult {
    /// Value at Risk.
    pub var_value: f64,
    /// Confidence level used.
    pub confidence_level: f64,
    /// Lookback window used.
    pub lookback_days: u32,
    /// Method used.
    pub method: String,
    /// Portfolio value the figure refers to.
    pub portfolio_value: f64,
}

/// Exposure analysis returned by `GET /risk/exposure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    /// Exposure per asset class.
    pub asset_class_exposure: Vec<serde_json::Value>,
    /// Exposure per currency.
    pub currency_exposure: Vec<serde_json::Value>,
    /// Concentration metrics.
    pub concentration_analysis: serde_json::Value,
}
