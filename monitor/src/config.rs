//! Monitor configuration.
//!
//! Settings are read from `RISKDASH_*` environment variables; anything unset
//! falls back to the defaults below.

use std::env;
use std::time::Duration;

use riskdash_sdk::types::{VarMethod, VarParams, DEFAULT_VAR_ALPHA, DEFAULT_VAR_LOOKBACK};
use riskdash_sdk::{ClientConfig, SessionConfig, StreamConfig};
use serde::{Deserialize, Serialize};

/// Environment variable names.
pub mod vars {
    /// REST base URL.
    pub const API_URL: &str = "RISKDASH_API_URL";
    /// Streaming URL.
    pub const WS_URL: &str = "RISKDASH_WS_URL";
    /// Bearer token.
    pub const TOKEN: &str = "RISKDASH_TOKEN";
    /// Reconnect delay in seconds.
    pub const RECONNECT_DELAY_SECS: &str = "RISKDASH_RECONNECT_DELAY_SECS";
    /// Reconnect attempt cap.
    pub const MAX_RECONNECT_ATTEMPTS: &str = "RISKDASH_MAX_RECONNECT_ATTEMPTS";
    /// VaR method.
    pub const VAR_METHOD: &str = "RISKDASH_VAR_METHOD";
    /// VaR confidence level.
    pub const VAR_ALPHA: &str = "RISKDASH_VAR_ALPHA";
    /// VaR lookback in days.
    pub const VAR_LOOKBACK: &str = "RISKDASH_VAR_LOOKBACK";
    /// VaR refresh interval in seconds.
    pub const VAR_REFRESH_SECS: &str = "RISKDASH_VAR_REFRESH_SECS";
}

/// Configuration for the monitor service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// REST base URL.
    pub api_url: String,

    /// Streaming URL.
    pub ws_url: String,

    /// Bearer token.
    pub token: Option<String>,

    /// Delay between reconnect attempts in seconds.
    pub reconnect_delay_secs: u64,

    /// Reconnect attempt cap (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,

    /// VaR method.
    pub var_method: VarMethod,

    /// VaR confidence level.
    pub var_alpha: f64,

    /// VaR lookback in trading days.
    pub var_lookback: u32,

    /// VaR refresh interval in seconds.
    pub var_refresh_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: riskdash_sdk::client::config::DEFAULT_BASE_URL.to_string(),
            ws_url: riskdash_sdk::ws::config::DEFAULT_WS_URL.to_string(),
            token: None,
            reconnect_delay_secs: riskdash_sdk::ws::config::DEFAULT_RECONNECT_DELAY_SECS,
            max_reconnect_attempts: None,
            var_method: VarMethod::Historical,
            var_alpha: DEFAULT_VAR_ALPHA,
            var_lookback: DEFAULT_VAR_LOOKBACK,
            var_refresh_secs: 60,
        }
    }
}

impl MonitorConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result is
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(vars::API_URL) {
            config.api_url = url;
        }
        if let Some(url) = get(vars::WS_URL) {
            config.ws_url = url;
        }
        config.token = get(vars::TOKEN);

        if let Some(raw) = get(vars::RECONNECT_DELAY_SECS) {
            config.reconnect_delay_secs = parse(vars::RECONNECT_DELAY_SECS, &raw)?;
        }
        if let Some(raw) = get(vars::MAX_RECONNECT_ATTEMPTS) {
            config.max_reconnect_attempts = Some(parse(vars::MAX_RECONNECT_ATTEMPTS, &raw)?);
        }
        if let Some(raw) = get(vars::VAR_METHOD) {
            config.var_method = VarMethod::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: vars::VAR_METHOD.to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get(vars::VAR_ALPHA) {
            config.var_alpha = parse(vars::VAR_ALPHA, &raw)?;
        }
        if let Some(raw) = get(vars::VAR_LOOKBACK) {
            config.var_lookback = parse(vars::VAR_LOOKBACK, &raw)?;
        }
        if let Some(raw) = get(vars::VAR_REFRESH_SECS) {
            config.var_refresh_secs = parse(vars::VAR_REFRESH_SECS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the VaR refresh interval.
    #[must_use]
    pub fn with_var_refresh(mut self, secs: u64) -> Self {
        self.var_refresh_secs = secs;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidReconnectDelay);
        }

        if !(self.var_alpha > 0.0 && self.var_alpha < 1.0) {
            return Err(ConfigError::InvalidVarAlpha(self.var_alpha));
        }

        if self.var_lookback == 0 {
            return Err(ConfigError::InvalidVarLookback);
        }

        if self.var_refresh_secs == 0 {
            return Err(ConfigError::InvalidRefreshInterval);
        }

        self.session_config()
            .validate()
            .map_err(|e| ConfigError::Session(e.to_string()))
    }

    /// Builds the session configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut client = ClientConfig::new(&self.api_url);
        let mut stream = StreamConfig::new(&self.ws_url)
            .with_reconnect_delay(Duration::from_secs(self.reconnect_delay_secs));

        if let Some(attempts) = self.max_reconnect_attempts {
            stream = stream.with_max_reconnect_attempts(attempts);
        }
        if let Some(token) = &self.token {
            client = client.with_token(token.clone());
            stream = stream.with_token(token.clone());
        }

        SessionConfig::new(client, stream)
    }

    /// Returns the VaR request parameters.
    #[must_use]
    pub fn var_params(&self) -> VarParams {
        VarParams {
            method: self.var_method,
            alpha: self.var_alpha,
            lookback: self.var_lookback,
        }
    }

    /// Returns the VaR refresh interval.
    #[must_use]
    pub fn var_refresh(&self) -> Duration {
        Duration::from_secs(self.var_refresh_secs)
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },

    /// Invalid reconnect delay.
    #[error("reconnect_delay_secs must be > 0")]
    InvalidReconnectDelay,

    /// Invalid VaR confidence level.
    #[error("var_alpha must be in (0, 1), got {0}")]
    InvalidVarAlpha(f64),

    /// Invalid VaR lookback.
    #[error("var_lookback must be > 0")]
    InvalidVarLookback,

    /// Invalid refresh interval.
    #[error("var_refresh_secs must be > 0")]
    InvalidRefreshInterval,

    /// The derived session configuration is invalid.
    #[error("invalid session configuration: {0}")]
    Session(String),
}
