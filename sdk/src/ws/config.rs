//! WebSocket configuration.
//!
//! Provides configuration options for the stream connection.

use std::time::Duration;

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/stream";

/// Default reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default idle timeout in seconds.
///
/// The backend answers every ping and sends its own heartbeat after 60
/// seconds of silence, so three missed heartbeats mean the link is gone.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 90;

/// Stream connection configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL of the `/stream` endpoint.
    pub url: String,

    /// Fixed delay between a transport failure and the next attempt.
    pub reconnect_delay: Duration,

    /// Maximum reconnection attempts (None = unlimited).
    pub max_reconnect_attempts: Option<u32>,

    /// Interval between client pings (None = no pings).
    pub heartbeat_interval: Option<Duration>,

    /// Silence after which the link is treated as lost (None = never).
    pub idle_timeout: Option<Duration>,

    /// Optional bearer token sent on the upgrade request.
    pub token: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_attempts: None,
            heartbeat_interval: Some(Duration::from_secs(DEFAULT_HEARTBEAT_SECS)),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            token: None,
        }
    }
}

impl StreamConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets or disables the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets or disables the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), super::error::StreamError> {
        if self.url.is_empty() {
            return Err(super::error::StreamError::InvalidConfig(
                "url cannot be empty".to_string(),
            ));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(super::error::StreamError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(super::error::StreamError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.heartbeat_interval.is_some_and(|d| d.is_zero()) {
            return Err(super::error::StreamError::InvalidConfig(
                "heartbeat_interval must be > 0".to_string(),
            ));
        }

        if self.idle_timeout.is_some_and(|d| d.is_zero()) {
            return Err(super::error::StreamError::InvalidConfig(
                "idle_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
