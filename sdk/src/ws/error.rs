//! WebSocket error types.
//!
//! Transport failures never surface through these: the connection turns
//! them into state transitions. What remains are caller mistakes and local
//! failures.

use std::fmt;

/// WebSocket errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Invalid configuration.
    InvalidConfig(String),

    /// Event not valid in the current connection state.
    InvalidTransition {
        /// State at the time of the event.
        state: String,
        /// Rejected event.
        event: String,
    },

    /// The connection was closed and cannot be reopened.
    Closed,

    /// Failed to serialize an outbound frame.
    Serialization(String),

    /// The transport could not be opened.
    Connection(String),

    /// WebSocket protocol error.
    Protocol(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::InvalidTransition { state, event } => {
                write!(f, "invalid transition: {} in state {}", event, state)
            }
            Self::Closed => write!(f, "connection closed"),
            Self::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
