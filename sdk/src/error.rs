//! SDK error types.
//!
//! Aggregates the per-component errors for callers that drive a whole
//! session.

use crate::client::ClientError;
use crate::reconcile::ReconcileError;
use crate::ws::StreamError;

/// SDK errors.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Request client error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Stream connection error.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Reconciliation error.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Invalid session configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session has been torn down.
    #[error("session torn down")]
    TornDown,
}

impl SdkError {
    /// Returns true if trying again later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Client(e) => e.is_retryable(),
            Self::Reconcile(e) => e.is_retryable(),
            Self::Stream(_) | Self::InvalidConfig(_) | Self::TornDown => false,
        }
    }
}
