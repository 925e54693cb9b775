//! Client error types.
//!
//! Transport-level failures are kept apart from application-level HTTP
//! failures so callers can pick a retry policy: the former are retryable,
//! 4xx responses generally are not.

use std::fmt;

/// Client errors.
#[derive(Debug)]
pub enum ClientError {
    /// Network-level failure (DNS, connection refused, reset).
    Transport(reqwest::Error),

    /// Request timed out before a response arrived.
    Timeout,

    /// The API answered with a non-2xx status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Error detail reported by the API.
        message: String,
    },

    /// Response body could not be parsed.
    Parse(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// The request could not be built.
    InvalidRequest(String),
}

impl ClientError {
    /// Returns the HTTP status for application-level errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for connection-level failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }

    /// Returns true if the API rejected the credential (401/403).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// Transport failures and 5xx responses are retryable; 4xx are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Timeout => write!(f, "request timeout"),
            Self::Http { status, message } if *status == 401 || *status == 403 => {
                write!(f, "authentication failed [{}]: {}", status, message)
            }
            Self::Http { status, message } => write!(f, "HTTP error [{}]: {}", status, message),
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = ClientError::Http {
            status: 500,
            message: "VaR calculation failed".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error [500]: VaR calculation failed");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_auth_failure() {
        let err = ClientError::Http {
            status: 401,
            message: "Could not validate credentials".to_string(),
        };
        assert!(err.is_auth_failure());
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "authentication failed [401]: Could not validate credentials"
        );

        let err = ClientError::Http {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_retry_classification() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Timeout.is_transport());

        let server = ClientError::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server.is_retryable());
        assert!(!server.is_transport());

        let not_found = ClientError::Http {
            status: 404,
            message: "Report not found".to_string(),
        };
        assert!(!not_found.is_retryable());

        assert!(!ClientError::Parse("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(ClientError::Timeout.to_string(), "request timeout");
        assert_eq!(ClientError::Timeout.status(), None);
    }
}
