//! Last-good value retention.
//!
//! On-demand panels (VaR, summaries) keep showing the last successful result
//! when a refresh fails, alongside the error that made it stale.

use std::fmt;

use chrono::{DateTime, Utc};

/// Last successful value of an on-demand request.
#[derive(Debug, Clone, PartialEq)]
pub struct LastGood<T> {
    value: Option<T>,
    error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for LastGood<T> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            updated_at: None,
        }
    }
}

impl<T: Clone> LastGood<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last successful value.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns the error of the most recent refresh, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns when the value was last replaced.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns true if a value is shown but the latest refresh failed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.value.is_some() && self.error.is_some()
    }

    /// Records a refresh result. Success replaces the value and clears the
    /// error; failure keeps the value and records the error.
    pub fn update<E: fmt::Display>(&mut self, result: &Result<T, E>) {
        match result {
            Ok(value) => {
                self.value = Some(value.clone());
                self.error = None;
                self.updated_at = Some(Utc::now());
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}
