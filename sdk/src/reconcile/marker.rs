//! Recency markers.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body fields that may carry a recency marker, in priority order.
const MARKER_FIELDS: [&str; 4] = ["sequence", "timestamp", "as_of", "generated_at"];

/// Monotonic recency marker attached to snapshots and deltas.
///
/// Larger is newer. Sequence numbers are used as-is; timestamps are
/// converted to milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecencyMarker(i64);

impl RecencyMarker {
    /// Older than every other marker.
    pub const MIN: Self = Self(i64::MIN);

    /// Creates a marker from a raw value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Marker for the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Parses an ISO 8601 timestamp.
    ///
    /// Timestamps without an offset are taken as UTC, which is what the
    /// backend emits.
    #[must_use]
    pub fn from_timestamp(text: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(dt.timestamp_millis()));
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }

    /// Reads a marker from a response body, if it carries one.
    #[must_use]
    pub fn from_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        MARKER_FIELDS.iter().find_map(|field| match object.get(*field)? {
            Value::Number(n) => n.as_i64().map(Self),
            Value::String(s) => Self::from_timestamp(s),
            _ => None,
        })
    }
}

impl fmt::Display for RecencyMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecencyMarker {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
