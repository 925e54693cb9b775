//! Snapshots, deltas and the domains they describe.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::marker::RecencyMarker;
use crate::registry::ChannelPayload;
use crate::ws::messages::PNL_CHANNEL;

/// Domain objects kept in sync with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Portfolio P&L summary.
    Pnl,
    /// Current positions.
    Positions,
}

impl Domain {
    /// Every domain.
    pub const ALL: [Domain; 2] = [Domain::Pnl, Domain::Positions];

    /// REST path of the baseline snapshot.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Pnl => "/pnl/summary",
            Self::Positions => "/positions",
        }
    }

    /// Channel carrying deltas for this domain, if any.
    #[must_use]
    pub const fn channel(&self) -> Option<&'static str> {
        match self {
            Self::Pnl => Some(PNL_CHANNEL),
            Self::Positions => None,
        }
    }

    /// Returns the domain fed by `channel`.
    #[must_use]
    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.channel() == Some(channel))
    }

    /// Returns the domain name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pnl => "pnl",
            Self::Positions => "positions",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known-complete state of a domain object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Domain described.
    pub domain: Domain,
    /// Full state as returned by the backend, with deltas merged in.
    pub data: Value,
    /// Recency of `data`.
    pub marker: RecencyMarker,
}

impl Snapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(domain: Domain, data: Value, marker: RecencyMarker) -> Self {
        Self {
            domain,
            data,
            marker,
        }
    }

    /// Deserializes the snapshot data into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the data does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Partial update for a domain object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Fields to merge.
    pub data: Value,
    /// Recency of the update.
    pub marker: RecencyMarker,
}

impl Delta {
    /// Creates a delta.
    #[must_use]
    pub fn new(data: Value, marker: RecencyMarker) -> Self {
        Self { data, marker }
    }

    /// Builds a delta from a channel payload, stamping receipt time when the
    /// frame carried no marker.
    #[must_use]
    pub fn from_payload(payload: &ChannelPayload) -> Self {
        Self {
            data: payload.data.clone(),
            marker: payload.marker.unwrap_or_else(RecencyMarker::now),
        }
    }
}

/// Merges `patch` into `target` field by field.
///
/// Objects merge recursively; any other value replaces the target outright.
pub fn merge_fields(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_fields(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
