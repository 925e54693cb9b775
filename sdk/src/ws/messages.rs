//! WebSocket message types.
//!
//! Defines the control frames sent to the backend and the envelope every
//! inbound frame is parsed into.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reconcile::RecencyMarker;
use crate::registry::ChannelPayload;

/// Channel carrying price ticks.
pub const PRICES_CHANNEL: &str = "prices";

/// Channel carrying P&L updates.
pub const PNL_CHANNEL: &str = "pnl";

/// Channel carrying risk alerts.
pub const ALERTS_CHANNEL: &str = "alerts";

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Subscribe to channels.
    Subscribe {
        /// Channels to subscribe to.
        channels: Vec<String>,
    },
    /// Unsubscribe from channels.
    Unsubscribe {
        /// Channels to unsubscribe from.
        channels: Vec<String>,
    },
    /// Heartbeat.
    Ping,
}

/// Inbound frame kinds that carry channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `price_update`.
    PriceUpdate,
    /// `pnl_update`.
    PnlUpdate,
    /// `risk_alert`.
    RiskAlert,
}

impl MessageKind {
    /// Parses a frame `type`; returns `None` for kinds that carry no channel
    /// data (acknowledgements, heartbeats, unknown kinds).
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "price_update" => Some(Self::PriceUpdate),
            "pnl_update" => Some(Self::PnlUpdate),
            "risk_alert" => Some(Self::RiskAlert),
            _ => None,
        }
    }

    /// Returns the logical channel the kind is routed to.
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::PriceUpdate => PRICES_CHANNEL,
            Self::PnlUpdate => PNL_CHANNEL,
            Self::RiskAlert => ALERTS_CHANNEL,
        }
    }
}

/// Maps a frame `type` to its channel.
#[must_use]
pub fn kind_to_channel(kind: &str) -> Option<&'static str> {
    MessageKind::parse(kind).map(|k| k.channel())
}

/// Every inbound frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// Frame kind.
    #[serde(rename = "type")]
    pub kind: String,

    /// Channel-specific payload.
    #[serde(default)]
    pub data: Value,

    /// Backend timestamp (ISO 8601).
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Backend sequence number.
    #[serde(default)]
    pub sequence: Option<i64>,

    /// Human-readable text on `error` frames.
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object with a `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns the frame's recency marker: the sequence number when present,
    /// otherwise the timestamp.
    #[must_use]
    pub fn marker(&self) -> Option<RecencyMarker> {
        self.sequence.map(RecencyMarker::new).or_else(|| {
            self.timestamp
                .as_deref()
                .and_then(RecencyMarker::from_timestamp)
        })
    }

    /// Converts the frame into a channel and payload, or `None` when the kind
    /// is not routed.
    #[must_use]
    pub fn into_dispatch(self) -> Option<(&'static str, ChannelPayload)> {
        let channel = kind_to_channel(&self.kind)?;
        let marker = self.marker();
        Some((
            channel,
            ChannelPayload {
                data: self.data,
                marker,
            },
        ))
    }
}
