//! Channel subscription registry.
//!
//! Maps channel names to the ordered list of handlers interested in them.
//! Subscribers attach and detach independently; the stream connection only
//! asks which channels are active and dispatches payloads.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::reconcile::RecencyMarker;

/// Synthetic channel carrying connection-state notices.
pub const CONNECTIVITY_CHANNEL: &str = "connectivity";

/// Returns true for channels produced locally rather than by the backend.
#[must_use]
pub fn is_synthetic(channel: &str) -> bool {
    channel == CONNECTIVITY_CHANNEL
}

/// Payload delivered to channel handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPayload {
    /// Channel-specific data.
    pub data: Value,

    /// Recency marker carried by the frame, if any.
    pub marker: Option<RecencyMarker>,
}

impl ChannelPayload {
    /// Creates a payload without a recency marker.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self { data, marker: None }
    }

    /// Attaches a recency marker.
    #[must_use]
    pub fn with_marker(mut self, marker: RecencyMarker) -> Self {
        self.marker = Some(marker);
        self
    }
}

/// Error returned by a handler. It is logged and does not stop the dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any displayable value.
    pub fn new(msg: impl fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

/// Channel handler.
pub type Handler = Arc<dyn Fn(&ChannelPayload) -> Result<(), HandlerError> + Send + Sync>;

/// Identifies one subscription. Pass it back to
/// [`ChannelRegistry::unsubscribe`] to detach the handler.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping the handle leaves the handler subscribed forever"]
pub struct SubscriptionHandle {
    id: u64,
    channel: String,
}

impl SubscriptionHandle {
    /// Returns the subscription ID.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Cleared by `unsubscribe`. Held for the duration of each call, so
/// clearing it waits for a call already in progress.
type Liveness = Arc<Mutex<bool>>;

struct Entry {
    id: u64,
    handler: Handler,
    live: Liveness,
}

/// Registry of channel subscriptions.
///
/// Cloning is cheap; clones share the same subscriptions.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    /// Map from channel to handlers in subscription order.
    channels: Arc<RwLock<BTreeMap<String, Vec<Entry>>>>,

    /// Next subscription ID.
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry").finish_non_exhaustive()
    }
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to a channel.
    pub async fn subscribe<F>(&self, channel: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ChannelPayload) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let channel = channel.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut channels = self.channels.write().await;
        channels.entry(channel.clone()).or_default().push(Entry {
            id,
            handler: Arc::new(handler),
            live: Arc::new(Mutex::new(true)),
        });

        SubscriptionHandle { id, channel }
    }

    /// Removes a subscription.
    ///
    /// Returns false if it was already removed. A channel left without
    /// handlers stops being active. Once this returns, the handler is not
    /// called again, including by a dispatch that is already running.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = {
            let mut channels = self.channels.write().await;
            let Some(entries) = channels.get_mut(&handle.channel) else {
                return false;
            };

            let position = entries.iter().position(|entry| entry.id == handle.id);
            let removed = position.map(|index| entries.remove(index));

            if entries.is_empty() {
                channels.remove(&handle.channel);
            }
            removed
        };

        match removed {
            Some(entry) => {
                *entry.live.lock().unwrap_or_else(PoisonError::into_inner) = false;
                true
            }
            None => false,
        }
    }

    /// Invokes every handler registered for `channel`, in subscription order.
    ///
    /// The handler list is read once per dispatch, so a handler subscribed
    /// meanwhile first sees the next payload. A handler unsubscribed
    /// meanwhile is skipped. A failing or panicking handler is logged and
    /// the rest still run.
    pub async fn dispatch(&self, channel: &str, payload: &ChannelPayload) -> DispatchReport {
        let handlers: Vec<(u64, Handler, Liveness)> = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.id, Arc::clone(&e.handler), Arc::clone(&e.live)))
                    .collect(),
                None => return DispatchReport::default(),
            }
        };

        let mut report = DispatchReport::default();
        for (id, handler, live) in handlers {
            let live = live.lock().unwrap_or_else(PoisonError::into_inner);
            if !*live {
                continue;
            }

            report.delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!("Subscription {} on {}: {}", id, channel, e);
                }
                Err(_) => {
                    report.failed += 1;
                    warn!("Subscription {} on {} panicked", id, channel);
                }
            }
        }

        report
    }

    /// Returns the channels with at least one subscriber.
    pub async fn active_channels(&self) -> BTreeSet<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    /// Returns the number of subscribers for a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Returns the total number of subscriptions.
    pub async fn total_subscriptions(&self) -> usize {
        self.channels.read().await.values().map(Vec::len).sum()
    }
}
