//! Snapshot reconciliation.
//!
//! Keeps one authoritative snapshot per domain. Baselines come from a
//! [`SnapshotSource`]; deltas pushed over the stream are merged on top of them
//! when their recency marker is newer. Deltas that arrive before a baseline
//! exists, or while a new baseline is pending after a connection loss, are
//! buffered and replayed once the baseline lands.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::marker::RecencyMarker;
use super::snapshot::{merge_fields, Delta, Domain, Snapshot};
use crate::client::{ApiClient, ClientError, RequestOptions};

/// Default cap on deltas buffered per domain while awaiting a baseline.
pub const DEFAULT_MAX_BUFFERED_DELTAS: usize = 1024;

/// Supplies baseline snapshots.
pub trait SnapshotSource: Send + Sync + 'static {
    /// Fetches the full current state of `domain`.
    fn fetch(&self, domain: Domain) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

impl SnapshotSource for ApiClient {
    fn fetch(&self, domain: Domain) -> impl Future<Output = Result<Value, ClientError>> + Send {
        self.request(Method::GET, domain.path(), RequestOptions::new())
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Maximum deltas buffered per domain. The oldest is dropped beyond it.
    pub max_buffered_deltas: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_buffered_deltas: DEFAULT_MAX_BUFFERED_DELTAS,
        }
    }
}

impl ReconcilerConfig {
    /// Sets the buffer cap.
    #[must_use]
    pub fn with_max_buffered_deltas(mut self, max: usize) -> Self {
        self.max_buffered_deltas = max;
        self
    }
}

/// What happened to a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Merged into the snapshot and republished.
    Applied,
    /// Held until the next baseline.
    Buffered {
        /// Deltas now waiting for the domain.
        pending: usize,
    },
    /// Not newer than the held snapshot; ignored.
    Stale,
    /// Buffered, but the buffer was full and its oldest delta was dropped.
    /// The caller should force a new baseline.
    Overflowed {
        /// Marker of the dropped delta.
        dropped: RecencyMarker,
    },
    /// The reconciler has shut down.
    Discarded,
}

/// Reconciliation errors.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The baseline could not be fetched. The previous snapshot is kept.
    #[error("snapshot fetch failed: {0}")]
    Fetch(#[from] ClientError),

    /// The reconciler shut down before the fetch completed.
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Returns true if trying again later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Cancelled => false,
        }
    }
}

struct DomainState {
    snapshot: Option<Snapshot>,
    pending: VecDeque<Delta>,
    awaiting_baseline: bool,
    publisher: watch::Sender<Option<Snapshot>>,
    /// Last fetch ticket handed out.
    issued: u64,
    /// Ticket of the fetch that produced the held baseline.
    installed: u64,
    /// Deltas merged into the snapshot so far.
    merged: u64,
}

/// Domain state observed when a fetch was issued.
#[derive(Debug, Clone, Copy)]
struct FetchTicket {
    id: u64,
    merged: u64,
}

impl DomainState {
    fn new() -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            snapshot: None,
            pending: VecDeque::new(),
            awaiting_baseline: true,
            publisher,
            issued: 0,
            installed: 0,
            merged: 0,
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(self.snapshot.clone());
    }

    fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket {
            id: self.issued,
            merged: self.merged,
        }
    }

    fn held_marker(&self) -> Option<RecencyMarker> {
        self.snapshot.as_ref().map(|s| s.marker)
    }

    /// Installs a baseline that carries its own marker. It loses only to a
    /// strictly newer held snapshot.
    fn install_marked(
        &mut self,
        domain: Domain,
        body: Value,
        marker: RecencyMarker,
        ticket: FetchTicket,
    ) -> bool {
        match self.held_marker() {
            Some(held) if marker < held => {
                debug!(
                    "Discarding {} baseline {}: held snapshot is at {}",
                    domain, marker, held
                );
                false
            }
            _ => {
                self.snapshot = Some(Snapshot::new(domain, body, marker));
                self.installed = self.installed.max(ticket.id);
                true
            }
        }
    }

    /// Installs a baseline without a marker.
    ///
    /// Such a body can only be ordered against local events: it is dropped
    /// if a delta was merged or a later fetch landed while it was in flight.
    /// Otherwise it takes over the held marker, so the stream's own markers
    /// stay the only ones compared with each other.
    fn install_unmarked(&mut self, domain: Domain, body: Value, ticket: FetchTicket) -> bool {
        if self.merged != ticket.merged || self.installed > ticket.id {
            debug!(
                "Discarding {} baseline: snapshot advanced while it was in flight",
                domain
            );
            return false;
        }

        let marker = self.held_marker().unwrap_or(RecencyMarker::MIN);
        self.snapshot = Some(Snapshot::new(domain, body, marker));
        self.installed = ticket.id;
        true
    }

    /// Merges `delta` if it is newer than the held snapshot.
    fn merge(&mut self, delta: &Delta) -> bool {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return false;
        };
        if delta.marker <= snapshot.marker {
            return false;
        }
        merge_fields(&mut snapshot.data, &delta.data);
        snapshot.marker = delta.marker;
        self.merged += 1;
        true
    }
}

/// Merges baselines and deltas into one snapshot per domain.
pub struct SnapshotReconciler<S: SnapshotSource> {
    source: S,
    config: ReconcilerConfig,
    domains: Mutex<BTreeMap<Domain, DomainState>>,
    cancel: CancellationToken,
}

impl<S: SnapshotSource> std::fmt::Debug for SnapshotReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReconciler")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<S: SnapshotSource> SnapshotReconciler<S> {
    /// Creates a reconciler with no snapshots.
    #[must_use]
    pub fn new(source: S, config: ReconcilerConfig) -> Self {
        let domains = Domain::ALL
            .into_iter()
            .map(|domain| (domain, DomainState::new()))
            .collect();

        Self {
            source,
            config,
            domains: Mutex::new(domains),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the snapshot source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches a new baseline for `domain` and replays buffered deltas.
    ///
    /// A fetched body that carries a marker replaces the held snapshot only
    /// if that marker is not older. A body without one replaces it unless a
    /// delta was merged, or a later fetch landed, while this fetch was in
    /// flight; it inherits the held marker (or [`RecencyMarker::MIN`]).
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Fetch`] if the fetch fails, leaving the held
    /// snapshot and buffer untouched, or [`ReconcileError::Cancelled`] after
    /// [`shutdown`](Self::shutdown).
    pub async fn reconcile(&self, domain: Domain) -> Result<Snapshot, ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }

        let ticket = {
            let mut domains = self.domains.lock().await;
            domains
                .entry(domain)
                .or_insert_with(DomainState::new)
                .issue()
        };

        let body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ReconcileError::Cancelled),
            result = self.source.fetch(domain) => result?,
        };

        let mut domains = self.domains.lock().await;
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        let state = domains.entry(domain).or_insert_with(DomainState::new);

        let mut changed = match RecencyMarker::from_body(&body) {
            Some(marker) => state.install_marked(domain, body, marker, ticket),
            None => state.install_unmarked(domain, body, ticket),
        };

        // Replay in arrival order; merge skips anything not newer.
        let replayed = state.pending.len();
        while let Some(delta) = state.pending.pop_front() {
            changed |= state.merge(&delta);
        }
        state.awaiting_baseline = false;

        if changed {
            state.publish();
        }

        debug!(
            "Reconciled {} at {} ({} buffered deltas replayed)",
            domain,
            state.held_marker().unwrap_or(RecencyMarker::MIN),
            replayed
        );

        state
            .snapshot
            .clone()
            .ok_or(ReconcileError::Cancelled)
    }

    /// Applies a streamed delta.
    pub async fn apply_delta(&self, domain: Domain, delta: Delta) -> DeltaOutcome {
        if self.cancel.is_cancelled() {
            return DeltaOutcome::Discarded;
        }

        let mut domains = self.domains.lock().await;
        let state = domains.entry(domain).or_insert_with(DomainState::new);

        if state.snapshot.is_none() || state.awaiting_baseline {
            let mut dropped = None;
            if state.pending.len() >= self.config.max_buffered_deltas {
                dropped = state.pending.pop_front().map(|d| d.marker);
            }
            state.pending.push_back(delta);

            return match dropped {
                Some(dropped) => {
                    warn!(
                        "Delta buffer for {} full, dropped delta at {}",
                        domain, dropped
                    );
                    DeltaOutcome::Overflowed { dropped }
                }
                None => DeltaOutcome::Buffered {
                    pending: state.pending.len(),
                },
            };
        }

        if state.merge(&delta) {
            state.publish();
            DeltaOutcome::Applied
        } else {
            debug!("Ignoring stale {} delta at {}", domain, delta.marker);
            DeltaOutcome::Stale
        }
    }

    /// Marks every domain as awaiting a new baseline.
    ///
    /// Held snapshots stay visible; deltas are buffered until the next
    /// successful [`reconcile`](Self::reconcile).
    pub async fn begin_rebaseline(&self) {
        let mut domains = self.domains.lock().await;
        for state in domains.values_mut() {
            state.awaiting_baseline = true;
        }
    }

    /// Returns the current snapshot for `domain`.
    pub async fn snapshot(&self, domain: Domain) -> Option<Snapshot> {
        let domains = self.domains.lock().await;
        domains.get(&domain).and_then(|s| s.snapshot.clone())
    }

    /// Returns a receiver that sees every republished snapshot of `domain`.
    pub async fn watch(&self, domain: Domain) -> watch::Receiver<Option<Snapshot>> {
        let mut domains = self.domains.lock().await;
        domains
            .entry(domain)
            .or_insert_with(DomainState::new)
            .publisher
            .subscribe()
    }

    /// Returns the number of buffered deltas for `domain`.
    pub async fn pending_deltas(&self, domain: Domain) -> usize {
        let domains = self.domains.lock().await;
        domains.get(&domain).map_or(0, |s| s.pending.len())
    }

    /// Returns true while `domain` waits for a baseline.
    pub async fn awaiting_baseline(&self, domain: Domain) -> bool {
        let domains = self.domains.lock().await;
        domains.get(&domain).map_or(true, |s| s.awaiting_baseline)
    }

    /// Cancels in-flight fetches. Results that arrive afterwards are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
