//! Dashboard session.
//!
//! A [`Session`] owns everything one dashboard needs: the request client,
//! the channel registry, the stream connection and the snapshot reconciler.
//! It is constructed explicitly and torn down explicitly; nothing is global.
//!
//! Internally a single event task consumes `pnl` deltas and connectivity
//! notices in dispatch order. A connection loss marks every domain as
//! awaiting a new baseline; recovery triggers a re-fetch, and deltas that
//! arrive in between are buffered by the reconciler.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::LastGood;
use crate::client::{ApiClient, ClientConfig, ClientError};
use crate::error::SdkError;
use crate::reconcile::{
    Delta, DeltaOutcome, Domain, ReconcileError, ReconcilerConfig, Snapshot, SnapshotReconciler,
};
use crate::registry::{
    ChannelPayload, ChannelRegistry, HandlerError, SubscriptionHandle, CONNECTIVITY_CHANNEL,
};
use crate::types::{PnlSummary, Position, SummaryRequest, SummaryResponse, VarParams, VarResult};
use crate::ws::{ConnectionState, StreamConfig, StreamConnection};

/// Session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Request client configuration.
    pub client: ClientConfig,
    /// Stream connection configuration.
    pub stream: StreamConfig,
    /// Reconciler configuration.
    pub reconciler: ReconcilerConfig,
}

impl SessionConfig {
    /// Creates a configuration from client and stream settings.
    #[must_use]
    pub fn new(client: ClientConfig, stream: StreamConfig) -> Self {
        Self {
            client,
            stream,
            reconciler: ReconcilerConfig::default(),
        }
    }

    /// Sets the reconciler configuration.
    #[must_use]
    pub fn with_reconciler(mut self, reconciler: ReconcilerConfig) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Sets the bearer token on both the client and the stream.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.client.token = Some(token.clone());
        self.stream.token = Some(token);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any part of the configuration is invalid.
    pub fn validate(&self) -> Result<(), SdkError> {
        self.client.validate()?;
        self.stream.validate()?;
        if self.reconciler.max_buffered_deltas == 0 {
            return Err(SdkError::InvalidConfig(
                "max_buffered_deltas must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inputs to the session event task.
#[derive(Debug)]
enum SessionEvent {
    Delta(Domain, Delta),
    Connectivity(ConnectionState),
    Reconcile(Domain),
    Reconciled(Domain, Result<(), ReconcileError>),
}

/// A live dashboard session.
#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    registry: ChannelRegistry,
    stream: Arc<StreamConnection>,
    reconciler: Arc<SnapshotReconciler<ApiClient>>,
    var_panel: Arc<RwLock<LastGood<VarResult>>>,
    forwarders: Mutex<Vec<SubscriptionHandle>>,
    events: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Session {
    /// Activates a session: fetches initial baselines for every domain while
    /// the stream connection opens and subscribes.
    ///
    /// A backend that cannot be reached is not an error: the session starts
    /// disconnected and keeps retrying in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn activate(config: SessionConfig) -> Result<Self, SdkError> {
        config.validate()?;

        let retry_delay = config.stream.reconnect_delay;
        let client = ApiClient::new(config.client)?;
        let registry = ChannelRegistry::new();
        let stream = Arc::new(StreamConnection::new(config.stream, registry.clone())?);
        let reconciler = Arc::new(SnapshotReconciler::new(client.clone(), config.reconciler));
        let cancel = CancellationToken::new();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let forwarders = subscribe_forwarders(&registry, &event_tx).await;

        for domain in Domain::ALL {
            let _ = event_tx.send(SessionEvent::Reconcile(domain));
        }

        let worker = EventWorker {
            reconciler: Arc::clone(&reconciler),
            events: event_tx,
            cancel: cancel.clone(),
            retry_delay,
            in_flight: BTreeSet::new(),
            rerun: BTreeSet::new(),
            lost: false,
        };
        let events = tokio::spawn(worker.run(event_rx));

        let state = stream.open().await?;
        info!("Session activated, stream {}", state);

        Ok(Self {
            client,
            registry,
            stream,
            reconciler,
            var_panel: Arc::new(RwLock::new(LastGood::new())),
            forwarders: Mutex::new(forwarders),
            events: Mutex::new(Some(events)),
            cancel,
        })
    }

    /// Returns the request client.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Returns the channel registry.
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Returns the snapshot reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &SnapshotReconciler<ApiClient> {
        &self.reconciler
    }

    /// Subscribes a handler to a channel and updates the server-side
    /// subscription.
    pub async fn subscribe<F>(&self, channel: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ChannelPayload) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let handle = self.registry.subscribe(channel, handler).await;
        self.stream.refresh_subscriptions().await;
        handle
    }

    /// Removes a subscription. A channel left without subscribers is
    /// unsubscribed on the server.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self.registry.unsubscribe(handle).await;
        self.stream.refresh_subscriptions().await;
        removed
    }

    /// Returns the current snapshot of `domain`.
    pub async fn snapshot(&self, domain: Domain) -> Option<Snapshot> {
        self.reconciler.snapshot(domain).await
    }

    /// Returns a receiver for republished snapshots of `domain`.
    pub async fn watch(&self, domain: Domain) -> watch::Receiver<Option<Snapshot>> {
        self.reconciler.watch(domain).await
    }

    /// Returns the current P&L summary, if a baseline has been fetched.
    pub async fn pnl_summary(&self) -> Option<PnlSummary> {
        let snapshot = self.snapshot(Domain::Pnl).await?;
        snapshot
            .decode()
            .map_err(|e| warn!("P&L snapshot does not decode: {}", e))
            .ok()
    }

    /// Returns the current positions, if a baseline has been fetched.
    pub async fn positions(&self) -> Option<Vec<Position>> {
        let snapshot = self.snapshot(Domain::Positions).await?;
        snapshot
            .decode()
            .map_err(|e| warn!("Positions snapshot does not decode: {}", e))
            .ok()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    /// Returns a receiver for connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.stream.watch_state()
    }

    /// Replaces the bearer token. Takes effect on the next request and the
    /// next connection attempt.
    pub async fn set_token(&self, token: Option<String>) {
        self.client.set_token(token.clone()).await;
        self.stream.set_token(token).await;
    }

    /// Refreshes the VaR panel.
    ///
    /// On failure the panel keeps its previous value and records the error.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn refresh_var(&self, params: &VarParams) -> Result<VarResult, ClientError> {
        let result = self.client.risk_var(params).await;
        self.var_panel.write().await.update(&result);
        if let Err(e) = &result {
            warn!("VaR refresh failed: {}", e);
        }
        result
    }

    /// Returns the VaR panel contents.
    pub async fn var_panel(&self) -> LastGood<VarResult> {
        self.var_panel.read().await.clone()
    }

    /// Generates a narrative risk summary.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn generate_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<SummaryResponse, ClientError> {
        self.client.llm_summary(request).await
    }

    /// Tears the session down: cancels the reconnect timer and in-flight
    /// fetches, closes the stream and stops the event task.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        self.reconciler.shutdown();
        self.stream.close().await;

        if let Some(events) = self.events.lock().await.take() {
            if let Err(e) = events.await {
                warn!("Session event task ended abnormally: {}", e);
            }
        }

        let forwarders: Vec<_> = self.forwarders.lock().await.drain(..).collect();
        for handle in forwarders {
            self.registry.unsubscribe(handle).await;
        }

        info!("Session torn down");
    }

    /// Returns true once [`teardown`](Self::teardown) has been called.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.reconciler.shutdown();
    }
}

/// Subscribes the internal handlers that feed the event task.
async fn subscribe_forwarders(
    registry: &ChannelRegistry,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Vec<SubscriptionHandle> {
    let mut handles = Vec::new();

    for domain in Domain::ALL {
        let Some(channel) = domain.channel() else {
            continue;
        };
        let events = events.clone();
        let handle = registry
            .subscribe(channel, move |payload: &ChannelPayload| {
                events
                    .send(SessionEvent::Delta(domain, Delta::from_payload(payload)))
                    .map_err(|_| HandlerError::new("session closed"))
            })
            .await;
        handles.push(handle);
    }

    let events = events.clone();
    let handle = registry
        .subscribe(CONNECTIVITY_CHANNEL, move |payload: &ChannelPayload| {
            let state: ConnectionState =
                serde_json::from_value(payload.data.clone()).map_err(HandlerError::new)?;
            events
                .send(SessionEvent::Connectivity(state))
                .map_err(|_| HandlerError::new("session closed"))
        })
        .await;
    handles.push(handle);

    handles
}

/// Event task state.
struct EventWorker {
    reconciler: Arc<SnapshotReconciler<ApiClient>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    retry_delay: Duration,
    in_flight: BTreeSet<Domain>,
    /// Domains asked to reconcile again while a fetch was in flight.
    rerun: BTreeSet<Domain>,
    /// True between a connection loss and the next subscribe.
    lost: bool,
}

impl EventWorker {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                SessionEvent::Delta(domain, delta) => {
                    if let DeltaOutcome::Overflowed { .. } =
                        self.reconciler.apply_delta(domain, delta).await
                    {
                        self.start_reconcile(domain);
                    }
                }
                SessionEvent::Connectivity(state) => self.on_connectivity(state).await,
                SessionEvent::Reconcile(domain) => self.start_reconcile(domain),
                SessionEvent::Reconciled(domain, result) => self.on_reconciled(domain, result),
            }
        }

        debug!("Session event task stopped");
    }

    async fn on_connectivity(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Degraded(_) | ConnectionState::Disconnected => {
                if !self.lost {
                    self.lost = true;
                    self.reconciler.begin_rebaseline().await;
                }
            }
            ConnectionState::Subscribed => {
                if self.lost {
                    self.lost = false;
                    info!("Stream recovered, re-fetching baselines");
                    for domain in Domain::ALL {
                        self.start_reconcile(domain);
                    }
                }
            }
            ConnectionState::Connecting => {}
        }
    }

    fn start_reconcile(&mut self, domain: Domain) {
        if self.in_flight.contains(&domain) {
            self.rerun.insert(domain);
            return;
        }
        self.in_flight.insert(domain);

        let reconciler = Arc::clone(&self.reconciler);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = reconciler.reconcile(domain).await.map(|_| ());
            let _ = events.send(SessionEvent::Reconciled(domain, result));
        });
    }

    fn on_reconciled(&mut self, domain: Domain, result: Result<(), ReconcileError>) {
        self.in_flight.remove(&domain);

        match result {
            Ok(()) => {}
            Err(ReconcileError::Cancelled) => return,
            Err(e) if e.is_retryable() => {
                warn!("Reconciling {} failed, retrying in {:?}: {}", domain, self.retry_delay, e);
                let events = self.events.clone();
                let cancel = self.cancel.clone();
                let delay = self.retry_delay;
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            let _ = events.send(SessionEvent::Reconcile(domain));
                        }
                    }
                });
            }
            Err(e) => warn!("Reconciling {} failed: {}", domain, e),
        }

        if self.rerun.remove(&domain) {
            self.start_reconcile(domain);
        }
    }
}
