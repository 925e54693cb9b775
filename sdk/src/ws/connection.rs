//! Stream connection.
//!
//! Owns the persistent WebSocket to the backend. A single driver task walks
//! the [`StateMachine`], opens the transport, announces the live channel set,
//! routes inbound frames through the [`ChannelRegistry`] and reconnects after
//! a fixed delay when the link drops.

use std::collections::{BTreeSet, VecDeque};
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::StreamConfig;
use super::error::StreamError;
use super::messages::{ClientMessage, Envelope};
use super::state::{Action, ConnectionState, StateMachine, StreamEvent};
use crate::reconcile::RecencyMarker;
use crate::registry::{is_synthetic, ChannelPayload, ChannelRegistry, CONNECTIVITY_CHANNEL};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Commands sent from the connection handle to its driver.
#[derive(Debug)]
enum Command {
    /// Diff the live channel set against the announced one.
    Refresh,
}

/// Persistent streaming connection.
///
/// One connection per session. It is opened once and closed once; a closed
/// connection cannot be reopened.
#[derive(Debug)]
pub struct StreamConnection {
    config: StreamConfig,
    registry: ChannelRegistry,
    token: Arc<RwLock<Option<String>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl StreamConnection {
    /// Creates a connection that routes frames through `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: StreamConfig, registry: ChannelRegistry) -> Result<Self, StreamError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let token = Arc::new(RwLock::new(config.token.clone()));

        Ok(Self {
            config,
            registry,
            token,
            state_tx: Arc::new(state_tx),
            commands: Mutex::new(None),
            task: Mutex::new(None),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns the registry frames are dispatched through.
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Replaces the bearer token used for the next connection attempt.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Starts the connection driver.
    ///
    /// Resolves once the first connect attempt has finished, with the state
    /// it produced: `Subscribed` on success, `Disconnected` with a reconnect
    /// scheduled otherwise. Calling it again while running returns the
    /// current state.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] after [`close`](Self::close).
    pub async fn open(&self) -> Result<ConnectionState, StreamError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamError::Closed);
        }

        let ready_rx = {
            let mut task = self.task.lock().await;
            if task.is_some() {
                return Ok(self.state());
            }

            let (command_tx, command_rx) = mpsc::unbounded_channel();
            let (ready_tx, ready_rx) = oneshot::channel();

            let driver = Driver {
                config: self.config.clone(),
                registry: self.registry.clone(),
                token: Arc::clone(&self.token),
                state_tx: Arc::clone(&self.state_tx),
                commands: command_rx,
                cancel: self.cancel.clone(),
                machine: StateMachine::new(),
                announced: BTreeSet::new(),
                ready: Some(ready_tx),
            };

            *self.commands.lock().await = Some(command_tx);
            *task = Some(tokio::spawn(driver.run()));
            ready_rx
        };

        Ok(ready_rx.await.unwrap_or_else(|_| self.state()))
    }

    /// Asks the driver to bring the server-side subscription in line with
    /// the registry: channels that gained a subscriber are subscribed, and
    /// channels that lost their last one are unsubscribed.
    pub async fn refresh_subscriptions(&self) {
        if let Some(commands) = self.commands.lock().await.as_ref() {
            let _ = commands.send(Command::Refresh);
        }
    }

    /// Stops the driver, cancelling any pending reconnect, and waits for it.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Stream driver ended abnormally: {}", e);
            }
        }
        self.commands.lock().await.take();

        self.state_tx.send_if_modified(|state| {
            let changed = *state != ConnectionState::Disconnected;
            *state = ConnectionState::Disconnected;
            changed
        });
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connection driver task.
struct Driver {
    config: StreamConfig,
    registry: ChannelRegistry,
    token: Arc<RwLock<Option<String>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    machine: StateMachine,
    /// Channels the server was last told about.
    announced: BTreeSet<String>,
    /// Resolves `open()` after the first attempt.
    ready: Option<oneshot::Sender<ConnectionState>>,
}

impl Driver {
    async fn run(mut self) {
        let mut queue = VecDeque::new();
        let mut socket: Option<(WsSink, WsSource)> = None;
        self.step(StreamEvent::Open, &mut queue);

        loop {
            while let Some(action) = queue.pop_front() {
                match action {
                    Action::OpenTransport => {
                        let event = tokio::select! {
                            _ = self.cancel.cancelled() => StreamEvent::Teardown,
                            result = self.connect() => match result {
                                Ok(ws) => {
                                    socket = Some(ws.split());
                                    StreamEvent::TransportOpened
                                }
                                Err(e) => {
                                    warn!("Stream connect to {} failed: {}", self.config.url, e);
                                    StreamEvent::TransportFailed(e.to_string())
                                }
                            },
                        };
                        self.step(event, &mut queue);
                    }
                    Action::SendHandshake => {
                        if let Some((sink, _)) = socket.as_mut() {
                            // A failed send surfaces as a read error right after.
                            if let Err(e) = self.handshake(sink).await {
                                warn!("Subscribe handshake failed: {}", e);
                            }
                        }
                    }
                    Action::Notify(state) => self.notify(state).await,
                    Action::ScheduleReconnect => {
                        let event = self.wait_for_reconnect().await;
                        self.step(event, &mut queue);
                    }
                    Action::CancelReconnect => debug!("Pending reconnect cancelled"),
                }
            }

            if !self.machine.state().is_subscribed() {
                break;
            }
            let Some((sink, source)) = socket.take() else {
                break;
            };

            let event = self.read_loop(sink, source).await;
            self.step(event, &mut queue);
        }

        debug!("Stream driver stopped in state {}", self.machine.state());
    }

    /// Feeds an event to the state machine and queues the resulting actions.
    fn step(&mut self, event: StreamEvent, queue: &mut VecDeque<Action>) {
        match self.machine.handle(event) {
            Ok(actions) => queue.extend(actions),
            Err(e) => warn!("{}", e),
        }
    }

    async fn connect(&self) -> Result<WsStream, StreamError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::InvalidConfig(e.to_string()))?;

        if let Some(token) = self.token.read().await.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| StreamError::InvalidConfig(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| StreamError::Connection(e.to_string()))?;

        Ok(ws)
    }

    /// Sleeps for the reconnect delay, or gives up once the cap is reached.
    async fn wait_for_reconnect(&self) -> StreamEvent {
        if let Some(max) = self.config.max_reconnect_attempts {
            if self.machine.reconnect_attempts() >= max {
                warn!("Giving up after {} reconnect attempts", max);
                return StreamEvent::GiveUp;
            }
        }

        debug!("Reconnecting in {:?}", self.config.reconnect_delay);
        tokio::select! {
            _ = self.cancel.cancelled() => StreamEvent::Teardown,
            _ = tokio::time::sleep(self.config.reconnect_delay) => StreamEvent::ReconnectDue,
        }
    }

    /// Channels with subscribers, minus the locally produced ones.
    async fn live_channels(&self) -> BTreeSet<String> {
        self.registry
            .active_channels()
            .await
            .into_iter()
            .filter(|channel| !is_synthetic(channel))
            .collect()
    }

    async fn handshake(&mut self, sink: &mut WsSink) -> Result<(), StreamError> {
        let channels = self.live_channels().await;
        self.announced = channels.clone();

        if channels.is_empty() {
            debug!("No active channels to subscribe");
            return Ok(());
        }

        debug!("Subscribing to {:?}", channels);
        send(
            sink,
            &ClientMessage::Subscribe {
                channels: channels.into_iter().collect(),
            },
        )
        .await
    }

    async fn refresh(&mut self, sink: &mut WsSink) -> Result<(), StreamError> {
        let live = self.live_channels().await;
        let added: Vec<String> = live.difference(&self.announced).cloned().collect();
        let removed: Vec<String> = self.announced.difference(&live).cloned().collect();

        if !added.is_empty() {
            debug!("Subscribing to {:?}", added);
            send(sink, &ClientMessage::Subscribe { channels: added }).await?;
        }
        if !removed.is_empty() {
            debug!("Unsubscribing from {:?}", removed);
            send(sink, &ClientMessage::Unsubscribe { channels: removed }).await?;
        }

        self.announced = live;
        Ok(())
    }

    /// Publishes a state change and routes it on the connectivity channel.
    async fn notify(&mut self, state: ConnectionState) {
        info!("Stream {}", state);
        self.state_tx.send_replace(state.clone());

        match serde_json::to_value(&state) {
            Ok(data) => {
                let payload = ChannelPayload::new(data).with_marker(RecencyMarker::now());
                self.registry.dispatch(CONNECTIVITY_CHANNEL, &payload).await;
            }
            Err(e) => warn!("Failed to encode connection state: {}", e),
        }

        if state != ConnectionState::Connecting {
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(state);
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Dropping malformed frame: {}", e);
                return;
            }
        };

        if envelope.kind == "error" {
            warn!(
                "Server error: {}",
                envelope.message.as_deref().unwrap_or("unspecified")
            );
            return;
        }

        if let Some((channel, payload)) = envelope.into_dispatch() {
            self.registry.dispatch(channel, &payload).await;
        }
    }

    /// Reads frames until the link is lost or the driver is cancelled.
    async fn read_loop(&mut self, mut sink: WsSink, mut source: WsSource) -> StreamEvent {
        let mut heartbeat = self.config.heartbeat_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval
        });
        let mut last_seen = Instant::now();

        loop {
            let idle_deadline = self.config.idle_timeout.map(|timeout| last_seen + timeout);

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return StreamEvent::Teardown;
                }
                frame = source.next() => {
                    last_seen = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await,
                        Some(Ok(Message::Close(_))) => {
                            return StreamEvent::TransportLost("closed by server".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return StreamEvent::TransportLost(e.to_string()),
                        None => return StreamEvent::TransportLost("stream ended".to_string()),
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Refresh) => {
                        if let Err(e) = self.refresh(&mut sink).await {
                            return StreamEvent::TransportLost(e.to_string());
                        }
                    }
                    // The owning handle is gone.
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return StreamEvent::Teardown;
                    }
                },
                _ = tick(&mut heartbeat) => {
                    if let Err(e) = send(&mut sink, &ClientMessage::Ping).await {
                        return StreamEvent::TransportLost(e.to_string());
                    }
                }
                _ = sleep_until(idle_deadline) => {
                    return StreamEvent::TransportLost("idle timeout".to_string());
                }
            }
        }
    }
}

async fn send(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), StreamError> {
    let json = serde_json::to_string(msg).map_err(|e| StreamError::Serialization(e.to_string()))?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::registry::HandlerError;
    use crate::testing::{eventually, unused_addr, wait_for_state, MockBackend};

    type Log = Arc<StdMutex<Vec<(String, Value)>>>;

    fn quiet_config(url: String) -> StreamConfig {
        StreamConfig::new(url)
            .with_reconnect_delay(Duration::from_millis(100))
            .with_heartbeat_interval(None)
            .with_idle_timeout(None)
    }

    fn record(log: &Log, channel: &str) -> impl Fn(&ChannelPayload) -> Result<(), HandlerError> {
        let log = Arc::clone(log);
        let channel = channel.to_string();
        move |payload| {
            log.lock()
                .expect("log")
                .push((channel.clone(), payload.data.clone()));
            Ok(())
        }
    }

    fn states(log: &Log) -> Vec<String> {
        log.lock()
            .expect("log")
            .iter()
            .filter(|(channel, _)| channel == CONNECTIVITY_CHANNEL)
            .map(|(_, data)| data["state"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn count(log: &Log, state: &str) -> usize {
        states(log).iter().filter(|s| *s == state).count()
    }

    #[tokio::test]
    async fn test_handshake_lists_active_channels() {
        let backend = MockBackend::start().await;
        let registry = ChannelRegistry::new();
        let _prices = registry.subscribe("prices", |_: &ChannelPayload| Ok(())).await;
        let _pnl = registry.subscribe("pnl", |_: &ChannelPayload| Ok(())).await;
        let _conn = registry
            .subscribe(CONNECTIVITY_CHANNEL, |_: &ChannelPayload| Ok(()))
            .await;

        let stream = StreamConnection::new(quiet_config(backend.ws_url()), registry).expect("config");
        let state = stream.open().await.expect("open");
        assert_eq!(state, ConnectionState::Subscribed);

        let mut server = backend.next_connection().await;
        assert_eq!(
            server.next_control().await,
            json!({"type": "subscribe", "channels": ["pnl", "prices"]})
        );
        assert!(server.authorization.is_none());

        stream.close().await;
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_frames_routed_in_order() {
        let backend = MockBackend::start().await;
        let registry = ChannelRegistry::new();
        let log: Log = Arc::default();
        let _prices = registry.subscribe("prices", record(&log, "prices")).await;
        let _pnl = registry.subscribe("pnl", record(&log, "pnl")).await;
        let _alerts = registry.subscribe("alerts", record(&log, "alerts")).await;

        let stream = StreamConnection::new(quiet_config(backend.ws_url()), registry).expect("config");
        stream.open().await.expect("open");
        let mut server = backend.next_connection().await;
        server.next_control().await;

        server.send_json(json!({"type": "subscription", "channels": ["alerts", "pnl", "prices"]}));
        server.send_json(json!({"type": "price_update", "data": [{"symbol": "AAPL", "price": 190.1}], "sequence": 1}));
        server.send_raw("{garbage");
        server.send_json(json!({"type": "heartbeat", "timestamp": "2024-01-01T00:00:00"}));
        server.send_json(json!({"type": "pnl_update", "data": {"total_pnl": 12.5}, "timestamp": "2024-01-01T00:00:01"}));
        server.send_json(json!({"type": "mystery", "data": 1}));
        server.send_json(json!({"type": "risk_alert", "data": {"message": "VaR breach", "severity": "high"}}));

        eventually(|| log.lock().expect("log").len() == 3).await;
        let log = log.lock().expect("log").clone();
        assert_eq!(log[0].0, "prices");
        assert_eq!(log[0].1[0]["symbol"], "AAPL");
        assert_eq!(log[1], ("pnl".to_string(), json!({"total_pnl": 12.5})));
        assert_eq!(log[2].0, "alerts");
        assert_eq!(log[2].1["severity"], "high");

        stream.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_after_server_close() {
        let backend = MockBackend::start().await;
        let registry = ChannelRegistry::new();
        let log: Log = Arc::default();
        let _conn = registry
            .subscribe(CONNECTIVITY_CHANNEL, record(&log, CONNECTIVITY_CHANNEL))
            .await;
        let _prices = registry.subscribe("prices", |_: &ChannelPayload| Ok(())).await;
        let pnl = registry.subscribe("pnl", |_: &ChannelPayload| Ok(())).await;

        let stream =
            StreamConnection::new(quiet_config(backend.ws_url()), registry.clone()).expect("config");
        stream.open().await.expect("open");
        let mut first = backend.next_connection().await;
        assert_eq!(
            first.next_control().await,
            json!({"type": "subscribe", "channels": ["pnl", "prices"]})
        );

        // Dropped without a refresh: the next handshake still reflects it.
        registry.unsubscribe(pnl).await;
        first.close();

        let mut second = backend.next_connection().await;
        assert_eq!(
            second.next_control().await,
            json!({"type": "subscribe", "channels": ["prices"]})
        );

        eventually(|| states(&log).len() == 5).await;
        assert!(stream.state().is_subscribed());
        assert_eq!(
            states(&log),
            vec!["connecting", "subscribed", "degraded", "connecting", "subscribed"]
        );
        assert_eq!(
            log.lock().expect("log")[2].1,
            json!({"state": "degraded", "reason": "closed by server"})
        );

        stream.close().await;
    }

    #[tokio::test]
    async fn test_refused_connection_schedules_reconnect() {
        let addr = unused_addr().await;
        let registry = ChannelRegistry::new();
        let log: Log = Arc::default();
        let _conn = registry
            .subscribe(CONNECTIVITY_CHANNEL, record(&log, CONNECTIVITY_CHANNEL))
            .await;

        let config = quiet_config(format!("ws://{}/stream", addr))
            .with_reconnect_delay(Duration::from_millis(20));
        let stream = StreamConnection::new(config, registry).expect("config");

        assert_eq!(stream.open().await.expect("open"), ConnectionState::Disconnected);
        eventually(|| count(&log, "connecting") >= 3).await;

        stream.close().await;
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_gives_up_after_cap() {
        let addr = unused_addr().await;
        let registry = ChannelRegistry::new();
        let log: Log = Arc::default();
        let _conn = registry
            .subscribe(CONNECTIVITY_CHANNEL, record(&log, CONNECTIVITY_CHANNEL))
            .await;

        let config = quiet_config(format!("ws://{}/stream", addr))
            .with_reconnect_delay(Duration::from_millis(10))
            .with_max_reconnect_attempts(2);
        let stream = StreamConnection::new(config, registry).expect("config");
        stream.open().await.expect("open");

        let handle = stream.task.lock().await.take().expect("driver");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("driver stops")
            .expect("join");

        assert_eq!(count(&log, "connecting"), 3);
        assert_eq!(stream.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_bearer_token_on_upgrade() {
        let backend = MockBackend::start().await;
        let config = quiet_config(backend.ws_url()).with_token("abc");
        let stream = StreamConnection::new(config, ChannelRegistry::new()).expect("config");
        stream.open().await.expect("open");

        let server = backend.next_connection().await;
        assert_eq!(server.authorization.as_deref(), Some("Bearer abc"));

        stream.close().await;
    }

    #[tokio::test]
    async fn test_refresh_sends_lazy_unsubscribe() {
        let backend = MockBackend::start().await;
        let registry = ChannelRegistry::new();
        let _prices = registry.subscribe("prices", |_: &ChannelPayload| Ok(())).await;
        let pnl = registry.subscribe("pnl", |_: &ChannelPayload| Ok(())).await;

        let stream =
            StreamConnection::new(quiet_config(backend.ws_url()), registry.clone()).expect("config");
        stream.open().await.expect("open");
        let mut server = backend.next_connection().await;
        server.next_control().await;

        registry.unsubscribe(pnl).await;
        stream.refresh_subscriptions().await;
        assert_eq!(
            server.next_control().await,
            json!({"type": "unsubscribe", "channels": ["pnl"]})
        );

        let _alerts = registry.subscribe("alerts", |_: &ChannelPayload| Ok(())).await;
        stream.refresh_subscriptions().await;
        assert_eq!(
            server.next_control().await,
            json!({"type": "subscribe", "channels": ["alerts"]})
        );

        stream.close().await;
    }

    #[tokio::test]
    async fn test_close_cancels_pending_reconnect() {
        let addr = unused_addr().await;
        let config = quiet_config(format!("ws://{}/stream", addr))
            .with_reconnect_delay(Duration::from_secs(60));
        let stream = StreamConnection::new(config, ChannelRegistry::new()).expect("config");
        stream.open().await.expect("open");

        tokio::time::timeout(Duration::from_secs(5), stream.close())
            .await
            .expect("close does not wait for the timer");

        assert!(stream.is_closed());
        assert_eq!(stream.open().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let backend = MockBackend::start().await;
        let stream =
            StreamConnection::new(quiet_config(backend.ws_url()), ChannelRegistry::new()).expect("config");

        assert_eq!(stream.open().await.expect("open"), ConnectionState::Subscribed);
        assert_eq!(stream.open().await.expect("open"), ConnectionState::Subscribed);
        let _server = backend.next_connection().await;

        stream.close().await;
    }

    #[tokio::test]
    async fn test_heartbeat_ping() {
        let backend = MockBackend::start().await;
        let config = quiet_config(backend.ws_url())
            .with_heartbeat_interval(Some(Duration::from_millis(50)));
        let stream = StreamConnection::new(config, ChannelRegistry::new()).expect("config");
        stream.open().await.expect("open");

        let mut server = backend.next_connection().await;
        assert_eq!(server.next_json().await, json!({"type": "ping"}));

        stream.close().await;
    }

    #[tokio::test]
    async fn test_idle_timeout_degrades() {
        let backend = MockBackend::start().await;
        let registry = ChannelRegistry::new();
        let log: Log = Arc::default();
        let _conn = registry
            .subscribe(CONNECTIVITY_CHANNEL, record(&log, CONNECTIVITY_CHANNEL))
            .await;

        let config = quiet_config(backend.ws_url())
            .with_idle_timeout(Some(Duration::from_millis(100)))
            .with_reconnect_delay(Duration::from_secs(60));
        let stream = StreamConnection::new(config, registry).expect("config");
        stream.open().await.expect("open");
        let _server = backend.next_connection().await;

        let mut rx = stream.watch_state();
        let state = wait_for_state(&mut rx, |s| matches!(s, ConnectionState::Degraded(_))).await;
        assert_eq!(state, ConnectionState::Degraded("idle timeout".to_string()));

        stream.close().await;
        assert_eq!(states(&log).last().map(String::as_str), Some("disconnected"));
    }
}
