//! Local mock backend for tests.
//!
//! Serves canned JSON on any HTTP path and a scriptable `/stream` WebSocket
//! endpoint on `127.0.0.1:0`. Each accepted WebSocket is handed to the test
//! as a [`ServerConn`].

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::ws::ConnectionState;

/// How long helpers wait before failing a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A request seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Canned {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

enum ServerCommand {
    Send(String),
    Close,
}

/// Server side of one accepted WebSocket.
pub struct ServerConn {
    pub authorization: Option<String>,
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<ServerCommand>,
}

impl ServerConn {
    /// Waits for the next text frame sent by the client.
    pub async fn next_text(&mut self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, self.incoming.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client connection ended")
    }

    /// Waits for the next frame and parses it as JSON.
    pub async fn next_json(&mut self) -> Value {
        let text = self.next_text().await;
        serde_json::from_str(&text).expect("client frame is JSON")
    }

    /// Waits for the next frame whose `type` is not `ping`.
    pub async fn next_control(&mut self) -> Value {
        loop {
            let frame = self.next_json().await;
            if frame["type"] != "ping" {
                return frame;
            }
        }
    }

    /// Sends a JSON frame to the client.
    pub fn send_json(&self, value: Value) {
        self.send_raw(&value.to_string());
    }

    /// Sends a raw text frame to the client.
    pub fn send_raw(&self, text: &str) {
        let _ = self.outgoing.send(ServerCommand::Send(text.to_string()));
    }

    /// Closes the connection from the server side.
    pub fn close(&self) {
        let _ = self.outgoing.send(ServerCommand::Close);
    }
}

struct MockState {
    routes: Mutex<HashMap<String, VecDeque<Canned>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    conns: mpsc::UnboundedSender<ServerConn>,
}

/// A running mock backend.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    conns: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerConn>>,
    task: JoinHandle<()>,
}

impl MockBackend {
    /// Binds to an ephemeral port and starts serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (conns_tx, conns_rx) = mpsc::unbounded_channel();

        let state = Arc::new(MockState {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            conns: conns_tx,
        });

        let app = Router::new()
            .route("/stream", get(ws_upgrade))
            .fallback(http_handler)
            .with_state(Arc::clone(&state));

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            conns: tokio::sync::Mutex::new(conns_rx),
            task,
        }
    }

    /// Base URL of the REST API.
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// URL of the streaming endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/stream", self.addr)
    }

    /// Queues a JSON response for `path`. The last queued response repeats.
    pub fn respond_json(&self, path: &str, status: u16, body: Value) {
        self.push(path, status, body.to_string(), None);
    }

    /// Queues a raw response body for `path`.
    pub fn respond_raw(&self, path: &str, status: u16, body: &str) {
        self.push(path, status, body.to_string(), None);
    }

    /// Queues a JSON response that is sent after `delay`.
    pub fn respond_delayed(&self, path: &str, delay: Duration, body: Value) {
        self.push(path, 200, body.to_string(), Some(delay));
    }

    fn push(&self, path: &str, status: u16, body: String, delay: Option<Duration>) {
        self.state
            .routes
            .lock()
            .expect("routes")
            .entry(path.to_string())
            .or_default()
            .push_back(Canned {
                status,
                body,
                delay,
            });
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("requests").clone()
    }

    /// Number of requests seen for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Waits for the next accepted WebSocket connection.
    pub async fn next_connection(&self) -> ServerConn {
        let mut conns = self.conns.lock().await;
        tokio::time::timeout(TEST_TIMEOUT, conns.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("backend stopped")
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn http_handler(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().expect("requests").push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header(AUTHORIZATION),
        content_type: header(CONTENT_TYPE),
        body: if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        },
    });

    let canned = {
        let mut routes = state.routes.lock().expect("routes");
        routes.get_mut(uri.path()).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };

    let Some(canned) = canned else {
        return (StatusCode::NOT_FOUND, r#"{"detail":"Not Found"}"#).into_response();
    };

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(CONTENT_TYPE, "application/json")], canned.body).into_response()
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| serve_socket(socket, state, authorization))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<MockState>, authorization: Option<String>) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

    let conn = ServerConn {
        authorization,
        incoming: incoming_rx,
        outgoing: outgoing_tx,
    };
    if state.conns.send(conn).is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = incoming_tx.send(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            cmd = outgoing_rx.recv() => match cmd {
                Some(ServerCommand::Send(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(ServerCommand::Close) | None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}

/// Returns an address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr")
}

/// Waits until the watched connection state satisfies `predicate`.
pub async fn wait_for_state<F>(rx: &mut watch::Receiver<ConnectionState>, predicate: F) -> ConnectionState
where
    F: FnMut(&ConnectionState) -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed")
        .clone()
}

/// Polls `predicate` until it holds.
pub async fn eventually<F>(predicate: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(TEST_TIMEOUT, async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
