// Replay - time-travel debugging session client
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Mock dispatch server
//!
//! Speaks the replay wire protocol over a real WebSocket so the client can be
//! exercised end to end. Session bookkeeping (`Recording.createSession`,
//! `Recording.releaseSession`, `Session.listenForLoadChanges`) is answered by
//! the server itself; every other command goes to a scripted handler.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use eyre::Result;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A command as received by the mock server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRequest {
    /// Request id chosen by the client
    pub id: u64,
    /// Command name
    pub method: String,
    /// Command parameters
    #[serde(default)]
    pub params: Value,
    /// Session the command was scoped to
    #[serde(default)]
    pub session_id: Option<String>,
    /// Pause the command was scoped to
    #[serde(default)]
    pub pause_id: Option<String>,
}

/// One frame the handler wants sent back, in order
#[derive(Debug, Clone)]
pub enum MockReply {
    /// An unsolicited event
    Event {
        /// Event name
        method: String,
        /// Event payload
        params: Value,
    },
    /// Successful response to the request
    Result(Value),
    /// Error response to the request
    Error {
        /// Backend error code
        code: i64,
        /// Error message
        message: String,
    },
}

impl MockReply {
    /// An event frame.
    pub fn event(method: &str, params: Value) -> Self {
        Self::Event { method: method.to_string(), params }
    }

    /// An error response.
    pub fn error(code: i64, message: &str) -> Self {
        Self::Error { code, message: message.to_string() }
    }
}

/// Scripted command handler.
///
/// Returning `None` answers with an internal error; returning an empty list
/// leaves the command unanswered.
pub type MockHandler = Arc<dyn Fn(&MockRequest) -> Option<Vec<MockReply>> + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    handler: MockHandler,
    /// Frames pushed to `Session.listenForLoadChanges` callers
    load_changes: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    connections: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
    next_session: Arc<AtomicU64>,
    disconnect: CancellationToken,
}

/// Builder for a mock dispatch server
pub struct MockDispatchServer {
    handler: MockHandler,
    load_changes: Vec<Value>,
}

impl MockDispatchServer {
    /// Create a server whose non-session commands go to `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&MockRequest) -> Option<Vec<MockReply>> + Send + Sync + 'static,
    {
        Self { handler: Arc::new(handler), load_changes: Vec::new() }
    }

    /// Send `regions` as a `Session.loadedRegions` event once the client
    /// starts listening for load changes.
    pub fn with_loaded_regions(mut self, regions: Value) -> Self {
        self.load_changes.push(regions);
        self
    }

    /// Bind an ephemeral local port and start serving.
    pub async fn start(self) -> Result<MockServerHandle> {
        let state = ServerState {
            handler: self.handler,
            load_changes: Arc::new(Mutex::new(self.load_changes)),
            requests: Arc::new(Mutex::new(Vec::new())),
            connections: Arc::new(Mutex::new(Vec::new())),
            next_session: Arc::new(AtomicU64::new(1)),
            disconnect: CancellationToken::new(),
        };

        let app = Router::new().route("/", get(ws_handler)).with_state(state.clone());

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = served {
                error!("Mock dispatch server failed: {}", e);
            }
        });

        info!("Mock dispatch server listening on {}", actual_addr);
        Ok(MockServerHandle { addr: actual_addr, state, shutdown_tx: Some(shutdown_tx) })
    }
}

/// Handle to a running mock server
pub struct MockServerHandle {
    addr: SocketAddr,
    state: ServerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockServerHandle {
    /// WebSocket URL to connect to.
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Every command received so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.state.requests.lock().clone()
    }

    /// Number of commands received with the given method.
    pub fn count(&self, method: &str) -> usize {
        self.state.requests.lock().iter().filter(|request| request.method == method).count()
    }

    /// The most recent command with the given method.
    pub fn last(&self, method: &str) -> Option<MockRequest> {
        self.state.requests.lock().iter().rev().find(|request| request.method == method).cloned()
    }

    /// Push an event to every open connection.
    pub fn broadcast(&self, method: &str, params: Value) {
        let frame = json!({ "method": method, "params": params }).to_string();
        self.state.connections.lock().retain(|connection| connection.send(frame.clone()).is_ok());
    }

    /// Close every open connection from the server side.
    ///
    /// Connections accepted afterwards are closed immediately.
    pub fn disconnect_all(&self) {
        info!("Dropping all mock connections");
        self.state.disconnect.cancel();
    }

    /// Stop accepting connections.
    pub fn shutdown(mut self) {
        self.state.disconnect.cancel();
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            if shutdown_tx.send(()).is_err() {
                warn!("Mock dispatch server already shut down");
            }
        }
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        self.state.disconnect.cancel();
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Serve one client connection until either side closes it.
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (mut sender, mut receiver) = socket.split();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
    state.connections.lock().push(outgoing.clone());

    loop {
        tokio::select! {
            _ = state.disconnect.cancelled() => {
                debug!("Closing mock connection");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            Some(frame) = outgoing_rx.recv() => {
                if let Err(e) = sender.send(Message::Text(frame.into())).await {
                    error!("Failed to send frame: {}", e);
                    break;
                }
            }
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                };

                let request: MockRequest = match serde_json::from_str(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        error!("Failed to parse client request: {}", e);
                        continue;
                    }
                };
                debug!("Mock server received {} ({})", request.id, request.method);
                state.requests.lock().push(request.clone());

                for frame in respond(&state, &request) {
                    let _ = outgoing.send(frame);
                }
            }
        }
    }
}

fn respond(state: &ServerState, request: &MockRequest) -> Vec<String> {
    let replies = match request.method.as_str() {
        "Recording.createSession" => {
            let session = state.next_session.fetch_add(1, Ordering::Relaxed);
            vec![MockReply::Result(json!({ "sessionId": format!("mock-session-{session}") }))]
        }
        "Recording.releaseSession" => vec![MockReply::Result(json!({}))],
        "Session.listenForLoadChanges" => std::mem::take(&mut *state.load_changes.lock())
            .into_iter()
            .map(|regions| MockReply::event("Session.loadedRegions", regions))
            .collect(),
        _ => (state.handler)(request).unwrap_or_else(|| {
            warn!("Mock server has no handler for {}", request.method);
            vec![MockReply::error(1, &format!("unhandled method {}", request.method))]
        }),
    };

    replies
        .into_iter()
        .map(|reply| {
            match reply {
                MockReply::Event { method, params } => json!({ "method": method, "params": params }),
                MockReply::Result(result) => json!({ "id": request.id, "result": result }),
                MockReply::Error { code, message } => {
                    json!({ "id": request.id, "error": { "code": code, "message": message } })
                }
            }
            .to_string()
        })
        .collect()
}
