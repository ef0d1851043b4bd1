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

//! The session transport.
//!
//! [`SessionTransport`] owns the one connection to the replay backend. Callers
//! send commands and await their responses; the transport correlates responses
//! by request id, fans unsolicited events out to registered listeners, and
//! publishes connection lifecycle changes.
//!
//! # Tasks
//!
//! Once IO is attached two background tasks run:
//!
//! - the **writer** drains an unbounded channel of serialized frames into the
//!   sink, so commands issued while still connecting are buffered and flushed
//!   in order,
//! - the **reader** decodes incoming frames, resolves pending commands and
//!   dispatches events synchronously within its own turn.
//!
//! When the reader observes end-of-stream, an IO error or a protocol violation,
//! every pending command is rejected at once. Nothing waits forever after a
//! disconnection has been observed.

use std::{
    collections::{HashMap, VecDeque},
    fmt::Display,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{future, Sink, SinkExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use replay_common::{PauseId, SessionId};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use super::protocol::{CommandRequest, IncomingMessage};
use crate::error::{ClientError, ClientResult};

/// Handler invoked for every event with a matching method name
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by `add_event_listener`, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Lifecycle of the transport connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No IO attached yet; commands are buffered
    Connecting,
    /// IO attached and healthy
    Connected,
    /// Closed cleanly, either locally or by the backend
    Closed,
    /// Closed because of an error
    Failed(String),
}

impl ConnectionState {
    /// Returns `true` for [`Self::Closed`] and [`Self::Failed`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }
}

/// Transport tuning knobs
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Upper bound on how long a single command may wait for its response
    pub command_timeout: Option<Duration>,
}

struct PendingCommand {
    method: String,
    responder: oneshot::Sender<ClientResult<Value>>,
}

/// Number of timed-out request ids remembered individually
const MAX_ABANDONED_REQUESTS: usize = 256;

/// Ids of commands whose callers gave up, so late responses can be dropped.
///
/// Only the most recent ids are kept. Request ids only grow, so anything at
/// or below the newest forgotten id is treated as abandoned too.
#[derive(Debug, Default)]
struct AbandonedRequests {
    recent: VecDeque<u64>,
    floor: Option<u64>,
}

impl AbandonedRequests {
    fn insert(&mut self, id: u64) {
        if self.recent.len() >= MAX_ABANDONED_REQUESTS {
            if let Some(oldest) = self.recent.pop_front() {
                self.floor = Some(self.floor.map_or(oldest, |floor| floor.max(oldest)));
            }
        }
        self.recent.push_back(id);
    }

    /// Returns `true` if a response for `id` should be dropped.
    fn take(&mut self, id: u64) -> bool {
        if let Some(index) = self.recent.iter().position(|abandoned| *abandoned == id) {
            self.recent.remove(index);
            return true;
        }
        self.floor.is_some_and(|floor| id <= floor)
    }

    fn clear(&mut self) {
        self.recent.clear();
        self.floor = None;
    }

    fn len(&self) -> usize {
        self.recent.len()
    }
}

#[derive(Default)]
struct PendingTable {
    /// Set once the transport has shut down; no new commands are accepted.
    closed: Option<String>,
    commands: HashMap<u64, PendingCommand>,
    abandoned: AbandonedRequests,
}

struct Shared {
    next_request_id: AtomicU64,
    next_listener_id: AtomicU64,
    pending: Mutex<PendingTable>,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, EventHandler)>>>,
    outgoing: mpsc::UnboundedSender<String>,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Shut down and reject every pending command.
    fn shutdown(&self, terminal: ConnectionState, reason: &str) {
        let drained = {
            let mut table = self.pending.lock();
            if table.closed.is_some() {
                return;
            }
            table.closed = Some(reason.to_string());
            table.abandoned.clear();
            std::mem::take(&mut table.commands)
        };

        match &terminal {
            ConnectionState::Failed(_) => error!("Session transport failed: {}", reason),
            _ => info!("Session transport closed: {}", reason),
        }
        if !drained.is_empty() {
            warn!("Rejecting {} pending commands", drained.len());
        }

        for (id, command) in drained {
            trace!("Rejecting command {} ({})", id, command.method);
            let _ = command.responder.send(Err(ClientError::Disconnected(reason.to_string())));
        }

        self.state.send_replace(terminal);
    }

    fn handle_frame(&self, text: &str) -> ClientResult<()> {
        match IncomingMessage::parse(text)? {
            IncomingMessage::Response { id, outcome } => {
                let command = {
                    let mut table = self.pending.lock();
                    match table.commands.remove(&id) {
                        Some(command) => command,
                        None if table.abandoned.take(id) => {
                            debug!("Dropping late response for abandoned command {}", id);
                            return Ok(());
                        }
                        None => {
                            return Err(ClientError::ProtocolViolation(format!(
                                "response for unknown request id {id}"
                            )));
                        }
                    }
                };
                debug!("Received response for {} ({})", id, command.method);
                let _ = command.responder.send(outcome.map_err(ClientError::from));
            }
            IncomingMessage::Event { method, params } => self.dispatch_event(&method, &params),
        }
        Ok(())
    }

    fn dispatch_event(&self, method: &str, params: &Value) {
        // Snapshot the handlers so listeners may add or remove listeners.
        let handlers: Vec<EventHandler> = match self.listeners.read().get(method) {
            Some(handlers) => handlers.iter().map(|(_, handler)| handler.clone()).collect(),
            None => {
                trace!("No listeners for event {}", method);
                return;
            }
        };

        trace!("Dispatching {} to {} listeners", method, handlers.len());
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(params))).is_err() {
                error!("Listener for {} panicked; continuing with remaining listeners", method);
            }
        }
    }
}

/// The single owner of the connection to the replay backend
pub struct SessionTransport {
    shared: Arc<Shared>,
    options: TransportOptions,
    /// Receiving half of the outgoing frame queue, taken when IO is attached
    outgoing_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionTransport {
    /// Create a transport in the [`ConnectionState::Connecting`] state.
    ///
    /// Commands sent before IO is attached are buffered.
    pub fn new(options: TransportOptions) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Connecting);

        Self {
            shared: Arc::new(Shared {
                next_request_id: AtomicU64::new(1),
                next_listener_id: AtomicU64::new(1),
                pending: Mutex::new(PendingTable::default()),
                listeners: RwLock::new(HashMap::new()),
                outgoing,
                state,
            }),
            options,
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Connect to a dispatch server over WebSocket.
    pub async fn connect(url: &str, options: TransportOptions) -> ClientResult<Self> {
        let transport = Self::new(options);
        transport.open(url).await?;
        Ok(transport)
    }

    /// Create a transport over arbitrary text-frame IO.
    pub fn from_io<Si, St, E1, E2>(sink: Si, stream: St, options: TransportOptions) -> Self
    where
        Si: Sink<String, Error = E1> + Send + 'static,
        St: Stream<Item = Result<String, E2>> + Send + 'static,
        E1: Display + Send + 'static,
        E2: Display + Send + 'static,
    {
        let transport = Self::new(options);
        // A fresh transport always has its receiver.
        let _ = transport.attach(sink, stream);
        transport
    }

    /// Open a WebSocket connection and attach it.
    pub async fn open(&self, url: &str) -> ClientResult<()> {
        info!("Connecting to dispatch server at {}", url);

        let (socket, _) = match tokio_tungstenite::connect_async(url).await {
            Ok(connected) => connected,
            Err(e) => {
                let reason = e.to_string();
                self.shared.shutdown(ConnectionState::Failed(reason.clone()), &reason);
                return Err(ClientError::Connect { url: url.to_string(), reason });
            }
        };

        let (write, read) = socket.split();
        let sink = write.with(|text: String| {
            future::ready(Ok::<_, tokio_tungstenite::tungstenite::Error>(Message::text(text)))
        });
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_string())),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec()).map_err(|e| format!("non-utf8 frame: {e}")),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(e.to_string())),
            })
        });

        self.attach(sink, stream).map_err(|e| ClientError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Attach IO and start the reader and writer tasks.
    pub fn attach<Si, St, E1, E2>(&self, sink: Si, stream: St) -> ClientResult<()>
    where
        Si: Sink<String, Error = E1> + Send + 'static,
        St: Stream<Item = Result<String, E2>> + Send + 'static,
        E1: Display + Send + 'static,
        E2: Display + Send + 'static,
    {
        let Some(mut outgoing_rx) = self.outgoing_rx.lock().take() else {
            return Err(ClientError::ProtocolViolation("transport IO already attached".into()));
        };

        let writer_shared = self.shared.clone();
        let writer = tokio::spawn(async move {
            let mut sink = Box::pin(sink);
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(frame).await {
                    let reason = format!("write failed: {e}");
                    writer_shared.shutdown(ConnectionState::Failed(reason.clone()), &reason);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let reader_shared = self.shared.clone();
        let reader = tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                match stream.next().await {
                    Some(Ok(text)) => {
                        trace!("Received frame: {}", text);
                        if let Err(e) = reader_shared.handle_frame(&text) {
                            warn!("Protocol violation: {}", e);
                            let reason = e.to_string();
                            reader_shared.shutdown(ConnectionState::Failed(reason.clone()), &reason);
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let reason = format!("read failed: {e}");
                        reader_shared.shutdown(ConnectionState::Failed(reason.clone()), &reason);
                        return;
                    }
                    None => {
                        reader_shared.shutdown(ConnectionState::Closed, "connection closed by backend");
                        return;
                    }
                }
            }
        });

        self.tasks.lock().extend([writer, reader]);

        self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Send a command that is not scoped to a session.
    pub async fn send_command(&self, method: &str, params: Value) -> ClientResult<Value> {
        self.send_scoped_command(method, params, None, None).await
    }

    /// Send a command, optionally scoped to a session and a pause.
    ///
    /// Resolves with the `result` of the matching response, or rejects with
    /// the backend error, a timeout, or [`ClientError::Disconnected`].
    pub async fn send_scoped_command(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
        pause_id: Option<&PauseId>,
    ) -> ClientResult<Value> {
        let id = self.shared.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = CommandRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.cloned(),
            pause_id: pause_id.cloned(),
        };
        let frame = serde_json::to_string(&request)?;

        let (responder, response) = oneshot::channel();
        {
            let mut table = self.shared.pending.lock();
            if let Some(reason) = &table.closed {
                return Err(ClientError::Disconnected(reason.clone()));
            }
            table.commands.insert(id, PendingCommand { method: method.to_string(), responder });
        }

        debug!("Sending command {} ({})", id, method);
        if self.shared.outgoing.send(frame).is_err() {
            self.shared.pending.lock().commands.remove(&id);
            return Err(ClientError::Disconnected("outgoing queue closed".to_string()));
        }

        let outcome = match self.options.command_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let mut table = self.shared.pending.lock();
                    if table.commands.remove(&id).is_some() {
                        table.abandoned.insert(id);
                        trace!("{} recently abandoned commands", table.abandoned.len());
                    }
                    warn!("Command {} ({}) timed out", id, method);
                    return Err(ClientError::Timeout {
                        operation: method.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => response.await,
        };

        outcome.unwrap_or_else(|_| Err(ClientError::Disconnected("transport dropped".to_string())))
    }

    /// Register a handler for events with the given method name.
    ///
    /// Handlers for the same event run in registration order.
    pub fn add_event_listener<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Added listener {:?} for {}", id, event);
        id
    }

    /// Remove a previously registered handler. Returns `false` if unknown.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.write();
        let mut removed = false;
        listeners.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of commands still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().commands.len()
    }

    /// Close the connection, rejecting every pending command.
    pub fn close(&self) {
        self.shared.shutdown(ConnectionState::Closed, "transport closed by client");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for SessionTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    type Backend = (fmpsc::UnboundedReceiver<String>, fmpsc::UnboundedSender<Result<String, String>>);

    fn transport() -> (SessionTransport, Backend) {
        let (to_backend, from_client) = fmpsc::unbounded::<String>();
        let (to_client, from_backend) = fmpsc::unbounded::<Result<String, String>>();
        let transport = SessionTransport::from_io(to_backend, from_backend, TransportOptions::default());
        (transport, (from_client, to_client))
    }

    async fn next_request(rx: &mut fmpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.next().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_response_correlated_by_id() {
        let (transport, (mut requests, responses)) = transport();
        let transport = Arc::new(transport);

        let first = tokio::spawn({
            let transport = transport.clone();
            async move { transport.send_command("A.first", json!({})).await }
        });
        let first_req = next_request(&mut requests).await;
        let second = tokio::spawn({
            let transport = transport.clone();
            async move { transport.send_command("A.second", json!({})).await }
        });
        let second_req = next_request(&mut requests).await;
        assert!(second_req["id"].as_u64() > first_req["id"].as_u64());

        // Answer out of order.
        responses
            .unbounded_send(Ok(json!({"id": second_req["id"], "result": "two"}).to_string()))
            .unwrap();
        responses
            .unbounded_send(Ok(json!({"id": first_req["id"], "result": "one"}).to_string()))
            .unwrap();

        assert_eq!(second.await.unwrap().unwrap(), json!("two"));
        assert_eq!(first.await.unwrap().unwrap(), json!("one"));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_is_typed() {
        let (transport, (mut requests, responses)) = transport();
        let call = tokio::spawn(async move {
            let result = transport.send_command("Debugger.findHitPoints", json!({})).await;
            (transport, result)
        });
        let req = next_request(&mut requests).await;
        responses
            .unbounded_send(Ok(json!({
                "id": req["id"],
                "error": {"code": 55, "message": "Too many points"}
            })
            .to_string()))
            .unwrap();

        let (_transport, result) = call.await.unwrap();
        let err = result.unwrap_err();
        assert!(err.is_too_many_points());
        assert_eq!(err.protocol_code(), Some(55));
    }

    #[tokio::test]
    async fn test_disconnect_rejects_all_pending() {
        let (transport, (mut requests, responses)) = transport();
        let transport = Arc::new(transport);

        let calls: Vec<_> = (0..5)
            .map(|i| {
                let transport = transport.clone();
                tokio::spawn(async move { transport.send_command(&format!("M.m{i}"), json!({})).await })
            })
            .collect();
        for _ in 0..5 {
            next_request(&mut requests).await;
        }
        assert_eq!(transport.pending_count(), 5);

        drop(responses);

        for call in calls {
            assert!(call.await.unwrap().unwrap_err().is_disconnected());
        }
        assert_eq!(transport.state(), ConnectionState::Closed);

        // New commands fail immediately once closed.
        assert!(transport.send_command("M.late", json!({})).await.unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_explicit_close_rejects_pending() {
        let (transport, (mut requests, _responses)) = transport();
        let transport = Arc::new(transport);
        let call = tokio::spawn({
            let transport = transport.clone();
            async move { transport.send_command("M.slow", json!({})).await }
        });
        next_request(&mut requests).await;

        transport.close();
        assert!(call.await.unwrap().unwrap_err().is_disconnected());
        assert!(transport.state().is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_response_id_fails_transport() {
        let (transport, (mut requests, responses)) = transport();
        let mut state = transport.subscribe_state();
        let call = tokio::spawn(async move {
            let result = transport.send_command("M.m", json!({})).await;
            (transport, result)
        });
        next_request(&mut requests).await;
        responses.unbounded_send(Ok(json!({"id": 9999, "result": null}).to_string())).unwrap();

        let (_transport, result) = call.await.unwrap();
        assert!(result.unwrap_err().is_disconnected());
        state.wait_for(|s| matches!(s, ConnectionState::Failed(_))).await.unwrap();
    }

    #[tokio::test]
    async fn test_events_fan_out_in_registration_order() {
        let (transport, (mut requests, responses)) = transport();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            transport.add_event_listener("Console.newMessage", move |params| {
                seen.lock().push(format!("{tag}:{}", params["n"]));
            });
        }
        // A panicking listener must not stop the others.
        transport.add_event_listener("Console.newMessage", |_| panic!("listener bug"));
        let seen_after = seen.clone();
        transport.add_event_listener("Console.newMessage", move |_| {
            seen_after.lock().push("after-panic".to_string());
        });

        for n in 1..=2 {
            responses
                .unbounded_send(Ok(json!({"method": "Console.newMessage", "params": {"n": n}}).to_string()))
                .unwrap();
        }

        // Round-trip a command to make sure both events were processed.
        let call = tokio::spawn(async move {
            let r = transport.send_command("Sync.ping", json!({})).await;
            (transport, r)
        });
        let req = next_request(&mut requests).await;
        responses.unbounded_send(Ok(json!({"id": req["id"], "result": {}}).to_string())).unwrap();
        call.await.unwrap().1.unwrap();

        assert_eq!(
            *seen.lock(),
            vec!["first:1", "second:1", "after-panic", "first:2", "second:2", "after-panic"]
        );
    }

    #[tokio::test]
    async fn test_remove_event_listener() {
        let (transport, (mut requests, responses)) = transport();
        let count = Arc::new(AtomicUsize::new(0));
        let id = {
            let count = count.clone();
            transport.add_event_listener("Session.loadedRegions", move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(transport.remove_event_listener(id));
        assert!(!transport.remove_event_listener(id));

        responses
            .unbounded_send(Ok(json!({"method": "Session.loadedRegions", "params": {}}).to_string()))
            .unwrap();
        let call = tokio::spawn(async move {
            let r = transport.send_command("Sync.ping", json!({})).await;
            (transport, r)
        });
        let req = next_request(&mut requests).await;
        responses.unbounded_send(Ok(json!({"id": req["id"], "result": {}}).to_string())).unwrap();
        call.await.unwrap().1.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commands_buffered_until_attached() {
        let transport = Arc::new(SessionTransport::new(TransportOptions::default()));
        assert_eq!(transport.state(), ConnectionState::Connecting);

        let call = tokio::spawn({
            let transport = transport.clone();
            async move { transport.send_command("Recording.createSession", json!({})).await }
        });
        tokio::task::yield_now().await;

        let (to_backend, mut from_client) = fmpsc::unbounded::<String>();
        let (to_client, from_backend) = fmpsc::unbounded::<Result<String, String>>();
        transport.attach(to_backend, from_backend).unwrap();
        assert_eq!(transport.state(), ConnectionState::Connected);

        let req = next_request(&mut from_client).await;
        assert_eq!(req["method"], "Recording.createSession");
        to_client
            .unbounded_send(Ok(json!({"id": req["id"], "result": {"sessionId": "s"}}).to_string()))
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap(), json!({"sessionId": "s"}));
    }

    #[test]
    fn test_abandoned_requests_stay_bounded() {
        let mut abandoned = AbandonedRequests::default();
        for id in 1..=(MAX_ABANDONED_REQUESTS as u64 + 44) {
            abandoned.insert(id);
        }
        assert_eq!(abandoned.len(), MAX_ABANDONED_REQUESTS);
        assert_eq!(abandoned.floor, Some(44));

        // Forgotten ids are still recognized through the floor.
        assert!(abandoned.take(3));
        assert!(abandoned.take(100));
        assert!(!abandoned.take(100));
        assert_eq!(abandoned.len(), MAX_ABANDONED_REQUESTS - 1);
        assert!(!abandoned.take(10_000));

        abandoned.clear();
        assert!(!abandoned.take(3));
    }

    #[tokio::test]
    async fn test_command_timeout_abandons_request() {
        let (to_backend, mut from_client) = fmpsc::unbounded::<String>();
        let (to_client, from_backend) = fmpsc::unbounded::<Result<String, String>>();
        let transport = SessionTransport::from_io(
            to_backend,
            from_backend,
            TransportOptions { command_timeout: Some(Duration::from_millis(20)) },
        );

        let err = transport.send_command("Slow.call", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        assert_eq!(transport.pending_count(), 0);

        // The late response is ignored instead of failing the transport.
        let req = next_request(&mut from_client).await;
        to_client.unbounded_send(Ok(json!({"id": req["id"], "result": 1}).to_string())).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.state(), ConnectionState::Connected);
    }
}
