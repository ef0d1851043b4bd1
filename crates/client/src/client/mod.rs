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

//! The `ReplayClient` facade.
//!
//! The one object the rest of an application talks to. Every operation
//! follows the same path: check the cache, otherwise send a command over the
//! transport, merge the response into the pause data model, then populate the
//! cache. Concurrent callers of the same operation with the same arguments
//! share one backend command.
//!
//! # Example
//!
//! ```rust,no_run
//! use replay_client::{ClientConfig, ReplayClient};
//! use replay_common::RecordingId;
//!
//! # async fn example() -> eyre::Result<()> {
//! let client = ReplayClient::connect(ClientConfig::default()).await?;
//! client.create_session(&RecordingId::from("2f3c...")).await?;
//!
//! let sources = client.find_sources().await?;
//! println!("{} sources", sources.len());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod caches;
mod context;
mod events;
mod types;

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use replay_common::{
    ExecutionPoint, FrameId, ObjectId, PauseId, RecordingId, RequestId, ScopeId, SessionId, SourceId,
    TimeStampedPoint, TimeStampedPointRange,
};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use self::{
    caches::ClientCaches,
    context::{decode, decode_field, EventSubscription, SessionContext},
    events::EventListeners,
};
use crate::{
    cache::StreamSubscription,
    config::ClientConfig,
    error::{ClientError, ClientResult},
    focus::{FocusWindowTracker, LoadedRegions},
    pause::{Frame, Location, Object, PauseData, PauseStore, Scope, Source},
    transport::{ConnectionState, ListenerId, SessionTransport},
};

pub use self::{
    caches::MAX_HIT_POINTS,
    events::{ClientEvent, ClientEventHandler, ClientEventKind},
    types::{
        ConsoleMessage, EvaluationResult, LineLocations, MessagesResult, NetworkRequest, NetworkRequestEvent,
        NetworkRequests, PointDescription, RecordingCapabilities, ResponseBody, ResponseBodyPart, ScopeMapping,
        ScreenShot, SourceContents, StepKind,
    },
};

/// Client for one replay session
pub struct ReplayClient {
    context: Arc<SessionContext>,
    caches: Arc<ClientCaches>,
    /// Held while a session is being created
    creating_session: tokio::sync::Mutex<()>,
    focus: Arc<FocusWindowTracker>,
    regions: Arc<RwLock<Option<LoadedRegions>>>,
    listeners: Arc<EventListeners>,
    session_events: Mutex<Option<EventSubscription>>,
    state_watcher: JoinHandle<()>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ReplayClient {
    /// Connect to the dispatch server named in `config`.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let transport = SessionTransport::connect(&config.dispatch_url, config.transport_options()).await?;
        Ok(Self::new(transport, &config))
    }

    /// Build a client over an existing transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(transport: SessionTransport, config: &ClientConfig) -> Self {
        let context = Arc::new(SessionContext {
            transport: Arc::new(transport),
            session: RwLock::new(None),
            pauses: PauseStore::new(config.pause_limit()),
        });
        let caches = Arc::new(ClientCaches::new(context.clone(), config.external_cache_timeout()));
        let listeners = Arc::new(EventListeners::default());

        // Loaders own the context, so the store only gets a weak handle back.
        let evict_from: Weak<ClientCaches> = Arc::downgrade(&caches);
        context.pauses.on_discard(move |pause_id| {
            if let Some(caches) = evict_from.upgrade() {
                caches.discard_pause(pause_id);
            }
        });

        let mut state = context.transport.subscribe_state();
        let state_listeners = listeners.clone();
        let state_context = Arc::downgrade(&context);
        let state_watcher = tokio::spawn(async move {
            let initial = state.borrow_and_update().clone();
            if initial.is_terminal() {
                close_pauses(&state_context, &initial);
                return;
            }
            while state.changed().await.is_ok() {
                let current = state.borrow_and_update().clone();
                let terminal = current.is_terminal();
                if terminal {
                    close_pauses(&state_context, &current);
                }
                state_listeners.emit(&ClientEvent::SessionStateChange(current));
                if terminal {
                    break;
                }
            }
        });

        Self {
            context,
            caches,
            creating_session: tokio::sync::Mutex::new(()),
            focus: Arc::new(FocusWindowTracker::new()),
            regions: Arc::new(RwLock::new(None)),
            listeners,
            session_events: Mutex::new(None),
            state_watcher,
            background: Mutex::new(Vec::new()),
        }
    }

    // ========== Session ==========

    /// Create the session for a recording.
    ///
    /// Starts listening for loaded-region updates. A client holds at most one
    /// session; concurrent calls are serialized and all but the first fail
    /// with [`ClientError::SessionActive`].
    pub async fn create_session(&self, recording_id: &RecordingId) -> ClientResult<SessionId> {
        let _creating = self.creating_session.lock().await;
        if let Some(existing) = self.session_id() {
            return Err(ClientError::SessionActive(existing));
        }

        let method = "Recording.createSession";
        let result = self.context.transport.send_command(method, json!({ "recordingId": recording_id })).await?;
        let session_id: SessionId = decode(method, result["sessionId"].clone())?;
        info!("Created session {} for recording {}", session_id, recording_id);
        *self.context.session.write() = Some(session_id.clone());

        let regions = self.regions.clone();
        let listeners = self.listeners.clone();
        let subscription = self.context.subscribe().on("Session.loadedRegions", move |params| {
            let loaded = match decode::<LoadedRegions>("Session.loadedRegions", params.clone()) {
                Ok(loaded) => loaded.normalized(),
                Err(e) => {
                    warn!("Ignoring malformed loaded regions: {}", e);
                    return;
                }
            };
            let progress = loaded.indexing_progress();
            let previous = regions.write().replace(loaded.clone());
            listeners.emit(&ClientEvent::LoadedRegionsChange(loaded));
            if previous.map(|previous| previous.indexing_progress()) != Some(progress) {
                listeners.emit(&ClientEvent::ProcessingProgressChange(progress));
            }
        });
        *self.session_events.lock() = Some(subscription);

        // The backend only answers this once the session ends.
        let context = self.context.clone();
        let listen = tokio::spawn(async move {
            if let Err(e) = context.command("Session.listenForLoadChanges", json!({})).await {
                debug!("Stopped listening for load changes: {}", e);
            }
        });
        self.background.lock().push(listen);

        Ok(session_id)
    }

    /// The current session, if one was created.
    pub fn session_id(&self) -> Option<SessionId> {
        self.context.session.read().clone()
    }

    /// Current transport state.
    pub fn connection_state(&self) -> ConnectionState {
        self.context.transport.state()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &SessionTransport {
        &self.context.transport
    }

    /// Release the session and close the connection.
    ///
    /// Pending operations fail with [`ClientError::Disconnected`].
    pub async fn close(&self) {
        if let Some(session_id) = self.session_id() {
            let params = json!({ "sessionId": session_id });
            if let Err(e) = self.context.transport.send_command("Recording.releaseSession", params).await {
                debug!("Failed to release session {}: {}", session_id, e);
            }
        }
        self.session_events.lock().take();
        self.context.transport.close();
        for task in self.background.lock().drain(..) {
            task.abort();
        }
        self.context.pauses.close("client closed");
        self.context.pauses.clear();
        *self.context.session.write() = None;
    }

    // ========== Events ==========

    /// Forget every backend error the caches hold so the next call of the
    /// failed operation asks the backend again. Returns how many entries were
    /// cleared.
    ///
    /// Connection and timeout failures are never cached, so this is only
    /// needed after the backend itself refused.
    pub fn retry_failed_loads(&self) -> usize {
        self.caches.clear_errors()
    }

    /// Register a handler for one kind of client event.
    pub fn add_event_listener<F>(&self, kind: ClientEventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.listeners.add(kind, Arc::new(handler))
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ========== Recording ==========

    /// Last point of the recording.
    pub async fn get_endpoint(&self) -> ClientResult<TimeStampedPoint> {
        self.caches.endpoint.read_async().await
    }

    /// What the recorded runtime supports.
    pub async fn get_recording_capabilities(&self) -> ClientResult<RecordingCapabilities> {
        self.caches.capabilities.read_async().await
    }

    /// The execution point closest to a time.
    pub async fn get_point_near_time(&self, time: f64) -> ClientResult<TimeStampedPoint> {
        self.caches.point_near_time.read_async(time).await
    }

    // ========== Focus window and loaded regions ==========

    /// The active focus window, `None` for the whole recording.
    pub fn get_current_focus_window(&self) -> Option<TimeStampedPointRange> {
        self.focus.current()
    }

    /// Ask the backend to narrow queries to `range`.
    ///
    /// The backend may adjust the window; the window it returns becomes the
    /// current one.
    pub async fn request_focus_window(&self, range: TimeStampedPointRange) -> ClientResult<TimeStampedPointRange> {
        let method = "Session.requestFocusWindow";
        let result = self.context.command(method, json!({ "request": range })).await?;
        let window: TimeStampedPointRange = decode(method, result["window"].clone())?;
        if self.focus.set(Some(window.clone())) {
            self.listeners.emit(&ClientEvent::FocusWindowChange(Some(window.clone())));
        }
        Ok(window)
    }

    /// Latest loaded regions, once the backend has reported any.
    pub fn get_loaded_regions(&self) -> Option<LoadedRegions> {
        self.regions.read().clone()
    }

    /// Indexing progress in `[0, 1]`, once the backend has reported any.
    pub fn get_processing_progress(&self) -> Option<f64> {
        self.regions.read().as_ref().map(LoadedRegions::indexing_progress)
    }

    // ========== Sources ==========

    /// Every source of the recording.
    pub async fn find_sources(&self) -> ClientResult<Arc<Vec<Source>>> {
        self.caches.sources.read_async().await
    }

    /// Sources, if already loaded.
    pub fn get_sources_if_cached(&self) -> Option<Arc<Vec<Source>>> {
        self.caches.sources.get_if_cached()
    }

    /// Subscribe to the contents of a source as they stream in.
    ///
    /// Dropping every subscription before completion aborts the stream.
    pub fn stream_source_contents(&self, source_id: &SourceId) -> StreamSubscription<SourceId, SourceContents> {
        self.caches.source_contents.stream(source_id.clone())
    }

    /// The complete contents of a source.
    pub async fn get_source_contents(&self, source_id: &SourceId) -> ClientResult<SourceContents> {
        self.caches.source_contents.read_async(source_id.clone()).await
    }

    /// Breakable positions in a source, sorted by line.
    pub async fn get_breakpoint_positions(&self, source_id: &SourceId) -> ClientResult<Arc<Vec<LineLocations>>> {
        self.caches.breakpoint_positions.read_async(source_id.clone()).await
    }

    /// Generated-to-original variable name mapping at a location.
    pub async fn get_scope_map(&self, location: &Location) -> ClientResult<Arc<Vec<ScopeMapping>>> {
        self.caches.scope_maps.read_async(location.clone()).await
    }

    // ========== Pauses ==========

    /// Pause at a point.
    ///
    /// Never cached: pausing twice at the same point may yield two pauses,
    /// and everything downstream is keyed by the id actually returned.
    pub async fn create_pause(&self, point: &ExecutionPoint) -> ClientResult<PauseId> {
        let method = "Session.createPause";
        let result = self.context.command(method, json!({ "point": point })).await?;
        let pause_id: PauseId = decode(method, result["pauseId"].clone())?;
        let data: PauseData = decode_field(method, &result, "data")?;

        debug!("Created pause {} at {}", pause_id, point);
        self.context.pauses.register_pause(&pause_id, point.clone());
        self.merge_pause_data(&pause_id, data);
        Ok(pause_id)
    }

    /// The paused-state data model.
    pub fn pauses(&self) -> &PauseStore {
        &self.context.pauses
    }

    /// Merge externally obtained paused-state data.
    pub fn merge_pause_data(&self, pause_id: &PauseId, data: PauseData) {
        let sources = self.caches.sources.get_if_cached().unwrap_or_default();
        self.context.pauses.cache_pause_data(pause_id, &sources, data);
    }

    /// Whatever is known about an object so far, without a backend call.
    pub fn get_object(&self, pause_id: &PauseId, object_id: &ObjectId) -> Option<Arc<Object>> {
        self.context.pauses.get_object(pause_id, object_id)
    }

    /// Every frame of a pause, innermost first.
    pub async fn get_all_frames(&self, pause_id: &PauseId) -> ClientResult<Arc<Vec<Arc<Frame>>>> {
        self.caches.frames.read_async(pause_id.clone()).await
    }

    /// The location to show for a frame, once its pause data is loaded.
    pub fn get_preferred_location(&self, pause_id: &PauseId, frame_id: &FrameId) -> Option<Location> {
        self.context.pauses.preferred_location(pause_id, frame_id)
    }

    /// An object with its preview.
    ///
    /// Objects whose preview already arrived with other data are returned
    /// without a backend call.
    pub async fn get_object_preview(&self, pause_id: &PauseId, object_id: &ObjectId) -> ClientResult<Arc<Object>> {
        if let Some(object) = self.context.pauses.get_object(pause_id, object_id) {
            if object.preview.is_some() {
                return Ok(object);
            }
        }
        self.caches.object_previews.read_async((pause_id.clone(), object_id.clone())).await
    }

    /// A scope of a pause.
    pub async fn get_scope(&self, pause_id: &PauseId, scope_id: &ScopeId) -> ClientResult<Arc<Scope>> {
        if let Some(scope) = self.context.pauses.get_scope(pause_id, scope_id) {
            return Ok(scope);
        }
        self.caches.scopes.read_async((pause_id.clone(), scope_id.clone())).await
    }

    /// Evaluate an expression in a frame, or in the global scope when `frame_id` is `None`.
    ///
    /// Results are not cached; objects they reference are merged into the pause.
    pub async fn evaluate_expression(
        &self,
        pause_id: &PauseId,
        frame_id: Option<&FrameId>,
        expression: &str,
    ) -> ClientResult<EvaluationResult> {
        let (method, params) = match frame_id {
            Some(frame_id) => ("Pause.evaluateInFrame", json!({ "frameId": frame_id, "expression": expression })),
            None => ("Pause.evaluateInGlobal", json!({ "expression": expression })),
        };
        let result = self.context.pause_command(pause_id, method, params).await?;
        let mut evaluation: EvaluationResult = decode(method, result["result"].clone())?;
        self.merge_pause_data(pause_id, std::mem::take(&mut evaluation.data));
        Ok(evaluation)
    }

    /// The DOM document object of a pause.
    pub async fn get_document(&self, pause_id: &PauseId) -> ClientResult<ObjectId> {
        self.caches.documents.read_async(pause_id.clone()).await
    }

    /// Render the page at a pause.
    ///
    /// `None` when no graphics exist at that point.
    pub async fn repaint_graphics(&self, pause_id: &PauseId) -> ClientResult<Option<ScreenShot>> {
        self.caches.repaints.read_async(pause_id.clone()).await
    }

    /// Wait for the screenshot of a pause, as delivered by a repaint.
    pub async fn get_screenshot(&self, pause_id: &PauseId) -> ClientResult<ScreenShot> {
        self.caches.screenshots.read_async(pause_id.clone()).await
    }

    /// Forget a pause, everything merged into it and every cached result
    /// keyed by it. Later reads for the pause go to the backend again.
    pub fn discard_pause(&self, pause_id: &PauseId) -> bool {
        self.context.pauses.discard_pause(pause_id)
    }

    // ========== Stepping and point queries ==========

    /// Where a step from `point` would land.
    pub async fn find_step_target(&self, point: &ExecutionPoint, kind: StepKind) -> ClientResult<PointDescription> {
        self.caches.step_targets.read_async((point.clone(), kind)).await
    }

    /// Every time `location` was hit inside the current focus window.
    ///
    /// Fails with a too-many-points protocol error (see
    /// [`ClientError::is_too_many_points`]) when the location is hit more
    /// than [`MAX_HIT_POINTS`] times; narrow the focus window and retry.
    pub async fn find_hit_points(&self, location: &Location) -> ClientResult<Arc<Vec<PointDescription>>> {
        self.caches.hit_points.read_async((location.clone(), self.focus.current())).await
    }

    // ========== Console and network ==========

    /// Console messages inside the current focus window.
    pub async fn find_messages(&self) -> ClientResult<Arc<MessagesResult>> {
        self.caches.messages.read_async(self.focus.current()).await
    }

    /// Every network request of the recording.
    pub async fn find_network_requests(&self) -> ClientResult<Arc<NetworkRequests>> {
        self.caches.network_requests.read_async().await
    }

    /// The response body of a network request.
    pub async fn get_response_body(&self, request_id: &RequestId) -> ClientResult<Arc<ResponseBody>> {
        self.caches.response_bodies.read_async(request_id.clone()).await
    }

    /// Send an arbitrary session-scoped command.
    pub async fn send_session_command(&self, method: &str, params: Value) -> ClientResult<Value> {
        self.context.command(method, params).await
    }
}

/// Fail readers blocked on pause data once the connection is gone.
fn close_pauses(context: &Weak<SessionContext>, state: &ConnectionState) {
    let Some(context) = context.upgrade() else { return };
    let reason = match state {
        ConnectionState::Failed(reason) => reason.clone(),
        _ => "connection closed".to_string(),
    };
    context.pauses.close(reason);
}

impl Drop for ReplayClient {
    fn drop(&mut self) {
        self.state_watcher.abort();
        for task in self.background.lock().drain(..) {
            task.abort();
        }
    }
}
