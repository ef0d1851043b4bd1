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

//! The caches behind every facade operation and the loaders that fill them.
//!
//! Each loader follows the same shape: subscribe to the events the command
//! streams its results through (if any), send the command, merge any attached
//! paused-state data into the pause store, and return the decoded value.

use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::FutureExt;
use parking_lot::Mutex;
use replay_common::{ExecutionPoint, ObjectId, PauseId, RequestId, ScopeId, SourceId, TimeStampedPoint, TimeStampedPointRange};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    context::{decode, decode_field, SessionContext},
    types::{
        ConsoleMessage, LineLocations, MessagesResult, NetworkRequest, NetworkRequestEvent, NetworkRequests,
        PointDescription, RecordingCapabilities, ResponseBody, ResponseBodyPart, ScopeMapping, ScreenShot,
        SourceContents, StepKind,
    },
};
use crate::{
    cache::{Cache, CacheOptions, ExternallyManagedCache, SingleEntryCache, StreamingCache},
    error::ClientError,
    pause::{Frame, Location, Object, PauseData, Scope, Source},
    transport::{error_codes, ProtocolError},
};

/// Upper bound on hit points requested for one location
pub const MAX_HIT_POINTS: usize = 10_000;

/// Hit-point lookups are scoped by the focus window active when issued.
pub(crate) type HitPointQuery = (Location, Option<TimeStampedPointRange>);

pub(crate) struct ClientCaches {
    pub(crate) endpoint: SingleEntryCache<TimeStampedPoint>,
    pub(crate) capabilities: SingleEntryCache<RecordingCapabilities>,
    pub(crate) point_near_time: Cache<f64, u64, TimeStampedPoint>,
    pub(crate) sources: SingleEntryCache<Arc<Vec<Source>>>,
    pub(crate) source_contents: StreamingCache<SourceId, SourceId, SourceContents>,
    pub(crate) breakpoint_positions: Cache<SourceId, SourceId, Arc<Vec<LineLocations>>>,
    pub(crate) scope_maps: Cache<Location, Location, Arc<Vec<ScopeMapping>>>,
    pub(crate) frames: Cache<PauseId, PauseId, Arc<Vec<Arc<Frame>>>>,
    pub(crate) object_previews: Cache<(PauseId, ObjectId), (PauseId, ObjectId), Arc<Object>>,
    pub(crate) scopes: Cache<(PauseId, ScopeId), (PauseId, ScopeId), Arc<Scope>>,
    pub(crate) documents: Cache<PauseId, PauseId, ObjectId>,
    pub(crate) repaints: Cache<PauseId, PauseId, Option<ScreenShot>>,
    pub(crate) screenshots: Arc<ExternallyManagedCache<PauseId, ScreenShot>>,
    pub(crate) step_targets: Cache<(ExecutionPoint, StepKind), (ExecutionPoint, StepKind), PointDescription>,
    pub(crate) hit_points: Cache<HitPointQuery, HitPointQuery, Arc<Vec<PointDescription>>>,
    pub(crate) messages: Cache<Option<TimeStampedPointRange>, Option<TimeStampedPointRange>, Arc<MessagesResult>>,
    pub(crate) network_requests: SingleEntryCache<Arc<NetworkRequests>>,
    pub(crate) response_bodies: Cache<RequestId, RequestId, Arc<ResponseBody>>,
}

/// Sources known so far, used to pick preferred frame locations.
fn known_sources(sources: &SingleEntryCache<Arc<Vec<Source>>>) -> Arc<Vec<Source>> {
    sources.get_if_cached().unwrap_or_default()
}

fn event_targets(params: &Value, key: &str, wanted: &str) -> bool {
    params.get(key).and_then(Value::as_str) == Some(wanted)
}

impl ClientCaches {
    pub(crate) fn new(ctx: Arc<SessionContext>, screenshot_timeout: Option<Duration>) -> Self {
        let sources = Self::sources_cache(ctx.clone());
        let screenshots = Arc::new(ExternallyManagedCache::new("screenshots", screenshot_timeout));

        Self {
            endpoint: Self::endpoint_cache(ctx.clone()),
            capabilities: Self::capabilities_cache(ctx.clone()),
            point_near_time: Self::point_near_time_cache(ctx.clone()),
            source_contents: Self::source_contents_cache(ctx.clone()),
            breakpoint_positions: Self::breakpoint_positions_cache(ctx.clone()),
            scope_maps: Self::scope_map_cache(ctx.clone()),
            frames: Self::frames_cache(ctx.clone(), sources.clone()),
            object_previews: Self::object_preview_cache(ctx.clone(), sources.clone()),
            scopes: Self::scope_cache(ctx.clone(), sources.clone()),
            documents: Self::document_cache(ctx.clone(), sources.clone()),
            repaints: Self::repaint_cache(ctx.clone(), screenshots.clone()),
            step_targets: Self::step_target_cache(ctx.clone()),
            hit_points: Self::hit_point_cache(ctx.clone()),
            messages: Self::message_cache(ctx.clone(), sources.clone()),
            network_requests: Self::network_request_cache(ctx.clone()),
            response_bodies: Self::response_body_cache(ctx),
            screenshots,
            sources,
        }
    }

    /// Forget every cached backend error so the next read asks again.
    pub(crate) fn clear_errors(&self) -> usize {
        let cleared = self.endpoint.clear_errors()
            + self.capabilities.clear_errors()
            + self.point_near_time.clear_errors()
            + self.sources.clear_errors()
            + self.source_contents.clear_errors()
            + self.breakpoint_positions.clear_errors()
            + self.scope_maps.clear_errors()
            + self.frames.clear_errors()
            + self.object_previews.clear_errors()
            + self.scopes.clear_errors()
            + self.documents.clear_errors()
            + self.repaints.clear_errors()
            + self.screenshots.clear_errors()
            + self.step_targets.clear_errors()
            + self.hit_points.clear_errors()
            + self.messages.clear_errors()
            + self.network_requests.clear_errors()
            + self.response_bodies.clear_errors();
        debug!("Cleared {} failed cache entries", cleared);
        cleared
    }

    /// Drop everything keyed by a pause that left the pause store.
    pub(crate) fn discard_pause(&self, pause_id: &PauseId) {
        let evicted = self.frames.evict_where(|id| id == pause_id)
            + self.object_previews.evict_where(|(id, _)| id == pause_id)
            + self.scopes.evict_where(|(id, _)| id == pause_id)
            + self.documents.evict_where(|id| id == pause_id)
            + self.repaints.evict_where(|id| id == pause_id);
        self.screenshots.evict(pause_id);
        debug!("Evicted {} cache entries of pause {}", evicted, pause_id);
    }

    fn endpoint_cache(ctx: Arc<SessionContext>) -> SingleEntryCache<TimeStampedPoint> {
        SingleEntryCache::new(CacheOptions::immutable("endpoint"), move || {
            let ctx = ctx.clone();
            async move {
                let method = "Session.getEndpoint";
                let result = ctx.command(method, json!({})).await?;
                decode(method, result["endpoint"].clone())
            }
            .boxed()
        })
    }

    fn capabilities_cache(ctx: Arc<SessionContext>) -> SingleEntryCache<RecordingCapabilities> {
        SingleEntryCache::new(CacheOptions::immutable("capabilities"), move || {
            let ctx = ctx.clone();
            async move {
                let method = "Session.getBuildId";
                let result = ctx.command(method, json!({})).await?;
                let build_id: String = decode(method, result["buildId"].clone())?;
                debug!("Recording build id: {}", build_id);
                Ok(RecordingCapabilities::from_build_id(&build_id))
            }
            .boxed()
        })
    }

    fn point_near_time_cache(ctx: Arc<SessionContext>) -> Cache<f64, u64, TimeStampedPoint> {
        Cache::new(CacheOptions::immutable("point-near-time"), |time: &f64| time.to_bits(), move |time: f64| {
            let ctx = ctx.clone();
            async move {
                let method = "Session.getPointNearTime";
                let result = ctx.command(method, json!({ "time": time })).await?;
                decode(method, result["point"].clone())
            }
            .boxed()
        })
    }

    /// Sources arrive as `Debugger.newSource(s)` events before the command's
    /// response.
    fn sources_cache(ctx: Arc<SessionContext>) -> SingleEntryCache<Arc<Vec<Source>>> {
        SingleEntryCache::new(CacheOptions::immutable("sources"), move || {
            let ctx = ctx.clone();
            async move {
                let collected = Arc::new(Mutex::new(Vec::<Source>::new()));
                let single = collected.clone();
                let batch = collected.clone();

                let _subscription = ctx
                    .subscribe()
                    .on("Debugger.newSource", move |params| match decode::<Source>("Debugger.newSource", params.clone()) {
                        Ok(source) => single.lock().push(source),
                        Err(e) => warn!("Ignoring malformed source: {}", e),
                    })
                    .on("Debugger.newSources", move |params| {
                        match decode_field::<Vec<Source>>("Debugger.newSources", params, "sources") {
                            Ok(sources) => batch.lock().extend(sources),
                            Err(e) => warn!("Ignoring malformed source batch: {}", e),
                        }
                    });

                ctx.command("Debugger.findSources", json!({})).await?;

                let mut seen = HashSet::new();
                let mut sources = std::mem::take(&mut *collected.lock());
                sources.retain(|source| seen.insert(source.source_id.clone()));
                debug!("Found {} sources", sources.len());
                Ok(Arc::new(sources))
            }
            .boxed()
        })
    }

    fn source_contents_cache(ctx: Arc<SessionContext>) -> StreamingCache<SourceId, SourceId, SourceContents> {
        StreamingCache::new(
            CacheOptions::immutable("source-contents"),
            |source_id: &SourceId| source_id.clone(),
            move |source_id: SourceId, sink| {
                let ctx = ctx.clone();
                async move {
                    let sink = Arc::new(sink);
                    let contents = Arc::new(Mutex::new(SourceContents::default()));

                    let (info_sink, info_contents, info_id) = (sink.clone(), contents.clone(), source_id.clone());
                    let (chunk_sink, chunk_contents, chunk_id) = (sink.clone(), contents.clone(), source_id.clone());

                    let _subscription = ctx
                        .subscribe()
                        .on("Debugger.sourceContentsInfo", move |params| {
                            if !event_targets(params, "sourceId", info_id.as_str()) {
                                return;
                            }
                            let mut contents = info_contents.lock();
                            contents.content_type = params.get("contentType").and_then(Value::as_str).map(String::from);
                            contents.line_count = params.get("lineCount").and_then(Value::as_u64);
                            contents.code_unit_count = params.get("codeUnitCount").and_then(Value::as_u64);
                            info_sink.update(contents.clone());
                        })
                        .on("Debugger.sourceContentsChunk", move |params| {
                            if !event_targets(params, "sourceId", chunk_id.as_str()) {
                                return;
                            }
                            if let Some(chunk) = params.get("chunk").and_then(Value::as_str) {
                                let mut contents = chunk_contents.lock();
                                contents.content.push_str(chunk);
                                chunk_sink.update(contents.clone());
                            }
                        });

                    ctx.command("Debugger.streamSourceContents", json!({ "sourceId": source_id })).await?;

                    let contents = contents.lock().clone();
                    debug!("Streamed {} bytes of source {}", contents.content.len(), source_id);
                    Ok(contents)
                }
                .boxed()
            },
        )
    }

    fn breakpoint_positions_cache(ctx: Arc<SessionContext>) -> Cache<SourceId, SourceId, Arc<Vec<LineLocations>>> {
        Cache::new(
            CacheOptions::immutable("breakpoint-positions"),
            |source_id: &SourceId| source_id.clone(),
            move |source_id: SourceId| {
                let ctx = ctx.clone();
                async move {
                    let method = "Debugger.getPossibleBreakpoints";
                    let result = ctx.command(method, json!({ "sourceId": source_id })).await?;
                    let mut lines: Vec<LineLocations> = decode_field(method, &result, "lineLocations")?;
                    lines.sort_by_key(|line| line.line);
                    Ok(Arc::new(lines))
                }
                .boxed()
            },
        )
    }

    fn scope_map_cache(ctx: Arc<SessionContext>) -> Cache<Location, Location, Arc<Vec<ScopeMapping>>> {
        Cache::new(CacheOptions::immutable("scope-maps"), |location: &Location| location.clone(), move |location: Location| {
            let ctx = ctx.clone();
            async move {
                let method = "Debugger.getScopeMap";
                let result = ctx.command(method, json!({ "location": location })).await?;
                Ok(Arc::new(decode_field(method, &result, "map")?))
            }
            .boxed()
        })
    }

    fn frames_cache(
        ctx: Arc<SessionContext>,
        sources: SingleEntryCache<Arc<Vec<Source>>>,
    ) -> Cache<PauseId, PauseId, Arc<Vec<Arc<Frame>>>> {
        Cache::new(CacheOptions::immutable("frames"), |pause_id: &PauseId| pause_id.clone(), move |pause_id: PauseId| {
            let ctx = ctx.clone();
            let sources = sources.clone();
            async move {
                let method = "Pause.getAllFrames";
                let result = ctx.pause_command(&pause_id, method, json!({})).await?;
                let stack = decode_field(method, &result, "frames")?;
                let data: PauseData = decode_field(method, &result, "data")?;

                ctx.pauses.cache_pause_data(&pause_id, &known_sources(&sources), data);
                ctx.pauses.set_frame_stack(&pause_id, stack);
                let frames = ctx.pauses.frames(&pause_id).ok_or_else(|| {
                    ClientError::ProtocolViolation(format!("{method} response lacks data for some frames"))
                })?;
                Ok(Arc::new(frames))
            }
            .boxed()
        })
    }

    fn object_preview_cache(
        ctx: Arc<SessionContext>,
        sources: SingleEntryCache<Arc<Vec<Source>>>,
    ) -> Cache<(PauseId, ObjectId), (PauseId, ObjectId), Arc<Object>> {
        Cache::new(
            CacheOptions::immutable("object-previews"),
            |key: &(PauseId, ObjectId)| key.clone(),
            move |(pause_id, object_id): (PauseId, ObjectId)| {
                let ctx = ctx.clone();
                let sources = sources.clone();
                async move {
                    let method = "Pause.getObjectPreview";
                    let result = ctx.pause_command(&pause_id, method, json!({ "object": object_id })).await?;
                    let data: PauseData = decode_field(method, &result, "data")?;
                    ctx.pauses.cache_pause_data(&pause_id, &known_sources(&sources), data);
                    ctx.pauses.get_object(&pause_id, &object_id).ok_or_else(|| {
                        ClientError::ProtocolViolation(format!("{method} response lacks object {object_id}"))
                    })
                }
                .boxed()
            },
        )
    }

    fn scope_cache(
        ctx: Arc<SessionContext>,
        sources: SingleEntryCache<Arc<Vec<Source>>>,
    ) -> Cache<(PauseId, ScopeId), (PauseId, ScopeId), Arc<Scope>> {
        Cache::new(
            CacheOptions::immutable("scopes"),
            |key: &(PauseId, ScopeId)| key.clone(),
            move |(pause_id, scope_id): (PauseId, ScopeId)| {
                let ctx = ctx.clone();
                let sources = sources.clone();
                async move {
                    let method = "Pause.getScope";
                    let result = ctx.pause_command(&pause_id, method, json!({ "scope": scope_id })).await?;
                    let data: PauseData = decode_field(method, &result, "data")?;
                    ctx.pauses.cache_pause_data(&pause_id, &known_sources(&sources), data);
                    ctx.pauses.get_scope(&pause_id, &scope_id).ok_or_else(|| {
                        ClientError::ProtocolViolation(format!("{method} response lacks scope {scope_id}"))
                    })
                }
                .boxed()
            },
        )
    }

    fn document_cache(
        ctx: Arc<SessionContext>,
        sources: SingleEntryCache<Arc<Vec<Source>>>,
    ) -> Cache<PauseId, PauseId, ObjectId> {
        Cache::new(CacheOptions::immutable("documents"), |pause_id: &PauseId| pause_id.clone(), move |pause_id: PauseId| {
            let ctx = ctx.clone();
            let sources = sources.clone();
            async move {
                let method = "DOM.getDocument";
                let result = ctx.pause_command(&pause_id, method, json!({})).await?;
                let data: PauseData = decode_field(method, &result, "data")?;
                ctx.pauses.cache_pause_data(&pause_id, &known_sources(&sources), data);
                decode(method, result["document"].clone())
            }
            .boxed()
        })
    }

    /// Repainting pushes its screenshot into the externally managed
    /// screenshot cache, waking anyone waiting in `get_screenshot`.
    fn repaint_cache(
        ctx: Arc<SessionContext>,
        screenshots: Arc<ExternallyManagedCache<PauseId, ScreenShot>>,
    ) -> Cache<PauseId, PauseId, Option<ScreenShot>> {
        Cache::new(CacheOptions::immutable("repaints"), |pause_id: &PauseId| pause_id.clone(), move |pause_id: PauseId| {
            let ctx = ctx.clone();
            let screenshots = screenshots.clone();
            async move {
                let method = "DOM.repaintGraphics";
                let result = match ctx.pause_command(&pause_id, method, json!({})).await {
                    Ok(result) => result,
                    Err(err) => {
                        screenshots.cache_error(pause_id, err.clone());
                        return Err(err);
                    }
                };
                let screenshot: Option<ScreenShot> = decode_field(method, &result, "screenShot")?;
                match &screenshot {
                    Some(screenshot) => screenshots.cache_value(pause_id, screenshot.clone()),
                    None => screenshots.cache_error(
                        pause_id,
                        ProtocolError::new(error_codes::GRAPHICS_UNAVAILABLE_AT_POINT, "no graphics at this point").into(),
                    ),
                }
                Ok(screenshot)
            }
            .boxed()
        })
    }

    fn step_target_cache(
        ctx: Arc<SessionContext>,
    ) -> Cache<(ExecutionPoint, StepKind), (ExecutionPoint, StepKind), PointDescription> {
        Cache::new(
            CacheOptions::immutable("step-targets"),
            |key: &(ExecutionPoint, StepKind)| key.clone(),
            move |(point, kind): (ExecutionPoint, StepKind)| {
                let ctx = ctx.clone();
                async move {
                    let method = kind.command();
                    let result = ctx.command(method, json!({ "point": point })).await?;
                    decode(method, result["target"].clone())
                }
                .boxed()
            },
        )
    }

    fn hit_point_cache(ctx: Arc<SessionContext>) -> Cache<HitPointQuery, HitPointQuery, Arc<Vec<PointDescription>>> {
        Cache::new(
            CacheOptions::immutable("hit-points"),
            |query: &HitPointQuery| query.clone(),
            move |(location, window): HitPointQuery| {
                let ctx = ctx.clone();
                async move {
                    let method = "Session.findPoints";
                    let mut limits = json!({ "maxCount": MAX_HIT_POINTS });
                    if let Some(window) = &window {
                        limits["begin"] = json!(window.begin.point);
                        limits["end"] = json!(window.end.point);
                    }
                    let params = json!({
                        "pointSelector": { "kind": "locations", "locations": [location] },
                        "pointLimits": limits,
                    });
                    let result = ctx.command(method, params).await?;
                    let mut points: Vec<PointDescription> = decode_field(method, &result, "points")?;
                    points.sort_by(|a, b| a.point.cmp(&b.point));
                    Ok(Arc::new(points))
                }
                .boxed()
            },
        )
    }

    /// Without a focus window messages stream in as `Console.newMessage`
    /// events; with one they come back in the response.
    fn message_cache(
        ctx: Arc<SessionContext>,
        sources: SingleEntryCache<Arc<Vec<Source>>>,
    ) -> Cache<Option<TimeStampedPointRange>, Option<TimeStampedPointRange>, Arc<MessagesResult>> {
        Cache::new(
            CacheOptions::immutable("messages"),
            |window: &Option<TimeStampedPointRange>| window.clone(),
            move |window: Option<TimeStampedPointRange>| {
                let ctx = ctx.clone();
                let sources = sources.clone();
                async move {
                    let (mut messages, overflow) = match window {
                        Some(window) => {
                            let method = "Console.findMessagesInRange";
                            let range = json!({ "begin": window.begin.point, "end": window.end.point });
                            let result = ctx.command(method, json!({ "range": range })).await?;
                            let messages: Vec<ConsoleMessage> = decode_field(method, &result, "messages")?;
                            (messages, decode_field::<bool>(method, &result, "overflow")?)
                        }
                        None => {
                            let method = "Console.findMessages";
                            let collected = Arc::new(Mutex::new(Vec::new()));
                            let sink = collected.clone();
                            let _subscription = ctx.subscribe().on("Console.newMessage", move |params| {
                                match decode_field::<Option<ConsoleMessage>>("Console.newMessage", params, "message") {
                                    Ok(Some(message)) => sink.lock().push(message),
                                    Ok(None) => {}
                                    Err(e) => warn!("Ignoring malformed console message: {}", e),
                                }
                            });
                            let result = ctx.command(method, json!({})).await?;
                            let overflow = decode_field::<bool>(method, &result, "overflow")?;
                            let messages = std::mem::take(&mut *collected.lock());
                            (messages, overflow)
                        }
                    };

                    let known = known_sources(&sources);
                    for message in &mut messages {
                        let data = std::mem::take(&mut message.data);
                        if let Some(pause_id) = &message.pause_id {
                            ctx.pauses.cache_pause_data(pause_id, &known, data);
                        }
                    }
                    messages.sort_by(|a, b| a.point.point.cmp(&b.point.point));
                    if overflow {
                        debug!("Console message search overflowed after {} messages", messages.len());
                    }
                    Ok(Arc::new(MessagesResult { messages, overflow }))
                }
                .boxed()
            },
        )
    }

    fn network_request_cache(ctx: Arc<SessionContext>) -> SingleEntryCache<Arc<NetworkRequests>> {
        SingleEntryCache::new(CacheOptions::immutable("network-requests"), move || {
            let ctx = ctx.clone();
            async move {
                let collected = Arc::new(Mutex::new(NetworkRequests::default()));
                let sink = collected.clone();
                let _subscription = ctx.subscribe().on("Network.requests", move |params| {
                    let requests = decode_field::<Vec<NetworkRequest>>("Network.requests", params, "requests");
                    let events = decode_field::<Vec<NetworkRequestEvent>>("Network.requests", params, "events");
                    match (requests, events) {
                        (Ok(requests), Ok(events)) => {
                            let mut collected = sink.lock();
                            collected.requests.extend(requests);
                            collected.events.extend(events);
                        }
                        (Err(e), _) | (_, Err(e)) => warn!("Ignoring malformed network batch: {}", e),
                    }
                });

                ctx.command("Network.findRequests", json!({})).await?;

                let mut requests = std::mem::take(&mut *collected.lock());
                requests.requests.sort_by(|a, b| a.point.point.cmp(&b.point.point));
                Ok(Arc::new(requests))
            }
            .boxed()
        })
    }

    fn response_body_cache(ctx: Arc<SessionContext>) -> Cache<RequestId, RequestId, Arc<ResponseBody>> {
        Cache::new(CacheOptions::immutable("response-bodies"), |id: &RequestId| id.clone(), move |id: RequestId| {
            let ctx = ctx.clone();
            async move {
                let body = Arc::new(Mutex::new(ResponseBody::default()));
                let sink = body.clone();
                let wanted = id.clone();
                let _subscription = ctx.subscribe().on("Network.responseBodyData", move |params| {
                    if !event_targets(params, "id", wanted.as_str()) {
                        return;
                    }
                    match decode_field::<Vec<ResponseBodyPart>>("Network.responseBodyData", params, "parts") {
                        Ok(parts) => {
                            let mut body = sink.lock();
                            for part in parts {
                                body.insert(part);
                            }
                        }
                        Err(e) => warn!("Ignoring malformed response body chunk: {}", e),
                    }
                });

                ctx.command("Network.getResponseBody", json!({ "id": id })).await?;

                let body = std::mem::take(&mut *body.lock());
                Ok(Arc::new(body))
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_targets_matches_string_field() {
        assert!(event_targets(&json!({"sourceId": "1"}), "sourceId", "1"));
        assert!(!event_targets(&json!({"sourceId": "2"}), "sourceId", "1"));
        assert!(!event_targets(&json!({}), "sourceId", "1"));
    }
}
