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

//! Per-pause tables of frames, scopes and objects.
//!
//! Data arrives in batches attached to many different command responses and
//! is merged additively. Each pause has its own namespace: object, frame and
//! scope ids are only unique within a pause, so nothing is ever shared across
//! pause ids. Object graph links (parents, scope objects, prototypes) are kept
//! as plain ids and resolved through the owning pause's table.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use replay_common::{ExecutionPoint, FrameId, ObjectId, PauseId, ScopeId, SourceId};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::types::{select_preferred_location, Frame, Location, Object, ObjectPreview, PauseData, Scope, Source};
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Default)]
struct PauseEntry {
    point: Option<ExecutionPoint>,
    /// Stack order, innermost first; `None` until the full stack was fetched
    stack: Option<Vec<FrameId>>,
    frames: HashMap<FrameId, Arc<Frame>>,
    preferred_locations: HashMap<FrameId, Location>,
    scopes: HashMap<ScopeId, Arc<Scope>>,
    objects: HashMap<ObjectId, Arc<Object>>,
}

#[derive(Debug, Default)]
struct PauseTable {
    /// Insertion order, oldest first
    order: VecDeque<PauseId>,
    entries: HashMap<PauseId, PauseEntry>,
}

impl PauseTable {
    /// The entry for `pause_id`, created if needed. Pauses pushed out by the
    /// limit are appended to `evicted`.
    fn entry(&mut self, pause_id: &PauseId, max_pauses: Option<usize>, evicted: &mut Vec<PauseId>) -> &mut PauseEntry {
        if !self.entries.contains_key(pause_id) {
            if let Some(max) = max_pauses.filter(|max| *max > 0) {
                while self.order.len() >= max {
                    let Some(oldest) = self.order.pop_front() else { break };
                    debug!("Evicting pause {} beyond limit of {}", oldest, max);
                    self.entries.remove(&oldest);
                    evicted.push(oldest);
                }
            }
            self.order.push_back(pause_id.clone());
        }
        self.entries.entry(pause_id.clone()).or_default()
    }
}

/// Returns the preview to keep when an object is delivered again.
///
/// A complete preview is never replaced by a truncated one, and a missing
/// preview never erases a known one.
fn merge_preview(existing: Option<&ObjectPreview>, incoming: Option<ObjectPreview>) -> Option<ObjectPreview> {
    match (existing, incoming) {
        (None, incoming) => incoming,
        (Some(existing), None) => Some(existing.clone()),
        (Some(existing), Some(incoming)) => {
            if incoming.overflow && !existing.overflow {
                Some(existing.clone())
            } else {
                Some(incoming)
            }
        }
    }
}

type DiscardHandler = Arc<dyn Fn(&PauseId) + Send + Sync>;

/// Paused-state data model shared by the client facade
pub struct PauseStore {
    table: RwLock<PauseTable>,
    max_pauses: Option<usize>,
    version: watch::Sender<u64>,
    on_discard: Mutex<Option<DiscardHandler>>,
    /// Why the store stopped receiving data, once it has
    closed: RwLock<Option<String>>,
}

impl fmt::Debug for PauseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseStore")
            .field("pauses", &self.pause_count())
            .field("max_pauses", &self.max_pauses)
            .field("closed", &*self.closed.read())
            .finish()
    }
}

impl Default for PauseStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PauseStore {
    /// Create a store keeping at most `max_pauses` pauses; the oldest are
    /// discarded beyond that.
    pub fn new(max_pauses: Option<usize>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            table: RwLock::new(PauseTable::default()),
            max_pauses,
            version,
            on_discard: Mutex::new(None),
            closed: RwLock::new(None),
        }
    }

    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    /// Call `handler` for every pause dropped from the store, whether
    /// discarded explicitly or pushed out by the pause limit. Replaces any
    /// previous handler.
    ///
    /// The handler runs without any store lock held.
    pub fn on_discard(&self, handler: impl Fn(&PauseId) + Send + Sync + 'static) {
        *self.on_discard.lock() = Some(Arc::new(handler));
    }

    fn notify_discarded(&self, pause_ids: &[PauseId]) {
        if pause_ids.is_empty() {
            return;
        }
        let handler = self.on_discard.lock().clone();
        if let Some(handler) = handler {
            for pause_id in pause_ids {
                handler(pause_id);
            }
        }
    }

    /// Stop waiting for data that can no longer arrive. Readers blocked in
    /// [`wait_for_object`](Self::wait_for_object) fail with
    /// [`ClientError::Disconnected`], now and from then on.
    pub fn close(&self, reason: impl Into<String>) {
        {
            let mut closed = self.closed.write();
            if closed.is_some() {
                return;
            }
            let reason = reason.into();
            debug!("Pause store closed: {}", reason);
            *closed = Some(reason);
        }
        self.bump();
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.read().is_some()
    }

    /// Record a freshly created pause.
    pub fn register_pause(&self, pause_id: &PauseId, point: ExecutionPoint) {
        let mut evicted = Vec::new();
        self.table.write().entry(pause_id, self.max_pauses, &mut evicted).point = Some(point);
        self.bump();
        self.notify_discarded(&evicted);
    }

    /// Merge a batch of paused-state data into the namespace of `pause_id`.
    ///
    /// `sources` is used to choose the preferred location of each new frame.
    /// Re-delivering known data leaves the model unchanged.
    pub fn cache_pause_data(&self, pause_id: &PauseId, sources: &[Source], data: PauseData) {
        if data.is_empty() {
            return;
        }
        trace!(
            "Merging {} frames, {} scopes, {} objects into pause {}",
            data.frames.len(),
            data.scopes.len(),
            data.objects.len(),
            pause_id
        );

        let by_id: HashMap<SourceId, &Source> =
            sources.iter().map(|source| (source.source_id.clone(), source)).collect();

        let mut evicted = Vec::new();
        {
            let mut table = self.table.write();
            let entry = table.entry(pause_id, self.max_pauses, &mut evicted);

            for frame in data.frames {
                if let Some(location) = select_preferred_location(&frame.location, &by_id) {
                    entry.preferred_locations.insert(frame.frame_id.clone(), location.clone());
                }
                entry.frames.insert(frame.frame_id.clone(), Arc::new(frame));
            }

            for scope in data.scopes {
                entry.scopes.insert(scope.scope_id.clone(), Arc::new(scope));
            }

            for mut object in data.objects {
                let existing = entry.objects.get(&object.object_id);
                if existing.is_some_and(|existing| **existing == object) {
                    continue;
                }
                object.preview = merge_preview(
                    existing.and_then(|existing| existing.preview.as_ref()),
                    object.preview.take(),
                );
                if object.class_name.is_empty() {
                    if let Some(existing) = existing {
                        object.class_name = existing.class_name.clone();
                    }
                }
                entry.objects.insert(object.object_id.clone(), Arc::new(object));
            }
        }

        self.bump();
        self.notify_discarded(&evicted);
    }

    /// Record the full stack of a pause, innermost frame first.
    pub fn set_frame_stack(&self, pause_id: &PauseId, stack: Vec<FrameId>) {
        let mut evicted = Vec::new();
        self.table.write().entry(pause_id, self.max_pauses, &mut evicted).stack = Some(stack);
        self.bump();
        self.notify_discarded(&evicted);
    }

    /// Returns `true` if the pause is known.
    pub fn has_pause(&self, pause_id: &PauseId) -> bool {
        self.table.read().entries.contains_key(pause_id)
    }

    /// Point at which the pause was created, if it was registered.
    pub fn pause_point(&self, pause_id: &PauseId) -> Option<ExecutionPoint> {
        self.table.read().entries.get(pause_id)?.point.clone()
    }

    /// Whatever is known about an object so far.
    pub fn get_object(&self, pause_id: &PauseId, object_id: &ObjectId) -> Option<Arc<Object>> {
        self.table.read().entries.get(pause_id)?.objects.get(object_id).cloned()
    }

    /// Wait until the object has been merged into the pause.
    ///
    /// Fails with [`ClientError::Aborted`] if the pause is discarded while
    /// waiting, and with [`ClientError::Disconnected`] once the store is
    /// closed.
    pub async fn wait_for_object(&self, pause_id: &PauseId, object_id: &ObjectId) -> ClientResult<Arc<Object>> {
        let mut version = self.version.subscribe();
        let mut seen_pause = false;
        loop {
            let discarded = {
                let table = self.table.read();
                match table.entries.get(pause_id) {
                    Some(entry) => {
                        seen_pause = true;
                        if let Some(object) = entry.objects.get(object_id) {
                            return Ok(object.clone());
                        }
                        false
                    }
                    None => seen_pause,
                }
            };
            if let Some(reason) = self.closed.read().clone() {
                return Err(ClientError::Disconnected(reason));
            }
            if discarded {
                return Err(ClientError::Aborted);
            }
            if version.changed().await.is_err() {
                return Err(ClientError::Aborted);
            }
        }
    }

    /// A frame by id.
    pub fn get_frame(&self, pause_id: &PauseId, frame_id: &FrameId) -> Option<Arc<Frame>> {
        self.table.read().entries.get(pause_id)?.frames.get(frame_id).cloned()
    }

    /// A frame by stack index, 0 being the innermost.
    pub fn get_frame_by_index(&self, pause_id: &PauseId, index: usize) -> Option<Arc<Frame>> {
        let table = self.table.read();
        let entry = table.entries.get(pause_id)?;
        let frame_id = entry.stack.as_ref()?.get(index)?;
        entry.frames.get(frame_id).cloned()
    }

    /// All frames in stack order, once the stack and every frame are known.
    pub fn frames(&self, pause_id: &PauseId) -> Option<Vec<Arc<Frame>>> {
        let table = self.table.read();
        let entry = table.entries.get(pause_id)?;
        entry.stack.as_ref()?.iter().map(|frame_id| entry.frames.get(frame_id).cloned()).collect()
    }

    /// The location to show for a frame.
    pub fn preferred_location(&self, pause_id: &PauseId, frame_id: &FrameId) -> Option<Location> {
        self.table.read().entries.get(pause_id)?.preferred_locations.get(frame_id).cloned()
    }

    /// A scope by id.
    pub fn get_scope(&self, pause_id: &PauseId, scope_id: &ScopeId) -> Option<Arc<Scope>> {
        self.table.read().entries.get(pause_id)?.scopes.get(scope_id).cloned()
    }

    /// The scope chain of a frame, innermost first, once every scope is known.
    pub fn scope_chain(&self, pause_id: &PauseId, frame_id: &FrameId) -> Option<Vec<Arc<Scope>>> {
        let table = self.table.read();
        let entry = table.entries.get(pause_id)?;
        let frame = entry.frames.get(frame_id)?;
        frame.scope_chain.iter().map(|scope_id| entry.scopes.get(scope_id).cloned()).collect()
    }

    /// Returns `true` if `node` is `root` or one of its descendants.
    ///
    /// Walks parent links known so far; a missing link answers `false`.
    pub fn is_node_in_subtree(&self, pause_id: &PauseId, node: &ObjectId, root: &ObjectId) -> bool {
        let table = self.table.read();
        let Some(entry) = table.entries.get(pause_id) else { return false };

        let mut visited = HashSet::new();
        let mut current = node.clone();
        loop {
            if current == *root {
                return true;
            }
            if !visited.insert(current.clone()) {
                return false;
            }
            let parent = entry
                .objects
                .get(&current)
                .and_then(|object| object.node())
                .and_then(|node| node.parent_node.clone());
            match parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Number of ancestors between `node` and the document root.
    ///
    /// `None` while the parent chain is incomplete.
    pub fn node_depth(&self, pause_id: &PauseId, node: &ObjectId) -> Option<usize> {
        let table = self.table.read();
        let entry = table.entries.get(pause_id)?;

        let mut visited = HashSet::new();
        let mut current = node.clone();
        let mut depth = 0;
        loop {
            if !visited.insert(current.clone()) {
                return None;
            }
            let info = entry.objects.get(&current)?.node()?;
            match &info.parent_node {
                Some(parent) => {
                    current = parent.clone();
                    depth += 1;
                }
                None => return Some(depth),
            }
        }
    }

    /// Drop everything known about a pause.
    pub fn discard_pause(&self, pause_id: &PauseId) -> bool {
        let removed = {
            let mut table = self.table.write();
            table.order.retain(|id| id != pause_id);
            table.entries.remove(pause_id).is_some()
        };
        if removed {
            debug!("Discarded pause {}", pause_id);
            self.bump();
            self.notify_discarded(std::slice::from_ref(pause_id));
        }
        removed
    }

    /// Drop every pause.
    pub fn clear(&self) {
        let discarded: Vec<PauseId> = {
            let mut table = self.table.write();
            table.entries.clear();
            table.order.drain(..).collect()
        };
        self.bump();
        self.notify_discarded(&discarded);
    }

    /// Number of pauses currently held.
    pub fn pause_count(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Number of objects known for a pause.
    pub fn object_count(&self, pause_id: &PauseId) -> usize {
        self.table.read().entries.get(pause_id).map(|entry| entry.objects.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pause::types::{NodeInfo, SourceKind};
    use std::time::Duration;

    fn object(id: &str, preview: Option<ObjectPreview>) -> Object {
        Object { object_id: id.into(), class_name: "Object".into(), preview }
    }

    fn preview(overflow: bool) -> ObjectPreview {
        ObjectPreview { properties: vec![], overflow, prototype_id: None, node: None }
    }

    fn node(id: &str, parent: Option<&str>) -> Object {
        Object {
            object_id: id.into(),
            class_name: "HTMLDivElement".into(),
            preview: Some(ObjectPreview {
                node: Some(NodeInfo {
                    node_type: 1,
                    node_name: "DIV".into(),
                    parent_node: parent.map(ObjectId::from),
                    child_nodes: vec![],
                    attributes: vec![],
                    is_connected: true,
                }),
                ..preview(false)
            }),
        }
    }

    fn objects(objects: Vec<Object>) -> PauseData {
        PauseData { objects, ..Default::default() }
    }

    #[tokio::test]
    async fn test_waiting_reader_resolves_once_object_arrives() {
        let store = Arc::new(PauseStore::default());
        let p1 = PauseId::from("p1");
        let five = ObjectId::from("5");
        assert!(store.get_object(&p1, &five).is_none());

        let waiter = {
            let store = store.clone();
            let (p1, five) = (p1.clone(), five.clone());
            tokio::spawn(async move { store.wait_for_object(&p1, &five).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        store.cache_pause_data(&p1, &[], objects(vec![object("5", None)]));
        let object = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap().unwrap();
        assert_eq!(object.object_id, five);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = PauseStore::default();
        let p1 = PauseId::from("p1");
        let batch = objects(vec![object("1", Some(preview(false))), object("2", None)]);

        store.cache_pause_data(&p1, &[], batch.clone());
        let first = store.get_object(&p1, &"1".into()).unwrap();
        store.cache_pause_data(&p1, &[], batch);

        assert_eq!(store.object_count(&p1), 2);
        let second = store.get_object(&p1, &"1".into()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_keeps_better_preview() {
        let store = PauseStore::default();
        let p1 = PauseId::from("p1");

        store.cache_pause_data(&p1, &[], objects(vec![object("1", Some(preview(false)))]));
        // Reference without a preview, then a truncated preview.
        store.cache_pause_data(&p1, &[], objects(vec![object("1", None)]));
        store.cache_pause_data(&p1, &[], objects(vec![object("1", Some(preview(true)))]));
        let kept = store.get_object(&p1, &"1".into()).unwrap();
        assert_eq!(kept.preview, Some(preview(false)));

        store.cache_pause_data(&p1, &[], objects(vec![object("2", Some(preview(true)))]));
        store.cache_pause_data(&p1, &[], objects(vec![object("2", Some(preview(false)))]));
        let upgraded = store.get_object(&p1, &"2".into()).unwrap();
        assert_eq!(upgraded.preview, Some(preview(false)));
    }

    #[test]
    fn test_pauses_do_not_share_objects() {
        let store = PauseStore::default();
        let (p1, p2) = (PauseId::from("p1"), PauseId::from("p2"));

        store.cache_pause_data(&p1, &[], objects(vec![object("5", Some(preview(false)))]));
        store.cache_pause_data(
            &p2,
            &[],
            objects(vec![Object { object_id: "5".into(), class_name: "Array".into(), preview: None }]),
        );

        assert_eq!(store.get_object(&p1, &"5".into()).unwrap().class_name, "Object");
        assert_eq!(store.get_object(&p2, &"5".into()).unwrap().class_name, "Array");
        assert!(store.get_object(&p2, &"5".into()).unwrap().preview.is_none());
    }

    #[test]
    fn test_frames_scopes_and_preferred_location() {
        let store = PauseStore::default();
        let p1 = PauseId::from("p1");
        let sources = vec![
            Source { source_id: "gen".into(), kind: SourceKind::ScriptSource, url: None, generated_source_ids: vec![] },
            Source {
                source_id: "orig".into(),
                kind: SourceKind::SourceMapped,
                url: None,
                generated_source_ids: vec!["gen".into()],
            },
        ];
        let frame = Frame {
            frame_id: "f0".into(),
            frame_type: "call".into(),
            function_name: Some("main".into()),
            location: vec![
                Location { source_id: "gen".into(), line: 100, column: 4 },
                Location { source_id: "orig".into(), line: 12, column: 2 },
            ],
            scope_chain: vec!["s0".into(), "s1".into()],
            this: None,
        };
        let scope = |id: &str| Scope {
            scope_id: id.into(),
            scope_type: "block".into(),
            object: None,
            function_lexical: None,
            bindings: vec![],
        };

        store.cache_pause_data(&p1, &sources, PauseData { frames: vec![frame], scopes: vec![scope("s0")], objects: vec![] });
        assert_eq!(store.preferred_location(&p1, &"f0".into()).unwrap().line, 12);
        // One scope is still missing.
        assert!(store.scope_chain(&p1, &"f0".into()).is_none());
        assert!(store.frames(&p1).is_none());

        store.cache_pause_data(&p1, &sources, PauseData { scopes: vec![scope("s1")], ..Default::default() });
        store.set_frame_stack(&p1, vec!["f0".into()]);
        assert_eq!(store.scope_chain(&p1, &"f0".into()).unwrap().len(), 2);
        assert_eq!(store.frames(&p1).unwrap().len(), 1);
        assert_eq!(store.get_frame_by_index(&p1, 0).unwrap().function_name.as_deref(), Some("main"));
        assert!(store.get_frame_by_index(&p1, 1).is_none());
    }

    #[test]
    fn test_subtree_and_depth_queries() {
        let store = PauseStore::default();
        let p1 = PauseId::from("p1");
        store.cache_pause_data(
            &p1,
            &[],
            objects(vec![node("html", None), node("body", Some("html")), node("div", Some("body"))]),
        );

        assert!(store.is_node_in_subtree(&p1, &"div".into(), &"html".into()));
        assert!(store.is_node_in_subtree(&p1, &"div".into(), &"div".into()));
        assert!(!store.is_node_in_subtree(&p1, &"html".into(), &"div".into()));
        assert_eq!(store.node_depth(&p1, &"div".into()), Some(2));
        assert_eq!(store.node_depth(&p1, &"html".into()), Some(0));
    }

    #[test]
    fn test_ancestry_terminates_on_missing_and_cyclic_links() {
        let store = PauseStore::default();
        let p1 = PauseId::from("p1");
        store.cache_pause_data(
            &p1,
            &[],
            objects(vec![
                node("orphan", Some("unknown")),
                node("a", Some("b")),
                node("b", Some("a")),
            ]),
        );

        assert!(!store.is_node_in_subtree(&p1, &"orphan".into(), &"root".into()));
        assert_eq!(store.node_depth(&p1, &"orphan".into()), None);
        assert!(!store.is_node_in_subtree(&p1, &"a".into(), &"root".into()));
        assert_eq!(store.node_depth(&p1, &"a".into()), None);
    }

    #[test]
    fn test_pause_limit_evicts_oldest() {
        let store = PauseStore::new(Some(2));
        for id in ["p1", "p2", "p3"] {
            store.cache_pause_data(&id.into(), &[], objects(vec![object("1", None)]));
        }
        assert_eq!(store.pause_count(), 2);
        assert!(!store.has_pause(&"p1".into()));
        assert!(store.has_pause(&"p3".into()));
    }

    #[test]
    fn test_discard_handler_sees_every_dropped_pause() {
        let store = PauseStore::new(Some(2));
        let dropped = Arc::new(Mutex::new(Vec::<PauseId>::new()));
        let sink = dropped.clone();
        store.on_discard(move |pause_id| sink.lock().push(pause_id.clone()));

        store.register_pause(&"p1".into(), ExecutionPoint::from(1));
        store.register_pause(&"p2".into(), ExecutionPoint::from(2));
        assert!(dropped.lock().is_empty());

        // The limit pushes out the oldest pause.
        store.cache_pause_data(&"p3".into(), &[], objects(vec![object("1", None)]));
        assert_eq!(*dropped.lock(), vec![PauseId::from("p1")]);

        assert!(store.discard_pause(&"p2".into()));
        assert!(!store.discard_pause(&"p2".into()));
        store.clear();
        assert_eq!(*dropped.lock(), vec![PauseId::from("p1"), PauseId::from("p2"), PauseId::from("p3")]);
    }

    #[test]
    fn test_discard_handler_may_use_the_store() {
        let store = Arc::new(PauseStore::default());
        let weak = Arc::downgrade(&store);
        let counted = Arc::new(Mutex::new(None));
        let sink = counted.clone();
        store.on_discard(move |_| {
            if let Some(store) = weak.upgrade() {
                *sink.lock() = Some(store.pause_count());
            }
        });

        store.register_pause(&"p1".into(), ExecutionPoint::from(1));
        store.discard_pause(&"p1".into());
        assert_eq!(*counted.lock(), Some(0));
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let store = Arc::new(PauseStore::default());
        let p1 = PauseId::from("p1");
        store.register_pause(&p1, ExecutionPoint::from(10));
        store.cache_pause_data(&p1, &[], objects(vec![object("1", None)]));

        let waiter = {
            let store = store.clone();
            let p1 = p1.clone();
            tokio::spawn(async move { store.wait_for_object(&p1, &"9".into()).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        store.close("connection reset");
        let err = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Disconnected(reason) if reason == "connection reset"));
        assert!(store.is_closed());

        // Known objects are still served, missing ones fail at once.
        assert!(store.wait_for_object(&p1, &"1".into()).await.is_ok());
        assert!(store.wait_for_object(&"p2".into(), &"1".into()).await.unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_discard_fails_waiters() {
        let store = Arc::new(PauseStore::default());
        let p1 = PauseId::from("p1");
        store.register_pause(&p1, ExecutionPoint::from(10));

        let waiter = {
            let store = store.clone();
            let p1 = p1.clone();
            tokio::spawn(async move { store.wait_for_object(&p1, &"9".into()).await })
        };
        tokio::task::yield_now().await;
        assert!(store.discard_pause(&p1));
        assert!(matches!(waiter.await.unwrap(), Err(ClientError::Aborted)));
        assert_eq!(store.pause_count(), 0);
    }
}
