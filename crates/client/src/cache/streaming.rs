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

//! Streaming cache: values that arrive incrementally.
//!
//! A streaming load pushes partial values through a [`StreamSink`] and
//! finally resolves with the complete value. Subscribers see every partial
//! value through a [`StreamSubscription`]. When the last subscriber of an
//! unfinished stream goes away, the load is cancelled and the entry dropped,
//! so a later request starts over.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::CacheOptions;
use crate::error::{ClientError, ClientResult};

/// Progress of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Data is still arriving
    Streaming,
    /// The final value has been delivered
    Complete,
    /// The load failed
    Failed,
}

/// What a subscriber observes at one moment
#[derive(Debug, Clone)]
pub struct StreamSnapshot<V> {
    /// Latest partial or final value
    pub value: Option<V>,
    /// Stream progress
    pub status: StreamStatus,
    /// Set when `status` is [`StreamStatus::Failed`]
    pub error: Option<ClientError>,
}

impl<V> StreamSnapshot<V> {
    fn streaming() -> Self {
        Self { value: None, status: StreamStatus::Streaming, error: None }
    }
}

/// Handle a streaming loader uses to publish partial values
pub struct StreamSink<V> {
    sender: Arc<watch::Sender<StreamSnapshot<V>>>,
    cancel: CancellationToken,
}

impl<V> StreamSink<V> {
    /// Publish a partial value. Returns `false` once the stream was aborted,
    /// in which case the value is dropped.
    pub fn update(&self, value: V) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sender.send_modify(|snapshot| snapshot.value = Some(value));
        true
    }

    /// Token cancelled when every subscriber has detached.
    pub fn abort_signal(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once the stream was aborted.
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

type StreamLoadFn<A, V> = Arc<dyn Fn(A, StreamSink<V>) -> BoxFuture<'static, ClientResult<V>> + Send + Sync>;

struct StreamEntry<V> {
    generation: u64,
    receiver: watch::Receiver<StreamSnapshot<V>>,
    cancel: CancellationToken,
    consumers: usize,
    finished: bool,
}

struct StreamInner<K, V> {
    name: String,
    entries: Mutex<HashMap<K, StreamEntry<V>>>,
    next_generation: AtomicU64,
    load_count: AtomicUsize,
}

impl<K: Eq + Hash + fmt::Debug, V> StreamInner<K, V> {
    fn detach(&self, key: &K, generation: u64) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else { return };
        if entry.generation != generation {
            return;
        }
        entry.consumers = entry.consumers.saturating_sub(1);
        if entry.consumers == 0 && !entry.finished {
            debug!("{}: last subscriber of {:?} detached, aborting stream", self.name, key);
            entry.cancel.cancel();
            entries.remove(key);
        }
    }
}

/// A live view of one stream
pub struct StreamSubscription<K: Eq + Hash + fmt::Debug, V> {
    key: K,
    generation: u64,
    receiver: watch::Receiver<StreamSnapshot<V>>,
    inner: Arc<StreamInner<K, V>>,
}

impl<K: Eq + Hash + fmt::Debug, V: Clone> StreamSubscription<K, V> {
    /// Latest value published so far.
    pub fn latest(&self) -> Option<V> {
        self.receiver.borrow().value.clone()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> StreamSnapshot<V> {
        self.receiver.borrow().clone()
    }

    /// Current progress.
    pub fn status(&self) -> StreamStatus {
        self.receiver.borrow().status
    }

    /// Wait for the next update. Returns `false` when no further updates can
    /// arrive.
    pub async fn changed(&mut self) -> bool {
        if self.receiver.borrow().status != StreamStatus::Streaming {
            return false;
        }
        self.receiver.changed().await.is_ok()
    }

    /// Wait for the final value.
    pub async fn wait_for_completion(&mut self) -> ClientResult<V> {
        let snapshot = self
            .receiver
            .wait_for(|snapshot| snapshot.status != StreamStatus::Streaming)
            .await
            .map_err(|_| ClientError::Aborted)?
            .clone();
        match (snapshot.status, snapshot.value, snapshot.error) {
            (StreamStatus::Failed, _, Some(err)) => Err(err),
            (StreamStatus::Complete, Some(value), _) => Ok(value),
            _ => Err(ClientError::Aborted),
        }
    }
}

impl<K: Eq + Hash + fmt::Debug, V> Drop for StreamSubscription<K, V> {
    fn drop(&mut self) {
        self.inner.detach(&self.key, self.generation);
    }
}

/// Keyed cache of streams
pub struct StreamingCache<A, K, V> {
    get_key: Arc<dyn Fn(&A) -> K + Send + Sync>,
    load: StreamLoadFn<A, V>,
    inner: Arc<StreamInner<K, V>>,
}

impl<A, K, V> Clone for StreamingCache<A, K, V> {
    fn clone(&self) -> Self {
        Self { get_key: self.get_key.clone(), load: self.load.clone(), inner: self.inner.clone() }
    }
}

impl<A, K, V> fmt::Debug for StreamingCache<A, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingCache").field("name", &self.inner.name).finish()
    }
}

impl<A, K, V> StreamingCache<A, K, V>
where
    A: Send + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a streaming cache. The loader receives the arguments and a sink
    /// for partial values and resolves with the complete value.
    pub fn new<KF, LF>(options: CacheOptions, get_key: KF, load: LF) -> Self
    where
        KF: Fn(&A) -> K + Send + Sync + 'static,
        LF: Fn(A, StreamSink<V>) -> BoxFuture<'static, ClientResult<V>> + Send + Sync + 'static,
    {
        Self {
            get_key: Arc::new(get_key),
            load: Arc::new(load),
            inner: Arc::new(StreamInner {
                name: options.name,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                load_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to the stream for these arguments, starting it if needed.
    pub fn stream(&self, args: A) -> StreamSubscription<K, V> {
        let key = (self.get_key)(&args);
        let mut entries = self.inner.entries.lock();

        if let Some(entry) = entries.get_mut(&key) {
            trace!("{}: joining stream {:?}", self.inner.name, key);
            entry.consumers += 1;
            return StreamSubscription {
                key,
                generation: entry.generation,
                receiver: entry.receiver.clone(),
                inner: self.inner.clone(),
            };
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(StreamSnapshot::streaming());
        let sender = Arc::new(sender);
        let cancel = CancellationToken::new();
        entries.insert(
            key.clone(),
            StreamEntry {
                generation,
                receiver: receiver.clone(),
                cancel: cancel.clone(),
                consumers: 1,
                finished: false,
            },
        );
        drop(entries);

        debug!("{}: starting stream {:?}", self.inner.name, key);
        self.inner.load_count.fetch_add(1, Ordering::Relaxed);
        let sink = StreamSink { sender: sender.clone(), cancel: cancel.clone() };
        let loading = (self.load)(args, sink);
        let inner = self.inner.clone();
        let task_key = key.clone();

        tokio::spawn(async move {
            // Dropping the loader on abort releases whatever it holds.
            let result = tokio::select! {
                result = loading => result,
                _ = cancel.cancelled() => {
                    trace!("{}: stream {:?} aborted", inner.name, task_key);
                    return;
                }
            };

            {
                let mut entries = inner.entries.lock();
                if !matches!(entries.get(&task_key), Some(entry) if entry.generation == generation) {
                    return;
                }
                if matches!(&result, Err(err) if err.is_transient()) {
                    // Current subscribers still see the failure below.
                    entries.remove(&task_key);
                } else if let Some(entry) = entries.get_mut(&task_key) {
                    entry.finished = true;
                }
            }

            sender.send_modify(|snapshot| match result {
                Ok(value) => {
                    snapshot.value = Some(value);
                    snapshot.status = StreamStatus::Complete;
                }
                Err(err) => {
                    debug!("{}: stream {:?} failed: {}", inner.name, task_key, err);
                    snapshot.status = StreamStatus::Failed;
                    snapshot.error = Some(err);
                }
            });
        });

        StreamSubscription { key, generation, receiver, inner: self.inner.clone() }
    }

    /// Subscribe and wait for the final value.
    pub async fn read_async(&self, args: A) -> ClientResult<V> {
        self.stream(args).wait_for_completion().await
    }

    /// The complete value, if the stream for these arguments has finished.
    pub fn get_if_cached(&self, args: &A) -> Option<V> {
        let key = (self.get_key)(args);
        let entries = self.inner.entries.lock();
        let entry = entries.get(&key)?;
        let snapshot = entry.receiver.borrow();
        match snapshot.status {
            StreamStatus::Complete => snapshot.value.clone(),
            _ => None,
        }
    }

    /// Progress of the stream for these arguments, `None` if not started.
    pub fn status(&self, args: &A) -> Option<StreamStatus> {
        let key = (self.get_key)(args);
        let entries = self.inner.entries.lock();
        entries.get(&key).map(|entry| entry.receiver.borrow().status)
    }

    /// Drop a finished or failed stream so the next subscription restarts it.
    /// Active streams are left alone.
    pub fn invalidate(&self, args: &A) -> bool {
        let key = (self.get_key)(args);
        let mut entries = self.inner.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.finished => entries.remove(&key).is_some(),
            _ => false,
        }
    }

    /// Drop every failed stream so the next subscription restarts it.
    pub fn clear_errors(&self) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !(entry.finished && entry.receiver.borrow().status == StreamStatus::Failed));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("{}: cleared {} failed streams", self.inner.name, removed);
        }
        removed
    }

    /// Number of streams started over the cache's lifetime.
    pub fn load_count(&self) -> usize {
        self.inner.load_count.load(Ordering::Relaxed)
    }
}
