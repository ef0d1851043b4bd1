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

//! Keyed and single-entry caches with in-flight load coalescing.
//!
//! A cache is parameterized by the argument type passed to its loader, a key
//! function projecting those arguments onto a hashable key, and the loader
//! itself. For any key at most one load is in flight; concurrent readers of
//! that key all await the same shared future.
//!
//! Loads run on their own task. A load that has started always runs to
//! completion and populates the cache, even if every reader that triggered it
//! has gone away.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};

/// Boxed loader future
pub type LoadFuture<V> = BoxFuture<'static, ClientResult<V>>;

/// A load shared between every reader of the same key
pub type SharedLoad<V> = Shared<BoxFuture<'static, ClientResult<V>>>;

type KeyFn<A, K> = Arc<dyn Fn(&A) -> K + Send + Sync>;
type LoadFn<A, V> = Arc<dyn Fn(A) -> LoadFuture<V> + Send + Sync>;

/// Observable state of one cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Not requested yet, or dropped since
    NotFound,
    /// A load is in flight
    Pending,
    /// A value is cached
    Resolved,
    /// The last load failed and the error is cached
    Rejected,
}

/// Outcome of a non-blocking [`Cache::read`]
pub enum CacheRead<V> {
    /// The value was already cached
    Ready(V),
    /// A load is in flight; await the future for its outcome
    Suspended(SharedLoad<V>),
}

impl<V: Clone> CacheRead<V> {
    /// Wait for the value, completing immediately if it was cached.
    pub async fn resolve(self) -> ClientResult<V> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Suspended(load) => load.await,
        }
    }

    /// Returns `true` if reading required a load.
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// Options shared by all cache variants
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Name used in logs
    pub name: String,
    /// Resolved entries are never invalidated or reloaded
    pub immutable: bool,
}

impl CacheOptions {
    /// Options for a cache whose entries may be invalidated.
    pub fn mutable(name: impl Into<String>) -> Self {
        Self { name: name.into(), immutable: false }
    }

    /// Options for a cache whose resolved entries live for the whole session.
    pub fn immutable(name: impl Into<String>) -> Self {
        Self { name: name.into(), immutable: true }
    }
}

enum Entry<V> {
    Pending { generation: u64, load: SharedLoad<V> },
    Resolved(V),
    Rejected(ClientError),
}

struct Inner<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    next_generation: AtomicU64,
    load_count: AtomicUsize,
}

/// A keyed cache over loader arguments `A`, keys `K` and values `V`
pub struct Cache<A, K, V> {
    options: CacheOptions,
    get_key: KeyFn<A, K>,
    load: LoadFn<A, V>,
    inner: Arc<Inner<K, V>>,
}

impl<A, K, V> Clone for Cache<A, K, V> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            get_key: self.get_key.clone(),
            load: self.load.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<A, K, V> fmt::Debug for Cache<A, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.options.name)
            .field("immutable", &self.options.immutable)
            .field("load_count", &self.inner.load_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<A, K, V> Cache<A, K, V>
where
    A: Send + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache.
    ///
    /// `get_key` must be a pure function of the arguments: equal logical
    /// inputs have to produce equal keys.
    pub fn new<KF, LF>(options: CacheOptions, get_key: KF, load: LF) -> Self
    where
        KF: Fn(&A) -> K + Send + Sync + 'static,
        LF: Fn(A) -> LoadFuture<V> + Send + Sync + 'static,
    {
        Self {
            options,
            get_key: Arc::new(get_key),
            load: Arc::new(load),
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                load_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Cache name used in logs.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Read without blocking.
    ///
    /// Returns the cached value, rethrows a cached error, or starts (or joins)
    /// the load for this key and hands back the shared future.
    pub fn read(&self, args: A) -> ClientResult<CacheRead<V>> {
        let key = (self.get_key)(&args);

        let (generation, load, sender) = {
            let mut entries = self.inner.entries.lock();
            match entries.get(&key) {
                Some(Entry::Resolved(value)) => {
                    trace!("{}: hit {:?}", self.options.name, key);
                    return Ok(CacheRead::Ready(value.clone()));
                }
                Some(Entry::Rejected(err)) => return Err(err.clone()),
                Some(Entry::Pending { load, .. }) => {
                    trace!("{}: joining in-flight load for {:?}", self.options.name, key);
                    return Ok(CacheRead::Suspended(load.clone()));
                }
                None => {}
            }

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let (sender, receiver) = oneshot::channel::<ClientResult<V>>();
            let load = async move { receiver.await.unwrap_or(Err(ClientError::Aborted)) }
                .boxed()
                .shared();
            entries.insert(key.clone(), Entry::Pending { generation, load: load.clone() });
            (generation, load, sender)
        };

        debug!("{}: miss {:?}, loading", self.options.name, key);
        self.inner.load_count.fetch_add(1, Ordering::Relaxed);
        let loading = (self.load)(args);
        let inner = self.inner.clone();
        let name = self.options.name.clone();

        tokio::spawn(async move {
            let result = loading.await;
            {
                let mut entries = inner.entries.lock();
                let current = matches!(
                    entries.get(&key),
                    Some(Entry::Pending { generation: g, .. }) if *g == generation
                );
                if current {
                    match &result {
                        Ok(value) => {
                            entries.insert(key, Entry::Resolved(value.clone()));
                        }
                        Err(err) if err.is_transient() => {
                            debug!("{}: load for {:?} failed, not caching: {}", name, key, err);
                            entries.remove(&key);
                        }
                        Err(err) => {
                            debug!("{}: load for {:?} failed: {}", name, key, err);
                            entries.insert(key, Entry::Rejected(err.clone()));
                        }
                    }
                } else {
                    trace!("{}: discarding stale load for {:?}", name, key);
                }
            }
            let _ = sender.send(result);
        });

        Ok(CacheRead::Suspended(load))
    }

    /// Read, awaiting the load on a miss.
    pub async fn read_async(&self, args: A) -> ClientResult<V> {
        self.read(args)?.resolve().await
    }

    /// The cached value for these arguments, without triggering a load.
    pub fn get_if_cached(&self, args: &A) -> Option<V> {
        let key = (self.get_key)(args);
        match self.inner.entries.lock().get(&key) {
            Some(Entry::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The state of the entry for these arguments.
    pub fn status(&self, args: &A) -> CacheStatus {
        let key = (self.get_key)(args);
        match self.inner.entries.lock().get(&key) {
            None => CacheStatus::NotFound,
            Some(Entry::Pending { .. }) => CacheStatus::Pending,
            Some(Entry::Resolved(_)) => CacheStatus::Resolved,
            Some(Entry::Rejected(_)) => CacheStatus::Rejected,
        }
    }

    /// Populate an entry directly, e.g. from data that arrived as a side
    /// effect of another command.
    pub fn cache(&self, args: &A, value: V) {
        let key = (self.get_key)(args);
        let mut entries = self.inner.entries.lock();
        if self.options.immutable && matches!(entries.get(&key), Some(Entry::Resolved(_))) {
            return;
        }
        entries.insert(key, Entry::Resolved(value));
    }

    /// Discard the entry so the next read loads again.
    ///
    /// Resolved entries of an immutable cache are kept. An in-flight load is
    /// still delivered to its current waiters but is not cached.
    pub fn invalidate(&self, args: &A) -> bool {
        let key = (self.get_key)(args);
        let mut entries = self.inner.entries.lock();
        if self.options.immutable && matches!(entries.get(&key), Some(Entry::Resolved(_))) {
            warn!("{}: refusing to invalidate immutable entry {:?}", self.options.name, key);
            return false;
        }
        entries.remove(&key).is_some()
    }

    /// Discard every entry that may be invalidated.
    pub fn invalidate_all(&self) {
        let mut entries = self.inner.entries.lock();
        if self.options.immutable {
            entries.retain(|_, entry| matches!(entry, Entry::Resolved(_)));
        } else {
            entries.clear();
        }
    }

    /// Forget every cached error so the next read of those keys loads again.
    ///
    /// Applies to immutable caches too: only resolved values are immutable.
    pub fn clear_errors(&self) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !matches!(entry, Entry::Rejected(_)));
        before - entries.len()
    }

    /// Drop every entry whose key matches, whatever its state.
    ///
    /// Used when the thing the keys refer to no longer exists, e.g. a
    /// discarded pause. Immutability does not protect these entries, and
    /// in-flight loads for them complete without being cached.
    pub fn evict_where(&self, mut matches: impl FnMut(&K) -> bool) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !matches(key));
        let evicted = before - entries.len();
        if evicted > 0 {
            trace!("{}: evicted {} entries", self.options.name, evicted);
        }
        evicted
    }

    /// Number of entries in any state.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads started over the cache's lifetime.
    pub fn load_count(&self) -> usize {
        self.inner.load_count.load(Ordering::Relaxed)
    }
}

/// A cache holding exactly one value, used for per-session singletons
pub struct SingleEntryCache<V> {
    cache: Cache<(), (), V>,
}

impl<V> Clone for SingleEntryCache<V> {
    fn clone(&self) -> Self {
        Self { cache: self.cache.clone() }
    }
}

impl<V> fmt::Debug for SingleEntryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SingleEntryCache").field(&self.cache).finish()
    }
}

impl<V> SingleEntryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a single-entry cache.
    pub fn new<LF>(options: CacheOptions, load: LF) -> Self
    where
        LF: Fn() -> LoadFuture<V> + Send + Sync + 'static,
    {
        Self { cache: Cache::new(options, |_: &()| (), move |()| load()) }
    }

    /// See [`Cache::read`].
    pub fn read(&self) -> ClientResult<CacheRead<V>> {
        self.cache.read(())
    }

    /// See [`Cache::read_async`].
    pub async fn read_async(&self) -> ClientResult<V> {
        self.cache.read_async(()).await
    }

    /// See [`Cache::get_if_cached`].
    pub fn get_if_cached(&self) -> Option<V> {
        self.cache.get_if_cached(&())
    }

    /// See [`Cache::status`].
    pub fn status(&self) -> CacheStatus {
        self.cache.status(&())
    }

    /// See [`Cache::cache`].
    pub fn cache(&self, value: V) {
        self.cache.cache(&(), value)
    }

    /// See [`Cache::invalidate`].
    pub fn invalidate(&self) -> bool {
        self.cache.invalidate(&())
    }

    /// See [`Cache::clear_errors`].
    pub fn clear_errors(&self) -> usize {
        self.cache.clear_errors()
    }

    /// See [`Cache::load_count`].
    pub fn load_count(&self) -> usize {
        self.cache.load_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{error_codes, ProtocolError};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// A cache whose loader doubles its argument after `gate` is notified.
    fn gated_cache(immutable: bool, gate: Arc<Notify>) -> Cache<u32, u32, u32> {
        let options = if immutable {
            CacheOptions::immutable("gated")
        } else {
            CacheOptions::mutable("gated")
        };
        Cache::new(options, |n: &u32| *n, move |n: u32| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(n * 2)
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_load() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(false, gate.clone());

        let first = cache.read(21).unwrap();
        let second = cache.read(21).unwrap();
        assert!(first.is_suspended() && second.is_suspended());
        assert_eq!(cache.status(&21), CacheStatus::Pending);
        assert_eq!(cache.load_count(), 1);

        gate.notify_one();
        let (a, b) = tokio::join!(first.resolve(), second.resolve());
        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.get_if_cached(&21), Some(42));
        assert_eq!(cache.status(&21), CacheStatus::Resolved);
    }

    #[tokio::test]
    async fn test_get_if_cached_does_not_load() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(false, gate);
        assert_eq!(cache.get_if_cached(&1), None);
        assert_eq!(cache.status(&1), CacheStatus::NotFound);
        assert_eq!(cache.load_count(), 0);
    }

    #[tokio::test]
    async fn test_immutable_entry_never_reloads() {
        let counter = Arc::new(AtomicUsize::new(0));
        let loads = counter.clone();
        let cache: Cache<(), (), usize> =
            Cache::new(CacheOptions::immutable("immutable"), |_: &()| (), move |()| {
                // Every load would return a different value.
                let value = loads.fetch_add(1, Ordering::SeqCst);
                async move { Ok(value) }.boxed()
            });

        assert_eq!(cache.read_async(()).await.unwrap(), 0);
        assert!(!cache.invalidate(&()));
        cache.invalidate_all();
        assert_eq!(cache.read_async(()).await.unwrap(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutable_entry_reloads_after_invalidate() {
        let counter = Arc::new(AtomicUsize::new(0));
        let loads = counter.clone();
        let cache = SingleEntryCache::new(CacheOptions::mutable("mutable"), move || {
            let value = loads.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }.boxed()
        });

        assert_eq!(cache.read_async().await.unwrap(), 0);
        assert!(cache.invalidate());
        assert_eq!(cache.status(), CacheStatus::NotFound);
        assert_eq!(cache.read_async().await.unwrap(), 1);
        assert_eq!(cache.load_count(), 2);
    }

    /// A cache whose every load fails with the error built by `error`.
    fn failing_cache(
        options: CacheOptions,
        counter: Arc<AtomicUsize>,
        error: fn() -> ClientError,
    ) -> Cache<u8, u8, u8> {
        Cache::new(options, |k: &u8| *k, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(error()) }.boxed()
        })
    }

    fn backend_error() -> ClientError {
        ProtocolError::new(error_codes::COMMAND_FAILED, "failed").into()
    }

    #[tokio::test]
    async fn test_errors_are_cached_until_invalidated() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = failing_cache(CacheOptions::mutable("failing"), counter.clone(), backend_error);

        let err = cache.read_async(1).await.unwrap_err();
        assert_eq!(err.protocol_code(), Some(error_codes::COMMAND_FAILED));
        assert_eq!(cache.status(&1), CacheStatus::Rejected);
        // Rethrown synchronously without another load.
        assert!(cache.read(1).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        cache.invalidate(&1);
        assert!(cache.read_async(1).await.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_not_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = failing_cache(CacheOptions::immutable("flaky"), counter.clone(), || {
            ClientError::Disconnected("gone".into())
        });

        assert!(cache.read_async(1).await.unwrap_err().is_disconnected());
        assert_eq!(cache.status(&1), CacheStatus::NotFound);
        assert!(cache.read_async(1).await.unwrap_err().is_disconnected());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_errors_retries_immutable_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let cache = failing_cache(CacheOptions::immutable("failing"), counter.clone(), backend_error);
        cache.cache(&2, 20);

        assert!(cache.read_async(1).await.is_err());
        assert_eq!(cache.clear_errors(), 1);
        assert_eq!(cache.status(&1), CacheStatus::NotFound);
        // Resolved entries are untouched.
        assert_eq!(cache.get_if_cached(&2), Some(20));

        assert!(cache.read_async(1).await.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evict_where_ignores_immutability() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(true, gate.clone());
        cache.cache(&1, 10);
        cache.cache(&2, 20);
        let pending = cache.read(3).unwrap();

        assert_eq!(cache.evict_where(|key| *key != 2), 2);
        assert_eq!(cache.get_if_cached(&1), None);
        assert_eq!(cache.get_if_cached(&2), Some(20));

        // The evicted load still reaches its waiter but is not cached.
        gate.notify_one();
        assert_eq!(pending.resolve().await.unwrap(), 6);
        assert_eq!(cache.status(&3), CacheStatus::NotFound);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_load_completes_after_readers_drop() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(false, gate.clone());

        drop(cache.read(5).unwrap());
        gate.notify_one();

        for _ in 0..50 {
            if cache.get_if_cached(&5).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.get_if_cached(&5), Some(10));
        assert_eq!(cache.load_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_during_load_does_not_cache_stale_value() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(false, gate.clone());

        let waiting = cache.read(3).unwrap();
        assert!(cache.invalidate(&3));
        gate.notify_one();

        // The current waiter still receives the value...
        assert_eq!(waiting.resolve().await.unwrap(), 6);
        // ...but it was not cached.
        assert_eq!(cache.status(&3), CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn test_manual_cache_population() {
        let gate = Arc::new(Notify::new());
        let cache = gated_cache(false, gate);
        cache.cache(&7, 700);
        assert_eq!(cache.read_async(7).await.unwrap(), 700);
        assert_eq!(cache.load_count(), 0);
    }

    #[tokio::test]
    async fn test_keys_derived_from_subset_of_args() {
        // The second tuple element is a label that does not affect the key.
        let cache: Cache<(u32, String), u32, u32> =
            Cache::new(CacheOptions::mutable("subset"), |(n, _): &(u32, String)| *n, |(n, _)| {
                async move { Ok(n + 1) }.boxed()
            });

        assert_eq!(cache.read_async((1, "a".into())).await.unwrap(), 2);
        assert_eq!(cache.read_async((1, "b".into())).await.unwrap(), 2);
        assert_eq!(cache.load_count(), 1);
    }
}
