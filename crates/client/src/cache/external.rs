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

//! Externally managed cache.
//!
//! Entries are never loaded by the cache itself. Some other code path, usually
//! an event handler or the response of an unrelated command, stores the value
//! and every reader waiting for that key is woken up.

use std::{collections::HashMap, fmt, hash::Hash, time::Duration};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{ClientError, ClientResult};

type Waiter<V> = oneshot::Sender<ClientResult<V>>;

enum Slot<V> {
    Ready(ClientResult<V>),
    Waiting(Vec<Waiter<V>>),
}

/// A keyed cache populated from outside
pub struct ExternallyManagedCache<K, V> {
    name: String,
    timeout: Option<Duration>,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> fmt::Debug for ExternallyManagedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternallyManagedCache")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<K, V> ExternallyManagedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Create a cache. Readers give up after `timeout`, if set.
    pub fn new(name: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self { name: name.into(), timeout, slots: Mutex::new(HashMap::new()) }
    }

    /// Store a value and wake everyone waiting for it.
    pub fn cache_value(&self, key: K, value: V) {
        self.store(key, Ok(value));
    }

    /// Store an error and wake everyone waiting for it.
    ///
    /// Transient errors only wake the current readers and are not kept.
    pub fn cache_error(&self, key: K, error: ClientError) {
        self.store(key, Err(error));
    }

    fn store(&self, key: K, result: ClientResult<V>) {
        let previous = {
            let mut slots = self.slots.lock();
            match &result {
                Err(err) if err.is_transient() => slots.remove(&key),
                _ => slots.insert(key.clone(), Slot::Ready(result.clone())),
            }
        };
        if let Some(Slot::Waiting(waiters)) = previous {
            trace!("{}: waking {} readers of {:?}", self.name, waiters.len(), key);
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// The cached value, if one has been stored.
    pub fn get_if_cached(&self, key: &K) -> Option<V> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(Ok(value))) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns `true` if a value or error has been stored for `key`.
    pub fn contains(&self, key: &K) -> bool {
        matches!(self.slots.lock().get(key), Some(Slot::Ready(_)))
    }

    /// Read the value, waiting until some other code path stores it.
    pub async fn read_async(&self, key: K) -> ClientResult<V> {
        let receiver = {
            let mut slots = self.slots.lock();
            let (sender, receiver) = oneshot::channel();
            match slots.get_mut(&key) {
                Some(Slot::Ready(result)) => return result.clone(),
                Some(Slot::Waiting(waiters)) => {
                    waiters.retain(|waiter| !waiter.is_closed());
                    waiters.push(sender);
                }
                None => {
                    slots.insert(key.clone(), Slot::Waiting(vec![sender]));
                }
            }
            receiver
        };

        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!("{}: gave up waiting for {:?}", self.name, key);
                    self.prune_waiters(&key);
                    return Err(ClientError::Timeout {
                        operation: format!("{} {:?}", self.name, key),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => receiver.await,
        };
        outcome.unwrap_or(Err(ClientError::Aborted))
    }

    /// Drop waiters whose reader went away, and the slot if none are left.
    fn prune_waiters(&self, key: &K) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Waiting(waiters)) = slots.get_mut(key) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                slots.remove(key);
            }
        }
    }

    /// Forget every stored error so the next store or read starts over.
    pub fn clear_errors(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| !matches!(slot, Slot::Ready(Err(_))));
        before - slots.len()
    }

    /// Forget the entry for `key`. Pending readers are failed with
    /// [`ClientError::Aborted`].
    pub fn evict(&self, key: &K) {
        if let Some(Slot::Waiting(waiters)) = self.slots.lock().remove(key) {
            for waiter in waiters {
                let _ = waiter.send(Err(ClientError::Aborted));
            }
        }
    }

    /// Number of keys with a stored value or error.
    pub fn len(&self) -> usize {
        self.slots.lock().values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of readers currently parked on `key`.
    pub fn waiting(&self, key: &K) -> usize {
        match self.slots.lock().get(key) {
            Some(Slot::Waiting(waiters)) => waiters.len(),
            _ => 0,
        }
    }
}
