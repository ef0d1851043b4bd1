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

//! Resource caches backing the client facade.
//!
//! Every cache guarantees that for any key at most one backend load is in
//! flight, and that concurrent readers of the same key observe the same
//! outcome. Four variants are provided:
//!
//! - [`Cache`]: keyed, loads on demand
//! - [`SingleEntryCache`]: one value per session
//! - [`StreamingCache`]: values delivered incrementally, abortable
//! - [`ExternallyManagedCache`]: populated by other code paths
//!
//! Caches constructed with [`CacheOptions::immutable`] keep resolved values for
//! the lifetime of the client. Backend errors are cached until the entry is
//! invalidated or the errors are cleared; transient failures (see
//! [`ClientError::is_transient`](crate::ClientError::is_transient)) are only
//! delivered to the readers waiting at the time.

mod external;
mod keyed;
mod streaming;

pub use external::ExternallyManagedCache;
pub use keyed::{Cache, CacheOptions, CacheRead, CacheStatus, LoadFuture, SharedLoad, SingleEntryCache};
pub use streaming::{StreamSink, StreamSnapshot, StreamStatus, StreamSubscription, StreamingCache};
