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

//! Client-level events.
//!
//! UI code subscribes here rather than to raw transport events, so backend
//! method names never leak past the facade.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use replay_common::TimeStampedPointRange;
use tracing::{debug, error};

use crate::{focus::LoadedRegions, transport::{ConnectionState, ListenerId}};

/// Kinds of events the client emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    /// [`ClientEvent::SessionStateChange`]
    SessionStateChange,
    /// [`ClientEvent::FocusWindowChange`]
    FocusWindowChange,
    /// [`ClientEvent::ProcessingProgressChange`]
    ProcessingProgressChange,
    /// [`ClientEvent::LoadedRegionsChange`]
    LoadedRegionsChange,
}

/// An event emitted by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection changed state
    SessionStateChange(ConnectionState),
    /// The focus window changed; `None` is the whole recording
    FocusWindowChange(Option<TimeStampedPointRange>),
    /// Indexing progress in `[0, 1]`
    ProcessingProgressChange(f64),
    /// New loaded regions arrived
    LoadedRegionsChange(LoadedRegions),
}

impl ClientEvent {
    /// The kind of this event.
    pub fn kind(&self) -> ClientEventKind {
        match self {
            Self::SessionStateChange(_) => ClientEventKind::SessionStateChange,
            Self::FocusWindowChange(_) => ClientEventKind::FocusWindowChange,
            Self::ProcessingProgressChange(_) => ClientEventKind::ProcessingProgressChange,
            Self::LoadedRegionsChange(_) => ClientEventKind::LoadedRegionsChange,
        }
    }
}

/// Handler for client events
pub type ClientEventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct EventListeners {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(ListenerId, ClientEventKind, ClientEventHandler)>>,
}

impl EventListeners {
    pub(crate) fn add(&self, kind: ClientEventKind, handler: ClientEventHandler) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, kind, handler));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Invoke every handler of the event's kind in registration order.
    pub(crate) fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let handlers: Vec<ClientEventHandler> = self
            .handlers
            .read()
            .iter()
            .filter(|(_, handler_kind, _)| *handler_kind == kind)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        debug!("Emitting {:?} to {} listeners", kind, handlers.len());
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("Listener for {:?} panicked", kind);
            }
        }
    }
}
