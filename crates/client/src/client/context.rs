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

//! Per-connection state shared by the facade and its cache loaders.

use std::sync::Arc;

use parking_lot::RwLock;
use replay_common::{PauseId, SessionId};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::{
    error::{ClientError, ClientResult},
    pause::PauseStore,
    transport::{ListenerId, SessionTransport},
};

/// Everything a backend round trip needs.
///
/// Cache loaders hold an `Arc` of this rather than of the facade, so caches
/// can live inside the facade without reference cycles.
pub(crate) struct SessionContext {
    pub(crate) transport: Arc<SessionTransport>,
    pub(crate) session: RwLock<Option<SessionId>>,
    pub(crate) pauses: PauseStore,
}

impl SessionContext {
    pub(crate) fn session_id(&self) -> ClientResult<SessionId> {
        self.session.read().clone().ok_or(ClientError::NoSession)
    }

    /// Send a command scoped to the current session.
    pub(crate) async fn command(&self, method: &str, params: Value) -> ClientResult<Value> {
        let session_id = self.session_id()?;
        self.transport.send_scoped_command(method, params, Some(&session_id), None).await
    }

    /// Send a command scoped to a pause of the current session.
    pub(crate) async fn pause_command(&self, pause_id: &PauseId, method: &str, params: Value) -> ClientResult<Value> {
        let session_id = self.session_id()?;
        self.transport.send_scoped_command(method, params, Some(&session_id), Some(pause_id)).await
    }

    /// Listen to transport events for as long as the returned guard lives.
    pub(crate) fn subscribe(&self) -> EventSubscription {
        EventSubscription { transport: self.transport.clone(), ids: Vec::new() }
    }
}

/// Transport listeners removed on drop.
///
/// Loaders that collect events keep one alive across their command, so an
/// aborted or failed load never leaves handlers behind.
pub(crate) struct EventSubscription {
    transport: Arc<SessionTransport>,
    ids: Vec<ListenerId>,
}

impl EventSubscription {
    pub(crate) fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.ids.push(self.transport.add_event_listener(event, handler));
        self
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.transport.remove_event_listener(id);
        }
    }
}

/// Decode a response or event payload.
pub(crate) fn decode<T: DeserializeOwned>(method: &str, value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| {
        trace!("Failed to decode {} payload: {}", method, e);
        ClientError::Serialization(format!("{method}: {e}"))
    })
}

/// Decode one field of a response, tolerating its absence.
pub(crate) fn decode_field<T: DeserializeOwned + Default>(method: &str, value: &Value, field: &str) -> ClientResult<T> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(field_value) => decode(method, field_value.clone()),
    }
}
