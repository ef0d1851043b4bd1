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

//! Wire protocol message types.
//!
//! The backend speaks JSON over a persistent connection:
//!
//! - commands are `{id, method, params}` plus optional top-level `sessionId`
//!   and `pauseId` fields,
//! - responses are `{id, result}` or `{id, error}`,
//! - unsolicited events are `{method, params}` without an id.
//!
//! The schema of individual `params`/`result` payloads is owned by the backend
//! and is decoded by the client facade, not here.

use replay_common::{PauseId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ClientError;

/// Outgoing command frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Monotonically increasing request identifier
    pub id: u64,
    /// Method name, e.g. `Debugger.findSources`
    pub method: String,
    /// Method parameters
    pub params: Value,
    /// Session the command is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Pause the command is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_id: Option<PauseId>,
}

/// Error object of a `{id, error}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("backend error {code}: {message}")]
pub struct ProtocolError {
    /// Numeric error code, see [`error_codes`]
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Optional extra data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProtocolError {
    /// Create a protocol error with the given code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// Returns `true` for [`error_codes::TOO_MANY_POINTS`].
    pub fn is_too_many_points(&self) -> bool {
        self.code == error_codes::TOO_MANY_POINTS
    }

    /// Returns `true` if the recording or session is gone on the backend side.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self.code,
            error_codes::RECORDING_UNLOADED
                | error_codes::SESSION_DESTROYED
                | error_codes::UNKNOWN_SESSION
        )
    }
}

/// Backend error codes callers branch on.
pub mod error_codes {
    /// Internal backend failure
    pub const INTERNAL_ERROR: i64 = 1;
    /// The recording cannot be replayed by this backend
    pub const UNSUPPORTED_RECORDING: i64 = 31;
    /// The recording's build is not known to the backend
    pub const UNKNOWN_BUILD: i64 = 32;
    /// The command failed while running inside the replay
    pub const COMMAND_FAILED: i64 = 33;
    /// The recording was unloaded while the session was active
    pub const RECORDING_UNLOADED: i64 = 38;
    /// No document exists at the requested point
    pub const DOCUMENT_IS_UNAVAILABLE: i64 = 45;
    /// The backend gave up on the command
    pub const TIMED_OUT: i64 = 46;
    /// The recording is corrupt
    pub const INVALID_RECORDING: i64 = 50;
    /// The backend is overloaded
    pub const SERVICE_UNAVAILABLE: i64 = 51;
    /// A point query matched more points than the backend will return
    pub const TOO_MANY_POINTS: i64 = 55;
    /// The session id is not known to the backend
    pub const UNKNOWN_SESSION: i64 = 59;
    /// Graphics cannot be produced at the requested point
    pub const GRAPHICS_UNAVAILABLE_AT_POINT: i64 = 65;
    /// The session was destroyed by the backend
    pub const SESSION_DESTROYED: i64 = 66;
    /// The focus window changed while the command was running
    pub const FOCUS_WINDOW_CHANGE: i64 = 76;
}

/// A decoded incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Response to an earlier command
    Response {
        /// Id of the originating command
        id: u64,
        /// `result` on success, `error` otherwise
        outcome: Result<Value, ProtocolError>,
    },
    /// Unsolicited event
    Event {
        /// Event name, e.g. `Session.loadedRegions`
        method: String,
        /// Event payload
        params: Value,
    },
}

#[derive(Deserialize)]
struct RawMessage {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolError>,
    method: Option<String>,
    params: Option<Value>,
}

impl IncomingMessage {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        let raw: RawMessage = serde_json::from_str(text)
            .map_err(|e| ClientError::ProtocolViolation(format!("malformed frame: {e}")))?;

        match (raw.id, raw.method) {
            (Some(id), _) => {
                let outcome = match raw.error {
                    Some(error) => Err(error),
                    None => Ok(raw.result.unwrap_or(Value::Null)),
                };
                Ok(Self::Response { id, outcome })
            }
            (None, Some(method)) => {
                Ok(Self::Event { method, params: raw.params.unwrap_or(Value::Null) })
            }
            (None, None) => Err(ClientError::ProtocolViolation(
                "frame carries neither an id nor a method".to_string(),
            )),
        }
    }
}
