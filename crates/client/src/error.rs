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

//! Error taxonomy for the session layer.
//!
//! Every error is cheaply cloneable so that a single failed load can be
//! delivered to all callers waiting on the same cache key.

use replay_common::SessionId;
use thiserror::Error;

use crate::transport::ProtocolError;

/// Result alias used throughout the client crate
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the transport, the caches and the client facade
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The connection closed or failed while the operation was pending
    #[error("connection to the replay backend was lost: {0}")]
    Disconnected(String),
    /// The backend answered with `{id, error}`
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The backend sent something the client cannot correlate or parse
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// A command or result could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A command did not receive a response within the configured bound
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The command method or cache name that timed out
        operation: String,
        /// The bound that was exceeded
        timeout_ms: u64,
    },
    /// The operation was abandoned before producing a result, e.g. a
    /// stream whose consumers all detached or a pause that was discarded
    #[error("operation aborted")]
    Aborted,
    /// A session-scoped command was issued before `create_session`
    #[error("no session has been created")]
    NoSession,
    /// `create_session` was called on a client that already has one
    #[error("session {0} is already active")]
    SessionActive(SessionId),
    /// The transport could not be established
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Dispatch URL
        url: String,
        /// Underlying failure
        reason: String,
    },
}

impl ClientError {
    /// The backend error code, if this is a command error.
    pub fn protocol_code(&self) -> Option<i64> {
        match self {
            Self::Protocol(err) => Some(err.code),
            _ => None,
        }
    }

    /// Returns `true` if the backend refused because too many points matched.
    ///
    /// Callers typically retry with a narrower focus window.
    pub fn is_too_many_points(&self) -> bool {
        matches!(self, Self::Protocol(err) if err.is_too_many_points())
    }

    /// Returns `true` if the error was caused by losing the connection.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }

    /// Returns `true` if the failure says nothing about the requested data.
    ///
    /// Local and transport conditions (no session yet, a timeout, a lost
    /// connection, an abandoned load) are delivered to whoever is waiting but
    /// never cached, so a later read tries again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoSession
                | Self::Timeout { .. }
                | Self::Disconnected(_)
                | Self::Aborted
                | Self::Connect { .. }
        )
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
