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

//! Payloads returned by the client facade.

use replay_common::{ExecutionPoint, PauseId, RequestId, SourceId, TimeStampedPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pause::{Location, NamedValue, PauseData};

/// What the recorded runtime supports, derived from the recording's build id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingCapabilities {
    /// DOM inspection works
    pub supports_elements_inspector: bool,
    /// Event listener breakpoints work
    pub supports_event_types: bool,
    /// Network requests were recorded
    pub supports_network_requests: bool,
    /// Screenshots can be repainted
    pub supports_repaint_graphics: bool,
    /// Side-effect free evaluation is available
    pub supports_pure_evaluation: bool,
}

impl RecordingCapabilities {
    /// Derive capabilities from a build id such as `linux-chromium-20231010-abcdef`.
    ///
    /// The runtime is the second dash-separated component. Unknown runtimes
    /// get the full capability set.
    pub fn from_build_id(build_id: &str) -> Self {
        match build_id.split('-').nth(1) {
            Some("chromium") => Self {
                supports_elements_inspector: true,
                supports_event_types: true,
                supports_network_requests: true,
                supports_repaint_graphics: true,
                supports_pure_evaluation: false,
            },
            Some("node") => Self {
                supports_elements_inspector: false,
                supports_event_types: false,
                supports_network_requests: true,
                supports_repaint_graphics: false,
                supports_pure_evaluation: false,
            },
            _ => Self {
                supports_elements_inspector: true,
                supports_event_types: true,
                supports_network_requests: true,
                supports_repaint_graphics: true,
                supports_pure_evaluation: true,
            },
        }
    }
}

/// A point together with the frame location it was hit at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDescription {
    /// The execution point
    pub point: ExecutionPoint,
    /// Milliseconds since recording start
    pub time: f64,
    /// Locations of the innermost frame
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame: Vec<Location>,
}

impl PointDescription {
    /// The timestamped point, without location.
    pub fn time_stamped_point(&self) -> TimeStampedPoint {
        TimeStampedPoint::new(self.point.clone(), self.time)
    }
}

/// Direction and granularity of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Step over
    Over,
    /// Step into
    Into,
    /// Step out
    Out,
    /// Step over, backwards
    ReverseOver,
    /// Step out, backwards
    ReverseOut,
}

impl StepKind {
    /// Backend command that finds the target of this step.
    pub fn command(self) -> &'static str {
        match self {
            Self::Over => "Debugger.findStepOverTarget",
            Self::Into => "Debugger.findStepInTarget",
            Self::Out => "Debugger.findStepOutTarget",
            Self::ReverseOver => "Debugger.findReverseStepOverTarget",
            Self::ReverseOut => "Debugger.findReverseStepOutTarget",
        }
    }
}

/// Breakable columns on one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineLocations {
    /// 1-based line
    pub line: u32,
    /// Breakable columns on the line
    pub columns: Vec<u32>,
}

/// A generated variable name and the original name it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMapping {
    /// Name in the generated source
    pub name: String,
    /// Name in the original source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

/// Contents of a source, possibly still streaming in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContents {
    /// Text received so far
    pub content: String,
    /// MIME type, once known
    pub content_type: Option<String>,
    /// Total lines, once known
    pub line_count: Option<u64>,
    /// Total UTF-16 code units, once known
    pub code_unit_count: Option<u64>,
}

/// A rendered frame of the recorded page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShot {
    /// Image MIME type
    pub mime_type: String,
    /// Base64-encoded image
    pub data: String,
    /// Content hash, for deduplication
    #[serde(default)]
    pub hash: String,
}

/// Outcome of evaluating an expression in a pause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// The value the expression produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned: Option<NamedValue>,
    /// The exception the expression threw
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<NamedValue>,
    /// The evaluation could not run at all
    #[serde(default)]
    pub failed: bool,
    /// Paused-state data referenced by the result
    #[serde(default)]
    pub data: PauseData,
}

/// A console message logged by the recorded program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    /// Origin, such as `ConsoleAPI` or `PageError`
    pub source: String,
    /// `info`, `warning`, `error` and so on
    pub level: String,
    /// Message text
    pub text: String,
    /// Script that logged the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Source that logged the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    /// Where the message was logged
    pub point: PointDescription,
    /// Pause holding the message arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_id: Option<PauseId>,
    /// Arguments passed to the console call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub argument_values: Vec<NamedValue>,
    /// Paused-state data for the arguments
    #[serde(default)]
    pub data: PauseData,
}

/// Console messages in the focus window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagesResult {
    /// Sorted by point
    pub messages: Vec<ConsoleMessage>,
    /// More messages exist than the backend returned
    pub overflow: bool,
}

/// A network request made by the recorded program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    /// Request id
    pub id: RequestId,
    /// When the request started
    pub point: TimeStampedPoint,
    /// The point that caused the request, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_point: Option<TimeStampedPoint>,
}

/// One lifecycle event of a network request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequestEvent {
    /// Request the event belongs to
    pub id: RequestId,
    /// Milliseconds since recording start
    pub time: f64,
    /// Event details; the shape depends on the event kind
    pub event: Value,
}

/// Every network request of the recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkRequests {
    /// Sorted by point
    pub requests: Vec<NetworkRequest>,
    /// In arrival order
    pub events: Vec<NetworkRequestEvent>,
}

/// One chunk of a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBodyPart {
    /// Byte offset into the body
    pub offset: u64,
    /// Decoded length in bytes
    pub length: u64,
    /// Base64-encoded bytes
    pub value: String,
}

/// A response body assembled from its chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody {
    /// Sorted by offset, without duplicates
    pub parts: Vec<ResponseBodyPart>,
}

impl ResponseBody {
    /// Insert a chunk, ignoring re-delivered offsets.
    pub fn insert(&mut self, part: ResponseBodyPart) {
        if let Err(index) = self.parts.binary_search_by_key(&part.offset, |p| p.offset) {
            self.parts.insert(index, part);
        }
    }

    /// Total length of the received chunks.
    pub fn len(&self) -> u64 {
        self.parts.iter().map(|part| part.length).sum()
    }

    /// Returns `true` if no chunk arrived.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
