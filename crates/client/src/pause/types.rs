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

//! Paused-state payloads as delivered by the backend.
//!
//! Every optional field defaults when absent: partial delivery is expected,
//! and an absent field means "not yet known".

use std::collections::HashMap;

use replay_common::{FrameId, ObjectId, ScopeId, SourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A position in a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Source the position is in
    pub source_id: SourceId,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub column: u32,
}

/// How a source came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// A standalone script file
    PlainScript,
    /// A script embedded in an HTML page
    InlineScript,
    /// Script text handed to the engine directly
    ScriptSource,
    /// An HTML document
    Html,
    /// An original source recovered through a source map
    SourceMapped,
    /// A pretty-printed copy of another source
    PrettyPrinted,
    /// One inline script cut out of an HTML page
    InlineScriptChunk,
    /// Any kind this client does not know
    #[serde(other)]
    Other,
}

impl SourceKind {
    /// Rank used when choosing among the mapped locations of a frame; lower
    /// is preferred.
    fn preference(self) -> u8 {
        match self {
            Self::SourceMapped => 0,
            Self::PlainScript | Self::InlineScript | Self::ScriptSource | Self::Html => 1,
            Self::InlineScriptChunk => 2,
            Self::PrettyPrinted => 3,
            Self::Other => 4,
        }
    }
}

/// A script or file loaded by the recorded program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Id unique within the recording
    pub source_id: SourceId,
    /// How the source came to be
    pub kind: SourceKind,
    /// Where the source was loaded from, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sources this one was generated from, for mapped and pretty-printed sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_source_ids: Vec<SourceId>,
}

/// Choose the location to show for a frame that maps to several sources.
///
/// Original (source-mapped) locations win over generated ones, and
/// pretty-printed copies lose to everything else. Locations in unknown
/// sources rank last. Ties keep backend order.
pub fn select_preferred_location<'a>(
    locations: &'a [Location],
    sources: &HashMap<SourceId, &Source>,
) -> Option<&'a Location> {
    locations.iter().min_by_key(|location| {
        sources.get(&location.source_id).map(|source| source.kind.preference()).unwrap_or(u8::MAX)
    })
}

/// A named value: a primitive, an object reference, or unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedValue {
    /// Property, binding or argument name
    pub name: String,
    /// Primitive value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Object value, resolved in the owning pause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectId>,
    /// `NaN`, `Infinity` and similar numbers JSON cannot carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_number: Option<String>,
    /// The value was optimized away
    #[serde(default)]
    pub unavailable: bool,
}

/// A stack frame of a pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Id unique within the pause
    pub frame_id: FrameId,
    /// `call`, `global`, `module` or `eval`
    #[serde(rename = "type", default)]
    pub frame_type: String,
    /// Name of the called function, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Every location this frame maps to, generated and original
    #[serde(default)]
    pub location: Vec<Location>,
    /// Innermost scope first
    #[serde(default)]
    pub scope_chain: Vec<ScopeId>,
    /// The `this` value of a call frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<NamedValue>,
}

/// One scope of a frame's scope chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Id unique within the pause
    pub scope_id: ScopeId,
    /// `global`, `function`, `block` or `with`
    #[serde(rename = "type", default)]
    pub scope_type: String,
    /// Backing object for global and `with` scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectId>,
    /// Function whose name is bound in this scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_lexical: Option<ObjectId>,
    /// Variables declared in this scope
    #[serde(default)]
    pub bindings: Vec<NamedValue>,
}

/// A DOM attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub value: String,
}

/// DOM node details carried in an object preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// DOM `nodeType`
    pub node_type: u32,
    /// DOM `nodeName`
    pub node_name: String,
    /// Parent node, `None` for the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node: Option<ObjectId>,
    /// Children in document order
    #[serde(default)]
    pub child_nodes: Vec<ObjectId>,
    /// Attributes of an element
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// The node is attached to the document
    #[serde(default)]
    pub is_connected: bool,
}

/// Preview of an object's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    /// Own properties, possibly truncated
    #[serde(default)]
    pub properties: Vec<NamedValue>,
    /// More properties exist than were sent
    #[serde(default)]
    pub overflow: bool,
    /// Prototype object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype_id: Option<ObjectId>,
    /// Set for DOM nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeInfo>,
}

/// An object in the paused program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// Id unique within the pause
    pub object_id: ObjectId,
    /// Constructor or class name
    #[serde(default)]
    pub class_name: String,
    /// Contents, once a preview was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

impl Object {
    /// Node info, if this object is a DOM node whose preview arrived.
    pub fn node(&self) -> Option<&NodeInfo> {
        self.preview.as_ref()?.node.as_ref()
    }
}

/// A batch of paused-state data, as attached to many backend responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseData {
    /// Frames
    #[serde(default)]
    pub frames: Vec<Frame>,
    /// Scopes
    #[serde(default)]
    pub scopes: Vec<Scope>,
    /// Objects
    #[serde(default)]
    pub objects: Vec<Object>,
}

impl PauseData {
    /// Returns `true` if the batch carries nothing.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.scopes.is_empty() && self.objects.is_empty()
    }
}
