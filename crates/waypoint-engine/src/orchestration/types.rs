//! Node and link types for orchestration graphs
//!
//! A node's pins (attributes) are never stored. They are recomputed from the
//! node id and the pin layout of its type: the pin at index `i` of the layout
//! has attribute id `node_id + 1 + i`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::codec;
use crate::error::ConfigurationError;
use crate::surface::CanvasSurface;

/// Unique identifier for a node within an orchestration
pub type NodeId = i32;

/// Unique identifier for a link within an orchestration
pub type LinkId = i32;

/// Identifier of a node pin, derived from its node id
pub type AttributeId = i32;

/// Unique identifier for an orchestration
pub type OrchestrationId = i32;

/// Canvas position of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Whether a pin receives or emits a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
}

/// A named pin in a node type's layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub name: &'static str,
    pub direction: PinDirection,
}

impl Pin {
    const fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PinDirection::Input,
        }
    }

    const fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PinDirection::Output,
        }
    }
}

// Inputs come before outputs. The last pin is the one the runner follows.
const START_PINS: &[Pin] = &[Pin::output("Next")];
const HTTP_PINS: &[Pin] = &[
    Pin::input("In"),
    Pin::output("Response"),
    Pin::output("StatusCode"),
    Pin::output("Next"),
];
const JSON_EXTRACT_PINS: &[Pin] = &[Pin::input("In"), Pin::output("Value"), Pin::output("Next")];
const SET_VARIABLE_PINS: &[Pin] = &[Pin::input("In"), Pin::input("Value"), Pin::output("Next")];
const GET_VARIABLE_PINS: &[Pin] = &[Pin::input("In"), Pin::output("Value"), Pin::output("Next")];
const IF_CONDITION_PINS: &[Pin] = &[
    Pin::input("In"),
    Pin::output("True"),
    Pin::output("False"),
    Pin::output("Next"),
];
const DELAY_PINS: &[Pin] = &[Pin::input("In"), Pin::output("Next")];
const ASSERT_PINS: &[Pin] = &[
    Pin::input("In"),
    Pin::output("Pass"),
    Pin::output("Fail"),
    Pin::output("Next"),
];
const LOG_PINS: &[Pin] = &[Pin::input("In"), Pin::output("Next")];

/// The type of an orchestration node
///
/// The string tag returned by [`NodeType::tag`] is the persisted form and is
/// stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "Start")]
    Start,
    #[serde(rename = "HTTP_GET")]
    HttpGet,
    #[serde(rename = "HTTP_POST")]
    HttpPost,
    #[serde(rename = "HTTP_PUT")]
    HttpPut,
    #[serde(rename = "HTTP_DELETE")]
    HttpDelete,
    #[serde(rename = "JSON_EXTRACT")]
    JsonExtract,
    #[serde(rename = "SET_VARIABLE")]
    SetVariable,
    #[serde(rename = "GET_VARIABLE")]
    GetVariable,
    #[serde(rename = "IF_CONDITION")]
    IfCondition,
    #[serde(rename = "DELAY")]
    Delay,
    #[serde(rename = "ASSERT")]
    Assert,
    #[serde(rename = "LOG")]
    Log,
}

impl NodeType {
    /// Every node type, in palette order
    pub const ALL: [NodeType; 12] = [
        NodeType::Start,
        NodeType::HttpGet,
        NodeType::HttpPost,
        NodeType::HttpPut,
        NodeType::HttpDelete,
        NodeType::JsonExtract,
        NodeType::SetVariable,
        NodeType::GetVariable,
        NodeType::IfCondition,
        NodeType::Delay,
        NodeType::Assert,
        NodeType::Log,
    ];

    /// Stable tag used for persistence and executor dispatch
    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::Start => "Start",
            NodeType::HttpGet => "HTTP_GET",
            NodeType::HttpPost => "HTTP_POST",
            NodeType::HttpPut => "HTTP_PUT",
            NodeType::HttpDelete => "HTTP_DELETE",
            NodeType::JsonExtract => "JSON_EXTRACT",
            NodeType::SetVariable => "SET_VARIABLE",
            NodeType::GetVariable => "GET_VARIABLE",
            NodeType::IfCondition => "IF_CONDITION",
            NodeType::Delay => "DELAY",
            NodeType::Assert => "ASSERT",
            NodeType::Log => "LOG",
        }
    }

    /// Look up a node type by its tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// Title shown in the node's title bar
    pub fn label(&self) -> &'static str {
        match self {
            NodeType::Start => "Start",
            NodeType::HttpGet => "GET",
            NodeType::HttpPost => "POST",
            NodeType::HttpPut => "PUT",
            NodeType::HttpDelete => "DELETE",
            NodeType::JsonExtract => "JSON Extract",
            NodeType::SetVariable => "Set Variable",
            NodeType::GetVariable => "Get Variable",
            NodeType::IfCondition => "If Condition",
            NodeType::Delay => "Delay",
            NodeType::Assert => "Assert",
            NodeType::Log => "Log",
        }
    }

    /// Pin layout for this type, inputs first
    pub fn pins(&self) -> &'static [Pin] {
        match self {
            NodeType::Start => START_PINS,
            NodeType::HttpGet | NodeType::HttpPost | NodeType::HttpPut | NodeType::HttpDelete => {
                HTTP_PINS
            }
            NodeType::JsonExtract => JSON_EXTRACT_PINS,
            NodeType::SetVariable => SET_VARIABLE_PINS,
            NodeType::GetVariable => GET_VARIABLE_PINS,
            NodeType::IfCondition => IF_CONDITION_PINS,
            NodeType::Delay => DELAY_PINS,
            NodeType::Assert => ASSERT_PINS,
            NodeType::Log => LOG_PINS,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for NodeType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ConfigurationError::UnknownNodeType(s.to_string()))
    }
}

/// Request settings shared by the four HTTP node types
///
/// `body` is only serialized and sent for POST and PUT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpRequestConfig {
    pub url: String,
    /// Raw header text, one `Name: value` per line
    pub headers: String,
    pub body: String,
}

/// Type-specific configuration of a node. The variant determines the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeConfig {
    Start,
    HttpGet(HttpRequestConfig),
    HttpPost(HttpRequestConfig),
    HttpPut(HttpRequestConfig),
    HttpDelete(HttpRequestConfig),
    JsonExtract { json_path: String },
    SetVariable { var_name: String },
    GetVariable { var_name: String },
    IfCondition { condition: String },
    /// Milliseconds, kept as text as typed by the user
    Delay { delay_ms: String },
    Assert { assertion: String },
    Log { message: String },
}

impl NodeConfig {
    /// Default configuration for a freshly created node
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Start => NodeConfig::Start,
            NodeType::HttpGet => NodeConfig::HttpGet(HttpRequestConfig::default()),
            NodeType::HttpPost => NodeConfig::HttpPost(HttpRequestConfig::default()),
            NodeType::HttpPut => NodeConfig::HttpPut(HttpRequestConfig::default()),
            NodeType::HttpDelete => NodeConfig::HttpDelete(HttpRequestConfig::default()),
            NodeType::JsonExtract => NodeConfig::JsonExtract {
                json_path: String::new(),
            },
            NodeType::SetVariable => NodeConfig::SetVariable {
                var_name: String::new(),
            },
            NodeType::GetVariable => NodeConfig::GetVariable {
                var_name: String::new(),
            },
            NodeType::IfCondition => NodeConfig::IfCondition {
                condition: String::new(),
            },
            NodeType::Delay => NodeConfig::Delay {
                delay_ms: "1000".to_string(),
            },
            NodeType::Assert => NodeConfig::Assert {
                assertion: String::new(),
            },
            NodeType::Log => NodeConfig::Log {
                message: String::new(),
            },
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Start => NodeType::Start,
            NodeConfig::HttpGet(_) => NodeType::HttpGet,
            NodeConfig::HttpPost(_) => NodeType::HttpPost,
            NodeConfig::HttpPut(_) => NodeType::HttpPut,
            NodeConfig::HttpDelete(_) => NodeType::HttpDelete,
            NodeConfig::JsonExtract { .. } => NodeType::JsonExtract,
            NodeConfig::SetVariable { .. } => NodeType::SetVariable,
            NodeConfig::GetVariable { .. } => NodeType::GetVariable,
            NodeConfig::IfCondition { .. } => NodeType::IfCondition,
            NodeConfig::Delay { .. } => NodeType::Delay,
            NodeConfig::Assert { .. } => NodeType::Assert,
            NodeConfig::Log { .. } => NodeType::Log,
        }
    }

    /// Configurable fields in serialization order
    fn fields(&self) -> Vec<&str> {
        match self {
            NodeConfig::Start => Vec::new(),
            NodeConfig::HttpGet(http) | NodeConfig::HttpDelete(http) => {
                vec![http.url.as_str(), http.headers.as_str()]
            }
            NodeConfig::HttpPost(http) | NodeConfig::HttpPut(http) => {
                vec![http.url.as_str(), http.headers.as_str(), http.body.as_str()]
            }
            NodeConfig::JsonExtract { json_path } => vec![json_path.as_str()],
            NodeConfig::SetVariable { var_name } | NodeConfig::GetVariable { var_name } => {
                vec![var_name.as_str()]
            }
            NodeConfig::IfCondition { condition } => vec![condition.as_str()],
            NodeConfig::Delay { delay_ms } => vec![delay_ms.as_str()],
            NodeConfig::Assert { assertion } => vec![assertion.as_str()],
            NodeConfig::Log { message } => vec![message.as_str()],
        }
    }

    fn fields_mut(&mut self) -> Vec<&mut String> {
        match self {
            NodeConfig::Start => Vec::new(),
            NodeConfig::HttpGet(http) | NodeConfig::HttpDelete(http) => {
                vec![&mut http.url, &mut http.headers]
            }
            NodeConfig::HttpPost(http) | NodeConfig::HttpPut(http) => {
                vec![&mut http.url, &mut http.headers, &mut http.body]
            }
            NodeConfig::JsonExtract { json_path } => vec![json_path],
            NodeConfig::SetVariable { var_name } | NodeConfig::GetVariable { var_name } => {
                vec![var_name]
            }
            NodeConfig::IfCondition { condition } => vec![condition],
            NodeConfig::Delay { delay_ms } => vec![delay_ms],
            NodeConfig::Assert { assertion } => vec![assertion],
            NodeConfig::Log { message } => vec![message],
        }
    }
}

/// A node in an orchestration graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    title: String,
    /// Last committed canvas position. The surface is authoritative while
    /// the orchestration is on screen.
    position: Position,
    config: NodeConfig,
}

impl Node {
    /// Create a node with the default configuration for its type
    pub fn new(id: NodeId, node_type: NodeType) -> Self {
        Self::with_config(id, NodeConfig::default_for(node_type))
    }

    /// Create a node with an explicit configuration
    pub fn with_config(id: NodeId, config: NodeConfig) -> Self {
        Self {
            id,
            title: config.node_type().label().to_string(),
            position: Position::default(),
            config,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }

    /// Stable type tag; see [`NodeType::tag`]
    pub fn type_tag(&self) -> &'static str {
        self.node_type().tag()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut NodeConfig {
        &mut self.config
    }

    /// Attribute ids of this node's pins, in layout order
    ///
    /// Pins whose id would overflow are left out; stores never hold such
    /// nodes.
    pub fn attribute_ids(&self) -> Vec<AttributeId> {
        let id = self.id;
        (1..=self.node_type().pins().len() as i32)
            .filter_map(|offset| id.checked_add(offset))
            .collect()
    }

    /// Check whether an attribute id belongs to one of this node's pins
    pub fn owns_attribute(&self, attribute: AttributeId) -> bool {
        let offset = i64::from(attribute) - i64::from(self.id);
        offset >= 1 && offset <= self.node_type().pins().len() as i64
    }

    /// The pin a traversal continues from: the last pin in the layout
    pub fn next_attribute(&self) -> Option<AttributeId> {
        self.attribute_ids().last().copied()
    }

    /// Cached position, as of the last commit
    pub fn position(&self) -> Position {
        self.position
    }

    /// Move the node, updating both the cache and the surface
    pub fn set_position(&mut self, position: Position, surface: &mut dyn CanvasSurface) {
        self.position = position;
        surface.set_node_position(self.id, position);
    }

    /// Current position on the surface, falling back to the cache
    pub fn live_position(&self, surface: &dyn CanvasSurface) -> Position {
        surface.node_position(self.id).unwrap_or(self.position)
    }

    /// Pull the surface position into the cache
    pub fn commit_position(&mut self, surface: &dyn CanvasSurface) {
        if let Some(position) = surface.node_position(self.id) {
            self.position = position;
        }
    }

    pub(crate) fn set_cached_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Encode the type-specific fields as one escaped, `|`-separated string
    pub fn serialize_data(&self) -> String {
        codec::encode_fields(&self.config.fields())
    }

    /// Decode fields written by [`Node::serialize_data`]
    ///
    /// Fields missing from `data` keep their current values; surplus fields
    /// are ignored.
    pub fn deserialize_data(&mut self, data: &str) {
        let decoded = codec::decode_fields(data);
        for (field, value) in self.config.fields_mut().into_iter().zip(decoded) {
            *field = value;
        }
    }
}

/// A directed link between two pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    pub start_attr: AttributeId,
    pub end_attr: AttributeId,
}

impl Link {
    pub fn new(id: LinkId, start_attr: AttributeId, end_attr: AttributeId) -> Self {
        Self {
            id,
            start_attr,
            end_attr,
        }
    }

    /// Check whether either endpoint is one of the given attributes
    pub fn touches(&self, attributes: &[AttributeId]) -> bool {
        attributes.contains(&self.start_attr) || attributes.contains(&self.end_attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for node_type in NodeType::ALL {
            assert_eq!(NodeType::from_tag(node_type.tag()), Some(node_type));
            assert_eq!(node_type.tag().parse::<NodeType>(), Ok(node_type));
        }
        assert_eq!(
            "GET".parse::<NodeType>(),
            Err(ConfigurationError::UnknownNodeType("GET".to_string()))
        );
    }

    #[test]
    fn test_http_get_attribute_ids() {
        let node = Node::new(11, NodeType::HttpGet);
        assert_eq!(node.attribute_ids(), vec![12, 13, 14, 15]);
        assert_eq!(node.next_attribute(), Some(15));
        assert!(node.owns_attribute(12));
        assert!(!node.owns_attribute(11));
        assert!(!node.owns_attribute(16));
    }

    #[test]
    fn test_pin_layouts_fit_id_step() {
        for node_type in NodeType::ALL {
            let pins = node_type.pins();
            assert!(!pins.is_empty());
            assert!(pins.len() < crate::constants::ids::NODE_ID_STEP as usize);
            assert_eq!(pins.last().map(|p| p.direction), Some(PinDirection::Output));

            // Inputs before outputs
            let first_output = pins
                .iter()
                .position(|p| p.direction == PinDirection::Output)
                .unwrap();
            assert!(pins[first_output..]
                .iter()
                .all(|p| p.direction == PinDirection::Output));
        }
    }

    #[test]
    fn test_every_type_derives_attribute_ids_from_its_id() {
        for node_type in NodeType::ALL {
            let node = Node::new(41, node_type);
            let pins = node_type.pins().len() as i32;
            let expected: Vec<AttributeId> = (42..=41 + pins).collect();
            assert_eq!(node.attribute_ids(), expected, "{node_type}");
            assert_eq!(node.next_attribute(), Some(41 + pins));
            assert!(!node.owns_attribute(41));
            assert!(!node.owns_attribute(42 + pins));
        }
    }

    #[test]
    fn test_every_type_round_trips_separators() {
        for node_type in NodeType::ALL {
            let mut node = Node::new(1, node_type);
            for (index, field) in node.config_mut().fields_mut().into_iter().enumerate() {
                *field = format!("a|b\\c{index}");
            }
            let data = node.serialize_data();

            let mut restored = Node::new(1, node_type);
            restored.deserialize_data(&data);
            assert_eq!(restored.config(), node.config(), "{node_type}");
            assert_eq!(restored.serialize_data(), data);
        }
    }

    #[test]
    fn test_start_serializes_empty() {
        let node = Node::new(1, NodeType::Start);
        assert_eq!(node.serialize_data(), "");
        assert_eq!(node.title(), "Start");
    }

    #[test]
    fn test_post_round_trip_with_separators() {
        let mut node = Node::with_config(
            21,
            NodeConfig::HttpPost(HttpRequestConfig {
                url: "https://example.com/a|b".to_string(),
                headers: "Content-Type: application/json\nX-Path: C:\\tmp".to_string(),
                body: "{\"pipe\":\"|\",\"slash\":\"\\\\\"}".to_string(),
            }),
        );
        let data = node.serialize_data();

        let mut restored = Node::new(21, NodeType::HttpPost);
        restored.deserialize_data(&data);
        assert_eq!(restored.config(), node.config());

        node.deserialize_data(&data);
        assert_eq!(node.config(), restored.config());
    }

    #[test]
    fn test_get_ignores_body() {
        let node = Node::with_config(
            1,
            NodeConfig::HttpGet(HttpRequestConfig {
                url: "http://a".to_string(),
                headers: String::new(),
                body: "ignored".to_string(),
            }),
        );
        assert_eq!(node.serialize_data(), "http://a|");
    }

    #[test]
    fn test_deserialize_missing_fields_keeps_current() {
        let mut node = Node::new(1, NodeType::HttpPut);
        if let NodeConfig::HttpPut(http) = node.config_mut() {
            http.body = "keep".to_string();
        }
        node.deserialize_data("http://x|H: v");
        match node.config() {
            NodeConfig::HttpPut(http) => {
                assert_eq!(http.url, "http://x");
                assert_eq!(http.headers, "H: v");
                assert_eq!(http.body, "keep");
            }
            other => panic!("unexpected config {other:?}"),
        }
    }

    #[test]
    fn test_link_touches() {
        let link = Link::new(10_000, 2, 12);
        assert!(link.touches(&[12, 13]));
        assert!(link.touches(&[2]));
        assert!(!link.touches(&[3, 4]));
    }
}
