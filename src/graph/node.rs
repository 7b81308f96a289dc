//! Node representation in the traceability graph

use super::edge::EdgeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a node
///
/// Serializes as a plain string: a requirement ID (`REQ-p00001`), an
/// assertion ID (`REQ-p00001-A`), a journey ID, or a synthetic
/// `code:`/`test:` location ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Requirement,
    Assertion,
    Code,
    Test,
    Journey,
}

/// Typed field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

/// Named node attributes, ordered by key
pub type Fields = BTreeMap<String, FieldValue>;

/// Well-known field keys
pub mod field {
    pub const TITLE: &str = "title";
    pub const LEVEL: &str = "level";
    pub const STATUS: &str = "status";
    pub const BODY: &str = "body";
    pub const HASH: &str = "hash";
    pub const HAS_METADATA: &str = "has_metadata";
    pub const IMPLEMENTS: &str = "implements";
    pub const REFINES: &str = "refines";
    pub const ADDRESSES: &str = "addresses";
    /// Assertion letters in the order written
    pub const ASSERTIONS: &str = "assertions";
    pub const END_MARKER: &str = "end_marker";
    pub const END_LINE: &str = "end_line";
    /// Owning requirement of an assertion node
    pub const REQUIREMENT: &str = "requirement";
    pub const LABEL: &str = "label";
    pub const TEXT: &str = "text";
    pub const TARGETS: &str = "targets";
    pub const ACTOR: &str = "actor";
    pub const GOAL: &str = "goal";
    pub const STEPS: &str = "steps";
}

/// File path plus inclusive line range
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
        }
    }

    /// A single-line location
    pub fn line(path: impl Into<String>, line: usize) -> Self {
        Self::new(path, line, line)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.path, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.path, self.start_line, self.end_line)
        }
    }
}

/// A node in the traceability graph
///
/// Nodes are owned by the graph's node store; edges and other nodes refer to
/// them only by [`NodeId`].
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub fields: Fields,
    pub source: SourceLocation,
    /// Edges leaving this node (indices into the graph's edge list)
    pub outgoing: Vec<EdgeId>,
    /// Resolved edges arriving at this node
    pub incoming: Vec<EdgeId>,
}

impl GraphNode {
    /// Create a new node with no fields or edges
    pub fn new(
        id: impl Into<NodeId>,
        kind: NodeKind,
        label: impl Into<String>,
        source: SourceLocation,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            fields: Fields::new(),
            source,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// Add a field to the node
    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Add a text field if the value is present
    pub fn with_text(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with_field(key, FieldValue::Text(v.to_string())),
            None => self,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.fields.get(key) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(FieldValue::Bool(true)))
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}
