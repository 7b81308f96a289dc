//! Typed relations between nodes

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Index of an edge in the graph's edge list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Types of relationship. Edges point from the dependent node to the one it
/// depends on: code implements a requirement, a requirement contains its
/// assertions, a requirement addresses a journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EdgeKind {
    Implements,
    Refines,
    Validates,
    Addresses,
    Contains,
}

impl EdgeKind {
    /// Only IMPLEMENTS and VALIDATES count toward coverage
    pub fn contributes_to_coverage(self) -> bool {
        matches!(self, EdgeKind::Implements | EdgeKind::Validates)
    }

    /// Edges that place a requirement under a parent
    pub fn is_parentage(self) -> bool {
        matches!(self, EdgeKind::Implements | EdgeKind::Refines)
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::Refines => "REFINES",
            EdgeKind::Validates => "VALIDATES",
            EdgeKind::Addresses => "ADDRESSES",
            EdgeKind::Contains => "CONTAINS",
        };
        f.write_str(name)
    }
}

/// An immutable, directed, typed edge
///
/// Equality and hashing consider only source, target, kind and assertion
/// targets; `line` records where the reference was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Assertion letters of `target` named by a multi-assertion reference
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_targets: Vec<String>,
    /// Line of the reference in the source node's file
    pub line: usize,
}

impl Edge {
    /// Create a new edge
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
            assertion_targets: Vec::new(),
            line: 0,
        }
    }

    /// Narrow the edge to specific assertions of its target
    pub fn with_assertions(mut self, letters: Vec<String>) -> Self {
        self.assertion_targets = letters;
        self
    }

    /// Record the line the reference was written on
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.kind == other.kind
            && self.assertion_targets == other.assertion_targets
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.target.hash(state);
        self.kind.hash(state);
        self.assertion_targets.hash(state);
    }
}
