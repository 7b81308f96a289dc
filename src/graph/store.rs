//! TraceGraph: the run-scoped, ID-indexed node store

use super::edge::{Edge, EdgeId, EdgeKind};
use super::metrics::NodeMetrics;
use super::node::{field, GraphNode, NodeId, NodeKind, SourceLocation};
use crate::parsing::SuppressionMarker;
use crate::source::GitChangeSummary;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A second definition of an already-present node ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateNode {
    pub id: NodeId,
    pub first: SourceLocation,
    pub duplicate: SourceLocation,
}

/// Per-file facts retained from parsing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub line_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<SuppressionMarker>,
}

/// The traceability graph of one run
///
/// Nodes live in a map keyed by ID and edges in a flat list; nodes refer to
/// their edges by [`EdgeId`] and edges refer to nodes by [`NodeId`]. Edges
/// whose target does not exist are kept so rule checks can report them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: Vec<Edge>,
    roots: Vec<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    duplicates: Vec<DuplicateNode>,
    metrics: BTreeMap<NodeId, NodeMetrics>,
    files: BTreeMap<String, FileInfo>,
    #[serde(skip)]
    edge_index: HashMap<Edge, EdgeId>,
}

impl TraceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. A second node with an existing ID is recorded as a
    /// duplicate and not stored; returns whether the node was inserted.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if let Some(existing) = self.nodes.get(&node.id) {
            self.duplicates.push(DuplicateNode {
                id: node.id.clone(),
                first: existing.source.clone(),
                duplicate: node.source,
            });
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Insert an edge, returning the existing ID if an equal edge is present
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        if let Some(id) = self.edge_index.get(&edge) {
            return *id;
        }
        let id = EdgeId(self.edges.len());
        if let Some(source) = self.nodes.get_mut(&edge.source) {
            source.outgoing.push(id);
        }
        if let Some(target) = self.nodes.get_mut(&edge.target) {
            target.incoming.push(id);
        }
        self.edge_index.insert(edge.clone(), id);
        self.edges.push(edge);
        id
    }

    pub(crate) fn set_roots(&mut self, roots: Vec<NodeId>) {
        self.roots = roots;
    }

    pub(crate) fn record_file(&mut self, path: impl Into<String>, info: FileInfo) {
        self.files.insert(path.into(), info);
    }

    // === Queries ===

    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes, ordered by ID
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Whether an edge's target exists in the store
    pub fn is_resolved(&self, edge: &Edge) -> bool {
        self.nodes.contains_key(&edge.target)
    }

    /// Top-level requirements: those declaring no parent
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn duplicates(&self) -> &[DuplicateNode] {
        &self.duplicates
    }

    pub fn files(&self) -> &BTreeMap<String, FileInfo> {
        &self.files
    }

    pub fn outgoing(&self, id: &str) -> Vec<&Edge> {
        self.resolve_edges(self.nodes.get(id).map(|n| n.outgoing.as_slice()))
    }

    pub fn incoming(&self, id: &str) -> Vec<&Edge> {
        self.resolve_edges(self.nodes.get(id).map(|n| n.incoming.as_slice()))
    }

    fn resolve_edges(&self, ids: Option<&[EdgeId]>) -> Vec<&Edge> {
        ids.unwrap_or_default()
            .iter()
            .filter_map(|id| self.edges.get(id.0))
            .collect()
    }

    /// Assertion nodes of a requirement, in the order written
    pub fn assertions_of(&self, id: &str) -> Vec<&GraphNode> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.list(field::ASSERTIONS)
            .iter()
            .filter_map(|letter| self.nodes.get(format!("{}-{}", id, letter).as_str()))
            .collect()
    }

    /// Requirements that implement or refine `id` or one of its assertions
    pub fn children_of(&self, id: &str) -> Vec<&GraphNode> {
        let mut targets: Vec<&str> = vec![id];
        targets.extend(self.assertions_of(id).iter().map(|a| a.id.as_str()));

        let mut seen: Vec<&NodeId> = Vec::new();
        for target in targets {
            for edge in self.incoming(target) {
                let is_requirement = self
                    .nodes
                    .get(&edge.source)
                    .is_some_and(|n| n.kind == NodeKind::Requirement);
                if edge.kind.is_parentage() && is_requirement && !seen.contains(&&edge.source) {
                    seen.push(&edge.source);
                }
            }
        }
        seen.into_iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    // === Metrics ===

    pub fn metrics(&self, id: &str) -> Option<&NodeMetrics> {
        self.metrics.get(id)
    }

    pub fn all_metrics(&self) -> &BTreeMap<NodeId, NodeMetrics> {
        &self.metrics
    }

    /// Mutable metrics for an existing node, created on first access
    pub fn metrics_mut(&mut self, id: &NodeId) -> Option<&mut NodeMetrics> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        Some(self.metrics.entry(id.clone()).or_default())
    }

    /// Merge a git-change summary into every node's metrics
    pub fn apply_git_summary(&mut self, summary: &GitChangeSummary) {
        for node in self.nodes.values() {
            let flags = summary.flags_for(&node.source.path);
            if flags.any() {
                self.metrics.entry(node.id.clone()).or_default().git = flags;
            }
        }
    }
}
