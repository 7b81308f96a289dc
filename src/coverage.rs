//! Coverage rollup and IMPLEMENTS cycle detection
//!
//! An assertion is covered when an IMPLEMENTS or VALIDATES edge targets it
//! directly, or targets its requirement with the assertion's letter in
//! `assertion_targets`. Coverage never flows through REFINES or CONTAINS.
//!
//! Before rollup, the requirement-level IMPLEMENTS graph is searched for
//! strongly connected components. IMPLEMENTS edges between members of the
//! same component are ignored, so a cycle contributes zero coverage.

use crate::graph::{field, Edge, EdgeKind, NodeId, NodeKind, TraceGraph};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Coverage of one requirement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementCoverage {
    pub id: NodeId,
    /// Assertion letters in the order written
    pub assertions: Vec<String>,
    /// Letters with at least one contributing edge
    pub covered: Vec<String>,
    pub coverage: f64,
}

/// Result of one rollup over the graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    pub requirements: Vec<RequirementCoverage>,
    /// Requirement IDs forming IMPLEMENTS cycles, one list per cycle
    pub cycles: Vec<Vec<NodeId>>,
}

impl CoverageReport {
    pub fn get(&self, id: &str) -> Option<&RequirementCoverage> {
        self.requirements.iter().find(|r| r.id.as_str() == id)
    }

    pub fn coverage_of(&self, id: &str) -> Option<f64> {
        self.get(id).map(|r| r.coverage)
    }
}

/// The requirement that owns a node: itself, or an assertion's parent
fn owning_requirement<'g>(graph: &'g TraceGraph, id: &NodeId) -> Option<&'g NodeId> {
    let node = graph.get(id.as_str())?;
    match node.kind {
        NodeKind::Requirement => Some(&node.id),
        NodeKind::Assertion => {
            let parent = node.text(field::REQUIREMENT)?;
            graph.get(parent).map(|p| &p.id)
        }
        _ => None,
    }
}

/// Requirement-level IMPLEMENTS adjacency
fn implements_graph(graph: &TraceGraph) -> BTreeMap<&NodeId, BTreeSet<&NodeId>> {
    let mut adjacency: BTreeMap<&NodeId, BTreeSet<&NodeId>> = BTreeMap::new();
    for node in graph.nodes_of_kind(NodeKind::Requirement) {
        adjacency.entry(&node.id).or_default();
    }
    for edge in graph.edges_of_kind(EdgeKind::Implements) {
        let source = graph
            .get(edge.source.as_str())
            .filter(|n| n.kind == NodeKind::Requirement)
            .map(|n| &n.id);
        if let (Some(source), Some(target)) = (source, owning_requirement(graph, &edge.target)) {
            adjacency.entry(source).or_default().insert(target);
        }
    }
    adjacency
}

/// Strongly connected components of size > 1, plus self-loops
///
/// Kosaraju's algorithm with explicit stacks; each component is sorted and
/// the list of components is sorted by first member.
pub fn detect_cycles(graph: &TraceGraph) -> Vec<Vec<NodeId>> {
    let adjacency = implements_graph(graph);
    let mut reverse: BTreeMap<&NodeId, Vec<&NodeId>> = BTreeMap::new();
    for (source, targets) in &adjacency {
        for target in targets {
            reverse.entry(*target).or_default().push(*source);
        }
    }

    // Pass 1: post-order finish sequence
    let mut visited: BTreeSet<&NodeId> = BTreeSet::new();
    let mut order: Vec<&NodeId> = Vec::with_capacity(adjacency.len());
    for &start in adjacency.keys() {
        if !visited.insert(start) {
            continue;
        }
        let mut stack = vec![(start, adjacency[start].iter())];
        while let Some((node, children)) = stack.last_mut() {
            let node = *node;
            match children.next().copied() {
                Some(child) => {
                    if visited.insert(child) {
                        let iter = adjacency.get(child).map(|c| c.iter()).unwrap_or_default();
                        stack.push((child, iter));
                    }
                }
                None => {
                    order.push(node);
                    stack.pop();
                }
            }
        }
    }

    // Pass 2: components on the transposed graph, in reverse finish order
    let mut assigned: BTreeSet<&NodeId> = BTreeSet::new();
    let mut cycles = Vec::new();
    for &start in order.iter().rev() {
        if !assigned.insert(start) {
            continue;
        }
        let mut component = vec![start];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &prev in reverse.get(node).map(Vec::as_slice).unwrap_or_default() {
                if assigned.insert(prev) {
                    component.push(prev);
                    stack.push(prev);
                }
            }
        }
        let self_loop = adjacency.get(start).is_some_and(|t| t.contains(start));
        if component.len() > 1 || self_loop {
            let mut ids: Vec<NodeId> = component.into_iter().cloned().collect();
            ids.sort();
            cycles.push(ids);
        }
    }
    cycles.sort();
    cycles
}

/// Whether an edge is an IMPLEMENTS edge inside one cycle
fn in_cycle(graph: &TraceGraph, edge: &Edge, members: &BTreeMap<&NodeId, usize>) -> bool {
    if edge.kind != EdgeKind::Implements {
        return false;
    }
    let source = members.get(&edge.source);
    let target = owning_requirement(graph, &edge.target).and_then(|t| members.get(t));
    matches!((source, target), (Some(a), Some(b)) if a == b)
}

/// Compute coverage for every requirement
pub fn compute_coverage(graph: &TraceGraph) -> CoverageReport {
    let cycles = detect_cycles(graph);
    let members: BTreeMap<&NodeId, usize> = cycles
        .iter()
        .enumerate()
        .flat_map(|(i, ids)| ids.iter().map(move |id| (id, i)))
        .collect();

    let counts = |edge: &&Edge| edge.kind.contributes_to_coverage() && !in_cycle(graph, edge, &members);

    let mut requirements = Vec::new();
    for node in graph.nodes_of_kind(NodeKind::Requirement) {
        let direct: Vec<&Edge> = graph.incoming(node.id.as_str()).into_iter().filter(counts).collect();
        let assertions = graph.assertions_of(node.id.as_str());

        let letters: Vec<String> = assertions
            .iter()
            .filter_map(|a| a.text(field::LABEL).map(String::from))
            .collect();
        let covered: Vec<String> = assertions
            .iter()
            .filter(|a| {
                let letter = a.text(field::LABEL).unwrap_or_default();
                let targeted = graph.incoming(a.id.as_str()).iter().any(counts);
                targeted || direct.iter().any(|e| e.assertion_targets.iter().any(|t| t == letter))
            })
            .filter_map(|a| a.text(field::LABEL).map(String::from))
            .collect();

        let coverage = if letters.is_empty() {
            if direct.is_empty() {
                0.0
            } else {
                1.0
            }
        } else {
            covered.len() as f64 / letters.len() as f64
        };
        debug!(id = %node.id, coverage, "Coverage computed");
        requirements.push(RequirementCoverage {
            id: node.id.clone(),
            assertions: letters,
            covered,
            coverage,
        });
    }

    info!(
        requirements = requirements.len(),
        cycles = cycles.len(),
        "Coverage rollup complete"
    );
    CoverageReport {
        requirements,
        cycles,
    }
}

/// Compute coverage and record it in each requirement's metrics
pub fn rollup(graph: &mut TraceGraph) -> CoverageReport {
    let report = compute_coverage(graph);
    for entry in &report.requirements {
        if let Some(metrics) = graph.metrics_mut(&entry.id) {
            metrics.coverage = Some(entry.coverage);
        }
    }
    report
}
