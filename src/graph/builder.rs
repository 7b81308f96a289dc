//! Graph assembly: parse every file, then build nodes, then resolve edges

use super::edge::{Edge, EdgeKind};
use super::node::{field, FieldValue, GraphNode, NodeId, NodeKind, SourceLocation};
use super::store::{FileInfo, TraceGraph};
use crate::config::PatternConfig;
use crate::parsing::{
    ContentType, FileParse, JourneyData, ParsedContent, ParsedData, ParserRegistry, ReferenceData,
    RequirementData,
};
use crate::source::SourceFile;
use rayon::prelude::*;
use tracing::{debug, info};

/// A reference waiting for every node to exist before it is resolved
#[derive(Debug)]
struct PendingRef {
    source: NodeId,
    target: String,
    kind: EdgeKind,
    line: usize,
}

/// Builds a [`TraceGraph`] from source files
pub struct GraphBuilder<'a> {
    config: &'a PatternConfig,
    registry: &'a ParserRegistry,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a PatternConfig, registry: &'a ParserRegistry) -> Self {
        Self { config, registry }
    }

    /// Run line claiming over every file in parallel. Results keep input order.
    pub fn parse_files(&self, files: &[SourceFile]) -> Vec<FileParse> {
        files
            .par_iter()
            .map(|f| self.registry.parse_file(&f.path, &f.text, self.config))
            .collect()
    }

    /// Parse and assemble in one step
    pub fn build(&self, files: &[SourceFile]) -> TraceGraph {
        let parses = self.parse_files(files);
        self.assemble(parses)
    }

    /// Merge per-file content records into one graph
    ///
    /// Nodes from every file are created first; references are resolved only
    /// afterwards so that they may point at IDs defined in later files.
    pub fn assemble(&self, parses: Vec<FileParse>) -> TraceGraph {
        let mut graph = TraceGraph::new();
        let mut pending = Vec::new();
        let mut roots = Vec::new();

        for parse in parses {
            for content in &parse.contents {
                match &content.parsed_data {
                    ParsedData::Requirement(data) => {
                        let added =
                            self.add_requirement(&mut graph, &parse.path, content, data, &mut pending);
                        if added && data.implements.is_empty() && data.refines.is_empty() {
                            roots.push(NodeId::from(data.id.as_str()));
                        }
                    }
                    ParsedData::Journey(data) => {
                        add_journey(&mut graph, &parse.path, content, data);
                    }
                    ParsedData::Reference(data) => {
                        add_reference(&mut graph, &parse.path, content, data, &mut pending);
                    }
                    ParsedData::Comment { .. } | ParsedData::Remainder => {}
                }
            }
            debug!(path = %parse.path, records = parse.contents.len(), "Merged file");
            graph.record_file(
                parse.path,
                FileInfo {
                    line_count: parse.line_count,
                    suppressions: parse.suppressions,
                },
            );
        }

        let references = pending.len();
        for reference in pending {
            for edge in self.resolve(reference) {
                graph.add_edge(edge);
            }
        }
        graph.set_roots(roots);

        info!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            references,
            duplicates = graph.duplicates().len(),
            "Graph assembled"
        );
        graph
    }

    fn add_requirement(
        &self,
        graph: &mut TraceGraph,
        path: &str,
        content: &ParsedContent,
        data: &RequirementData,
        pending: &mut Vec<PendingRef>,
    ) -> bool {
        let letters: Vec<String> = data.assertions.iter().map(|a| a.label.to_string()).collect();
        let node = GraphNode::new(
            data.id.as_str(),
            NodeKind::Requirement,
            data.title.as_str(),
            SourceLocation::new(path, content.start_line, content.end_line),
        )
        .with_field(field::TITLE, FieldValue::Text(data.title.clone()))
        .with_text(field::LEVEL, data.level.as_deref())
        .with_text(field::STATUS, data.status.as_deref())
        .with_text(field::HASH, data.stored_hash.as_deref())
        .with_field(field::BODY, FieldValue::Text(data.body.clone()))
        .with_field(field::HAS_METADATA, FieldValue::Bool(data.has_metadata))
        .with_field(field::IMPLEMENTS, FieldValue::List(data.implements.clone()))
        .with_field(field::REFINES, FieldValue::List(data.refines.clone()))
        .with_field(field::ADDRESSES, FieldValue::List(data.addresses.clone()))
        .with_field(field::ASSERTIONS, FieldValue::List(letters))
        .with_field(field::END_MARKER, FieldValue::Text(data.end_marker.clone()))
        .with_field(field::END_LINE, FieldValue::Int(data.end_line as i64));

        // A duplicate keeps nothing of its own: no assertions, no references.
        if !graph.add_node(node) {
            return false;
        }

        let requirement = NodeId::from(data.id.as_str());
        for assertion in &data.assertions {
            let id = NodeId::from_string(format!("{}-{}", data.id, assertion.label));
            let node = GraphNode::new(
                id.clone(),
                NodeKind::Assertion,
                assertion.text.as_str(),
                SourceLocation::line(path, assertion.line),
            )
            .with_field(field::REQUIREMENT, FieldValue::Text(data.id.clone()))
            .with_field(field::LABEL, FieldValue::Text(assertion.label.to_string()))
            .with_field(field::TEXT, FieldValue::Text(assertion.text.clone()));
            if graph.add_node(node) {
                graph.add_edge(
                    Edge::new(requirement.clone(), id, EdgeKind::Contains).at_line(assertion.line),
                );
            }
        }

        let declared = [
            (&data.implements, EdgeKind::Implements),
            (&data.refines, EdgeKind::Refines),
            (&data.addresses, EdgeKind::Addresses),
        ];
        for (targets, kind) in declared {
            pending.extend(targets.iter().map(|target| PendingRef {
                source: requirement.clone(),
                target: target.clone(),
                kind,
                line: content.start_line,
            }));
        }
        true
    }

    /// Turn one reference into edges. A target naming several assertions
    /// (`REQ-p00001-A-B`) becomes one edge per letter against the requirement.
    fn resolve(&self, reference: PendingRef) -> Vec<Edge> {
        let PendingRef {
            source,
            target,
            kind,
            line,
        } = reference;

        let parts = match kind {
            EdgeKind::Addresses => None,
            _ => self.config.parse_id(&target),
        };
        match parts {
            Some(parts) if parts.assertions.len() > 1 => {
                let base_len = target.len() - 2 * parts.assertions.len();
                let base = NodeId::from(&target[..base_len]);
                parts
                    .assertions
                    .iter()
                    .map(|letter| {
                        Edge::new(source.clone(), base.clone(), kind)
                            .with_assertions(vec![letter.to_string()])
                            .at_line(line)
                    })
                    .collect()
            }
            _ => vec![Edge::new(source, NodeId::from(target), kind).at_line(line)],
        }
    }
}

fn add_journey(graph: &mut TraceGraph, path: &str, content: &ParsedContent, data: &JourneyData) {
    let node = GraphNode::new(
        data.id.as_str(),
        NodeKind::Journey,
        data.title.as_str(),
        SourceLocation::new(path, content.start_line, content.end_line),
    )
    .with_field(field::TITLE, FieldValue::Text(data.title.clone()))
    .with_text(field::ACTOR, data.actor.as_deref())
    .with_text(field::GOAL, data.goal.as_deref())
    .with_field(field::STEPS, FieldValue::List(data.steps.clone()));
    graph.add_node(node);
}

fn add_reference(
    graph: &mut TraceGraph,
    path: &str,
    content: &ParsedContent,
    data: &ReferenceData,
    pending: &mut Vec<PendingRef>,
) {
    let (kind, edge_kind, tag) = match content.content_type {
        ContentType::TestRef => (NodeKind::Test, EdgeKind::Validates, "test"),
        _ => (NodeKind::Code, EdgeKind::Implements, "code"),
    };
    let id = NodeId::from_string(format!("{}:{}:{}", tag, path, content.start_line));
    let label = data
        .label
        .clone()
        .unwrap_or_else(|| format!("{}:{}", path, content.start_line));
    let targets = data.targets.iter().map(|t| t.id.clone()).collect();
    let node = GraphNode::new(
        id.clone(),
        kind,
        label,
        SourceLocation::new(path, content.start_line, content.end_line),
    )
    .with_field(field::TARGETS, FieldValue::List(targets));

    if graph.add_node(node) {
        pending.extend(data.targets.iter().map(|t| PendingRef {
            source: id.clone(),
            target: t.id.clone(),
            kind: edge_kind,
            line: t.line,
        }));
    }
}
