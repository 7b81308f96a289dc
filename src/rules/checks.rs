//! The built-in rule battery

use super::{Rule, RuleContext, Severity, Violation};
use crate::config::Level;
use crate::graph::{field, EdgeKind, GraphNode, NodeId, NodeKind, SourceLocation, TraceGraph};
use crate::hash::{calculate_hash, verify_hash, HashStatus};
use crate::source::LoadFailure;
use std::collections::{BTreeMap, BTreeSet};

/// Two nodes defined with one ID
pub struct DuplicateIdRule;

impl Rule for DuplicateIdRule {
    fn name(&self) -> &str {
        "duplicate_id"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        ctx.graph
            .duplicates()
            .iter()
            .map(|dup| {
                Violation::new(
                    "duplicate_id",
                    Severity::Error,
                    format!("{} is defined at {} and again at {}", dup.id, dup.first, dup.duplicate),
                )
                .on(&dup.id)
                .at(dup.duplicate.clone())
                .with_related(vec![dup.first.clone()])
            })
            .collect()
    }
}

/// The requirement a node belongs to, if any
fn owner<'g>(graph: &'g TraceGraph, id: &str) -> Option<&'g GraphNode> {
    let node = graph.get(id)?;
    match node.kind {
        NodeKind::Requirement => Some(node),
        NodeKind::Assertion => graph.get(node.text(field::REQUIREMENT)?),
        _ => None,
    }
}

/// One written reference. A multi-assertion reference expands to one edge
/// per letter, and all of them share this key.
type ReferenceKey<'g> = (&'g NodeId, usize, EdgeKind, &'g NodeId);

/// Broken references, each with the assertion letters it names that are
/// missing. An empty list means the target itself does not exist.
fn broken_references(graph: &TraceGraph) -> BTreeMap<ReferenceKey<'_>, Vec<&str>> {
    let mut broken: BTreeMap<ReferenceKey<'_>, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        if edge.kind == EdgeKind::Contains {
            continue;
        }
        let key = (&edge.source, edge.line, edge.kind, &edge.target);
        let Some(target) = graph.get(edge.target.as_str()) else {
            broken.entry(key).or_default();
            continue;
        };
        let known = target.list(field::ASSERTIONS);
        let missing: Vec<&str> = edge
            .assertion_targets
            .iter()
            .filter(|letter| !known.contains(letter))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            broken.entry(key).or_default().extend(missing);
        }
    }
    broken
}

/// References whose target is absent, minus each file's suppression budget
///
/// A file's budget grows with every `expected-broken-links N` marker and
/// only covers references written after the marker. Failures are consumed
/// in line order, one budget unit per written reference.
pub struct BrokenReferenceRule;

impl Rule for BrokenReferenceRule {
    fn name(&self) -> &str {
        "broken_reference"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let graph = ctx.graph;
        let mut by_file: BTreeMap<&str, Vec<(usize, Violation)>> = BTreeMap::new();

        for ((source_id, line, kind, target), letters) in broken_references(graph) {
            let Some(source) = graph.get(source_id.as_str()) else {
                continue;
            };
            let reason = if letters.is_empty() {
                format!("{kind} {target} which does not exist")
            } else {
                format!(
                    "{kind} {target} names assertion {} which does not exist",
                    letters.join(", ")
                )
            };
            let path = source.source.path.as_str();
            let violation = Violation::new(
                "broken_reference",
                Severity::Error,
                format!("{} {}", source.label, reason),
            )
            .on(&source.id)
            .at(SourceLocation::line(path, line));
            by_file.entry(path).or_default().push((line, violation));
        }

        let mut out = Vec::new();
        for (path, mut found) in by_file {
            found.sort_by_key(|(line, _)| *line);
            let markers = graph
                .files()
                .get(path)
                .map(|f| f.suppressions.as_slice())
                .unwrap_or_default();
            let mut used = 0;
            for (line, mut violation) in found {
                let budget: usize = markers
                    .iter()
                    .filter(|m| m.line < line)
                    .map(|m| m.count)
                    .sum();
                if used < budget {
                    used += 1;
                    violation.suppressed = true;
                }
                out.push(violation);
            }
        }
        out
    }
}

/// Requirements cut off from their declared parents, and unaddressed journeys
pub struct OrphanRule;

impl Rule for OrphanRule {
    fn name(&self) -> &str {
        "orphan"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let graph = ctx.graph;
        let mut out = Vec::new();

        for node in graph.nodes_of_kind(NodeKind::Requirement) {
            if graph.roots().contains(&node.id) {
                continue;
            }
            let has_parent = graph
                .outgoing(node.id.as_str())
                .iter()
                .any(|e| e.kind.is_parentage() && graph.is_resolved(e));
            if has_parent {
                continue;
            }
            let mut targets = vec![node.id.as_str()];
            targets.extend(graph.assertions_of(node.id.as_str()).iter().map(|a| a.id.as_str()));
            let referenced = targets.iter().any(|t| {
                graph.incoming(t).iter().any(|e| {
                    matches!(
                        e.kind,
                        EdgeKind::Implements | EdgeKind::Validates | EdgeKind::Refines
                    )
                })
            });
            if !referenced {
                out.push(
                    Violation::new(
                        "orphan",
                        Severity::Warning,
                        format!("{} has no resolvable parent and nothing references it", node.id),
                    )
                    .on(&node.id)
                    .at(node.source.clone()),
                );
            }
        }

        for journey in graph.nodes_of_kind(NodeKind::Journey) {
            let addressed = graph
                .incoming(journey.id.as_str())
                .iter()
                .any(|e| e.kind == EdgeKind::Addresses);
            if !addressed {
                out.push(
                    Violation::new(
                        "orphan",
                        Severity::Info,
                        format!("{} is not addressed by any requirement", journey.id),
                    )
                    .on(&journey.id)
                    .at(journey.source.clone()),
                );
            }
        }
        out
    }
}

/// Level of a requirement: its declared level name, else its ID's level code
fn level_of<'c>(ctx: &'c RuleContext<'_>, node: &GraphNode) -> Option<&'c Level> {
    if let Some(level) = node.text(field::LEVEL).and_then(|name| ctx.config.level_by_name(name)) {
        return Some(level);
    }
    let parts = ctx.config.parse_id(node.id.as_str())?;
    ctx.config.level_by_code(parts.level_code)
}

/// Parents must sit at a permitted level above their children
pub struct HierarchyRule;

impl Rule for HierarchyRule {
    fn name(&self) -> &str {
        "hierarchy"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let graph = ctx.graph;
        let mut out = Vec::new();
        for node in graph.nodes_of_kind(NodeKind::Requirement) {
            let Some(child_level) = level_of(ctx, node) else {
                continue;
            };
            let mut seen = BTreeSet::new();
            for edge in graph.outgoing(node.id.as_str()) {
                if !edge.kind.is_parentage() {
                    continue;
                }
                let Some(parent) = owner(graph, edge.target.as_str()) else {
                    continue;
                };
                // Several assertions of one parent count once
                if !seen.insert(&parent.id) {
                    continue;
                }
                let Some(parent_level) = level_of(ctx, parent) else {
                    continue;
                };
                if !ctx.config.permits_parent(child_level, parent_level) {
                    out.push(
                        Violation::new(
                            "hierarchy",
                            Severity::Error,
                            format!(
                                "{} ({}) may not {} {} ({})",
                                node.id,
                                child_level.name,
                                edge.kind.to_string().to_lowercase(),
                                parent.id,
                                parent_level.name
                            ),
                        )
                        .on(&node.id)
                        .at(node.source.clone())
                        .with_related(vec![parent.source.clone()]),
                    );
                }
            }
        }
        out
    }
}

/// One violation per IMPLEMENTS cycle
pub struct CycleRule;

impl Rule for CycleRule {
    fn name(&self) -> &str {
        "cycle"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        ctx.coverage
            .cycles
            .iter()
            .filter_map(|members| {
                let first = ctx.graph.get(members.first()?.as_str())?;
                let chain: Vec<&str> = members.iter().map(NodeId::as_str).collect();
                let related = members
                    .iter()
                    .skip(1)
                    .filter_map(|id| ctx.graph.get(id.as_str()))
                    .map(|n| n.source.clone())
                    .collect();
                Some(
                    Violation::new(
                        "cycle",
                        Severity::Error,
                        format!(
                            "IMPLEMENTS cycle among {}; excluded from coverage",
                            chain.join(", ")
                        ),
                    )
                    .on(&first.id)
                    .at(first.source.clone())
                    .with_related(related),
                )
            })
            .collect()
    }
}

/// Assertion letters must run A, B, C, ... without gaps
pub struct AssertionSequenceRule;

impl Rule for AssertionSequenceRule {
    fn name(&self) -> &str {
        "format.assertion_sequence"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let mut out = Vec::new();
        for node in ctx.graph.nodes_of_kind(NodeKind::Requirement) {
            let letters = node.list(field::ASSERTIONS);
            let expected = ('A'..='Z').map(|c| c.to_string());
            if let Some((i, (found, want))) = letters
                .iter()
                .zip(expected)
                .enumerate()
                .find(|(_, (found, want))| *found != want)
            {
                out.push(
                    Violation::new(
                        "format.assertion_sequence",
                        Severity::Error,
                        format!(
                            "{}: assertion {} is labelled {}, expected {}",
                            node.id,
                            i + 1,
                            found,
                            want
                        ),
                    )
                    .on(&node.id)
                    .at(node.source.clone()),
                );
            }
        }
        out
    }
}

/// Metadata line present and complete, with known status and matching level
pub struct MetadataRule;

impl Rule for MetadataRule {
    fn name(&self) -> &str {
        "format.metadata"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let mut out = Vec::new();
        for node in ctx.graph.nodes_of_kind(NodeKind::Requirement) {
            let finding = |rule: &str, severity, message: String| {
                Violation::new(rule, severity, message)
                    .on(&node.id)
                    .at(node.source.clone())
            };

            if !node.flag(field::HAS_METADATA) {
                out.push(finding(
                    "format.missing_metadata",
                    Severity::Error,
                    format!("{} has no **Level**/**Status** metadata line", node.id),
                ));
                continue;
            }
            for key in [field::LEVEL, field::STATUS] {
                if node.text(key).map_or(true, |v| v.trim().is_empty()) {
                    out.push(finding(
                        "format.missing_field",
                        Severity::Error,
                        format!("{} metadata is missing {}", node.id, key),
                    ));
                }
            }

            if let Some(status) = node.text(field::STATUS).filter(|s| !s.trim().is_empty()) {
                if !ctx.config.is_known_status(status) {
                    out.push(finding(
                        "format.unknown_status",
                        Severity::Warning,
                        format!("{} has unknown status '{}'", node.id, status),
                    ));
                }
            }

            if let Some(name) = node.text(field::LEVEL).filter(|s| !s.trim().is_empty()) {
                let declared = ctx.config.level_by_name(name);
                let from_id = ctx
                    .config
                    .parse_id(node.id.as_str())
                    .and_then(|p| ctx.config.level_by_code(p.level_code));
                let message = match (declared, from_id) {
                    (None, _) => Some(format!("{} declares unknown level '{}'", node.id, name)),
                    (Some(d), Some(i)) if d.code != i.code => Some(format!(
                        "{} declares level {} but its ID encodes {}",
                        node.id, d.name, i.name
                    )),
                    _ => None,
                };
                if let Some(message) = message {
                    out.push(finding("format.level_mismatch", Severity::Error, message));
                }
            }
        }
        out
    }
}

/// Stored hash missing or out of date
pub struct HashRule;

impl Rule for HashRule {
    fn name(&self) -> &str {
        "hash"
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation> {
        let length = ctx.config.hash_length();
        let mut out = Vec::new();
        for node in ctx.graph.nodes_of_kind(NodeKind::Requirement) {
            let body = node.text(field::BODY).unwrap_or_default();
            let stored = node.text(field::HASH);
            let violation = match verify_hash(body, stored, length) {
                HashStatus::Valid => continue,
                HashStatus::Mismatch => Violation::new(
                    "hash.mismatch",
                    Severity::Error,
                    format!(
                        "{} content changed since its hash was updated (stored {}, computed {})",
                        node.id,
                        stored.unwrap_or_default(),
                        calculate_hash(body, length)
                    ),
                ),
                HashStatus::Missing => Violation::new(
                    "hash.missing",
                    Severity::Warning,
                    format!("{} has no stored hash", node.id),
                ),
            };
            out.push(violation.on(&node.id).at(node.source.clone()));
        }
        out
    }
}

/// A file that could not be read, as a violation
pub fn unreadable_file(failure: &LoadFailure) -> Violation {
    Violation::new(
        "file.unreadable",
        Severity::Warning,
        format!("could not read {}: {}", failure.path, failure.reason),
    )
    .at(SourceLocation::line(failure.path.clone(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PatternConfig, TraceConfig};
    use crate::coverage::{compute_coverage, CoverageReport};
    use crate::graph::GraphBuilder;
    use crate::parsing::ParserRegistry;
    use crate::source::SourceFile;

    struct Fixture {
        config: PatternConfig,
        graph: TraceGraph,
        coverage: CoverageReport,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            Self::with_config(TraceConfig::default(), files)
        }

        fn with_config(config: TraceConfig, files: &[(&str, &str)]) -> Self {
            let config = config.compile().unwrap();
            let registry = ParserRegistry::standard(&config).unwrap();
            let files: Vec<_> = files.iter().map(|(p, t)| SourceFile::new(*p, *t)).collect();
            let graph = GraphBuilder::new(&config, &registry).build(&files);
            let coverage = compute_coverage(&graph);
            Self {
                config,
                graph,
                coverage,
            }
        }

        fn run(&self, rule: &dyn Rule) -> Vec<Violation> {
            rule.check(&RuleContext {
                graph: &self.graph,
                config: &self.config,
                coverage: &self.coverage,
            })
        }
    }

    fn req(id: &str, level: &str, implements: &str, assertions: &[&str]) -> String {
        let mut text = format!(
            "## {id}: Title of {id}\n**Level**: {level} | **Status**: Active | **Implements**: {implements}\n\n"
        );
        for a in assertions {
            text.push_str(a);
            text.push('\n');
        }
        text.push_str(&format!("\n*End* *{id}*\n\n"));
        text
    }

    #[test]
    fn duplicate_reports_both_locations() {
        let prd = req("REQ-p00001", "PRD", "-", &["A. One."]);
        let fx = Fixture::new(&[("a.md", prd.as_str()), ("b.md", prd.as_str())]);
        let found = fx.run(&DuplicateIdRule);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.as_ref().unwrap().path, "b.md");
        assert_eq!(found[0].related[0].path, "a.md");
    }

    #[test]
    fn suppression_budget_consumes_first_failures() {
        let code = "# elspais: expected-broken-links 2\n\
# Implements: REQ-d09001\n\
# Implements: REQ-d09002\n\
# Implements: REQ-d09003\n\
# Implements: REQ-d09004\n";
        let fx = Fixture::new(&[("src/tool.py", code)]);
        let found = fx.run(&BrokenReferenceRule);
        let reported: Vec<usize> = found
            .iter()
            .filter(|v| !v.suppressed)
            .map(|v| v.location.as_ref().unwrap().start_line)
            .collect();
        assert_eq!(reported, vec![4, 5]);
        assert_eq!(found.iter().filter(|v| v.suppressed).count(), 2);
    }

    #[test]
    fn marker_only_covers_later_lines() {
        let code = "# Implements: REQ-d09001\n\
# elspais: expected-broken-links 1\n\
# Implements: REQ-d09002\n";
        let fx = Fixture::new(&[("src/tool.py", code)]);
        let found = fx.run(&BrokenReferenceRule);
        let reported: Vec<_> = found.iter().filter(|v| !v.suppressed).collect();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].location.as_ref().unwrap().start_line, 1);
    }

    #[test]
    fn unknown_assertion_letter_is_broken() {
        let prd = req("REQ-p00001", "PRD", "-", &["A. One.", "B. Two."]);
        let code = "// Implements: REQ-p00001-A-C\n";
        let fx = Fixture::new(&[("spec/prd.md", prd.as_str()), ("src/lib.rs", code)]);
        let found = fx.run(&BrokenReferenceRule);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("assertion C"));
    }

    #[test]
    fn multi_assertion_reference_is_one_failure() {
        let prd = req("REQ-p00001", "PRD", "-", &["A. One."]);
        let code = "# elspais: expected-broken-links 1\n\
# Implements: REQ-p09999-A-B\n\
# Implements: REQ-p00001-B-C\n";
        let fx = Fixture::new(&[("spec/prd.md", prd.as_str()), ("src/tool.py", code)]);
        let found = fx.run(&BrokenReferenceRule);
        assert_eq!(found.len(), 2);
        assert!(found[0].suppressed);
        assert_eq!(found[0].location.as_ref().unwrap().start_line, 2);
        assert!(!found[1].suppressed);
        assert!(found[1].message.contains("names assertion B, C"));
    }

    #[test]
    fn orphan_requirement_and_journey() {
        let ops = req("REQ-o00001", "OPS", "REQ-p09999", &[]);
        let journey = "## JNY-Dev-01: Onboard\n**Actor**: Dev | **Goal**: Start\n\n1. Clone\n\n*End* *JNY-Dev-01*\n";
        let fx = Fixture::new(&[("spec/ops.md", ops.as_str()), ("spec/jny.md", journey)]);
        let found = fx.run(&OrphanRule);
        let summary: Vec<_> = found
            .iter()
            .map(|v| (v.node_id.as_ref().unwrap().as_str(), v.severity))
            .collect();
        assert_eq!(
            summary,
            vec![("REQ-o00001", Severity::Warning), ("JNY-Dev-01", Severity::Info)]
        );
    }

    #[test]
    fn implementing_child_is_not_orphan() {
        let prd = req("REQ-p00001", "PRD", "-", &["A. One."]);
        let ops = req("REQ-o00001", "OPS", "REQ-p00001-A", &[]);
        let fx = Fixture::new(&[("prd.md", prd.as_str()), ("ops.md", ops.as_str())]);
        assert!(fx.run(&OrphanRule).is_empty());
    }

    #[test]
    fn hierarchy_rejects_upward_implements() {
        let prd = req("REQ-p00001", "PRD", "REQ-d00001", &[]);
        let dev = req("REQ-d00001", "DEV", "-", &[]);
        let fx = Fixture::new(&[("prd.md", prd.as_str()), ("dev.md", dev.as_str())]);
        let found = fx.run(&HierarchyRule);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id.as_ref().unwrap().as_str(), "REQ-p00001");
    }

    #[test]
    fn hierarchy_reports_each_parent_once() {
        let prd = req("REQ-p00001", "PRD", "REQ-d00001-A-B", &[]);
        let dev = req("REQ-d00001", "DEV", "-", &["A. One.", "B. Two."]);
        let fx = Fixture::new(&[("prd.md", prd.as_str()), ("dev.md", dev.as_str())]);
        let found = fx.run(&HierarchyRule);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("REQ-d00001 (DEV)"));
    }

    #[test]
    fn hierarchy_same_level_follows_config() {
        let a = req("REQ-d00001", "DEV", "REQ-d00002", &[]);
        let b = req("REQ-d00002", "DEV", "-", &[]);
        let files = [("a.md", a.as_str()), ("b.md", b.as_str())];

        assert!(Fixture::new(&files).run(&HierarchyRule).is_empty());

        let mut strict = TraceConfig::default();
        strict.hierarchy.allow_same_level = false;
        assert_eq!(Fixture::with_config(strict, &files).run(&HierarchyRule).len(), 1);
    }

    #[test]
    fn cycle_reported_once() {
        let a = req("REQ-d00001", "DEV", "REQ-d00002", &[]);
        let b = req("REQ-d00002", "DEV", "REQ-d00001", &[]);
        let fx = Fixture::new(&[("a.md", a.as_str()), ("b.md", b.as_str())]);
        let found = fx.run(&CycleRule);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id.as_ref().unwrap().as_str(), "REQ-d00001");
        assert_eq!(found[0].related.len(), 1);
    }

    #[test]
    fn assertion_gap_is_flagged() {
        let prd = req("REQ-p00001", "PRD", "-", &["A. One.", "C. Three."]);
        let fx = Fixture::new(&[("prd.md", prd.as_str())]);
        let found = fx.run(&AssertionSequenceRule);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("labelled C, expected B"));
    }

    #[test]
    fn metadata_problems() {
        let bare = "## REQ-p00001: Bare\n\nText.\n\n*End* *Bare*\n";
        let odd = "## REQ-p00002: Odd\n**Level**: DEV | **Status**: Shelved\n\n*End* *Odd*\n";
        let fx = Fixture::new(&[("a.md", bare), ("b.md", odd)]);
        let mut rules: Vec<_> = fx.run(&MetadataRule).into_iter().map(|v| v.rule).collect();
        rules.sort();
        assert_eq!(
            rules,
            vec![
                "format.level_mismatch",
                "format.missing_metadata",
                "format.unknown_status"
            ]
        );
    }

    #[test]
    fn hash_missing_and_mismatch() {
        let fresh = req("REQ-p00001", "PRD", "-", &["A. One."]);
        let stale = "## REQ-p00002: Stale\n**Level**: PRD | **Status**: Active\n\nA. Two.\n\n*End* *Stale* | **Hash**: 00000000\n";
        let fx = Fixture::new(&[("a.md", fresh.as_str()), ("b.md", stale)]);
        let found = fx.run(&HashRule);
        let summary: Vec<_> = found.iter().map(|v| (v.rule.as_str(), v.severity)).collect();
        assert_eq!(
            summary,
            vec![("hash.missing", Severity::Warning), ("hash.mismatch", Severity::Error)]
        );
    }

    #[test]
    fn unreadable_file_is_a_warning() {
        let v = unreadable_file(&LoadFailure {
            path: "gone.md".into(),
            reason: "No such file".into(),
        });
        assert_eq!(v.rule, "file.unreadable");
        assert_eq!(v.severity, Severity::Warning);
    }
}
