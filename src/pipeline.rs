//! One traceability run: parse, assemble, roll up, check

use crate::config::{ConfigError, PatternConfig, TraceConfig};
use crate::coverage::{rollup, CoverageReport};
use crate::graph::{field, GraphBuilder, NodeKind, TraceGraph};
use crate::hash::{fix_files, plan_updates, verify_hash, FixError, FixReport};
use crate::parsing::ParserRegistry;
use crate::rules::{unreadable_file, RuleContext, RuleEngine, ValidationReport};
use crate::source::{GitChangeSummary, SourceSet};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Hash update failed: {0}")]
    Fix(#[from] FixError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;

/// Output of [`Pipeline::run`]
#[derive(Debug, Serialize)]
pub struct TraceRun {
    pub graph: TraceGraph,
    pub coverage: CoverageReport,
    pub report: ValidationReport,
}

impl TraceRun {
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

/// Compiled configuration, parser registry and rule battery for one run
pub struct Pipeline {
    config: PatternConfig,
    registry: ParserRegistry,
    rules: RuleEngine,
}

impl Pipeline {
    /// Compile configuration and build the standard registry and rules.
    /// Invalid configuration fails here, before any file is read.
    pub fn new(config: &TraceConfig) -> TraceResult<Self> {
        let config = config.compile()?;
        let registry = ParserRegistry::standard(&config)?;
        Ok(Self {
            config,
            registry,
            rules: RuleEngine::standard(),
        })
    }

    /// Replace the rule battery
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Parse and assemble the graph without annotation or checks
    pub fn build_graph(&self, sources: &SourceSet) -> TraceGraph {
        GraphBuilder::new(&self.config, &self.registry).build(&sources.files)
    }

    /// Full run: assemble, annotate metrics, then validate
    pub fn run(&self, sources: &SourceSet, git: Option<&GitChangeSummary>) -> TraceRun {
        let mut graph = self.build_graph(sources);
        let coverage = rollup(&mut graph);
        annotate_hashes(&mut graph, self.config.hash_length());
        if let Some(summary) = git {
            graph.apply_git_summary(summary);
        }

        let mut report = self.rules.run(&RuleContext {
            graph: &graph,
            config: &self.config,
            coverage: &coverage,
        });
        report.extend(sources.failures.iter().map(unreadable_file));

        info!(
            files = sources.len(),
            nodes = graph.node_count(),
            passed = report.passed(),
            "Run complete"
        );
        TraceRun {
            graph,
            coverage,
            report,
        }
    }

    /// Rewrite missing or stale hashes in place. Paths are resolved against `root`.
    pub fn update_hashes(&self, root: &Path, sources: &SourceSet) -> FixReport {
        let graph = self.build_graph(sources);
        let updates = plan_updates(&graph, self.config.hash_length());
        info!(planned = updates.len(), "Hash updates planned");
        fix_files(root, updates)
    }
}

fn annotate_hashes(graph: &mut TraceGraph, length: usize) {
    let statuses: Vec<_> = graph
        .nodes_of_kind(NodeKind::Requirement)
        .map(|node| {
            let body = node.text(field::BODY).unwrap_or_default();
            (node.id.clone(), verify_hash(body, node.text(field::HASH), length))
        })
        .collect();
    for (id, status) in statuses {
        if let Some(metrics) = graph.metrics_mut(&id) {
            metrics.hash = Some(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashStatus;
    use crate::source::SourceFile;

    #[test]
    fn invalid_config_fails_before_parsing() {
        let config = TraceConfig {
            prefix: String::new(),
            ..Default::default()
        };
        assert!(matches!(Pipeline::new(&config), Err(TraceError::Config(_))));
    }

    #[test]
    fn run_annotates_metrics() {
        let pipeline = Pipeline::new(&TraceConfig::default()).unwrap();
        let sources = SourceSet::from_files(vec![SourceFile::new(
            "spec/prd.md",
            "## REQ-p00001: Login\n**Level**: PRD | **Status**: Active\n\nA. Log in.\n\n*End* *Login*\n",
        )]);
        let git = GitChangeSummary {
            untracked: ["spec/prd.md".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let run = pipeline.run(&sources, Some(&git));

        let metrics = run.graph.metrics("REQ-p00001").unwrap();
        assert_eq!(metrics.coverage, Some(0.0));
        assert_eq!(metrics.hash, Some(HashStatus::Missing));
        assert!(metrics.git.untracked);
        assert!(run.passed());
    }
}
