//! Rule engine: independent checks over an assembled graph
//!
//! Every rule sees the whole resolved graph and returns all of its findings.
//! Violations are data; nothing here fails. A run passes when no unsuppressed
//! error-severity violation remains.

mod checks;

pub use checks::{
    unreadable_file, AssertionSequenceRule, BrokenReferenceRule, CycleRule, DuplicateIdRule,
    HashRule, HierarchyRule, MetadataRule, OrphanRule,
};

use crate::config::PatternConfig;
use crate::coverage::CoverageReport;
use crate::graph::{NodeId, SourceLocation, TraceGraph};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(name)
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub rule: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Other locations involved, e.g. the first definition of a duplicate
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<SourceLocation>,
    /// Tolerated by an `expected-broken-links` budget
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub suppressed: bool,
}

impl Violation {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            node_id: None,
            message: message.into(),
            location: None,
            related: Vec::new(),
            suppressed: false,
        }
    }

    pub fn on(mut self, id: &NodeId) -> Self {
        self.node_id = Some(id.clone());
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_related(mut self, related: Vec<SourceLocation>) -> Self {
        self.related = related;
        self
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{} [{}] {}", self.severity, self.rule, self.message)
    }
}

/// Everything a rule may look at
pub struct RuleContext<'a> {
    pub graph: &'a TraceGraph,
    pub config: &'a PatternConfig,
    pub coverage: &'a CoverageReport,
}

/// A single check
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Violation>;
}

/// All findings of one validation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    /// Broken references tolerated by a suppression budget
    pub suppressed: Vec<Violation>,
}

impl ValidationReport {
    /// No unsuppressed error-severity violation
    pub fn passed(&self) -> bool {
        !self.violations.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }

    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    /// Add findings produced outside the rule battery (e.g. unreadable files)
    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
        sort_violations(&mut self.violations);
    }
}

fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        a.location
            .cmp(&b.location)
            .then_with(|| a.rule.cmp(&b.rule))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

/// Ordered collection of rules, run as one battery
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleEngine {
    /// An engine with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in battery
    pub fn standard() -> Self {
        let mut engine = Self::empty();
        engine.register(DuplicateIdRule);
        engine.register(BrokenReferenceRule);
        engine.register(OrphanRule);
        engine.register(HierarchyRule);
        engine.register(CycleRule);
        engine.register(AssertionSequenceRule);
        engine.register(MetadataRule);
        engine.register(HashRule);
        engine
    }

    pub fn register<R: Rule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule and collect all findings
    pub fn run(&self, ctx: &RuleContext<'_>) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            let found = rule.check(ctx);
            debug!(rule = rule.name(), found = found.len(), "Rule complete");
            for violation in found {
                if violation.suppressed {
                    report.suppressed.push(violation);
                } else {
                    report.violations.push(violation);
                }
            }
        }
        sort_violations(&mut report.violations);
        sort_violations(&mut report.suppressed);

        info!(
            errors = report.count(Severity::Error),
            warnings = report.count(Severity::Warning),
            suppressed = report.suppressed.len(),
            "Validation complete"
        );
        report
    }
}
