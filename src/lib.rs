//! Elspais: requirement traceability graph
//!
//! Builds one graph per run from Markdown requirement specs and the source
//! and test files that reference them, then computes coverage, checks stored
//! content hashes, and runs a battery of structural and format rules.
//!
//! # Core Concepts
//!
//! - **Line claiming**: every line of every file belongs to exactly one
//!   parsed record; parsers run in priority order over unclaimed lines
//! - **Requirements and assertions**: lettered assertions are the unit of
//!   coverage
//! - **Edges**: IMPLEMENTS and VALIDATES count toward coverage; REFINES,
//!   ADDRESSES and CONTAINS do not
//! - **Hashes**: each closing marker may carry a digest of its body, and
//!   drift between the two is reported
//!
//! # Example
//!
//! ```
//! use elspais::{Pipeline, SourceFile, SourceSet, TraceConfig};
//!
//! let pipeline = Pipeline::new(&TraceConfig::default()).unwrap();
//! let sources = SourceSet::from_files(vec![SourceFile::new(
//!     "spec/prd.md",
//!     "## REQ-p00001: Login\n**Level**: PRD | **Status**: Active\n\nA. Users log in.\n\n*End* *Login*\n",
//! )]);
//! let run = pipeline.run(&sources, None);
//!
//! assert_eq!(run.coverage.coverage_of("REQ-p00001"), Some(0.0));
//! assert!(run.passed());
//! ```

pub mod config;
pub mod coverage;
pub mod graph;
pub mod hash;
pub mod parsing;
pub mod pipeline;
pub mod rules;
pub mod source;

pub use config::{ConfigError, PatternConfig, TraceConfig};
pub use coverage::{CoverageReport, RequirementCoverage};
pub use graph::{Edge, EdgeKind, GraphBuilder, GraphNode, NodeId, NodeKind, TraceGraph};
pub use hash::{calculate_hash, verify_hash, FixError, HashStatus};
pub use pipeline::{Pipeline, TraceError, TraceResult, TraceRun};
pub use rules::{RuleEngine, Severity, ValidationReport, Violation};
pub use source::{GitChangeSummary, SourceFile, SourceSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
