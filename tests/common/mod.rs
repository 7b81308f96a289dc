//! Common test utilities for integration tests
//!
//! Fixture text for requirement specs and source files, plus a corpus type
//! that writes them to a temporary directory when a test needs real files.

#![allow(dead_code, unused_imports)]

pub mod corpus;

pub use corpus::{requirement, TestCorpus, OPS, PRD};

use elspais::parsing::FileParse;
use std::collections::BTreeSet;

/// Assert that a file's records cover each line exactly once
pub fn assert_partition(parse: &FileParse) {
    let mut seen = BTreeSet::new();
    for content in &parse.contents {
        assert!(content.start_line <= content.end_line);
        for line in content.line_range() {
            assert!(seen.insert(line), "{}: line {} claimed twice", parse.path, line);
        }
    }
    let expected: BTreeSet<usize> = (1..=parse.line_count).collect();
    assert_eq!(seen, expected, "{}: gap in line coverage", parse.path);
}
