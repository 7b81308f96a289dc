//! The line-claiming parser interface

use super::types::{ParsedContent, SourceLine};
use crate::config::PatternConfig;

/// Per-file information handed to every parser
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Path of the file being parsed, as given by the caller
    pub path: &'a str,
    pub config: &'a PatternConfig,
}

impl<'a> ParseContext<'a> {
    pub fn new(path: &'a str, config: &'a PatternConfig) -> Self {
        Self { path, config }
    }

    /// Heuristic used by test-name references: any path component mentions "test"
    pub fn is_test_file(&self) -> bool {
        self.path
            .split(['/', '\\'])
            .any(|part| part.to_ascii_lowercase().contains("test"))
    }
}

/// Trait for content parsers
///
/// A parser sees only the lines no higher-priority parser has claimed,
/// sorted by line number. Line numbers may have gaps where earlier parsers
/// claimed lines; a block must never span such a gap.
///
/// # Example
///
/// ```ignore
/// struct HeadingParser;
///
/// impl ContentParser for HeadingParser {
///     fn name(&self) -> &str { "heading" }
///     fn priority(&self) -> u32 { 40 }
///     fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
///         Vec::new()
///     }
/// }
/// ```
pub trait ContentParser: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    /// Execution order (lower = earlier). The remainder pass always runs last.
    fn priority(&self) -> u32;

    /// Claim blocks from the unclaimed lines of one file
    ///
    /// Every returned record must cover a contiguous inclusive range of line
    /// numbers, all of which are present in `lines`.
    fn claim_and_parse(&self, lines: &[SourceLine<'_>], ctx: &ParseContext<'_>) -> Vec<ParsedContent>;
}
