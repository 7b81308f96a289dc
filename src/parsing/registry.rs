//! Parser registry: partitions each file's lines among parsers by priority

use super::parsers::{
    CodeRefParser, CommentParser, JourneyParser, RemainderParser, RequirementParser, TestRefParser,
};
use super::traits::{ContentParser, ParseContext};
use super::types::{split_lines, ParsedContent, SourceLine};
use crate::config::{ConfigResult, PatternConfig};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// An `elspais: expected-broken-links N` marker found in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuppressionMarker {
    pub line: usize,
    pub count: usize,
}

/// All content records of one file, sorted by start line
#[derive(Debug, Clone)]
pub struct FileParse {
    pub path: String,
    pub line_count: usize,
    pub contents: Vec<ParsedContent>,
    pub suppressions: Vec<SuppressionMarker>,
}

fn parse_suppression(text: &str) -> Option<usize> {
    let (_, rest) = text.split_once("elspais:")?;
    let rest = rest.trim_start().strip_prefix("expected-broken-links")?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Scan a file top to bottom for suppression markers
pub fn scan_suppressions(lines: &[SourceLine<'_>]) -> Vec<SuppressionMarker> {
    lines
        .iter()
        .filter_map(|line| {
            parse_suppression(line.text).map(|count| SuppressionMarker {
                line: line.number,
                count,
            })
        })
        .collect()
}

/// Ordered collection of parsers, built once per graph build
///
/// The remainder pass is not registered like other parsers: it always runs
/// after them, so every line ends up in exactly one record.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn ContentParser>>,
    remainder: RemainderParser,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Create a registry holding only the remainder pass
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            remainder: RemainderParser,
        }
    }

    /// Registry with the comment, requirement, journey, code-reference and
    /// test-reference parsers
    pub fn standard(config: &PatternConfig) -> ConfigResult<Self> {
        let mut registry = Self::new();
        registry.register(CommentParser::new());
        registry.register(RequirementParser::new(config)?);
        registry.register(JourneyParser::new(config)?);
        registry.register(CodeRefParser::new(config)?);
        registry.register(TestRefParser::new(config)?);
        Ok(registry)
    }

    /// Register a parser
    pub fn register<P: ContentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        self.parsers.sort_by_key(|p| p.priority());
    }

    /// Registered parsers in execution order (the remainder pass excluded)
    pub fn parsers(&self) -> Vec<&dyn ContentParser> {
        self.parsers.iter().map(|p| p.as_ref()).collect()
    }

    /// Number of registered parsers
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Check if only the remainder pass is present
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Partition one file's lines into content records
    pub fn parse_file(&self, path: &str, text: &str, config: &PatternConfig) -> FileParse {
        let lines = split_lines(text);
        let ctx = ParseContext::new(path, config);
        let mut claimed: BTreeSet<usize> = BTreeSet::new();
        let mut contents = Vec::new();

        let passes = self
            .parsers
            .iter()
            .map(|p| p.as_ref())
            .chain(std::iter::once(&self.remainder as &dyn ContentParser));

        for parser in passes {
            let unclaimed: Vec<SourceLine<'_>> = lines
                .iter()
                .filter(|l| !claimed.contains(&l.number))
                .copied()
                .collect();
            if unclaimed.is_empty() {
                break;
            }
            let available: BTreeSet<usize> = unclaimed.iter().map(|l| l.number).collect();

            let mut accepted = 0usize;
            for content in parser.claim_and_parse(&unclaimed, &ctx) {
                let in_bounds = content.start_line <= content.end_line
                    && content.line_range().all(|n| available.contains(&n) && !claimed.contains(&n));
                if !in_bounds {
                    warn!(
                        parser = parser.name(),
                        path,
                        start = content.start_line,
                        end = content.end_line,
                        "Dropping content record outside the unclaimed lines"
                    );
                    continue;
                }
                claimed.extend(content.line_range());
                contents.push(content);
                accepted += 1;
            }
            debug!(parser = parser.name(), path, accepted, "Parser pass complete");
        }

        contents.sort_by_key(|c| c.start_line);
        FileParse {
            path: path.to_string(),
            line_count: lines.len(),
            suppressions: scan_suppressions(&lines),
            contents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceConfig;
    use crate::parsing::types::{ContentType, ParsedData};

    struct FixedParser {
        id: &'static str,
        priority: u32,
        ranges: Vec<(usize, usize)>,
    }

    impl ContentParser for FixedParser {
        fn name(&self) -> &str {
            self.id
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
            self.ranges
                .iter()
                .filter_map(|&(start, end)| {
                    let block: Vec<_> = lines
                        .iter()
                        .filter(|l| l.number >= start && l.number <= end)
                        .copied()
                        .collect();
                    if block.is_empty() {
                        return None;
                    }
                    let mut content = ParsedContent::from_lines(
                        ContentType::Comment,
                        &block,
                        ParsedData::Comment {
                            text: self.id.to_string(),
                            decorative: false,
                        },
                    );
                    content.start_line = start;
                    content.end_line = end;
                    Some(content)
                })
                .collect()
        }
    }

    fn assert_partition(parse: &FileParse) {
        let mut seen = BTreeSet::new();
        for content in &parse.contents {
            for n in content.line_range() {
                assert!(seen.insert(n), "line {n} claimed twice");
            }
        }
        let expected: BTreeSet<usize> = (1..=parse.line_count).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_registry_ordering() {
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser { id: "late", priority: 200, ranges: vec![] });
        registry.register(FixedParser { id: "early", priority: 5, ranges: vec![] });
        registry.register(FixedParser { id: "middle", priority: 100, ranges: vec![] });

        let parsers = registry.parsers();
        assert_eq!(parsers[0].name(), "early");
        assert_eq!(parsers[1].name(), "middle");
        assert_eq!(parsers[2].name(), "late");
    }

    #[test]
    fn remainder_alone_partitions_everything() {
        let config = TraceConfig::default().compile().unwrap();
        let registry = ParserRegistry::new();
        let parse = registry.parse_file("a.txt", "one\ntwo\nthree", &config);
        assert_eq!(parse.contents.len(), 1);
        assert_eq!(parse.contents[0].content_type, ContentType::Remainder);
        assert_partition(&parse);
    }

    #[test]
    fn higher_priority_wins_and_overlaps_are_dropped() {
        let config = TraceConfig::default().compile().unwrap();
        let mut registry = ParserRegistry::new();
        registry.register(FixedParser { id: "first", priority: 1, ranges: vec![(2, 3)] });
        // Overlaps the first parser's claim and spans a gap: rejected.
        registry.register(FixedParser { id: "second", priority: 2, ranges: vec![(1, 4), (5, 5)] });

        let text = "a\nb\nc\nd\ne\nf";
        let parse = registry.parse_file("x.md", text, &config);
        assert_partition(&parse);

        let owners: Vec<_> = parse
            .contents
            .iter()
            .map(|c| match &c.parsed_data {
                ParsedData::Comment { text, .. } => (c.start_line, c.end_line, text.as_str()),
                _ => (c.start_line, c.end_line, "remainder"),
            })
            .collect();
        assert_eq!(
            owners,
            vec![
                (1, 1, "remainder"),
                (2, 3, "first"),
                (4, 4, "remainder"),
                (5, 5, "second"),
                (6, 6, "remainder"),
            ]
        );
    }

    #[test]
    fn scans_suppression_markers() {
        let lines = split_lines("x\n# elspais: expected-broken-links 2\ny\n<!-- elspais: expected-broken-links 1 -->");
        let markers = scan_suppressions(&lines);
        assert_eq!(
            markers,
            vec![
                SuppressionMarker { line: 2, count: 2 },
                SuppressionMarker { line: 4, count: 1 },
            ]
        );
    }

    #[test]
    fn empty_file_yields_no_records() {
        let config = TraceConfig::default().compile().unwrap();
        let registry = ParserRegistry::standard(&config).unwrap();
        let parse = registry.parse_file("empty.md", "", &config);
        assert!(parse.contents.is_empty());
        assert_eq!(parse.line_count, 0);
    }
}
