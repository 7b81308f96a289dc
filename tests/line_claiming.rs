//! Line-claiming properties across mixed inputs

mod common;

use common::{assert_partition, requirement, PRD};
use elspais::parsing::{
    ContentParser, ContentType, ParseContext, ParsedContent, ParsedData, ParserRegistry, SourceLine,
};
use elspais::{PatternConfig, TraceConfig};

fn config() -> PatternConfig {
    TraceConfig::default().compile().unwrap()
}

const MIXED_MD: &str = r#"<!-- generated header -->
# Spec

<!--
  Reviewer note spanning
  several lines
-->

## REQ-p00007: Export
**Level**: PRD | **Status**: Draft | **Implements**: -

A. The system SHALL export reports.

*End* *Export* | **Hash**: 12345678

## JNY-Ops-01: Weekly export
**Actor**: Operator | **Goal**: Send the weekly report

1. Open reports
2. Export

*End* *JNY-Ops-01*

<!-- unterminated comment
trailing prose
"#;

const MIXED_CODE: &str = r#"use std::io;

// Implements: REQ-p00007-A
pub fn export() -> io::Result<()> {
    Ok(())
}

/* Implements:
 * REQ-p00001-A
 * REQ-p00001-B
 */
pub fn login() {}
"#;

const MIXED_TEST: &str = r#"import pytest

# Validates: REQ-p00007-A
def test_export():
    assert True

def test_REQ_p00001_B_lockout():
    assert True
"#;

fn inputs() -> Vec<(&'static str, String)> {
    vec![
        ("spec/mixed.md", MIXED_MD.to_string()),
        ("spec/prd.md", PRD.to_string()),
        ("src/export.rs", MIXED_CODE.to_string()),
        ("tests/test_export.py", MIXED_TEST.to_string()),
        ("spec/generated.md", requirement("REQ-d00001", "DEV", "REQ-p00001", &["A. One."])),
        ("empty.md", String::new()),
        ("blank.md", "\n\n\n".to_string()),
    ]
}

fn types_by_line(registry: &ParserRegistry, config: &PatternConfig, path: &str, text: &str) -> Vec<(usize, ContentType)> {
    registry
        .parse_file(path, text, config)
        .contents
        .iter()
        .flat_map(|c| c.line_range().map(move |n| (n, c.content_type)))
        .collect()
}

#[test]
fn records_partition_every_file() {
    let config = config();
    let registry = ParserRegistry::standard(&config).unwrap();
    for (path, text) in inputs() {
        assert_partition(&registry.parse_file(path, &text, &config));
    }
}

#[test]
fn partition_holds_with_only_the_remainder_pass() {
    let config = config();
    let registry = ParserRegistry::new();
    for (path, text) in inputs() {
        let parse = registry.parse_file(path, &text, &config);
        assert_partition(&parse);
        assert!(parse.contents.iter().all(|c| c.content_type == ContentType::Remainder));
    }
}

#[test]
fn line_assignment_is_deterministic() {
    let config = config();
    let registry = ParserRegistry::standard(&config).unwrap();
    for (path, text) in inputs() {
        let first = types_by_line(&registry, &config, path, &text);
        let second = types_by_line(&registry, &config, path, &text);
        assert_eq!(first, second, "{path}");
    }
}

#[test]
fn mixed_markdown_is_classified() {
    let config = config();
    let registry = ParserRegistry::standard(&config).unwrap();
    let parse = registry.parse_file("spec/mixed.md", MIXED_MD, &config);

    let summary: Vec<(ContentType, usize, usize)> = parse
        .contents
        .iter()
        .map(|c| (c.content_type, c.start_line, c.end_line))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ContentType::Comment, 1, 1),
            (ContentType::Remainder, 2, 3),
            (ContentType::Comment, 4, 7),
            (ContentType::Remainder, 8, 8),
            (ContentType::Requirement, 9, 14),
            (ContentType::Remainder, 15, 15),
            (ContentType::Journey, 16, 22),
            (ContentType::Remainder, 23, 25),
        ]
    );
}

#[test]
fn code_markers_claim_only_marker_lines() {
    let config = config();
    let registry = ParserRegistry::standard(&config).unwrap();
    let parse = registry.parse_file("src/export.rs", MIXED_CODE, &config);

    let refs: Vec<_> = parse
        .contents
        .iter()
        .filter(|c| c.content_type == ContentType::CodeRef)
        .collect();
    assert_eq!(refs.len(), 2);
    assert_eq!((refs[0].start_line, refs[0].end_line), (3, 3));
    // Empty marker followed by ID-only comment lines
    assert_eq!((refs[1].start_line, refs[1].end_line), (8, 10));
    match &refs[1].parsed_data {
        ParsedData::Reference(data) => {
            let ids: Vec<_> = data.targets.iter().map(|t| t.id.as_str()).collect();
            assert_eq!(ids, vec!["REQ-p00001-A", "REQ-p00001-B"]);
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_files_yield_marker_and_name_references() {
    let config = config();
    let registry = ParserRegistry::standard(&config).unwrap();
    let parse = registry.parse_file("tests/test_export.py", MIXED_TEST, &config);

    let targets: Vec<(usize, String)> = parse
        .contents
        .iter()
        .filter(|c| c.content_type == ContentType::TestRef)
        .filter_map(|c| match &c.parsed_data {
            ParsedData::Reference(data) => Some((c.start_line, data.targets[0].id.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![(3, "REQ-p00007-A".to_string()), (7, "REQ-p00001-B".to_string())]
    );
}

/// Claims lines 2..=3 of any file it sees
struct GreedyParser;

impl ContentParser for GreedyParser {
    fn name(&self) -> &str {
        "greedy"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        let block: Vec<_> = lines.iter().filter(|l| (2..=3).contains(&l.number)).copied().collect();
        if block.len() != 2 {
            return Vec::new();
        }
        vec![ParsedContent::from_lines(
            ContentType::Comment,
            &block,
            ParsedData::Comment {
                text: "greedy".into(),
                decorative: false,
            },
        )]
    }
}

#[test]
fn earlier_parser_hides_lines_from_later_ones() {
    let config = config();
    let mut registry = ParserRegistry::standard(&config).unwrap();
    registry.register(GreedyParser);
    assert_eq!(registry.parsers()[1].name(), "greedy");

    // Line 3 holds a requirement heading, but the greedy parser owns it.
    let parse = registry.parse_file("spec/prd.md", PRD, &config);
    assert_partition(&parse);
    assert!(parse
        .contents
        .iter()
        .all(|c| c.content_type != ContentType::Requirement));
}
