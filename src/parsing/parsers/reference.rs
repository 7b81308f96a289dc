//! Code and test reference parsers
//!
//! Both recognise a comment marker followed by a configurable keyword:
//!
//! ```text
//! // Implements: REQ-d00001, REQ-p00001-A
//! # Validates: REQ-p00001-A-B
//! # Implements:
//! #   REQ-d00002
//! #   REQ-d00003
//! ```
//!
//! Only marker lines are claimed; the code around them is left for the
//! remainder pass.

use crate::config::{ConfigResult, PatternConfig};
use crate::parsing::traits::{ContentParser, ParseContext};
use crate::parsing::types::{
    ContentType, ParsedContent, ParsedData, ReferenceData, ReferenceTarget, SourceLine,
};
use regex::Regex;
use std::collections::BTreeSet;

const COMMENT_MARKERS: &str = r"(?:#|//|--|;|/\*|\*|<!--)";

/// Marker recognition shared by the code and test parsers
struct MarkerScanner {
    marker: Regex,
    continuation: Regex,
    id_prefix: String,
}

impl MarkerScanner {
    fn new(keyword: &str, config: &PatternConfig) -> ConfigResult<Self> {
        Ok(Self {
            marker: Regex::new(&format!(
                r"(?i){}\s*{}\s*:(?P<rest>.*)$",
                COMMENT_MARKERS,
                regex::escape(keyword)
            ))?,
            continuation: Regex::new(r"^\s*(?:#|//|--|;|\*)\s*(?P<rest>.*)$")?,
            id_prefix: format!("{}-", config.prefix()),
        })
    }

    /// ID-like tokens in a marker's target list
    fn tokens<'t>(&self, rest: &'t str) -> Vec<&'t str> {
        rest.split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn targets(&self, rest: &str, line: usize) -> Vec<ReferenceTarget> {
        self.tokens(rest)
            .into_iter()
            .filter(|t| t.starts_with(&self.id_prefix))
            .map(|t| ReferenceTarget {
                id: t.to_string(),
                line,
            })
            .collect()
    }

    /// Continuation line holding nothing but IDs
    fn continuation_targets(&self, line: &SourceLine<'_>) -> Option<Vec<ReferenceTarget>> {
        let caps = self.continuation.captures(line.text)?;
        let tokens = self.tokens(caps.name("rest")?.as_str());
        if tokens.is_empty() || !tokens.iter().all(|t| t.starts_with(&self.id_prefix)) {
            return None;
        }
        Some(
            tokens
                .into_iter()
                .map(|t| ReferenceTarget {
                    id: t.to_string(),
                    line: line.number,
                })
                .collect(),
        )
    }

    fn scan(&self, lines: &[SourceLine<'_>], content_type: ContentType) -> Vec<ParsedContent> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(caps) = self.marker.captures(lines[i].text) else {
                i += 1;
                continue;
            };
            let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
            let mut targets = self.targets(rest, lines[i].number);
            let mut end = i;

            if targets.is_empty() && self.tokens(rest).is_empty() {
                // Empty marker: targets follow on contiguous comment lines.
                while end + 1 < lines.len() && lines[end + 1].number == lines[end].number + 1 {
                    match self.continuation_targets(&lines[end + 1]) {
                        Some(more) => {
                            targets.extend(more);
                            end += 1;
                        }
                        None => break,
                    }
                }
            }

            if targets.is_empty() {
                i += 1;
                continue;
            }

            out.push(ParsedContent::from_lines(
                content_type,
                &lines[i..=end],
                ParsedData::Reference(ReferenceData {
                    targets,
                    label: None,
                }),
            ));
            i = end + 1;
        }
        out
    }
}

/// Claims `Implements:` markers in code (priority 70)
pub struct CodeRefParser {
    scanner: MarkerScanner,
}

impl CodeRefParser {
    pub fn new(config: &PatternConfig) -> ConfigResult<Self> {
        Ok(Self {
            scanner: MarkerScanner::new(config.implements_keyword(), config)?,
        })
    }
}

impl ContentParser for CodeRefParser {
    fn name(&self) -> &str {
        "code-ref"
    }

    fn priority(&self) -> u32 {
        70
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        self.scanner.scan(lines, ContentType::CodeRef)
    }
}

/// Claims `Validates:` markers and test functions named after requirements (priority 80)
pub struct TestRefParser {
    scanner: MarkerScanner,
    definition: Regex,
    name_reference: Regex,
    prefix: String,
}

impl TestRefParser {
    pub fn new(config: &PatternConfig) -> ConfigResult<Self> {
        let digits = if config.zero_padded() {
            format!(r"\d{{{}}}", config.id_digits())
        } else {
            r"\d+".to_string()
        };
        Ok(Self {
            scanner: MarkerScanner::new(config.validates_keyword(), config)?,
            definition: Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|function|func)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
            )?,
            name_reference: Regex::new(&format!(
                r"{}_(?P<code>[{}])(?P<num>{})(?:_(?P<assert>[A-Z])(?:_|$))?",
                regex::escape(config.prefix()),
                config.level_code_class(),
                digits
            ))?,
            prefix: config.prefix().to_string(),
        })
    }

    /// IDs embedded in a test function name, e.g. `test_REQ_p00001_A_login`
    fn ids_in_name(&self, name: &str) -> Vec<String> {
        self.name_reference
            .captures_iter(name)
            .map(|caps| {
                let mut id = format!("{}-{}{}", self.prefix, &caps["code"], &caps["num"]);
                if let Some(letter) = caps.name("assert") {
                    id.push('-');
                    id.push_str(letter.as_str());
                }
                id
            })
            .collect()
    }

    fn name_references(&self, lines: &[SourceLine<'_>], taken: &BTreeSet<usize>) -> Vec<ParsedContent> {
        lines
            .iter()
            .filter(|line| !taken.contains(&line.number))
            .filter_map(|line| {
                let caps = self.definition.captures(line.text)?;
                let name = caps.name("name")?.as_str();
                if !name.to_ascii_lowercase().contains("test") {
                    return None;
                }
                let targets: Vec<_> = self
                    .ids_in_name(name)
                    .into_iter()
                    .map(|id| ReferenceTarget {
                        id,
                        line: line.number,
                    })
                    .collect();
                if targets.is_empty() {
                    return None;
                }
                Some(ParsedContent::from_lines(
                    ContentType::TestRef,
                    std::slice::from_ref(line),
                    ParsedData::Reference(ReferenceData {
                        targets,
                        label: Some(name.to_string()),
                    }),
                ))
            })
            .collect()
    }
}

impl ContentParser for TestRefParser {
    fn name(&self) -> &str {
        "test-ref"
    }

    fn priority(&self) -> u32 {
        80
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        let mut out = self.scanner.scan(lines, ContentType::TestRef);
        if ctx.config.test_name_references() && ctx.is_test_file() {
            let taken: BTreeSet<usize> = out.iter().flat_map(|c| c.line_range()).collect();
            out.extend(self.name_references(lines, &taken));
            out.sort_by_key(|c| c.start_line);
        }
        out
    }
}
