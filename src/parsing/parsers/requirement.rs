//! Requirement block parser
//!
//! ```text
//! ## REQ-p00001: Title
//! **Level**: PRD | **Status**: Active | **Implements**: -
//! A. The system SHALL ...
//! B. The system SHALL ...
//! *End* *Title* | **Hash**: 1a2b3c4d
//! ```
//!
//! A block is claimed only when its closing marker is reached over
//! physically contiguous lines without meeting another requirement or
//! journey heading. Malformed blocks fall through to later parsers.

use super::{parse_fields, split_targets};
use crate::config::{ConfigResult, PatternConfig};
use crate::parsing::traits::{ContentParser, ParseContext};
use crate::parsing::types::{
    contiguous_run_end, AssertionData, ContentType, ParsedContent, ParsedData, RequirementData,
    SourceLine,
};
use regex::Regex;

pub struct RequirementParser {
    heading: Regex,
    journey_heading: Regex,
    end_marker: Regex,
    assertion: Regex,
}

impl RequirementParser {
    pub fn new(config: &PatternConfig) -> ConfigResult<Self> {
        Ok(Self {
            heading: Regex::new(&format!(
                r"^#{{1,6}}\s+(?P<id>{})\s*:\s*(?P<title>.*?)\s*$",
                config.id_fragment()
            ))?,
            journey_heading: Regex::new(&format!(r"^#{{1,6}}\s+{}\s*:", config.journey_fragment()))?,
            end_marker: end_marker_regex()?,
            assertion: Regex::new(r"^\s*(?P<label>[A-Z])[.)]\s+(?P<text>\S.*?)\s*$")?,
        })
    }

    fn parse_block(&self, block: &[SourceLine<'_>], id: String, title: String) -> ParsedContent {
        let mut data = RequirementData {
            id,
            title,
            ..Default::default()
        };
        let Some((last, inner)) = block[1..].split_last() else {
            return ParsedContent::from_lines(ContentType::Requirement, block, ParsedData::Requirement(data));
        };

        let meta_idx = inner.iter().position(|line| {
            parse_fields(line.text)
                .iter()
                .any(|(key, _)| key == "level" || key == "status")
        });
        if let Some(idx) = meta_idx {
            data.has_metadata = true;
            for (key, value) in parse_fields(inner[idx].text) {
                match key.as_str() {
                    "level" => data.level = Some(value),
                    "status" => data.status = Some(value),
                    "implements" => data.implements = split_targets(&value),
                    "refines" => data.refines = split_targets(&value),
                    "addresses" => data.addresses = split_targets(&value),
                    _ => {}
                }
            }
        }

        let content = &inner[meta_idx.map(|i| i + 1).unwrap_or(0)..];
        data.body = content.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");

        let mut continuing = false;
        for line in content {
            if let Some(caps) = self.assertion.captures(line.text) {
                let label = caps["label"].chars().next().unwrap_or('?');
                data.assertions.push(AssertionData {
                    label,
                    text: caps["text"].to_string(),
                    line: line.number,
                });
                continuing = true;
            } else if continuing
                && line.text.starts_with(char::is_whitespace)
                && !line.text.trim().is_empty()
            {
                if let Some(assertion) = data.assertions.last_mut() {
                    assertion.text.push(' ');
                    assertion.text.push_str(line.text.trim());
                }
            } else {
                continuing = false;
            }
        }

        if let Some(caps) = self.end_marker.captures(last.text) {
            data.stored_hash = caps.name("hash").map(|m| m.as_str().to_string());
        }
        data.end_marker = last.text.to_string();
        data.end_line = last.number;

        ParsedContent::from_lines(ContentType::Requirement, block, ParsedData::Requirement(data))
    }
}

/// `*End* *Name*` with an optional `| **Hash**: <value>` suffix
pub(crate) fn end_marker_regex() -> Result<Regex, regex::Error> {
    Regex::new(r"^\*End\*\s+\*(?P<name>[^*]+)\*(?:\s*\|\s*\*\*Hash\*\*\s*:\s*(?P<hash>\S+))?\s*$")
}

impl ContentParser for RequirementParser {
    fn name(&self) -> &str {
        "requirement"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(caps) = self.heading.captures(lines[i].text) else {
                i += 1;
                continue;
            };
            let id = caps["id"].to_string();
            let title = caps["title"].to_string();

            let run_end = contiguous_run_end(lines, i);
            let mut end = None;
            for j in i + 1..=run_end {
                let text = lines[j].text;
                if self.end_marker.is_match(text) {
                    end = Some(j);
                    break;
                }
                if self.heading.is_match(text) || self.journey_heading.is_match(text) {
                    break;
                }
            }

            match end {
                Some(j) => {
                    out.push(self.parse_block(&lines[i..=j], id, title));
                    i = j + 1;
                }
                None => i += 1,
            }
        }
        out
    }
}
