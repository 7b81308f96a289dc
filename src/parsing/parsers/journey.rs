//! User-journey parser
//!
//! ```text
//! ## JNY-Admin-01: Reset a password
//! **Actor**: Administrator | **Goal**: Restore access for a locked user
//! 1. Open the user list
//! 2. Choose "Reset password"
//! *End* *JNY-Admin-01*
//! ```

use super::parse_fields;
use super::requirement::end_marker_regex;
use crate::config::{ConfigResult, PatternConfig};
use crate::parsing::traits::{ContentParser, ParseContext};
use crate::parsing::types::{
    contiguous_run_end, ContentType, JourneyData, ParsedContent, ParsedData, SourceLine,
};
use regex::Regex;

pub struct JourneyParser {
    heading: Regex,
    requirement_heading: Regex,
    end_marker: Regex,
    step: Regex,
}

impl JourneyParser {
    pub fn new(config: &PatternConfig) -> ConfigResult<Self> {
        Ok(Self {
            heading: Regex::new(&format!(
                r"^#{{1,6}}\s+(?P<id>{})\s*:\s*(?P<title>.*?)\s*$",
                config.journey_fragment()
            ))?,
            requirement_heading: Regex::new(&format!(r"^#{{1,6}}\s+{}\s*:", config.id_fragment()))?,
            end_marker: end_marker_regex()?,
            step: Regex::new(r"^\s*\d+[.)]\s+(?P<text>\S.*?)\s*$")?,
        })
    }

    fn parse_block(&self, block: &[SourceLine<'_>], id: String, title: String) -> ParsedContent {
        let mut data = JourneyData {
            id,
            title,
            ..Default::default()
        };
        // Blocks always hold at least the heading and the closing marker.
        let inner = block.get(1..block.len().saturating_sub(1)).unwrap_or_default();
        for line in inner {
            for (key, value) in parse_fields(line.text) {
                match key.as_str() {
                    "actor" => data.actor = Some(value),
                    "goal" => data.goal = Some(value),
                    _ => {}
                }
            }
            if let Some(caps) = self.step.captures(line.text) {
                data.steps.push(caps["text"].to_string());
            }
        }
        ParsedContent::from_lines(ContentType::Journey, block, ParsedData::Journey(data))
    }
}

impl ContentParser for JourneyParser {
    fn name(&self) -> &str {
        "journey"
    }

    fn priority(&self) -> u32 {
        60
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
                if self.heading.is_match(text) || self.requirement_heading.is_match(text) {
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
