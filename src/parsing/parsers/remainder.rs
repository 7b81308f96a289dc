//! Remainder pass: groups every unclaimed line into maximal contiguous runs

use crate::parsing::traits::{ContentParser, ParseContext};
use crate::parsing::types::{contiguous_run_end, ContentType, ParsedContent, ParsedData, SourceLine};

pub const REMAINDER_PRIORITY: u32 = 999;

#[derive(Debug, Default, Clone, Copy)]
pub struct RemainderParser;

impl ContentParser for RemainderParser {
    fn name(&self) -> &str {
        "remainder"
    }

    fn priority(&self) -> u32 {
        REMAINDER_PRIORITY
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], _ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        let mut out = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = contiguous_run_end(lines, start);
            out.push(ParsedContent::from_lines(
                ContentType::Remainder,
                &lines[start..=end],
                ParsedData::Remainder,
            ));
            start = end + 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceConfig;

    #[test]
    fn splits_runs_at_gaps() {
        let config = TraceConfig::default().compile().unwrap();
        let ctx = ParseContext::new("f.md", &config);
        let lines = vec![
            SourceLine::new(1, "a"),
            SourceLine::new(2, "b"),
            SourceLine::new(4, "c"),
            SourceLine::new(7, "d"),
            SourceLine::new(8, "e"),
        ];
        let ranges: Vec<_> = RemainderParser
            .claim_and_parse(&lines, &ctx)
            .iter()
            .map(|c| (c.start_line, c.end_line))
            .collect();
        assert_eq!(ranges, vec![(1, 2), (4, 4), (7, 8)]);
    }
}
