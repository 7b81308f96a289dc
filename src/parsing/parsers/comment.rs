//! Comment-block parser
//!
//! Claims HTML comment blocks (`<!-- ... -->`) that start a line. A block
//! opened without a closing marker extends over physically contiguous lines
//! until one contains `-->`; if contiguity breaks first, nothing is claimed.
//! A comment that opens with an Implements or Validates marker is left for
//! the reference parsers.

use crate::parsing::traits::{ContentParser, ParseContext};
use crate::parsing::types::{contiguous_run_end, ContentType, ParsedContent, ParsedData, SourceLine};

const OPEN: &str = "<!--";
const CLOSE: &str = "-->";

#[derive(Debug, Default)]
pub struct CommentParser;

impl CommentParser {
    pub fn new() -> Self {
        Self
    }

    /// Comment payload with markers and decorative characters removed
    fn payload(block: &[SourceLine<'_>]) -> String {
        let joined = block.iter().map(|l| l.text.trim()).collect::<Vec<_>>().join("\n");
        let inner = joined.trim().trim_start_matches(OPEN);
        let inner = match inner.rfind(CLOSE) {
            Some(pos) => &inner[..pos],
            None => inner,
        };
        inner
            .trim()
            .trim_matches(|c: char| c == '-' || c == '=' || c == '*' || c.is_whitespace())
            .to_string()
    }

    /// Whether the text after `<!--` starts with a reference keyword and colon
    fn opens_reference(after_open: &str, ctx: &ParseContext<'_>) -> bool {
        let rest = after_open.trim_start();
        [ctx.config.implements_keyword(), ctx.config.validates_keyword()]
            .into_iter()
            .any(|keyword| {
                rest.get(..keyword.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
                    && rest[keyword.len()..].trim_start().starts_with(':')
            })
    }

    fn emit(block: &[SourceLine<'_>]) -> ParsedContent {
        let text = Self::payload(block);
        let decorative = text.is_empty();
        ParsedContent::from_lines(
            ContentType::Comment,
            block,
            ParsedData::Comment { text, decorative },
        )
    }
}

impl ContentParser for CommentParser {
    fn name(&self) -> &str {
        "comment"
    }

    fn priority(&self) -> u32 {
        0
    }

    fn claim_and_parse(&self, lines: &[SourceLine<'_>], ctx: &ParseContext<'_>) -> Vec<ParsedContent> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].text.trim_start();
            let Some(after_open) = trimmed.strip_prefix(OPEN) else {
                i += 1;
                continue;
            };
            if Self::opens_reference(after_open, ctx) {
                i += 1;
                continue;
            }

            if after_open.contains(CLOSE) {
                out.push(Self::emit(&lines[i..=i]));
                i += 1;
                continue;
            }

            let run_end = contiguous_run_end(lines, i);
            let close = (i + 1..=run_end).find(|&j| lines[j].text.contains(CLOSE));
            match close {
                Some(j) => {
                    out.push(Self::emit(&lines[i..=j]));
                    i = j + 1;
                }
                // Unterminated: leave the lines for lower-priority parsers.
                None => i += 1,
            }
        }
        out
    }
}
