//! Built-in content parsers
//!
//! | Parser | Priority | Claims |
//! |---|---|---|
//! | [`CommentParser`] | 0 | `<!-- ... -->` blocks, except reference markers |
//! | [`RequirementParser`] | 50 | heading through `*End*` marker |
//! | [`JourneyParser`] | 60 | journey heading through `*End*` marker |
//! | [`CodeRefParser`] | 70 | `Implements:` marker lines |
//! | [`TestRefParser`] | 80 | `Validates:` marker lines, test-name references |
//! | [`RemainderParser`] | 999 | every line left over |

mod comment;
mod journey;
mod reference;
mod remainder;
mod requirement;

pub use comment::CommentParser;
pub use journey::JourneyParser;
pub use reference::{CodeRefParser, TestRefParser};
pub use remainder::{RemainderParser, REMAINDER_PRIORITY};
pub use requirement::RequirementParser;

/// Split a `**Key**: value | **Key**: value` line into lowercase keys and trimmed values
pub(crate) fn parse_fields(line: &str) -> Vec<(String, String)> {
    line.split('|')
        .filter_map(|segment| {
            let segment = segment.trim();
            let rest = segment.strip_prefix("**")?;
            let (key, value) = rest.split_once("**")?;
            let value = value.trim_start().strip_prefix(':')?;
            Some((key.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Split a comma-separated target list, dropping `-` placeholders
pub(crate) fn split_targets(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "-")
        .map(String::from)
        .collect()
}
