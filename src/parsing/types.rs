//! Content records emitted by parsers before graph assembly

use serde::Serialize;

/// One physical line of a source file. Line numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    pub fn new(number: usize, text: &'a str) -> Self {
        Self { number, text }
    }
}

/// Split file text into numbered lines (handles `\n` and `\r\n`)
pub fn split_lines(text: &str) -> Vec<SourceLine<'_>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| SourceLine::new(i + 1, line))
        .collect()
}

/// Classification of a claimed block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Comment,
    Requirement,
    Journey,
    CodeRef,
    TestRef,
    Remainder,
}

/// One lettered assertion inside a requirement block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionData {
    pub label: char,
    pub text: String,
    pub line: usize,
}

/// Fields extracted from a requirement block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementData {
    pub id: String,
    pub title: String,
    pub level: Option<String>,
    pub status: Option<String>,
    /// Whether a `**Level**`/`**Status**` metadata line was present
    pub has_metadata: bool,
    pub implements: Vec<String>,
    pub refines: Vec<String>,
    pub addresses: Vec<String>,
    pub assertions: Vec<AssertionData>,
    /// Text between the metadata line and the closing marker, as written
    pub body: String,
    pub stored_hash: Option<String>,
    /// The closing marker line exactly as it appears in the file
    pub end_marker: String,
    pub end_line: usize,
}

/// Fields extracted from a journey block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JourneyData {
    pub id: String,
    pub title: String,
    pub actor: Option<String>,
    pub goal: Option<String>,
    pub steps: Vec<String>,
}

/// A single target named by a reference marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceTarget {
    pub id: String,
    pub line: usize,
}

/// Fields extracted from an Implements/Validates marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceData {
    pub targets: Vec<ReferenceTarget>,
    /// Human-readable label, e.g. the test function name
    pub label: Option<String>,
}

/// Type-specific payload of a [`ParsedContent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedData {
    Comment { text: String, decorative: bool },
    Requirement(RequirementData),
    Journey(JourneyData),
    Reference(ReferenceData),
    Remainder,
}

/// A contiguous, inclusive range of lines claimed by one parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedContent {
    pub content_type: ContentType,
    pub start_line: usize,
    pub end_line: usize,
    pub raw_text: String,
    pub parsed_data: ParsedData,
}

impl ParsedContent {
    /// Build a record spanning `lines`, which must be non-empty and contiguous
    pub fn from_lines(content_type: ContentType, lines: &[SourceLine<'_>], parsed_data: ParsedData) -> Self {
        let start_line = lines.first().map(|l| l.number).unwrap_or_default();
        let end_line = lines.last().map(|l| l.number).unwrap_or_default();
        let raw_text = lines.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");
        Self {
            content_type,
            start_line,
            end_line,
            raw_text,
            parsed_data,
        }
    }

    /// Line numbers covered by this record
    pub fn line_range(&self) -> std::ops::RangeInclusive<usize> {
        self.start_line..=self.end_line
    }
}

/// Find the end of the physically contiguous run starting at `start`:
/// the largest index `j >= start` such that lines `start..=j` have consecutive numbers.
pub fn contiguous_run_end(lines: &[SourceLine<'_>], start: usize) -> usize {
    let mut end = start;
    while end + 1 < lines.len() && lines[end + 1].number == lines[end].number + 1 {
        end += 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_numbers_from_one() {
        let lines = split_lines("a\r\nb\n\nc");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], SourceLine::new(1, "a"));
        assert_eq!(lines[1], SourceLine::new(2, "b"));
        assert_eq!(lines[3], SourceLine::new(4, "c"));
    }

    #[test]
    fn contiguous_run_stops_at_gap() {
        let lines = vec![
            SourceLine::new(1, "a"),
            SourceLine::new(2, "b"),
            SourceLine::new(5, "c"),
        ];
        assert_eq!(contiguous_run_end(&lines, 0), 1);
        assert_eq!(contiguous_run_end(&lines, 2), 2);
    }
}
