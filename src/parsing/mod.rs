//! Line-claiming parsing pipeline
//!
//! Each file is split into numbered lines and handed to the parsers of a
//! [`ParserRegistry`] in ascending priority order. A parser only ever sees
//! lines no earlier parser claimed; whatever is left at the end is grouped
//! by the remainder pass. The records of one file therefore partition its
//! line numbers exactly: no gaps, no overlaps.
//!
//! # Example
//!
//! ```
//! use elspais::config::TraceConfig;
//! use elspais::parsing::{ContentType, ParserRegistry};
//!
//! let config = TraceConfig::default().compile().unwrap();
//! let registry = ParserRegistry::standard(&config).unwrap();
//! let parse = registry.parse_file("src/lib.rs", "// Implements: REQ-d00001\nfn main() {}", &config);
//!
//! assert_eq!(parse.contents[0].content_type, ContentType::CodeRef);
//! assert_eq!(parse.contents[1].content_type, ContentType::Remainder);
//! ```

pub mod parsers;
mod registry;
mod traits;
mod types;

pub use registry::{scan_suppressions, FileParse, ParserRegistry, SuppressionMarker};
pub use traits::{ContentParser, ParseContext};
pub use types::{
    contiguous_run_end, split_lines, AssertionData, ContentType, JourneyData, ParsedContent,
    ParsedData, ReferenceData, ReferenceTarget, RequirementData, SourceLine,
};
