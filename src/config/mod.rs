//! Configuration for the traceability pipeline
//!
//! [`TraceConfig`] is the raw, serde-deserializable value handed to the core
//! by whatever loads configuration from disk. It is compiled once into an
//! immutable [`PatternConfig`] before any file is parsed; every problem found
//! during compilation is a fatal [`ConfigError`].

mod pattern;

pub use pattern::{IdParts, Level, PatternConfig};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Fatal configuration errors. Any of these aborts the run before parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid prefix '{0}': must be non-empty ASCII alphanumeric starting with a letter")]
    InvalidPrefix(String),

    #[error("Prefix '{0}' conflicts with the journey prefix")]
    ConflictingPrefix(String),

    #[error("Invalid level code '{code}' for level {level}: must be one ASCII lowercase letter")]
    InvalidLevelCode { level: String, code: String },

    #[error("Duplicate level {field}: {value}")]
    DuplicateLevel { field: &'static str, value: String },

    #[error("At least one level must be configured")]
    NoLevels,

    #[error("Unknown level referenced in hierarchy configuration: {0}")]
    UnknownLevel(String),

    #[error("ID digit width must be at least 1")]
    ZeroDigits,

    #[error("Hash length {0} out of range (4..=64)")]
    HashLength(usize),

    #[error("Marker keyword for {0} must not be empty")]
    EmptyKeyword(&'static str),

    #[error("Pattern compilation failed: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type for configuration compilation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// One requirement level as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Display name used on the metadata line (e.g. "PRD")
    pub name: String,
    /// Single-letter code embedded in IDs (e.g. "p")
    pub code: String,
    /// Ordering rank; lower ranks sit higher in the hierarchy
    pub rank: u32,
}

impl LevelConfig {
    pub fn new(name: impl Into<String>, code: impl Into<String>, rank: u32) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            rank,
        }
    }
}

/// Rules governing which levels may implement which
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Permit a requirement to implement another of the same rank
    pub allow_same_level: bool,
    /// Explicit level name -> permitted parent level names. Overrides rank ordering.
    pub allowed_parents: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            allow_same_level: true,
            allowed_parents: None,
        }
    }
}

/// Raw configuration value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub prefix: String,
    pub journey_prefix: String,
    pub levels: Vec<LevelConfig>,
    pub id_digits: usize,
    pub zero_padded: bool,
    pub hash_length: usize,
    pub implements_keyword: String,
    pub validates_keyword: String,
    pub statuses: Vec<String>,
    pub hierarchy: HierarchyConfig,
    /// Treat `test_REQ_p00001_...` function names in test files as references
    pub test_name_references: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            prefix: "REQ".into(),
            journey_prefix: "JNY".into(),
            levels: vec![
                LevelConfig::new("PRD", "p", 1),
                LevelConfig::new("OPS", "o", 2),
                LevelConfig::new("DEV", "d", 3),
            ],
            id_digits: 5,
            zero_padded: true,
            hash_length: 8,
            implements_keyword: "Implements".into(),
            validates_keyword: "Validates".into(),
            statuses: ["Active", "Draft", "Deprecated", "Proposed"]
                .into_iter()
                .map(String::from)
                .collect(),
            hierarchy: HierarchyConfig::default(),
            test_name_references: true,
        }
    }
}

impl TraceConfig {
    /// Compile into the immutable pattern configuration
    pub fn compile(&self) -> ConfigResult<PatternConfig> {
        PatternConfig::compile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_compiles() {
        let pattern = TraceConfig::default().compile().unwrap();
        assert_eq!(pattern.prefix(), "REQ");
        assert_eq!(pattern.levels().len(), 3);
    }

    #[test]
    fn deserializes_partial_yaml_with_defaults() {
        let yaml = "prefix: SPEC\nid_digits: 3\n";
        let config: TraceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.prefix, "SPEC");
        assert_eq!(config.id_digits, 3);
        assert_eq!(config.journey_prefix, "JNY");
        assert!(config.hierarchy.allow_same_level);
    }

    #[test]
    fn conflicting_prefix_is_fatal() {
        let config = TraceConfig {
            journey_prefix: "REQ".into(),
            ..TraceConfig::default()
        };
        assert!(matches!(
            config.compile(),
            Err(ConfigError::ConflictingPrefix(p)) if p == "REQ"
        ));
    }

    #[test]
    fn duplicate_level_code_is_fatal() {
        let mut config = TraceConfig::default();
        config.levels.push(LevelConfig::new("QA", "p", 4));
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DuplicateLevel { field: "code", .. })
        ));
    }

    #[test]
    fn unknown_level_in_hierarchy_is_fatal() {
        let mut config = TraceConfig::default();
        let mut allowed = BTreeMap::new();
        allowed.insert("DEV".to_string(), vec!["XYZ".to_string()]);
        config.hierarchy.allowed_parents = Some(allowed);
        assert!(matches!(
            config.compile(),
            Err(ConfigError::UnknownLevel(l)) if l == "XYZ"
        ));
    }

    #[test]
    fn invalid_level_code_is_fatal() {
        let mut config = TraceConfig::default();
        config.levels[0].code = "PR".into();
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidLevelCode { .. })
        ));
    }
}
