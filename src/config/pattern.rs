//! Compiled, immutable ID pattern configuration

use super::{ConfigError, ConfigResult, TraceConfig};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// A requirement level after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub code: char,
    pub rank: u32,
}

/// Decomposed requirement ID: `REQ-p00001-A` -> {p, 1, [A]}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParts {
    pub level_code: char,
    pub number: u64,
    /// Assertion letters, in the order written. Empty for a bare requirement ID.
    pub assertions: Vec<char>,
}

/// Immutable pattern configuration, compiled once per run
///
/// Built with [`TraceConfig::compile`]; every parser and rule receives it by
/// reference instead of re-deriving patterns.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    prefix: String,
    levels: Vec<Level>,
    digits: usize,
    zero_padded: bool,
    hash_length: usize,
    implements_keyword: String,
    validates_keyword: String,
    statuses: Vec<String>,
    allow_same_level: bool,
    allowed_parents: Option<BTreeMap<String, BTreeSet<String>>>,
    test_name_references: bool,
    id_regex: Regex,
    id_fragment: String,
    journey_fragment: String,
}

fn valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

impl PatternConfig {
    /// Validate and compile a raw configuration
    pub fn compile(config: &TraceConfig) -> ConfigResult<Self> {
        if !valid_prefix(&config.prefix) {
            return Err(ConfigError::InvalidPrefix(config.prefix.clone()));
        }
        if !valid_prefix(&config.journey_prefix) {
            return Err(ConfigError::InvalidPrefix(config.journey_prefix.clone()));
        }
        if config.prefix.eq_ignore_ascii_case(&config.journey_prefix) {
            return Err(ConfigError::ConflictingPrefix(config.prefix.clone()));
        }
        if config.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        if config.id_digits == 0 {
            return Err(ConfigError::ZeroDigits);
        }
        if !(4..=64).contains(&config.hash_length) {
            return Err(ConfigError::HashLength(config.hash_length));
        }
        if config.implements_keyword.trim().is_empty() {
            return Err(ConfigError::EmptyKeyword("implements"));
        }
        if config.validates_keyword.trim().is_empty() {
            return Err(ConfigError::EmptyKeyword("validates"));
        }

        let mut levels = Vec::with_capacity(config.levels.len());
        let mut names = BTreeSet::new();
        let mut codes = BTreeSet::new();
        let mut ranks = BTreeSet::new();
        for level in &config.levels {
            let mut chars = level.code.chars();
            let code = match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() => c,
                _ => {
                    return Err(ConfigError::InvalidLevelCode {
                        level: level.name.clone(),
                        code: level.code.clone(),
                    })
                }
            };
            if !names.insert(level.name.to_ascii_uppercase()) {
                return Err(ConfigError::DuplicateLevel {
                    field: "name",
                    value: level.name.clone(),
                });
            }
            if !codes.insert(code) {
                return Err(ConfigError::DuplicateLevel {
                    field: "code",
                    value: level.code.clone(),
                });
            }
            if !ranks.insert(level.rank) {
                return Err(ConfigError::DuplicateLevel {
                    field: "rank",
                    value: level.rank.to_string(),
                });
            }
            levels.push(Level {
                name: level.name.clone(),
                code,
                rank: level.rank,
            });
        }
        levels.sort_by_key(|l| l.rank);

        let allowed_parents = match &config.hierarchy.allowed_parents {
            Some(map) => {
                let mut resolved = BTreeMap::new();
                for (child, parents) in map {
                    let child = Self::canonical_level_name(&levels, child)?;
                    let mut set = BTreeSet::new();
                    for parent in parents {
                        set.insert(Self::canonical_level_name(&levels, parent)?);
                    }
                    resolved.insert(child, set);
                }
                Some(resolved)
            }
            None => None,
        };

        let code_class: String = levels.iter().map(|l| l.code).collect();
        let digits = if config.zero_padded {
            format!(r"\d{{{}}}", config.id_digits)
        } else {
            r"\d+".to_string()
        };
        let id_fragment = format!(r"{}-[{}]{}", regex::escape(&config.prefix), code_class, digits);
        let id_regex = Regex::new(&format!(
            r"^{}-(?P<code>[{}])(?P<num>{})(?P<assert>(?:-[A-Z])*)$",
            regex::escape(&config.prefix),
            code_class,
            digits
        ))?;
        let journey_fragment = format!(r"{}-[A-Za-z0-9]+-\d+", regex::escape(&config.journey_prefix));

        Ok(Self {
            prefix: config.prefix.clone(),
            levels,
            digits: config.id_digits,
            zero_padded: config.zero_padded,
            hash_length: config.hash_length,
            implements_keyword: config.implements_keyword.trim().to_string(),
            validates_keyword: config.validates_keyword.trim().to_string(),
            statuses: config.statuses.clone(),
            allow_same_level: config.hierarchy.allow_same_level,
            allowed_parents,
            test_name_references: config.test_name_references,
            id_regex,
            id_fragment,
            journey_fragment,
        })
    }

    fn canonical_level_name(levels: &[Level], name: &str) -> ConfigResult<String> {
        levels
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.name.clone())
            .ok_or_else(|| ConfigError::UnknownLevel(name.to_string()))
    }

    /// Decompose a well-formed ID, or `None` if it does not match
    pub fn parse_id(&self, id: &str) -> Option<IdParts> {
        let caps = self.id_regex.captures(id)?;
        let level_code = caps.name("code")?.as_str().chars().next()?;
        let number = caps.name("num")?.as_str().parse().ok()?;
        let assertions = caps
            .name("assert")
            .map(|m| {
                m.as_str()
                    .split('-')
                    .filter_map(|s| s.chars().next())
                    .collect()
            })
            .unwrap_or_default();
        Some(IdParts {
            level_code,
            number,
            assertions,
        })
    }

    /// Render a canonical ID from its parts
    pub fn format_id(&self, level_code: char, number: u64, assertion: Option<char>) -> String {
        let mut id = if self.zero_padded {
            format!("{}-{}{:0width$}", self.prefix, level_code, number, width = self.digits)
        } else {
            format!("{}-{}{}", self.prefix, level_code, number)
        };
        if let Some(letter) = assertion {
            id.push('-');
            id.push(letter);
        }
        id
    }

    /// Unanchored regex source matching a bare requirement ID
    pub fn id_fragment(&self) -> &str {
        &self.id_fragment
    }

    /// Level codes as a regex character-class body (e.g. `pod`)
    pub fn level_code_class(&self) -> String {
        self.levels.iter().map(|l| l.code).collect()
    }

    pub fn id_digits(&self) -> usize {
        self.digits
    }

    pub fn zero_padded(&self) -> bool {
        self.zero_padded
    }

    /// Unanchored regex source matching a journey ID
    pub fn journey_fragment(&self) -> &str {
        &self.journey_fragment
    }

    pub fn level_by_code(&self, code: char) -> Option<&Level> {
        self.levels.iter().find(|l| l.code == code)
    }

    pub fn level_by_name(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Whether a requirement at `child` may declare a parent at `parent`
    pub fn permits_parent(&self, child: &Level, parent: &Level) -> bool {
        if let Some(allowed) = &self.allowed_parents {
            return allowed
                .get(&child.name)
                .is_some_and(|parents| parents.contains(&parent.name));
        }
        parent.rank < child.rank || (self.allow_same_level && parent.rank == child.rank)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Levels sorted by rank
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    pub fn implements_keyword(&self) -> &str {
        &self.implements_keyword
    }

    pub fn validates_keyword(&self) -> &str {
        &self.validates_keyword
    }

    pub fn is_known_status(&self, status: &str) -> bool {
        self.statuses.iter().any(|s| s.eq_ignore_ascii_case(status.trim()))
    }

    pub fn test_name_references(&self) -> bool {
        self.test_name_references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LevelConfig;

    fn pattern() -> PatternConfig {
        TraceConfig::default().compile().unwrap()
    }

    #[test]
    fn parses_bare_and_assertion_ids() {
        let p = pattern();
        let parts = p.parse_id("REQ-p00001").unwrap();
        assert_eq!(parts.level_code, 'p');
        assert_eq!(parts.number, 1);
        assert!(parts.assertions.is_empty());

        let parts = p.parse_id("REQ-d00042-B").unwrap();
        assert_eq!(parts.level_code, 'd');
        assert_eq!(parts.number, 42);
        assert_eq!(parts.assertions, vec!['B']);

        let parts = p.parse_id("REQ-o00003-A-C").unwrap();
        assert_eq!(parts.assertions, vec!['A', 'C']);
    }

    #[test]
    fn rejects_malformed_ids() {
        let p = pattern();
        assert!(p.parse_id("REQ-x00001").is_none());
        assert!(p.parse_id("REQ-p0001").is_none());
        assert!(p.parse_id("REQ-p00001-a").is_none());
        assert!(p.parse_id("SPEC-p00001").is_none());
        assert!(p.parse_id("REQ-p00001 ").is_none());
    }

    #[test]
    fn generator_round_trips_matcher() {
        let p = pattern();
        let id = p.format_id('o', 7, Some('A'));
        assert_eq!(id, "REQ-o00007-A");
        let parts = p.parse_id(&id).unwrap();
        assert_eq!(p.format_id(parts.level_code, parts.number, None), "REQ-o00007");
    }

    #[test]
    fn unpadded_numbering() {
        let config = TraceConfig {
            zero_padded: false,
            ..TraceConfig::default()
        };
        let p = config.compile().unwrap();
        assert_eq!(p.format_id('p', 12, None), "REQ-p12");
        assert_eq!(p.parse_id("REQ-p123456").unwrap().number, 123456);
    }

    #[test]
    fn journey_ids() {
        let p = pattern();
        let journey = Regex::new(&format!("^{}$", p.journey_fragment())).unwrap();
        assert!(journey.is_match("JNY-Dev-01"));
        assert!(!journey.is_match("JNY-Dev"));
        assert!(!journey.is_match("REQ-p00001"));
    }

    #[test]
    fn rank_based_parent_permission() {
        let p = pattern();
        let prd = p.level_by_name("prd").unwrap().clone();
        let ops = p.level_by_code('o').unwrap().clone();
        assert!(p.permits_parent(&ops, &prd));
        assert!(!p.permits_parent(&prd, &ops));
        assert!(p.permits_parent(&prd, &prd));
    }

    #[test]
    fn explicit_parent_map_overrides_ranks() {
        let mut config = TraceConfig::default();
        config.levels.push(LevelConfig::new("QA", "q", 4));
        let mut allowed = BTreeMap::new();
        allowed.insert("dev".to_string(), vec!["OPS".to_string()]);
        config.hierarchy.allowed_parents = Some(allowed);
        let p = config.compile().unwrap();
        let dev = p.level_by_name("DEV").unwrap().clone();
        let ops = p.level_by_name("OPS").unwrap().clone();
        let prd = p.level_by_name("PRD").unwrap().clone();
        assert!(p.permits_parent(&dev, &ops));
        assert!(!p.permits_parent(&dev, &prd));
    }
}
