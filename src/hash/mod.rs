//! Content hashing for requirement bodies
//!
//! A requirement's closing marker may carry a short hex digest of its body.
//! When the body is edited without refreshing the digest, the stored and
//! recomputed values drift apart and validation reports it.

mod fixer;

pub use fixer::{fix_files, plan_updates, rewrite, FixError, FixReport, FixResult, HashUpdate};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest length used when configuration does not say otherwise
pub const DEFAULT_HASH_LENGTH: usize = 8;

/// Outcome of comparing a stored hash with the body it claims to describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStatus {
    Valid,
    Mismatch,
    Missing,
}

/// Normalize a body so that cosmetic differences do not change its hash
///
/// Line endings become `\n`, trailing whitespace is removed from every line,
/// and leading/trailing blank lines and trailing horizontal rules are dropped.
pub fn canonicalize(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = normalized.lines().map(str::trim_end).collect();

    while lines
        .last()
        .is_some_and(|l| l.is_empty() || is_decorative(l))
    {
        lines.pop();
    }
    let first = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    lines[first..].join("\n")
}

fn is_decorative(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| matches!(c, '-' | '*' | '_' | '='))
}

/// Hex SHA-256 of the canonical body, truncated to `length` characters
pub fn calculate_hash(body: &str, length: usize) -> String {
    let digest = Sha256::digest(canonicalize(body).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(length);
    hex
}

/// Compare a stored hash against the body's current hash
pub fn verify_hash(body: &str, stored: Option<&str>, length: usize) -> HashStatus {
    match stored {
        None => HashStatus::Missing,
        Some(stored) if stored.eq_ignore_ascii_case(&calculate_hash(body, length)) => {
            HashStatus::Valid
        }
        Some(_) => HashStatus::Mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "A. The system SHALL authenticate users.\nB. The system SHALL log out idle users.";

    #[test]
    fn hash_is_stable_and_truncated() {
        let a = calculate_hash(BODY, 8);
        let b = calculate_hash(BODY, 8);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(calculate_hash(BODY, 16)[..8], a);
    }

    #[test]
    fn whitespace_and_line_endings_do_not_matter() {
        let noisy = format!("\n\n{}   \r\n\r\n", BODY.replace('\n', "  \r\n"));
        assert_eq!(calculate_hash(&noisy, 8), calculate_hash(BODY, 8));
    }

    #[test]
    fn trailing_rule_is_ignored() {
        let with_rule = format!("{BODY}\n\n---\n");
        assert_eq!(canonicalize(&with_rule), canonicalize(BODY));
    }

    #[test]
    fn content_changes_change_the_hash() {
        let edited = BODY.replace("idle", "inactive");
        assert_ne!(calculate_hash(&edited, 8), calculate_hash(BODY, 8));
    }

    #[test]
    fn verify_reports_each_status() {
        let hash = calculate_hash(BODY, 8);
        assert_eq!(verify_hash(BODY, Some(&hash), 8), HashStatus::Valid);
        assert_eq!(
            verify_hash(BODY, Some(&hash.to_uppercase()), 8),
            HashStatus::Valid
        );
        assert_eq!(verify_hash(BODY, Some("00000000"), 8), HashStatus::Mismatch);
        assert_eq!(verify_hash(BODY, None, 8), HashStatus::Missing);
    }

    #[test]
    fn empty_body_hashes() {
        assert_eq!(calculate_hash("", 8), calculate_hash("\n  \n", 8));
    }
}
