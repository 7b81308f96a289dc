//! Rewrite stale or missing hashes on requirement closing markers
//!
//! Every change is anchored on the exact closing-marker line recorded during
//! parsing. Only the stored hash substring is replaced (or a hash suffix
//! appended); the rest of the file is left byte-for-byte intact. If any
//! anchor in a file cannot be found, that file is not written at all.

use super::{calculate_hash, verify_hash, HashStatus};
use crate::graph::{field, NodeKind, TraceGraph};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FixError {
    #[error("{path}: closing marker for {id} not found verbatim (expected at line {line})")]
    AnchorNotFound { path: String, id: String, line: usize },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type FixResult<T> = Result<T, FixError>;

/// One planned change to a requirement's closing marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashUpdate {
    pub path: String,
    pub id: String,
    /// Line of the closing marker (1-based)
    pub line: usize,
    /// The closing marker line as parsed
    pub anchor: String,
    pub stored: Option<String>,
    pub computed: String,
}

/// Outcome of a fix run over several files
#[derive(Debug, Default)]
pub struct FixReport {
    pub updated: Vec<HashUpdate>,
    pub files_written: Vec<String>,
    pub failures: Vec<FixError>,
}

impl FixReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Requirements whose stored hash is missing or stale
pub fn plan_updates(graph: &TraceGraph, hash_length: usize) -> Vec<HashUpdate> {
    graph
        .nodes_of_kind(NodeKind::Requirement)
        .filter_map(|node| {
            let body = node.text(field::BODY).unwrap_or_default();
            let stored = node.text(field::HASH);
            if verify_hash(body, stored, hash_length) == HashStatus::Valid {
                return None;
            }
            Some(HashUpdate {
                path: node.source.path.clone(),
                id: node.id.to_string(),
                line: node
                    .int(field::END_LINE)
                    .map(|l| l as usize)
                    .unwrap_or(node.source.end_line),
                anchor: node.text(field::END_MARKER).unwrap_or_default().to_string(),
                stored: stored.map(String::from),
                computed: calculate_hash(body, hash_length),
            })
        })
        .collect()
}

/// Apply updates to one file's text. Fails without partial output if any
/// anchor is missing.
pub fn rewrite(path: &str, text: &str, updates: &[HashUpdate]) -> FixResult<String> {
    let mut lines: Vec<String> = text.split_inclusive('\n').map(String::from).collect();

    for update in updates {
        let index = locate_anchor(&lines, update).ok_or_else(|| FixError::AnchorNotFound {
            path: path.to_string(),
            id: update.id.clone(),
            line: update.line,
        })?;
        let (content, ending) = split_ending(&lines[index]);
        let replaced = replace_hash(content, update).ok_or_else(|| FixError::AnchorNotFound {
            path: path.to_string(),
            id: update.id.clone(),
            line: update.line,
        })?;
        lines[index] = format!("{replaced}{ending}");
    }
    Ok(lines.concat())
}

/// The recorded line if it still matches, otherwise the only verbatim match
fn locate_anchor(lines: &[String], update: &HashUpdate) -> Option<usize> {
    let expected = update.line.checked_sub(1)?;
    if lines
        .get(expected)
        .is_some_and(|l| is_anchor(l, &update.anchor))
    {
        return Some(expected);
    }
    let mut found = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_anchor(l, &update.anchor));
    match (found.next(), found.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

fn is_anchor(line: &str, anchor: &str) -> bool {
    split_ending(line).0 == anchor
}

fn split_ending(line: &str) -> (&str, &str) {
    let content = line.trim_end_matches(['\n', '\r']);
    (content, &line[content.len()..])
}

fn replace_hash(content: &str, update: &HashUpdate) -> Option<String> {
    match &update.stored {
        Some(stored) => {
            let key = content.rfind("**Hash**")?;
            let offset = content[key..].find(stored.as_str())? + key;
            Some(format!(
                "{}{}{}",
                &content[..offset],
                update.computed,
                &content[offset + stored.len()..]
            ))
        }
        None => Some(format!("{} | **Hash**: {}", content.trim_end(), update.computed)),
    }
}

/// Apply updates on disk, one file at a time
///
/// `root` is joined with each update's path. A failure in one file is
/// recorded and the remaining files are still processed.
pub fn fix_files(root: &Path, updates: Vec<HashUpdate>) -> FixReport {
    let mut by_file: BTreeMap<String, Vec<HashUpdate>> = BTreeMap::new();
    for update in updates {
        by_file.entry(update.path.clone()).or_default().push(update);
    }

    let mut report = FixReport::default();
    for (path, updates) in by_file {
        let full: PathBuf = root.join(&path);
        match fix_one(&path, &full, &updates) {
            Ok(true) => {
                info!(path = %path, count = updates.len(), "Updated hashes");
                report.files_written.push(path);
                report.updated.extend(updates);
            }
            Ok(false) => debug!(path = %path, "No hash changes"),
            Err(e) => {
                warn!(error = %e, "Hash update failed; file left unmodified");
                report.failures.push(e);
            }
        }
    }
    report
}

fn fix_one(path: &str, full: &Path, updates: &[HashUpdate]) -> FixResult<bool> {
    let io = |source: std::io::Error| FixError::Io {
        path: path.to_string(),
        source,
    };
    let text = std::fs::read_to_string(full).map_err(io)?;
    let rewritten = rewrite(path, &text, updates)?;
    if rewritten == text {
        return Ok(false);
    }
    std::fs::write(full, rewritten).map_err(io)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(line: usize, anchor: &str, stored: Option<&str>) -> HashUpdate {
        HashUpdate {
            path: "spec/prd.md".into(),
            id: "REQ-p00001".into(),
            line,
            anchor: anchor.into(),
            stored: stored.map(String::from),
            computed: "feedbeef".into(),
        }
    }

    #[test]
    fn replaces_only_the_stored_hash() {
        let text = "body\r\n*End* *Login* | **Hash**: 0badc0de\r\nafter\r\n";
        let out = rewrite(
            "spec/prd.md",
            text,
            &[update(2, "*End* *Login* | **Hash**: 0badc0de", Some("0badc0de"))],
        )
        .unwrap();
        assert_eq!(out, "body\r\n*End* *Login* | **Hash**: feedbeef\r\nafter\r\n");
    }

    #[test]
    fn appends_missing_hash() {
        let text = "*End* *Login*\n";
        let out = rewrite("spec/prd.md", text, &[update(1, "*End* *Login*", None)]).unwrap();
        assert_eq!(out, "*End* *Login* | **Hash**: feedbeef\n");
    }

    #[test]
    fn finds_moved_anchor_when_unique() {
        let text = "new line\n*End* *Login*";
        let out = rewrite("spec/prd.md", text, &[update(1, "*End* *Login*", None)]).unwrap();
        assert_eq!(out, "new line\n*End* *Login* | **Hash**: feedbeef");
    }

    #[test]
    fn missing_anchor_fails_whole_file() {
        let text = "*End* *Login*\n*End* *Other* | **Hash**: 11111111\n";
        let updates = [
            update(1, "*End* *Login*", None),
            update(2, "*End* *Gone* | **Hash**: 11111111", Some("11111111")),
        ];
        let err = rewrite("spec/prd.md", text, &updates).unwrap_err();
        assert!(matches!(err, FixError::AnchorNotFound { line: 2, .. }));
    }
}
