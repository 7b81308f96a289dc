//! Input collaborators: enumerated source files and git-change summaries

use crate::graph::GitFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// One file to parse: its path as reported in locations, and its full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// A file that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub path: String,
    pub reason: String,
}

/// The enumerated input of one run
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub files: Vec<SourceFile>,
    pub failures: Vec<LoadFailure>,
}

impl SourceSet {
    /// Wrap already-loaded files
    pub fn from_files(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            failures: Vec::new(),
        }
    }

    /// Read each path from disk. Unreadable files are recorded, not fatal.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut set = Self::default();
        for path in paths {
            let path = path.as_ref();
            let shown = display_path(path);
            match std::fs::read_to_string(path) {
                Ok(text) => set.files.push(SourceFile::new(shown, text)),
                Err(e) => {
                    warn!(path = %shown, error = %e, "Skipping unreadable file");
                    set.failures.push(LoadFailure {
                        path: shown,
                        reason: e.to_string(),
                    });
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Precomputed version-control state, supplied by the caller
///
/// The core never runs git itself; a summary is produced elsewhere and
/// merged into per-node metrics as boolean flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitChangeSummary {
    pub modified: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
    pub branch_changed: BTreeSet<String>,
}

impl GitChangeSummary {
    /// Flags for a node parsed from `path`
    pub fn flags_for(&self, path: &str) -> GitFlags {
        let path = normalize(path);
        GitFlags {
            modified: self.modified.contains(path),
            untracked: self.untracked.contains(path),
            branch_changed: self.branch_changed.contains(path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty() && self.branch_changed.is_empty()
    }

    /// Read a JSON summary file
    pub fn from_json_file(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn normalize(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_records_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.md");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(b"# hello\n")
            .unwrap();
        let missing = dir.path().join("missing.md");

        let set = SourceSet::load(&[good, missing]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.files[0].text, "# hello\n");
        assert_eq!(set.failures.len(), 1);
        assert!(set.failures[0].path.ends_with("missing.md"));
    }

    #[test]
    fn git_flags_match_normalized_paths() {
        let summary: GitChangeSummary =
            serde_json::from_str(r#"{"modified": ["spec/prd.md"], "untracked": ["src/new.rs"]}"#).unwrap();

        let flags = summary.flags_for("./spec/prd.md");
        assert!(flags.modified);
        assert!(!flags.untracked);
        assert!(summary.flags_for("src/new.rs").untracked);
        assert!(!summary.flags_for("other.md").any());
    }
}
