//! Fixture corpora for integration tests

use elspais::{SourceFile, SourceSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Product requirement with two assertions
pub const PRD: &str = r#"# Product Requirements

## REQ-p00001: User Login
**Level**: PRD | **Status**: Active | **Implements**: -

A. The system SHALL authenticate users with a password.
B. The system SHALL lock an account after five failed attempts.

*End* *User Login*
"#;

/// Operations requirement implementing assertion A of REQ-p00001
pub const OPS: &str = r#"# Operations Requirements

## REQ-o00001: Login Service Operation
**Level**: OPS | **Status**: Active | **Implements**: REQ-p00001-A

The login service SHALL run behind the shared gateway.

*End* *Login Service Operation*
"#;

/// Render a requirement block with the given metadata and assertion lines
pub fn requirement(id: &str, level: &str, implements: &str, assertions: &[&str]) -> String {
    let mut text = format!(
        "## {id}: Title of {id}\n**Level**: {level} | **Status**: Active | **Implements**: {implements}\n\n"
    );
    for assertion in assertions {
        text.push_str(assertion);
        text.push('\n');
    }
    text.push_str(&format!("\n*End* *{id}*\n"));
    text
}

/// A set of named files, held in memory and optionally written to disk
pub struct TestCorpus {
    files: Vec<(String, String)>,
    dir: Option<TempDir>,
}

impl TestCorpus {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            dir: None,
        }
    }

    /// Add a file under a relative path
    pub fn with(mut self, path: &str, text: impl Into<String>) -> Self {
        self.files.push((path.to_string(), text.into()));
        self
    }

    /// Files as in-memory sources, paths kept relative
    pub fn sources(&self) -> SourceSet {
        SourceSet::from_files(
            self.files
                .iter()
                .map(|(path, text)| SourceFile::new(path.as_str(), text.as_str()))
                .collect(),
        )
    }

    /// Write every file below a fresh temporary directory
    pub fn materialize(mut self) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        for (path, text) in &self.files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create fixture dir");
            }
            std::fs::write(&full, text).expect("Failed to write fixture");
        }
        self.dir = Some(dir);
        self
    }

    /// Root of the materialized corpus
    pub fn root(&self) -> &Path {
        self.dir
            .as_ref()
            .map(|d| d.path())
            .expect("Corpus not materialized")
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("Failed to read fixture")
    }

    /// Load the materialized files back from disk; paths stay relative to
    /// the corpus root so they can be joined with it again when fixing
    pub fn load(&self) -> SourceSet {
        let mut set = SourceSet::load(
            &self
                .files
                .iter()
                .map(|(path, _)| self.path(path))
                .collect::<Vec<_>>(),
        );
        for (file, (relative, _)) in set.files.iter_mut().zip(&self.files) {
            file.path = relative.clone();
        }
        set
    }
}

impl Default for TestCorpus {
    fn default() -> Self {
        Self::new()
    }
}
