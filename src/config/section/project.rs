//! `[project]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [project]
//! root = "."                          # Project root, relative to galley.toml
//! entries = ["index.html", "about.html"]
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Project layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root directory (every URL in the graph lives under it).
    pub root: PathBuf,

    /// Entry documents, project-relative.
    pub entries: Vec<String>,
}

impl ProjectConfig {
    pub const ROOT: FieldPath = FieldPath::new("project.root");
    pub const ENTRIES: FieldPath = FieldPath::new("project.entries");

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.entries.is_empty() {
            diag.error_with_hint(
                Self::ENTRIES,
                "at least one entry document is required",
                "entries = [\"index.html\"]",
            );
        }
        for entry in &self.entries {
            if entry.trim().is_empty() {
                diag.error(Self::ENTRIES, "entry paths must not be empty");
            } else if entry.contains("://") {
                diag.error_with_hint(
                    Self::ENTRIES,
                    format!("`{entry}` is a URL, entries are project-relative paths"),
                    "use a path such as \"index.html\"",
                );
            }
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            entries: vec!["index.html".to_string()],
        }
    }
}
