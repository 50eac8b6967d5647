//! Project configuration management for `galley.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── dev        # [dev]
//! │   └── project    # [project]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   ├── field      # FieldPath
//! │   └── handle     # Swappable per-session handle
//! └── mod.rs         # GalleyConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[project]` | Project root and entry documents                 |
//! | `[build]`   | Output dir, versioning, manifest, source maps    |
//! | `[dev]`     | Resource hints, dev reference versioning         |

pub mod section;
pub mod types;

pub use section::{BuildConfig, DevConfig, ProjectConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, ConfigHandle, FieldPath};

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::ResourceUrl;
use crate::log;

/// Default config file name.
pub const CONFIG_FILE: &str = "galley.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing galley.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleyConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root, resolved from `project.root` (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Project root and entries
    #[serde(default)]
    pub project: ProjectConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Dev session settings
    #[serde(default)]
    pub dev: DevConfig,
}

impl GalleyConfig {
    /// Load configuration from a `galley.toml` file.
    ///
    /// Unknown fields are reported as warnings and ignored. The project root
    /// is resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        let config_path = absolute(path);
        let base = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.root = normalize_lexically(&base.join(&config.project.root));
        config.config_path = config_path;

        config.validate().map_err(ConfigError::Diagnostics)?;
        Ok(config)
    }

    /// Parse configuration from TOML string.
    ///
    /// The root is taken as-is from `project.root`; callers that need an
    /// absolute root use [`GalleyConfig::load`] or set `root` themselves.
    pub fn from_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.root = config.project.root.clone();
        Ok(config)
    }

    /// In-memory configuration for a project directory, with defaults.
    pub fn for_project(root: impl Into<PathBuf>, entries: &[&str]) -> Self {
        let root = root.into();
        Self {
            root: root.clone(),
            project: ProjectConfig {
                root,
                entries: entries.iter().map(|e| (*e).to_string()).collect(),
            },
            ..Self::default()
        }
    }

    /// Parse TOML content, collecting any unknown fields.
    pub(crate) fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Validate every section, collecting all errors at once.
    pub fn validate(&self) -> Result<(), ConfigDiagnostics> {
        let mut diag = ConfigDiagnostics::new();
        self.project.validate(&mut diag);
        self.build.validate(&mut diag);
        diag.into_result()
    }

    // ========================================================================
    // derived urls
    // ========================================================================

    /// Directory URL of the project root (`file:///project/`).
    pub fn root_url(&self) -> Result<ResourceUrl, ConfigError> {
        ResourceUrl::from_directory_path(&self.root)
            .ok_or_else(|| ConfigError::InvalidPath(self.root.clone()))
    }

    /// Absolute output directory.
    pub fn out_dir(&self) -> PathBuf {
        normalize_lexically(&self.root.join(&self.build.out_dir))
    }

    /// Directory URL of the output directory.
    pub fn out_url(&self) -> Result<ResourceUrl, ConfigError> {
        let out_dir = self.out_dir();
        ResourceUrl::from_directory_path(&out_dir).ok_or(ConfigError::InvalidPath(out_dir))
    }

    /// Canonical URLs of the configured entry documents, in order.
    pub fn entry_urls(&self) -> Result<Vec<ResourceUrl>, ConfigError> {
        let root = self.root_url()?;
        self.project
            .entries
            .iter()
            .map(|entry| {
                root.join(entry.trim_start_matches('/'))
                    .map(|(url, _)| url)
                    .map_err(|_| ConfigError::InvalidEntry(entry.clone()))
            })
            .collect()
    }
}

// ============================================================================
// path helpers
// ============================================================================

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_lexically(path);
    }
    let cwd = std::env::current_dir().unwrap_or_default();
    normalize_lexically(&cwd.join(path))
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, rooted at `/project`.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> GalleyConfig {
    let (mut parsed, ignored) = GalleyConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed.root = PathBuf::from("/project").join(&parsed.project.root);
    parsed.root = normalize_lexically(&parsed.root);
    parsed
}
