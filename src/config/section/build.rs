//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! out_dir = "dist"                   # Output directory
//! base = "/"                         # Prefix of generated specifiers
//! versioning = true                  # Content-hash filenames (app.3f2a9c1b.js)
//! hash_length = 8                    # Hex chars of the version
//! version_entries = false            # Keep entry documents unhashed
//! sourcemaps = true                  # Emit .map files next to JS/CSS
//! manifest = "asset-manifest.json"   # Empty string disables the manifest
//! optimize = true                    # Run the optimize hook chain
//! max_concurrent_cooks = 64          # In-flight cooks
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Production build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory, relative to the project root.
    pub out_dir: PathBuf,

    /// Prefix of generated specifiers (`/`, `/app/`, `https://cdn.example.com/`).
    pub base: String,

    /// Rename outputs with their content version.
    pub versioning: bool,

    /// Number of hex chars kept from the content hash.
    pub hash_length: usize,

    /// Version entry documents too (off: `index.html` stays `index.html`).
    pub version_entries: bool,

    /// Emit composed source maps for text outputs.
    pub sourcemaps: bool,

    /// Manifest file name inside `out_dir`.
    pub manifest: String,

    /// Run optimizers after the rewrite pass.
    pub optimize: bool,

    /// Upper bound on cooks running at the same time.
    pub max_concurrent_cooks: usize,
}

impl BuildConfig {
    pub const BASE: FieldPath = FieldPath::new("build.base");
    pub const HASH_LENGTH: FieldPath = FieldPath::new("build.hash_length");
    pub const MANIFEST: FieldPath = FieldPath::new("build.manifest");
    pub const MAX_CONCURRENT_COOKS: FieldPath = FieldPath::new("build.max_concurrent_cooks");

    /// Manifest file name, `None` when disabled.
    pub fn manifest_name(&self) -> Option<&str> {
        let name = self.manifest.trim();
        (!name.is_empty()).then_some(name)
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(4..=64).contains(&self.hash_length) {
            diag.error_with_hint(
                Self::HASH_LENGTH,
                format!("{} is out of range", self.hash_length),
                "use a value between 4 and 64",
            );
        }

        let base_ok = self.base.starts_with('/') || self.base.contains("://");
        if !base_ok || !self.base.ends_with('/') {
            diag.error_with_hint(
                Self::BASE,
                format!("`{}` is not a valid base", self.base),
                "base must start with `/` (or be an absolute URL) and end with `/`",
            );
        }

        if let Some(name) = self.manifest_name()
            && (name.starts_with('/') || name.contains(".."))
        {
            diag.error(Self::MANIFEST, "manifest must be a plain file name inside out_dir");
        }

        if self.max_concurrent_cooks == 0 {
            diag.error(Self::MAX_CONCURRENT_COOKS, "must be at least 1");
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist"),
            base: "/".to_string(),
            versioning: true,
            hash_length: 8,
            version_entries: false,
            sourcemaps: true,
            manifest: "asset-manifest.json".to_string(),
            optimize: true,
            max_concurrent_cooks: 64,
        }
    }
}
