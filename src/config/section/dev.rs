//! `[dev]` section configuration.
//!
//! Contains on-demand cooking settings.
//!
//! # Example
//!
//! ```toml
//! [dev]
//! include_resource_hints = false   # Cook preload/prefetch targets eagerly
//! reference_versioning = false     # Append ?v=<version> to generated specifiers
//! ```

use serde::{Deserialize, Serialize};

/// Development session settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Follow resource-hint edges while warming the graph.
    pub include_resource_hints: bool,

    /// Append the dependency's dev version to generated specifiers.
    /// - `false` (default): `/util.js`
    /// - `true`: `/util.js?v=3f2a9c1b`, dependents are re-cooked on change
    pub reference_versioning: bool,
}
