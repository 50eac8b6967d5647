//! Session mode: development (lazy, incremental) or build (exhaustive).

use serde::{Deserialize, Serialize};

/// Which consumer a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Dev,
    Build,
    Test,
}

/// Session mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    pub kind: ModeKind,

    /// Cook errors abort the whole run (otherwise the node is served as an error payload).
    pub fatal_errors: bool,

    /// Follow dynamic imports during recursive loads.
    pub exhaustive: bool,

    /// Run the optimize hook chain after the graph stabilized.
    pub optimize: bool,
}

impl BuildMode {
    /// Production build: whole graph, versioned, optimized.
    pub const PRODUCTION: Self = Self {
        kind: ModeKind::Build,
        fatal_errors: true,
        exhaustive: true,
        optimize: true,
    };

    /// Development: cook on demand, errors become overlays.
    pub const DEVELOPMENT: Self = Self {
        kind: ModeKind::Dev,
        fatal_errors: false,
        exhaustive: false,
        optimize: false,
    };

    /// Test runs: like dev but exhaustive and strict.
    pub const TEST: Self = Self {
        kind: ModeKind::Test,
        fatal_errors: true,
        exhaustive: true,
        optimize: false,
    };

    #[inline]
    pub const fn is_dev(&self) -> bool {
        matches!(self.kind, ModeKind::Dev)
    }

    #[inline]
    pub const fn is_build(&self) -> bool {
        matches!(self.kind, ModeKind::Build)
    }
}
