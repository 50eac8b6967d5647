//! Per-node cooking state.
//!
//! ```text
//! unloaded → loading → loaded → transforming → resolving → cooked
//!                                                            │
//!                                  (build only) optimizing ←─┘─→ cooked
//! errored: reachable from any state
//! ```

use serde::{Deserialize, Serialize};

/// Where a node is in its cooking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookState {
    /// Never cooked, or purged by an invalidation.
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Transforming,
    Resolving,
    Optimizing,
    Cooked,
    Errored,
}

impl CookState {
    /// A cook (or optimize pass) is in progress.
    #[inline]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Loaded | Self::Transforming | Self::Resolving | Self::Optimizing
        )
    }

    /// Content is available (cooked or served as an error payload).
    #[inline]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Cooked | Self::Errored)
    }

    /// Check whether moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use CookState::*;
        match (self, next) {
            (_, Errored) | (_, Unloaded) => true,
            (Unloaded | Cooked | Errored, Loading) => true,
            (Loading, Loaded) => true,
            (Loaded, Transforming) => true,
            (Transforming, Resolving) => true,
            (Resolving, Cooked) => true,
            (Cooked, Optimizing) => true,
            (Optimizing, Cooked) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for CookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Transforming => "transforming",
            Self::Resolving => "resolving",
            Self::Optimizing => "optimizing",
            Self::Cooked => "cooked",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}
