//! Session-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::kitchen::CookError;
use crate::sourcemap::SourceMapError;

/// Errors surfaced by [`BuildSession`](crate::session::BuildSession) and
/// [`DevSession`](crate::session::DevSession).
#[derive(Debug, Error)]
pub enum GalleyError {
    /// A node failed to cook in a mode where errors are fatal.
    #[error(transparent)]
    Cook(#[from] CookError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session cancelled")]
    Cancelled,

    #[error("I/O error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("`{0}` is not a valid URL")]
    InvalidUrl(String),

    #[error("cannot serialize source map")]
    SourceMap(#[from] SourceMapError),

    #[error("cannot serialize manifest")]
    Manifest(#[from] serde_json::Error),
}

impl GalleyError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
