//! Galley - a graph-based asset transformation engine for web projects.
//!
//! One URL graph serves two consumers: a development session that cooks
//! resources on request and reacts to changes with hot updates, and a
//! production build that cooks everything, versions it and writes the output.
//!
//! # Module Structure
//!
//! ```text
//! src/
//! ├── core        # ResourceUrl, ContentKind, BuildMode, CookState, SpecifierKind
//! ├── graph       # UrlGraph, UrlInfo (nodes), Reference (edges)
//! ├── plugin      # Plugin, hook traits, PluginController
//! ├── kitchen     # Kitchen: per-node cooking state machine
//! ├── loader      # UrlGraphLoader: memoized recursive discovery
//! ├── sourcemap   # v3 maps, fragment chains
//! ├── build       # Versioner, Manifest, Emitter
//! ├── reload      # Invalidator, dev notifications
//! ├── session     # Session, BuildSession, DevSession
//! ├── builtin     # url_resolution(), file_loader()
//! ├── config      # galley.toml
//! ├── logger      # log!/debug!, dev status block, ProgressLine
//! └── utils       # hashing, MIME types
//! ```
//!
//! # Example
//!
//! ```ignore
//! let config = GalleyConfig::load(Path::new("galley.toml"))?;
//! let plugins = vec![file_loader(), html_plugin(), url_resolution()];
//! let report = BuildSession::new(config, plugins)?.run().await?;
//! log!("build"; "{}", report.graph);
//! ```

pub mod logger;

pub mod build;
pub mod builtin;
pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod kitchen;
pub mod loader;
pub mod plugin;
pub mod reload;
pub mod session;
pub mod sourcemap;
pub mod utils;

#[cfg(test)]
mod testing;

pub use build::{EmitSummary, Emitter, Manifest, VersionReport, Versioner};
pub use config::{ConfigHandle, GalleyConfig};
pub use core::{BuildMode, ContentKind, CookState, ResourceUrl};
pub use error::GalleyError;
pub use graph::{Reference, ReferenceKind, UrlGraph, UrlId, UrlInfo};
pub use kitchen::{CookError, CookErrorKind, Kitchen};
pub use loader::UrlGraphLoader;
pub use plugin::{Plugin, PluginController};
pub use reload::{DevNotification, InvalidationSignal, Invalidator};
pub use session::{BuildReport, BuildSession, DevSession, Session};
