//! Sessions: the context every engine call runs in.
//!
//! # Module Structure
//!
//! ```text
//! session/
//! ├── build   # BuildSession: prepare → version → rewrite → optimize → emit
//! ├── dev     # DevSession: request, on_change, subscribe, reload_config
//! └── mod.rs  # Session (this file)
//! ```
//!
//! A [`Session`] owns one graph, one plugin controller, one kitchen and one
//! loader, all sharing the same config handle and cancellation token. Two
//! sessions in one process share no engine state.

mod build;
mod dev;


pub use build::{BuildReport, BuildSession};
pub use dev::{DevSession, Served};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigHandle, GalleyConfig};
use crate::core::{BuildMode, ResourceUrl};
use crate::error::GalleyError;
use crate::graph::{UrlGraph, UrlId};
use crate::kitchen::Kitchen;
use crate::loader::{LoadOptions, UrlGraphLoader};
use crate::plugin::{Plugin, PluginController};

/// Config, mode, graph, plugins, kitchen, loader and cancellation of one run.
pub struct Session {
    config: ConfigHandle,
    mode: BuildMode,
    kitchen: Arc<Kitchen>,
    loader: Arc<UrlGraphLoader>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        config: GalleyConfig,
        plugins: Vec<Plugin>,
        mode: BuildMode,
    ) -> Result<Self, GalleyError> {
        let root = config.root_url()?;
        let options = LoadOptions::for_mode(mode, &config);
        let max_concurrent = config.build.max_concurrent_cooks;
        let config = ConfigHandle::new(config);

        let graph = Arc::new(UrlGraph::new(root));
        let plugins = Arc::new(PluginController::new(plugins, mode));
        let kitchen = Arc::new(Kitchen::new(graph, plugins, config.clone(), mode));
        let cancel = CancellationToken::new();
        let loader = Arc::new(UrlGraphLoader::new(
            Arc::clone(&kitchen),
            options,
            max_concurrent,
            cancel.clone(),
        ));

        Ok(Self {
            config,
            mode,
            kitchen,
            loader,
            cancel,
        })
    }

    #[inline]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    #[inline]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    #[inline]
    pub fn graph(&self) -> &Arc<UrlGraph> {
        self.kitchen.graph()
    }

    #[inline]
    pub fn plugins(&self) -> &Arc<PluginController> {
        self.kitchen.plugins()
    }

    #[inline]
    pub fn kitchen(&self) -> &Arc<Kitchen> {
        &self.kitchen
    }

    #[inline]
    pub fn loader(&self) -> &Arc<UrlGraphLoader> {
        &self.loader
    }

    /// Token observed by every cook and wait of this session.
    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Register the configured entry documents.
    pub fn add_entries(&self) -> Result<Vec<UrlId>, GalleyError> {
        let entries = self.config.get().entry_urls()?;
        Ok(entries
            .iter()
            .map(|url| self.graph().add_entry(url))
            .collect())
    }

    /// Canonical URL of `input`: absolute URLs as-is, anything else is
    /// taken relative to the project root.
    pub fn url(&self, input: &str) -> Result<ResourceUrl, GalleyError> {
        let root = self.graph().root();
        let joined = if input.contains("://") {
            ResourceUrl::parse(input)
        } else {
            root.join(input.trim_start_matches('/')).map(|(url, _)| url)
        };
        joined.map_err(|_| GalleyError::InvalidUrl(input.to_string()))
    }
}
