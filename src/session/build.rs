//! Production build orchestration.
//!
//! Build pipeline phases:
//! - **Prepare** - Cook every entry and everything it reaches (fixed point)
//! - **Version** - Content versions and generated URLs, dependencies first
//! - **Rewrite** - Re-render templates with final generated URLs
//! - **Optimize** - Optimizer chain over the rewritten content
//! - **Emit** - Output files, source maps, manifest

use futures::future::join_all;
use rayon::prelude::*;

use crate::build::{EmitSummary, Emitter, VersionReport, Versioner};
use crate::config::GalleyConfig;
use crate::core::BuildMode;
use crate::error::GalleyError;
use crate::graph::{GraphStats, UrlId};
use crate::loader::LoadSummary;
use crate::plugin::Plugin;
use crate::session::Session;
use crate::{debug, log};

/// What a whole build did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub graph: GraphStats,
    pub versions: VersionReport,
    pub emitted: EmitSummary,
    pub warnings: usize,
}

pub struct BuildSession {
    session: Session,
    progress: bool,
}

impl BuildSession {
    /// Production build.
    pub fn new(config: GalleyConfig, plugins: Vec<Plugin>) -> Result<Self, GalleyError> {
        Self::with_mode(config, plugins, BuildMode::PRODUCTION)
    }

    pub fn with_mode(
        config: GalleyConfig,
        plugins: Vec<Plugin>,
        mode: BuildMode,
    ) -> Result<Self, GalleyError> {
        Ok(Self {
            session: Session::new(config, plugins, mode)?,
            progress: false,
        })
    }

    /// Show emit counters on the terminal.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run every phase in order.
    pub async fn run(&self) -> Result<BuildReport, GalleyError> {
        let summary = self.prepare().await?;
        let versions = self.version()?;
        self.rewrite();
        self.optimize().await?;
        let emitted = self.emit().await?;

        let graph = self.session.graph().stats();
        log!(
            "build";
            "{} cooked in {} generation(s), {} file(s) written",
            graph.cooked, summary.generations, emitted.files
        );
        Ok(BuildReport {
            graph,
            versions,
            emitted,
            warnings: self.report_warnings(),
        })
    }

    /// Cook the entries and everything they reach.
    ///
    /// The first cook failure aborts the build.
    pub async fn prepare(&self) -> Result<LoadSummary, GalleyError> {
        let loader = self.session.loader();
        for entry in self.session.add_entries()? {
            loader.load(entry);
        }
        let mut summary = loader.all_done(self.session.cancellation()).await?;
        if !summary.failed.is_empty() {
            let first = summary.failed.swap_remove(0);
            for other in &summary.failed {
                debug!("build"; "also failed: {}", other);
            }
            return Err(GalleyError::Cook(first));
        }
        Ok(summary)
    }

    pub fn version(&self) -> Result<VersionReport, GalleyError> {
        let config = self.session.config().get();
        Versioner::new(self.session.graph(), &config).run()
    }

    /// Re-render every cooked node with final generated URLs.
    pub fn rewrite(&self) {
        let kitchen = self.session.kitchen();
        self.cooked().par_iter().for_each(|id| kitchen.rewrite(*id));
    }

    /// Returns how many nodes went through the optimizer chain.
    pub async fn optimize(&self) -> Result<usize, GalleyError> {
        let config = self.session.config().get();
        if !(self.session.mode().optimize && config.build.optimize) {
            return Ok(0);
        }
        let kitchen = self.session.kitchen();
        let cancel = self.session.cancellation();
        let ids = self.cooked();
        let results = join_all(ids.iter().map(|id| kitchen.optimize(*id, cancel))).await;
        for result in results {
            match result {
                Err(err) if err.is_cancelled() => return Err(GalleyError::Cancelled),
                Err(err) => return Err(GalleyError::Cook(err)),
                Ok(()) => {}
            }
        }
        Ok(ids.len())
    }

    pub async fn emit(&self) -> Result<EmitSummary, GalleyError> {
        let config = self.session.config().get();
        Emitter::new(self.session.graph(), &config)
            .with_progress(self.progress)
            .emit()
            .await
    }

    fn cooked(&self) -> Vec<UrlId> {
        self.session.graph().with_nodes(|nodes| {
            nodes
                .iter()
                .filter(|node| node.is_cooked())
                .map(|node| node.id)
                .collect()
        })
    }

    fn report_warnings(&self) -> usize {
        let graph = self.session.graph();
        let root = graph.root();
        graph.with_nodes(|nodes| {
            let mut count = 0;
            for node in nodes {
                for warning in &node.warnings {
                    log!("warning"; "{}: {}", node.url.relative_to(root), warning);
                    count += 1;
                }
            }
            count
        })
    }
}
