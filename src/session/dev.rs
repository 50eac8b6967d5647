//! Development session: cook on request, invalidate on change.
//!
//! ```text
//! request(url) ──▶ load + fixed point ──▶ Served { content, version }
//! on_change({url}) ──▶ Invalidator ──▶ forget stale ──▶ DevNotification
//!                                                          ├─▶ subscribers
//!                                                          └─▶ returned
//! ```
//!
//! Stale nodes are not re-cooked eagerly; the next request for them does.

use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::config::GalleyConfig;
use crate::core::{BuildMode, ResourceUrl};
use crate::error::GalleyError;
use crate::graph::{Content, UrlId};
use crate::logger::{status_error, status_success, status_unchanged, status_warning};
use crate::plugin::Plugin;
use crate::reload::{DevNotification, InvalidationSignal, Invalidator};
use crate::session::Session;
use crate::utils::hash::ContentHash;
use crate::{debug, log};

/// Response to a dev request.
#[derive(Debug, Clone)]
pub struct Served {
    pub url: ResourceUrl,
    pub content_type: String,
    pub content: Content,
    /// Short content hash, usable as an ETag.
    pub version: Option<String>,
    /// `content` is the JSON error payload.
    pub errored: bool,
}

pub struct DevSession {
    session: Session,
    subscribers: Mutex<Vec<Sender<DevNotification>>>,
}

impl DevSession {
    pub fn new(config: GalleyConfig, plugins: Vec<Plugin>) -> Result<Self, GalleyError> {
        Ok(Self {
            session: Session::new(config, plugins, BuildMode::DEVELOPMENT)?,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Register the entries. Nothing is cooked until requested.
    pub fn start(&self) -> Result<Vec<UrlId>, GalleyError> {
        let entries = self.session.add_entries()?;
        debug!("dev"; "{} entr(ies) registered", entries.len());
        Ok(entries)
    }

    /// Receive every notification produced from now on.
    pub fn subscribe(&self) -> Receiver<DevNotification> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Cook `url` (and what it statically imports) unless already cooked.
    ///
    /// Cook failures are served as error payloads; only cancellation and
    /// session-level failures are returned as errors.
    pub async fn request(&self, url: &ResourceUrl) -> Result<Served, GalleyError> {
        let graph = self.session.graph();
        let loader = self.session.loader();
        let id = graph.reuse_or_create_url_info(url);

        let outcome = loader.load(id).await;
        let summary = loader.all_done(self.session.cancellation()).await?;
        for failed in &summary.failed {
            debug!("dev"; "{}", failed);
        }

        let relative = url.relative_to(graph.root());
        match outcome {
            Err(err) if err.is_cancelled() => return Err(GalleyError::Cancelled),
            Err(err) => status_error(&format!("failed to cook {relative}"), &err.to_string()),
            Ok(()) => {
                let config = self.session.config().get();
                if config.dev.reference_versioning {
                    self.version_targets(id);
                    self.session.kitchen().rewrite(id);
                    graph.update(id, |node| node.version = None);
                }
            }
        }

        let version = self.version_of(id);
        Ok(graph.read(id, |node| Served {
            url: node.url.clone(),
            content_type: node.content_type.clone().unwrap_or_default(),
            content: node.content.clone().unwrap_or_else(|| Content::text("")),
            version,
            errored: node.error.is_some(),
        }))
    }

    /// Dev version of `url`: short hash of its current content.
    pub fn version(&self, url: &ResourceUrl) -> Option<String> {
        let id = self.session.graph().id_of(url)?;
        self.version_of(id)
    }

    /// React to a changed source. `None` when the graph never saw it.
    pub fn on_change(
        &self,
        signal: &InvalidationSignal,
    ) -> Result<Option<DevNotification>, GalleyError> {
        let url = self.session.url(&signal.url)?;
        let graph = self.session.graph();
        let relative = url.relative_to(graph.root());

        let config = self.session.config().get();
        let Some(invalidation) = Invalidator::new(graph, &config.dev).invalidate(&url) else {
            status_unchanged(&format!("{relative} (not served)"));
            return Ok(None);
        };

        let loader = self.session.loader();
        for id in &invalidation.stale {
            loader.forget(*id);
        }

        match &invalidation.notification {
            DevNotification::Hot { boundary_urls } => {
                status_success(&format!("hot update: {}", boundary_urls.join(", ")));
            }
            DevNotification::FullReload { reason } => {
                status_warning(&format!(
                    "full reload: {}",
                    reason.as_deref().unwrap_or(&relative)
                ));
            }
        }
        self.notify(&invalidation.notification);
        Ok(Some(invalidation.notification))
    }

    /// Re-read `galley.toml`; on change every node is purged and clients
    /// get a full reload.
    pub fn reload_config(&self) -> anyhow::Result<bool> {
        if !self.session.config().reload()? {
            return Ok(false);
        }

        let graph = self.session.graph();
        let loader = self.session.loader();
        for id in graph.url_infos() {
            graph.update(id, |node| node.purge());
            loader.forget(id);
        }
        self.session.add_entries()?;

        log!("reload"; "galley.toml changed, {} node(s) purged", graph.len());
        self.notify(&DevNotification::full_reload_with_reason("galley.toml changed"));
        Ok(true)
    }

    fn notify(&self, notification: &DevNotification) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    fn version_of(&self, id: UrlId) -> Option<String> {
        let graph = self.session.graph();
        let (cached, content) = graph.read(id, |node| {
            let content = node.content.clone().filter(|_| node.is_cooked());
            (node.version.clone(), content)
        });
        if cached.is_some() {
            return cached;
        }

        let length = self.session.config().get().build.hash_length;
        let version = ContentHash::of(content?.as_bytes()).short(length);
        graph.update(id, |node| node.version = Some(version.clone()));
        Some(version)
    }

    /// Make sure every cooked target of `id` has a dev version.
    fn version_targets(&self, id: UrlId) {
        let targets: Vec<UrlId> = self.session.graph().read(id, |node| {
            node.references
                .iter()
                .filter(|r| r.is_followable())
                .filter_map(|r| r.target)
                .collect()
        });
        for target in targets {
            self.version_of(target);
        }
    }
}
