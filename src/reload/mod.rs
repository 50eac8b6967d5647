//! Dev-mode invalidation: "source changed" → stale nodes → hot or full reload.
//!
//! # Modules
//!
//! - `message` - notification and signal types (`hot`, `full-reload`, `{url}`)
//!
//! # Walk
//!
//! ```text
//! util.js changed
//!   ├─ decline?              → full-reload
//!   ├─ accept_self?          → boundary: util.js
//!   ├─ entry?                → full-reload
//!   └─ for each importer (resource hints skipped)
//!        ├─ already on path? → full-reload (cycle)
//!        ├─ decline?         → full-reload
//!        ├─ accepts deps?    → boundary: importer
//!        └─ otherwise        → walk the importer
//! ```
//!
//! A node nobody imports and that does not accept itself also degrades to a
//! full reload.

pub mod message;

pub use message::{DevNotification, InvalidationSignal};

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::config::DevConfig;
use crate::core::ResourceUrl;
use crate::graph::{UrlGraph, UrlId};
use crate::debug;

/// What one invalidation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub notification: DevNotification,
    /// Nodes purged and due for a re-cook, the changed node first.
    pub stale: Vec<UrlId>,
}

/// Decides how a change propagates through incoming edges.
pub struct Invalidator<'a> {
    graph: &'a UrlGraph,
    reference_versioning: bool,
}

/// Walk state shared across the recursion.
#[derive(Default)]
struct Walk {
    path: Vec<UrlId>,
    accepted: FxHashSet<UrlId>,
    visited: Vec<UrlId>,
    boundaries: BTreeSet<String>,
}

impl<'a> Invalidator<'a> {
    pub fn new(graph: &'a UrlGraph, config: &DevConfig) -> Self {
        Self {
            graph,
            reference_versioning: config.reference_versioning,
        }
    }

    /// Invalidate `url`. `None` when the graph never saw it.
    pub fn invalidate(&self, url: &ResourceUrl) -> Option<Invalidation> {
        let id = self.graph.id_of(url)?;
        self.graph.update(id, |node| node.purge());

        let mut walk = Walk::default();
        let notification = match self.propagate(id, &mut walk) {
            Ok(()) => DevNotification::hot(walk.boundaries.into_iter().collect()),
            Err(reason) => DevNotification::full_reload_with_reason(reason),
        };

        for dependent in &walk.visited {
            self.graph.update(*dependent, |node| node.version = None);
        }

        let mut stale = vec![id];
        if self.reference_versioning {
            // dependents embed `?v=` of what they import
            for dependent in self.graph.dependents_closure(id, |r| !r.is_resource_hint) {
                if dependent != id {
                    self.graph.update(dependent, |node| node.purge());
                    stale.push(dependent);
                }
            }
        }

        debug!(
            "reload";
            "{} -> {} ({} stale)",
            url.relative_to(self.graph.root()),
            notification.to_json(),
            stale.len()
        );
        Some(Invalidation {
            notification,
            stale,
        })
    }

    fn propagate(&self, id: UrlId, walk: &mut Walk) -> Result<(), String> {
        let root = self.graph.root();
        let (relative, hot, is_entry) = self
            .graph
            .read(id, |node| (node.url.relative_to(root), node.hot, node.is_entry));

        if hot.decline {
            return Err(format!("{relative} declines hot updates"));
        }
        if hot.accept_self {
            walk.boundaries.insert(relative);
            return Ok(());
        }
        if is_entry {
            return Err(format!("{relative} is an entry document"));
        }
        if walk.accepted.contains(&id) {
            return Ok(());
        }

        let importers = self.graph.dependents(id, false);
        if importers.is_empty() {
            return Err(format!("nothing accepts the update of {relative}"));
        }

        walk.path.push(id);
        for importer in importers {
            if !walk.visited.contains(&importer) {
                walk.visited.push(importer);
            }
            let (importer_url, importer_hot) = self
                .graph
                .read(importer, |node| (node.url.relative_to(root), node.hot));

            if walk.path.contains(&importer) {
                return Err(format!("circular import through {importer_url}"));
            }
            if importer_hot.decline {
                return Err(format!("{importer_url} declines hot updates"));
            }
            if importer_hot.accept_dependencies {
                walk.boundaries.insert(importer_url);
                continue;
            }
            self.propagate(importer, walk)?;
        }
        walk.path.pop();
        walk.accepted.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildMode, CookState};
    use crate::testing::{Fixture, file};
    use tokio_util::sync::CancellationToken;

    async fn warm(fixture: &Fixture, entry: &str) {
        let loader = fixture.loader();
        loader.load(fixture.entry(entry));
        let summary = loader.all_done(&CancellationToken::new()).await.unwrap();
        assert!(summary.failed.is_empty(), "{:?}", summary.failed);
    }

    fn invalidate(fixture: &Fixture, path: &str) -> Invalidation {
        let config = fixture.config().get();
        Invalidator::new(fixture.graph(), &config.dev)
            .invalidate(&file(path))
            .unwrap()
    }

    fn app(util: &str) -> Fixture {
        Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("index.html", r#"<script type="module" src="./main.js"></script>"#),
            ("main.js", r#"import "./util.js";"#),
            ("util.js", util),
        ])
    }

    #[tokio::test]
    async fn test_self_accepting_module_is_hot() {
        let fixture = app("export const x = 1; import.meta.hot.accept();");
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "util.js");
        assert_eq!(result.notification, DevNotification::hot(vec!["util.js".into()]));
        assert_eq!(result.stale, vec![fixture.node("util.js")]);
        let util = fixture.node("util.js");
        assert_eq!(fixture.graph().read(util, |n| n.state), CookState::Unloaded);
        assert!(fixture.graph().read(util, |n| n.hot.accept_self));
    }

    #[tokio::test]
    async fn test_nobody_accepting_reaches_entry() {
        let fixture = app("export const x = 1;");
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "util.js");
        assert!(!result.notification.is_hot());
        assert_eq!(
            result.notification,
            DevNotification::full_reload_with_reason("index.html is an entry document")
        );
    }

    #[tokio::test]
    async fn test_importer_accepting_dependencies() {
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("index.html", r#"<script type="module" src="./main.js"></script>"#),
            ("main.js", r#"import "./util.js"; import.meta.hot.accept(["./util.js"], () => {});"#),
            ("util.js", "export const x = 1;"),
        ]);
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "util.js");
        assert_eq!(result.notification, DevNotification::hot(vec!["main.js".into()]));
    }

    #[tokio::test]
    async fn test_decline_wins_over_accepting_importer() {
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("main.js", r#"import "./util.js"; import.meta.hot.accept(["./util.js"], () => {});"#),
            ("util.js", "import.meta.hot.decline();"),
        ]);
        warm(&fixture, "main.js").await;

        let result = invalidate(&fixture, "util.js");
        assert!(!result.notification.is_hot());
    }

    #[tokio::test]
    async fn test_boundaries_from_several_importers() {
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("index.html", r#"<script type="module" src="./a.js"></script><script type="module" src="./b.js"></script>"#),
            ("a.js", r#"import "./shared.js"; import.meta.hot.accept();"#),
            ("b.js", r#"import "./shared.js"; import.meta.hot.accept();"#),
            ("shared.js", "export {}"),
        ]);
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "shared.js");
        assert_eq!(
            result.notification,
            DevNotification::hot(vec!["a.js".into(), "b.js".into()])
        );
    }

    #[tokio::test]
    async fn test_cycle_degrades_to_full_reload() {
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("main.js", r#"import "./a.js"; import.meta.hot.accept(["./a.js"], () => {});"#),
            ("a.js", r#"import "./b.js";"#),
            ("b.js", r#"import "./a.js";"#),
        ]);
        warm(&fixture, "main.js").await;

        let result = invalidate(&fixture, "b.js");
        assert_eq!(
            result.notification,
            DevNotification::full_reload_with_reason("circular import through b.js")
        );
    }

    #[tokio::test]
    async fn test_resource_hints_are_not_walked() {
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
            ("index.html", r#"<link rel="modulepreload" href="./util.js"><script type="module" src="./main.js"></script>"#),
            ("main.js", r#"import "./util.js"; import.meta.hot.accept(["./util.js"], () => {});"#),
            ("util.js", "export {}"),
        ]);
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "util.js");
        assert_eq!(result.notification, DevNotification::hot(vec!["main.js".into()]));
    }

    #[tokio::test]
    async fn test_versions_cleared_and_reference_versioning_restales() {
        let files = [
            ("index.html", r#"<script type="module" src="./main.js"></script>"#),
            ("main.js", r#"import "./util.js"; import.meta.hot.accept(["./util.js"], () => {});"#),
            ("util.js", "export {}"),
        ];
        let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&files);
        warm(&fixture, "index.html").await;
        let (main, index) = (fixture.node("main.js"), fixture.node("index.html"));
        for id in [main, index] {
            fixture.graph().update(id, |n| n.version = Some("abcd".into()));
        }

        let result = invalidate(&fixture, "util.js");
        assert_eq!(result.notification, DevNotification::hot(vec!["main.js".into()]));
        assert_eq!(result.stale, vec![fixture.node("util.js")]);
        assert_eq!(fixture.graph().read(main, |n| n.version.clone()), None);
        // the walk stopped at main.js
        assert!(fixture.graph().read(index, |n| n.version.is_some()));
        assert_eq!(fixture.graph().read(main, |n| n.state), CookState::Cooked);

        let fixture = Fixture::build(
            BuildMode::DEVELOPMENT,
            "[dev]\nreference_versioning = true",
            crate::testing::standard_plugins,
        )
        .with_files(&files);
        warm(&fixture, "index.html").await;

        let result = invalidate(&fixture, "util.js");
        let (main, index) = (fixture.node("main.js"), fixture.node("index.html"));
        assert_eq!(result.stale, vec![fixture.node("util.js"), main, index]);
        assert_eq!(fixture.graph().read(main, |n| n.state), CookState::Unloaded);
        assert!(fixture.graph().read(main, |n| n.hot.accept_dependencies));
    }

    #[tokio::test]
    async fn test_unknown_url() {
        let fixture = app("export {}");
        let config = fixture.config().get();
        assert!(
            Invalidator::new(fixture.graph(), &config.dev)
                .invalidate(&file("nope.js"))
                .is_none()
        );
    }
}
