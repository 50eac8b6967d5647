//! Recursive discovery with memoized cooks and a fixed-point wait.
//!
//! ```text
//! load(entry) ──spawn──▶ cook(entry) ──▶ load_referenced(entry)
//!                                          ├─ load(a) ──▶ cook(a) ──▶ ...
//!                                          └─ load(b) ──▶ (already pending: shared)
//!
//! all_done():  generation 1: [entry]      drain
//!              generation 2: [a, b]       drain
//!              generation 3: []           fixed point
//! ```
//!
//! The pending map holds one shared operation per node, so concurrent
//! discoveries (and cycles) await the same cook instead of starting another.
//! A finished operation stays in the map until [`UrlGraphLoader::forget`].
//!
//! At most one cook per node runs at a time. Forgetting a node whose cook is
//! still running only marks the operation stale: the next `load` chains a
//! new cook after it. A cook whose node was purged mid-flight starts over.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::GalleyConfig;
use crate::core::BuildMode;
use crate::error::GalleyError;
use crate::graph::{ReferenceKind, UrlId};
use crate::kitchen::{CookError, CookErrorKind, Kitchen};
use crate::debug;

/// Outcome of one cook, shared by everyone awaiting it.
pub type CookOutcome = Result<(), CookError>;

/// Memoized cook of one node.
pub type LoadOperation = Shared<BoxFuture<'static, CookOutcome>>;

struct Pending {
    operation: LoadOperation,
    /// Forgotten while still running.
    stale: bool,
}

/// Which edges `load_referenced` follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Schedule the targets of a node's edges once it is cooked.
    pub recursive: bool,
    pub include_resource_hints: bool,
    pub include_dynamic_imports: bool,
}

impl LoadOptions {
    /// Build: follow everything but resource hints. Dev: static edges only.
    pub fn for_mode(mode: BuildMode, config: &GalleyConfig) -> Self {
        Self {
            recursive: true,
            include_resource_hints: mode.is_dev() && config.dev.include_resource_hints,
            include_dynamic_imports: mode.exhaustive,
        }
    }
}

/// What one `all_done` call observed.
#[derive(Debug, Default)]
pub struct LoadSummary {
    /// Non-empty batches drained.
    pub generations: u64,
    pub cooked: usize,
    pub failed: Vec<CookError>,
}

pub struct UrlGraphLoader {
    kitchen: Arc<Kitchen>,
    options: LoadOptions,
    pending: DashMap<UrlId, Pending>,
    /// Operations created since the last drain.
    queue: Mutex<Vec<LoadOperation>>,
    generation: AtomicU64,
    limit: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl UrlGraphLoader {
    pub fn new(
        kitchen: Arc<Kitchen>,
        options: LoadOptions,
        max_concurrent: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kitchen,
            options,
            pending: DashMap::new(),
            queue: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancel,
        }
    }

    #[inline]
    pub fn kitchen(&self) -> &Arc<Kitchen> {
        &self.kitchen
    }

    #[inline]
    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Generations drained so far, across every `all_done` call.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Cook `id` unless a cook is already pending or done; returns the shared operation.
    ///
    /// Must be called within a tokio runtime.
    pub fn load(self: &Arc<Self>, id: UrlId) -> LoadOperation {
        match self.pending.entry(id) {
            Entry::Occupied(mut entry) => {
                if !entry.get().stale {
                    return entry.get().operation.clone();
                }
                let previous = entry.get().operation.clone();
                let operation = self.spawn(id, Some(previous));
                entry.insert(Pending {
                    operation: operation.clone(),
                    stale: false,
                });
                operation
            }
            Entry::Vacant(entry) => {
                let operation = self.spawn(id, None);
                entry.insert(Pending {
                    operation: operation.clone(),
                    stale: false,
                });
                operation
            }
        }
    }

    /// Start the cook of `id` once `after` (if any) has settled.
    fn spawn(self: &Arc<Self>, id: UrlId, after: Option<LoadOperation>) -> LoadOperation {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Some(previous) = after {
                let _ = previous.await;
            }
            this.run(id).await
        });

        let graph = Arc::clone(self.kitchen.graph());
        let operation = async move {
            task.await.unwrap_or_else(|join_error| {
                let url = graph.read(id, |node| node.url.clone());
                Err(CookError::new(
                    CookErrorKind::Internal,
                    url,
                    format!("cook task failed: {join_error}"),
                ))
            })
        }
        .boxed()
        .shared();

        self.queue.lock().push(operation.clone());
        operation
    }

    async fn run(self: Arc<Self>, id: UrlId) -> CookOutcome {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.limit).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            let url = self.kitchen.graph().read(id, |node| node.url.clone());
            return Err(CookError::cancelled(url));
        };

        loop {
            match self.kitchen.cook(id, &self.cancel).await {
                Err(err) if err.is_superseded() => {
                    debug!("loader"; "{} changed while cooking, starting over", err.url);
                }
                result => break result?,
            }
        }
        if self.options.recursive {
            self.load_referenced(id);
        }
        Ok(())
    }

    /// Schedule loads for every followable edge of `id` (does not wait for them).
    pub fn load_referenced(self: &Arc<Self>, id: UrlId) {
        let targets: Vec<UrlId> = self.kitchen.graph().read(id, |node| {
            node.references
                .iter()
                .filter(|r| r.is_followable())
                .filter(|r| self.options.include_resource_hints || !r.is_resource_hint)
                .filter(|r| {
                    self.options.include_dynamic_imports || r.kind != ReferenceKind::JsImportDynamic
                })
                .filter_map(|r| r.target)
                .collect()
        });
        for target in targets {
            self.load(target);
        }
    }

    /// Drop the memoized operation of `id` so the next `load` cooks again.
    ///
    /// A cook still in flight is kept (and marked stale) so the next one
    /// starts only after it settles.
    pub fn forget(&self, id: UrlId) {
        if let Entry::Occupied(mut entry) = self.pending.entry(id) {
            if entry.get().operation.peek().is_some() {
                entry.remove();
            } else {
                entry.get_mut().stale = true;
            }
        }
    }

    /// Whether a cook of `id` was started and not forgotten.
    pub fn is_pending(&self, id: UrlId) -> bool {
        self.pending.get(&id).is_some_and(|pending| !pending.stale)
    }

    /// Wait until no new operation appears: drain batches until one is empty.
    ///
    /// Cook failures are collected, not propagated; cancellation is.
    pub async fn all_done(&self, cancel: &CancellationToken) -> Result<LoadSummary, GalleyError> {
        let mut summary = LoadSummary::default();
        loop {
            let batch = std::mem::take(&mut *self.queue.lock());
            if batch.is_empty() {
                break;
            }
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            summary.generations += 1;
            debug!("loader"; "generation {}: {} operation(s)", generation, batch.len());

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GalleyError::Cancelled),
                results = join_all(batch) => results,
            };
            for result in results {
                match result {
                    Ok(()) => summary.cooked += 1,
                    Err(err) if err.is_cancelled() => return Err(GalleyError::Cancelled),
                    Err(err) => summary.failed.push(err),
                }
            }
        }
        Ok(summary)
    }
}
