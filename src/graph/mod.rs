//! URL graph: nodes keyed by canonical URL, edges with a reverse index.
//!
//! # Module Structure
//!
//! ```text
//! graph/
//! ├── info       # UrlInfo (node), UrlId, Content, HotPolicy
//! ├── reference  # Reference (edge), Mention, ReferenceKind
//! └── mod.rs     # UrlGraph bookkeeping (this file)
//! ```
//!
//! # Invariants
//!
//! - One node per canonical URL: `reuse_or_create_url_info` is idempotent
//! - For every `nodes[p].references[i].target == Some(t)` there is exactly
//!   one `EdgeRef { parent: p, index: i }` in `nodes[t].incoming`, and
//!   nothing else is in any incoming index
//! - Outgoing edges and the incoming indices they affect change in one
//!   critical section
//!
//! No hook logic lives here. Locks are never held across an `.await`:
//! every method takes and releases the lock synchronously.

mod info;
mod reference;

pub use info::{Content, EdgeRef, HotPolicy, UrlId, UrlInfo};
pub use reference::{Mention, Reference, ReferenceKind};

use std::collections::VecDeque;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;

use crate::core::{CookState, ResourceUrl};

// =============================================================================
// Data Structure
// =============================================================================

#[derive(Debug, Default)]
struct GraphInner {
    nodes: Vec<UrlInfo>,
    index: FxHashMap<ResourceUrl, UrlId>,
}

impl GraphInner {
    fn reuse_or_create(&mut self, url: &ResourceUrl) -> UrlId {
        if let Some(id) = self.index.get(url) {
            return *id;
        }
        let id = UrlId(self.nodes.len() as u32);
        self.nodes.push(UrlInfo::new(id, url.clone()));
        self.index.insert(url.clone(), id);
        id
    }

    /// Replace `id`'s outgoing edges, keeping every incoming index consistent.
    fn set_references(&mut self, id: UrlId, mut references: Vec<Reference>) {
        let old = std::mem::take(&mut self.nodes[id.index()].references);
        let mut old_targets: SmallVec<[UrlId; 8]> = old.iter().filter_map(|r| r.target).collect();
        old_targets.sort_unstable();
        old_targets.dedup();
        for target in old_targets {
            self.nodes[target.index()]
                .incoming
                .retain(|edge| edge.parent != id);
        }

        for (index, reference) in references.iter_mut().enumerate() {
            reference.target = None;
            if reference.external {
                continue;
            }
            let Some(url) = reference.url.clone() else {
                continue;
            };
            let target = self.reuse_or_create(&url);
            reference.target = Some(target);
            self.nodes[target.index()].incoming.push(EdgeRef {
                parent: id,
                index: index as u32,
            });
        }

        self.nodes[id.index()].references = references;
    }
}

/// The URL graph of one session.
///
/// Shared by every concurrent cook of the session. Node ids index an
/// append-only arena, so a `UrlId` never dangles.
#[derive(Debug)]
pub struct UrlGraph {
    root: ResourceUrl,
    inner: RwLock<GraphInner>,
}

/// One hop of a reference trace: `parent` mentions `specifier`, resolved to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub parent: ResourceUrl,
    pub specifier: String,
    pub url: ResourceUrl,
}

/// Node and edge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub cooked: usize,
    pub errored: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} edges ({} cooked, {} errored)",
            self.nodes, self.edges, self.cooked, self.errored
        )
    }
}

impl UrlGraph {
    /// Create an empty graph for a project rooted at `root` (directory URL).
    pub fn new(root: ResourceUrl) -> Self {
        Self {
            root,
            inner: RwLock::new(GraphInner::default()),
        }
    }

    /// Project root directory URL.
    #[inline]
    pub fn root(&self) -> &ResourceUrl {
        &self.root
    }

    // -------------------------------------------------------------------------
    // Node identity
    // -------------------------------------------------------------------------

    /// Node for `url`, created on first sight.
    pub fn reuse_or_create_url_info(&self, url: &ResourceUrl) -> UrlId {
        if let Some(id) = self.id_of(url) {
            return id;
        }
        self.inner.write().reuse_or_create(url)
    }

    /// Node for an entry document.
    pub fn add_entry(&self, url: &ResourceUrl) -> UrlId {
        let mut inner = self.inner.write();
        let id = inner.reuse_or_create(url);
        inner.nodes[id.index()].is_entry = true;
        id
    }

    #[inline]
    pub fn id_of(&self, url: &ResourceUrl) -> Option<UrlId> {
        self.inner.read().index.get(url).copied()
    }

    /// Snapshot of the node for `url`.
    pub fn get_url_info(&self, url: &ResourceUrl) -> Option<UrlInfo> {
        let inner = self.inner.read();
        let id = inner.index.get(url)?;
        Some(inner.nodes[id.index()].clone())
    }

    /// Snapshot of node `id`.
    pub fn url_info(&self, id: UrlId) -> UrlInfo {
        self.read(id, UrlInfo::clone)
    }

    /// Run `f` against node `id` under the read lock.
    ///
    /// Panics if `id` was minted by another graph.
    pub fn read<R>(&self, id: UrlId, f: impl FnOnce(&UrlInfo) -> R) -> R {
        f(&self.inner.read().nodes[id.index()])
    }

    /// Run `f` against all nodes under a single read lock.
    ///
    /// Use this for multi-node queries to avoid repeated lock acquisition.
    pub fn with_nodes<R>(&self, f: impl FnOnce(&[UrlInfo]) -> R) -> R {
        f(&self.inner.read().nodes)
    }

    /// Mutate node `id` under the write lock.
    ///
    /// May rewrite generated specifiers, but must not add, drop or retarget
    /// references; use [`Self::commit`] for that.
    pub(crate) fn update<R>(&self, id: UrlId, f: impl FnOnce(&mut UrlInfo) -> R) -> R {
        f(&mut self.inner.write().nodes[id.index()])
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    /// Replace `id`'s outgoing edge set.
    ///
    /// Creates nodes for newly referenced URLs and fills in each reference's
    /// `target`. Returns the distinct targets in first-mention order.
    pub fn update_references(&self, id: UrlId, references: Vec<Reference>) -> Vec<UrlId> {
        self.commit(id, references, |_| ())
    }

    /// Replace edges and finish a cook in one critical section.
    pub(crate) fn commit(
        &self,
        id: UrlId,
        references: Vec<Reference>,
        finish: impl FnOnce(&mut UrlInfo),
    ) -> Vec<UrlId> {
        let mut inner = self.inner.write();
        Self::commit_locked(&mut inner, id, references, finish)
    }

    /// [`Self::commit`], unless the node was purged since `epoch`.
    ///
    /// Returns `None` (and leaves the node untouched) when it was.
    pub(crate) fn commit_at(
        &self,
        id: UrlId,
        epoch: u64,
        references: Vec<Reference>,
        finish: impl FnOnce(&mut UrlInfo),
    ) -> Option<Vec<UrlId>> {
        let mut inner = self.inner.write();
        if inner.nodes[id.index()].epoch != epoch {
            return None;
        }
        Some(Self::commit_locked(&mut inner, id, references, finish))
    }

    fn commit_locked(
        inner: &mut GraphInner,
        id: UrlId,
        references: Vec<Reference>,
        finish: impl FnOnce(&mut UrlInfo),
    ) -> Vec<UrlId> {
        inner.set_references(id, references);
        let node = &mut inner.nodes[id.index()];
        finish(node);

        let mut seen = FxHashSet::default();
        node.references
            .iter()
            .filter_map(|r| r.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Outgoing edges of `id`.
    pub fn outgoing(&self, id: UrlId) -> Vec<Reference> {
        self.read(id, |node| node.references.clone())
    }

    /// Edges pointing at `id`.
    pub fn incoming(&self, id: UrlId) -> Vec<Reference> {
        let inner = self.inner.read();
        inner.nodes[id.index()]
            .incoming
            .iter()
            .map(|edge| inner.nodes[edge.parent.index()].references[edge.index as usize].clone())
            .collect()
    }

    /// Distinct direct dependents of `id`, sorted by id.
    pub fn dependents(&self, id: UrlId, include_resource_hints: bool) -> Vec<UrlId> {
        let inner = self.inner.read();
        let mut parents: Vec<UrlId> = inner.nodes[id.index()]
            .incoming
            .iter()
            .filter(|edge| {
                include_resource_hints
                    || !inner.nodes[edge.parent.index()].references[edge.index as usize]
                        .is_resource_hint
            })
            .map(|edge| edge.parent)
            .collect();
        parents.sort_unstable();
        parents.dedup();
        parents
    }

    /// Every node that reaches `id` through incoming edges, nearest first.
    ///
    /// `follow` decides per edge whether the walk crosses it. `id` itself is
    /// only included when it sits on a cycle.
    pub fn dependents_closure(
        &self,
        id: UrlId,
        follow: impl Fn(&Reference) -> bool,
    ) -> Vec<UrlId> {
        let inner = self.inner.read();
        let nodes = &inner.nodes;
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for edge in &nodes[current.index()].incoming {
                let reference = &nodes[edge.parent.index()].references[edge.index as usize];
                if follow(reference) && seen.insert(edge.parent) {
                    order.push(edge.parent);
                    queue.push_back(edge.parent);
                }
            }
        }
        order
    }

    // -------------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------------

    /// Every node id, in creation order.
    pub fn url_infos(&self) -> Vec<UrlId> {
        (0..self.len() as u32).map(UrlId).collect()
    }

    pub fn entries(&self) -> Vec<UrlId> {
        self.with_nodes(|nodes| nodes.iter().filter(|n| n.is_entry).map(|n| n.id).collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> GraphStats {
        self.with_nodes(|nodes| {
            let mut stats = GraphStats {
                nodes: nodes.len(),
                ..GraphStats::default()
            };
            for node in nodes {
                stats.edges += node.references.iter().filter(|r| r.target.is_some()).count();
                match node.state {
                    CookState::Cooked => stats.cooked += 1,
                    CookState::Errored => stats.errored += 1,
                    _ => {}
                }
            }
            stats
        })
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Shortest chain of references from an entry down to `id`.
    ///
    /// Empty for entries and for nodes no entry reaches.
    pub fn reference_trace(&self, id: UrlId) -> Vec<TraceStep> {
        let inner = self.inner.read();
        let nodes = &inner.nodes;
        if nodes[id.index()].is_entry {
            return Vec::new();
        }

        // parent -> (child, reference index), discovered walking incoming edges
        let mut came_from: FxHashMap<UrlId, (UrlId, u32)> = FxHashMap::default();
        let mut visited = FxHashSet::default();
        visited.insert(id);
        let mut queue = VecDeque::from([id]);
        let mut entry = None;

        'search: while let Some(current) = queue.pop_front() {
            for edge in &nodes[current.index()].incoming {
                if !visited.insert(edge.parent) {
                    continue;
                }
                came_from.insert(edge.parent, (current, edge.index));
                if nodes[edge.parent.index()].is_entry {
                    entry = Some(edge.parent);
                    break 'search;
                }
                queue.push_back(edge.parent);
            }
        }

        let Some(mut current) = entry else {
            return Vec::new();
        };
        let mut trace = Vec::new();
        while current != id {
            let Some(&(child, index)) = came_from.get(&current) else {
                break;
            };
            let reference = &nodes[current.index()].references[index as usize];
            trace.push(TraceStep {
                parent: nodes[current.index()].url.clone(),
                specifier: reference.specifier.clone(),
                url: nodes[child.index()].url.clone(),
            });
            current = child;
        }
        trace
    }

    /// Check the incoming/outgoing invariant. Returns the first violation.
    pub fn verify(&self) -> Result<(), String> {
        self.with_nodes(|nodes| {
            let mut expected: FxHashSet<(UrlId, EdgeRef)> = FxHashSet::default();
            for node in nodes {
                for (index, reference) in node.references.iter().enumerate() {
                    if let Some(target) = reference.target {
                        expected.insert((
                            target,
                            EdgeRef {
                                parent: node.id,
                                index: index as u32,
                            },
                        ));
                    }
                }
            }
            let mut actual = 0;
            for node in nodes {
                for edge in &node.incoming {
                    actual += 1;
                    if !expected.contains(&(node.id, *edge)) {
                        return Err(format!(
                            "orphaned back-reference {} -> {} (index {})",
                            nodes[edge.parent.index()].url,
                            node.url,
                            edge.index
                        ));
                    }
                }
            }
            if actual != expected.len() {
                return Err(format!(
                    "incoming index has {actual} entries, outgoing edges expect {}",
                    expected.len()
                ));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
