//! Content versions and generated URLs.
//!
//! ```text
//! own hash        blake3(kind, template rendered with root-relative URLs)   (parallel)
//!      │
//! components      Tarjan over cooked → cooked edges, dependencies first
//!      │
//! version         blake3(own, versions of dependencies outside the component)
//!      │
//! generated_url   <out>/<dir>/<stem>.<version>.<ext>
//! ```
//!
//! Root-relative URLs keep versions independent of where the project lives
//! on disk. Members of a cycle fold only dependencies outside their
//! component, so the fold never waits on itself.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::GalleyConfig;
use crate::core::ResourceUrl;
use crate::error::GalleyError;
use crate::graph::{UrlGraph, UrlId, UrlInfo};
use crate::utils::hash::{ContentHash, VersionHasher};
use crate::debug;

/// What a versioning pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionReport {
    pub versioned: usize,
    pub components: usize,
    /// Components with more than one member (or a self-reference).
    pub cycles: usize,
}

/// Computes `version` and `generated_url` for every cooked node.
pub struct Versioner<'a> {
    graph: &'a UrlGraph,
    config: &'a GalleyConfig,
}

impl<'a> Versioner<'a> {
    pub fn new(graph: &'a UrlGraph, config: &'a GalleyConfig) -> Self {
        Self { graph, config }
    }

    pub fn run(&self) -> Result<VersionReport, GalleyError> {
        let root = self.graph.root();
        let out_url = self.config.out_url()?;

        let own: FxHashMap<UrlId, ContentHash> = self.graph.with_nodes(|nodes| {
            nodes
                .par_iter()
                .filter(|node| node.is_cooked())
                .map(|node| (node.id, own_hash(node, root)))
                .collect()
        });
        let edges = self.edges(&own);
        let components = strongly_connected(&own, &edges);

        let mut versions: FxHashMap<UrlId, ContentHash> = FxHashMap::default();
        let mut report = VersionReport {
            components: components.len(),
            ..VersionReport::default()
        };

        for component in &components {
            let members: FxHashSet<UrlId> = component.iter().copied().collect();
            let cyclic = component.len() > 1 || edges[&component[0]].contains(&component[0]);
            if cyclic {
                report.cycles += 1;
            }

            for id in component {
                // dependencies outside the component are already versioned
                let mut dependencies: Vec<&ContentHash> = edges[id]
                    .iter()
                    .filter(|dep| !members.contains(dep))
                    .filter_map(|dep| versions.get(dep))
                    .collect();
                dependencies.sort_unstable_by_key(|hash| *hash.as_bytes());

                let mut hasher = VersionHasher::new();
                hasher.field(own[id].as_bytes());
                for dep in dependencies {
                    hasher.field(dep.as_bytes());
                }
                let version = hasher.finish();
                versions.insert(*id, version);
            }
        }

        let build = &self.config.build;
        for (id, version) in &versions {
            let version = version.short(build.hash_length);
            let generated = self.graph.read(*id, |node| {
                let hashed = build.versioning && (!node.is_entry || build.version_entries);
                generated_url(&node.url, root, &out_url, hashed.then_some(version.as_str()))
            })?;
            self.graph.update(*id, |node| {
                node.version = Some(version);
                node.generated_url = Some(generated);
            });
            report.versioned += 1;
        }

        debug!(
            "version";
            "{} node(s) in {} component(s), {} cyclic",
            report.versioned, report.components, report.cycles
        );
        Ok(report)
    }

    /// Distinct cooked targets of every cooked node, resource hints included.
    fn edges(&self, cooked: &FxHashMap<UrlId, ContentHash>) -> FxHashMap<UrlId, Vec<UrlId>> {
        self.graph.with_nodes(|nodes| {
            cooked
                .keys()
                .map(|id| {
                    let mut targets: Vec<UrlId> = nodes[id.index()]
                        .references
                        .iter()
                        .filter(|r| r.is_followable())
                        .filter_map(|r| r.target)
                        .filter(|t| cooked.contains_key(t))
                        .collect();
                    targets.sort_unstable();
                    targets.dedup();
                    (*id, targets)
                })
                .collect()
        })
    }
}

/// Hash of a node's own content, with references as root-relative URLs.
fn own_hash(node: &UrlInfo, root: &ResourceUrl) -> ContentHash {
    let mut hasher = VersionHasher::new();
    hasher.field(node.kind.map_or("", |k| k.name()).as_bytes());
    match &node.template {
        Some(template) => {
            let (text, _) = template.render(node.url.as_str(), |slot| {
                let reference = node.references.get(slot.reference)?;
                let url = reference.url.as_ref().filter(|_| !reference.external)?;
                Some(url.relative_to(root))
            });
            hasher.field(text.as_bytes());
        }
        None => {
            hasher.field(node.content.as_ref().map_or(&[][..], |c| c.as_bytes()));
        }
    }
    hasher.finish()
}

/// Output URL of `url`: same path under `out_url`, `version` spliced
/// before the extension. The query is dropped; URLs outside `root` keep
/// only their file name.
pub(crate) fn generated_url(
    url: &ResourceUrl,
    root: &ResourceUrl,
    out_url: &ResourceUrl,
    version: Option<&str>,
) -> Result<ResourceUrl, GalleyError> {
    let path = if url.is_within(root) {
        let relative = url.relative_to(root);
        relative.split('?').next().unwrap_or_default().to_string()
    } else {
        url.file_name().to_string()
    };

    let path = match version {
        Some(version) => {
            let (dir, name) = path.rsplit_once('/').map_or(("", path.as_str()), |(d, n)| (d, n));
            let name = match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{version}.{ext}"),
                _ => format!("{name}.{version}"),
            };
            if dir.is_empty() {
                name
            } else {
                format!("{dir}/{name}")
            }
        }
        None => path,
    };

    out_url
        .join(&path)
        .map(|(url, _)| url)
        .map_err(|_| GalleyError::InvalidUrl(format!("{out_url}{path}")))
}

// ============================================================================
// Strongly connected components
// ============================================================================

/// Tarjan's algorithm without recursion. Components come out dependencies
/// first; members and roots are visited in id order for determinism.
fn strongly_connected(
    nodes: &FxHashMap<UrlId, ContentHash>,
    edges: &FxHashMap<UrlId, Vec<UrlId>>,
) -> Vec<Vec<UrlId>> {
    #[derive(Clone, Copy)]
    struct Mark {
        index: usize,
        low: usize,
        on_stack: bool,
    }

    let mut roots: Vec<UrlId> = nodes.keys().copied().collect();
    roots.sort_unstable();

    let mut marks: FxHashMap<UrlId, Mark> = FxHashMap::default();
    let mut stack: Vec<UrlId> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0;

    for root in roots {
        if marks.contains_key(&root) {
            continue;
        }
        // (node, next edge to look at)
        let mut work: Vec<(UrlId, usize)> = vec![(root, 0)];
        marks.insert(
            root,
            Mark {
                index: next_index,
                low: next_index,
                on_stack: true,
            },
        );
        next_index += 1;
        stack.push(root);

        while let Some((node, cursor)) = work.last().copied() {
            if let Some(&target) = edges[&node].get(cursor) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                match marks.get(&target).copied() {
                    None => {
                        marks.insert(
                            target,
                            Mark {
                                index: next_index,
                                low: next_index,
                                on_stack: true,
                            },
                        );
                        next_index += 1;
                        stack.push(target);
                        work.push((target, 0));
                    }
                    Some(mark) if mark.on_stack => {
                        if let Some(current) = marks.get_mut(&node) {
                            current.low = current.low.min(mark.index);
                        }
                    }
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            let Mark { index, low, .. } = marks[&node];
            if let Some(&(parent, _)) = work.last()
                && let Some(parent_mark) = marks.get_mut(&parent)
            {
                parent_mark.low = parent_mark.low.min(low);
            }
            if index == low {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    if let Some(mark) = marks.get_mut(&member) {
                        mark.on_stack = false;
                    }
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }
    components
}
