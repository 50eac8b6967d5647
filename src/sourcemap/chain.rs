//! Lazy chain of source-map fragments.
//!
//! ```text
//! original ──transform 1──▶ ... ──transform N──▶ template ──render──▶ content ──optimize──▶ final
//!            fragment              fragment                fragment             fragments
//! ```
//!
//! The render fragment is replaced whenever the content is re-rendered with
//! new specifiers (build rewrite pass), the rest only grows.

use std::sync::Arc;

use super::{Position, SourceMap};

/// One step of the chain.
#[derive(Debug, Clone)]
pub enum Link {
    /// Maps this stage's output back to its input.
    Map(Arc<SourceMap>),
    /// Stage replaced the content without providing a map: positions are lost.
    Opaque,
}

impl Link {
    fn locate(&self, position: Position) -> Option<Position> {
        match self {
            Self::Map(map) => map.locate(position),
            Self::Opaque => None,
        }
    }
}

/// Accumulated source-map state of one node.
#[derive(Debug, Clone, Default)]
pub struct SourcemapChain {
    transforms: Vec<Link>,
    render: Option<Link>,
    optimizations: Vec<Link>,
}

impl SourcemapChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_transform(&mut self, link: Link) {
        self.transforms.push(link);
    }

    /// Replace the render fragment.
    pub fn set_render(&mut self, map: SourceMap) {
        self.render = Some(Link::Map(Arc::new(map)));
    }

    pub fn push_optimization(&mut self, link: Link) {
        self.optimizations.push(link);
    }

    /// Drop optimize fragments (content is re-rendered from the template).
    pub fn clear_optimizations(&mut self) {
        self.optimizations.clear();
    }

    /// No stage changed positions.
    pub fn is_identity(&self) -> bool {
        self.transforms.is_empty() && self.render.is_none() && self.optimizations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len() + usize::from(self.render.is_some()) + self.optimizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn links(&self) -> impl DoubleEndedIterator<Item = &Link> {
        self.transforms
            .iter()
            .chain(self.render.iter())
            .chain(self.optimizations.iter())
    }

    /// Map a position in the final content back to the loaded content.
    ///
    /// Walks fragments newest-first without composing them. Columns past
    /// the start of a segment carry over to the original linearly.
    pub fn original_position(&self, position: Position) -> Option<Position> {
        let mut current = position;
        for link in self.links().rev() {
            current = link.locate(current)?;
        }
        Some(current)
    }

    /// Compose every fragment into a single map.
    ///
    /// Returns `None` when the chain is empty or broken by an opaque stage.
    /// `source`/`source_content` describe the loaded content.
    pub fn materialize(&self, source: &str, source_content: Option<&str>) -> Option<SourceMap> {
        let mut composed: Option<SourceMap> = None;
        for link in self.links() {
            let Link::Map(map) = link else {
                return None;
            };
            composed = Some(match composed {
                None => map.as_ref().clone(),
                Some(earlier) => map.compose(&earlier),
            });
        }

        let mut map = composed?;
        map.sources = vec![source.to_string()];
        map.sources_content = vec![source_content.map(str::to_owned)];
        Some(map)
    }
}
