//! Graph node: one [`UrlInfo`] per canonical URL.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Reference;
use crate::core::{ContentKind, CookState, ResourceUrl};
use crate::kitchen::{ContentTemplate, CookError, CookWarning};
use crate::sourcemap::SourcemapChain;

/// Index of a node inside its [`UrlGraph`](super::UrlGraph).
///
/// Only minted by the graph, valid for the graph's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlId(pub(crate) u32);

impl UrlId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for UrlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Back-pointer stored in a target's incoming index: `references[index]` of `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRef {
    pub parent: UrlId,
    pub index: u32,
}

/// Node payload. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl Content {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn binary(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Binary(bytes.into())
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hot-update policy declared by the node's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotPolicy {
    /// Any change reaching this node forces a full reload.
    pub decline: bool,
    /// The node re-applies itself when it changes.
    pub accept_self: bool,
    /// The node re-applies itself when one of its dependencies changes.
    pub accept_dependencies: bool,
}

impl HotPolicy {
    pub const fn accepting_self() -> Self {
        Self {
            decline: false,
            accept_self: true,
            accept_dependencies: false,
        }
    }

    pub fn merge(&mut self, other: HotPolicy) {
        self.decline |= other.decline;
        self.accept_self |= other.accept_self;
        self.accept_dependencies |= other.accept_dependencies;
    }
}

/// A node of the URL graph.
///
/// `content`/`state`/`references` are written by the kitchen only, at the
/// end of the node's own cook. `incoming` is maintained by the graph.
#[derive(Debug, Clone)]
pub struct UrlInfo {
    pub id: UrlId,
    pub url: ResourceUrl,
    pub kind: Option<ContentKind>,
    pub subtype: Option<String>,
    pub content_type: Option<String>,

    /// Current payload (rendered with generated specifiers).
    pub content: Option<Content>,
    /// Payload as loaded.
    pub original_content: Option<Content>,
    /// Text with reference slots, re-rendered by the versioner.
    pub template: Option<Arc<ContentTemplate>>,
    pub sourcemap: SourcemapChain,

    pub generated_url: Option<ResourceUrl>,
    pub state: CookState,

    /// Outgoing edges, in discovery order.
    pub references: Vec<Reference>,
    /// Reverse index of edges pointing at this node.
    pub incoming: Vec<EdgeRef>,

    pub hot: HotPolicy,
    /// Content hash; see the versioner (build) and `DevSession::version` (dev).
    pub version: Option<String>,

    pub is_entry: bool,
    pub error: Option<CookError>,
    pub warnings: Vec<CookWarning>,

    /// Bumped by every purge. A cook started under an older epoch never
    /// writes to the node.
    pub epoch: u64,
}

impl UrlInfo {
    pub(crate) fn new(id: UrlId, url: ResourceUrl) -> Self {
        Self {
            id,
            url,
            kind: None,
            subtype: None,
            content_type: None,
            content: None,
            original_content: None,
            template: None,
            sourcemap: SourcemapChain::new(),
            generated_url: None,
            state: CookState::Unloaded,
            references: Vec::new(),
            incoming: Vec::new(),
            hot: HotPolicy::default(),
            version: None,
            is_entry: false,
            error: None,
            warnings: Vec::new(),
            epoch: 0,
        }
    }

    /// Text of the current content, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Content::as_text)
    }

    #[inline]
    pub fn is_cooked(&self) -> bool {
        self.state == CookState::Cooked
    }

    /// Forget everything produced by cooking.
    ///
    /// Keeps identity, the incoming index, entry flag and the hot policy of
    /// the last cook (the invalidator needs it to decide the update).
    pub(crate) fn purge(&mut self) {
        self.state = CookState::Unloaded;
        self.content = None;
        self.original_content = None;
        self.template = None;
        self.sourcemap = SourcemapChain::new();
        self.version = None;
        self.error = None;
        self.warnings.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_accessors() {
        let text = Content::text("body{}");
        assert_eq!(text.as_text(), Some("body{}"));
        assert_eq!(text.len(), 6);

        let binary = Content::binary(vec![0u8, 1, 2]);
        assert_eq!(binary.as_text(), None);
        assert_eq!(binary.as_bytes(), &[0, 1, 2]);
    }

    #[test]
    fn test_hot_policy_merge() {
        let mut policy = HotPolicy::default();
        policy.merge(HotPolicy::accepting_self());
        policy.merge(HotPolicy {
            decline: true,
            ..HotPolicy::default()
        });
        assert!(policy.accept_self);
        assert!(policy.decline);
        assert!(!policy.accept_dependencies);
    }

    #[test]
    fn test_purge_keeps_hot_and_incoming() {
        let url = ResourceUrl::parse("file:///project/a.js").unwrap();
        let mut info = UrlInfo::new(UrlId(0), url);
        info.state = CookState::Cooked;
        info.content = Some(Content::text("x"));
        info.version = Some("abcd".into());
        info.hot = HotPolicy::accepting_self();
        info.incoming.push(EdgeRef {
            parent: UrlId(1),
            index: 0,
        });

        info.purge();

        assert_eq!(info.state, CookState::Unloaded);
        assert!(info.content.is_none());
        assert!(info.version.is_none());
        assert!(info.hot.accept_self);
        assert_eq!(info.incoming.len(), 1);
    }
}
