//! Graph edge: one [`Reference`] per mention of a URL in a parent's content.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::UrlId;
use crate::core::{ContentKind, ResourceUrl};

/// How the parent mentions the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Synthetic edge for an entry document.
    Entry,
    /// `<a href>`, `<link href>`.
    HtmlHref,
    /// `<script src>`, `<img src>`, ...
    HtmlSrc,
    /// `url(...)` in CSS.
    CssUrl,
    /// `@import` in CSS.
    CssImport,
    /// `import x from "..."`, `export ... from "..."`.
    JsImportStatic,
    /// `import("...")`.
    JsImportDynamic,
    /// `new URL("...", import.meta.url)`.
    JsUrl,
    /// Anything a plugin invents.
    Other,
}

impl ReferenceKind {
    /// Whether the specifier follows JS module resolution (bare specifiers allowed).
    #[inline]
    pub const fn is_js_import(self) -> bool {
        matches!(self, Self::JsImportStatic | Self::JsImportDynamic)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::HtmlHref => "html_href",
            Self::HtmlSrc => "html_src",
            Self::CssUrl => "css_url",
            Self::CssImport => "css_import",
            Self::JsImportStatic => "js_import_static",
            Self::JsImportDynamic => "js_import_dynamic",
            Self::JsUrl => "js_url",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A URL mention found by a transform stage, before resolution.
///
/// `span` is a byte range in the text the stage was given; it is the exact
/// region that will be replaced by the generated specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub specifier: String,
    pub kind: ReferenceKind,
    pub subtype: Option<String>,
    pub span: Range<usize>,
    pub is_resource_hint: bool,
    pub expected_kind: Option<ContentKind>,
}

impl Mention {
    pub fn new(kind: ReferenceKind, specifier: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            subtype: None,
            span,
            is_resource_hint: false,
            expected_kind: None,
        }
    }

    pub fn resource_hint(mut self) -> Self {
        self.is_resource_hint = true;
        self
    }

    pub fn expecting(mut self, kind: ContentKind) -> Self {
        self.expected_kind = Some(kind);
        self
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}

/// An edge of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub parent: ResourceUrl,
    /// Raw specifier as authored.
    pub specifier: String,
    pub kind: ReferenceKind,
    pub subtype: Option<String>,

    /// Resolved canonical target (`None` when unresolved or external).
    pub url: Option<ResourceUrl>,
    /// Fragment of the specifier; not part of node identity.
    pub fragment: Option<String>,
    /// Target node, filled in by [`UrlGraph::update_references`](super::UrlGraph::update_references).
    pub target: Option<UrlId>,
    /// Points outside the project; kept verbatim, never cooked.
    pub external: bool,

    /// String written back into the parent's content.
    pub generated_specifier: Option<String>,
    /// Region of the parent's template replaced by `generated_specifier`.
    pub span: Option<Range<usize>>,

    /// Preload/prefetch: not a hard dependency.
    pub is_resource_hint: bool,
    pub expected_kind: Option<ContentKind>,
    /// Plugin that reported the mention.
    pub owner: Option<Arc<str>>,
}

impl Reference {
    /// Synthetic entry edge.
    pub fn entry(url: ResourceUrl) -> Self {
        Self {
            parent: url.clone(),
            specifier: url.to_string(),
            kind: ReferenceKind::Entry,
            subtype: None,
            url: Some(url),
            fragment: None,
            target: None,
            external: false,
            generated_specifier: None,
            span: None,
            is_resource_hint: false,
            expected_kind: None,
            owner: None,
        }
    }

    /// Unresolved edge built from a mention.
    pub fn from_mention(parent: ResourceUrl, mention: &Mention, owner: Arc<str>) -> Self {
        Self {
            parent,
            specifier: mention.specifier.clone(),
            kind: mention.kind,
            subtype: mention.subtype.clone(),
            url: None,
            fragment: None,
            target: None,
            external: false,
            generated_specifier: None,
            span: Some(mention.span.clone()),
            is_resource_hint: mention.is_resource_hint,
            expected_kind: mention.expected_kind,
            owner: Some(owner),
        }
    }

    /// Edge that the loader may follow (resolved, internal).
    #[inline]
    pub fn is_followable(&self) -> bool {
        self.target.is_some() && !self.external
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_builder() {
        let mention = Mention::new(ReferenceKind::HtmlHref, "./main.css", 12..22)
            .resource_hint()
            .expecting(ContentKind::Css)
            .subtype("preload");
        assert!(mention.is_resource_hint);
        assert_eq!(mention.expected_kind, Some(ContentKind::Css));
        assert_eq!(mention.subtype.as_deref(), Some("preload"));
    }

    #[test]
    fn test_from_mention_copies_fields() {
        let parent = ResourceUrl::parse("file:///project/index.html").unwrap();
        let mention = Mention::new(ReferenceKind::HtmlSrc, "./main.js", 5..14);
        let reference = Reference::from_mention(parent.clone(), &mention, Arc::from("html"));
        assert_eq!(reference.parent, parent);
        assert_eq!(reference.specifier, "./main.js");
        assert_eq!(reference.span, Some(5..14));
        assert_eq!(reference.owner.as_deref(), Some("html"));
        assert!(!reference.is_followable());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ReferenceKind::JsImportStatic.to_string(), "js_import_static");
        assert!(ReferenceKind::JsImportDynamic.is_js_import());
        assert!(!ReferenceKind::CssUrl.is_js_import());
    }
}
