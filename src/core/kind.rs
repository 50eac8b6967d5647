//! Content classification of graph nodes.

use serde::{Deserialize, Serialize};

use crate::utils::mime;

/// Kind of content a node holds.
///
/// Assigned during load, may be refined by a transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Html,
    Css,
    /// ES module script (`<script type="module">`, `import`).
    JsModule,
    /// Classic script (`<script src>` without `type="module"`).
    JsClassic,
    Json,
    WebManifest,
    Svg,
    Text,
    /// Opaque binary asset (images, fonts, wasm, ...).
    Asset,
}

impl ContentKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 9] = [
        Self::Html,
        Self::Css,
        Self::JsModule,
        Self::JsClassic,
        Self::Json,
        Self::WebManifest,
        Self::Svg,
        Self::Text,
        Self::Asset,
    ];

    /// Classify from a content type.
    pub fn from_content_type(content_type: &str) -> Self {
        match mime::essence(content_type) {
            mime::types::HTML => Self::Html,
            mime::types::CSS => Self::Css,
            "text/javascript" | "application/javascript" => Self::JsModule,
            mime::types::WEBMANIFEST => Self::WebManifest,
            mime::types::SVG => Self::Svg,
            ct if ct == mime::types::JSON || ct.ends_with("+json") => Self::Json,
            ct if mime::is_text(ct) => Self::Text,
            _ => Self::Asset,
        }
    }

    /// Classify from a lowercase file extension.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("cjs") => Self::JsClassic,
            other => Self::from_content_type(mime::from_extension(other)),
        }
    }

    /// Short name used in logs, progress counters and error payloads.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::JsModule => "js_module",
            Self::JsClassic => "js_classic",
            Self::Json => "json",
            Self::WebManifest => "webmanifest",
            Self::Svg => "svg",
            Self::Text => "text",
            Self::Asset => "asset",
        }
    }

    /// Check if content of this kind is text (has a template).
    #[inline]
    pub const fn is_text(self) -> bool {
        !matches!(self, Self::Asset)
    }

    #[inline]
    pub const fn is_js(self) -> bool {
        matches!(self, Self::JsModule | Self::JsClassic)
    }

    /// Whether `self` (loaded) is compatible with `expected` (from the reference).
    ///
    /// JS flavors are interchangeable, the reference decides which one wins.
    pub fn is_compatible_with(self, expected: Self) -> bool {
        self == expected
            || (self.is_js() && expected.is_js())
            || (self == Self::Json && expected == Self::WebManifest)
            || (self == Self::Text && expected.is_text())
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
