//! Hook traits and the values flowing through them.
//!
//! | Hook                 | Called                         | Dispatch                 |
//! |----------------------|--------------------------------|--------------------------|
//! | `Resolver`           | per reference                  | first `Some` wins        |
//! | `Loader`             | once per cook                  | first `Some` wins        |
//! | `Transformer`        | per cook, per content kind     | every stage, in order    |
//! | `Optimizer`          | build only, after the rewrite  | every stage, in order    |
//! | `SpecifierFormatter` | per resolved reference         | owner first, then rest   |
//!
//! Returning `Ok(None)` defers to the next plugin.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::GalleyConfig;
use crate::core::{BuildMode, ContentKind, ResourceUrl};
use crate::graph::{Content, HotPolicy, Mention, Reference, ReferenceKind, UrlGraph};
use crate::kitchen::{CookWarning, Edit, WarningKind};
use crate::sourcemap::{Position, SourceMap};

// ============================================================================
// Errors
// ============================================================================

/// What a hook returns when it fails.
#[derive(Debug, Error)]
pub enum HookError {
    /// Content could not be parsed. `position` is in the text the hook was given.
    #[error("{message}")]
    Parse {
        message: String,
        position: Option<Position>,
    },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    #[error("cancelled")]
    Cancelled,
}

impl HookError {
    pub fn parse(message: impl Into<String>, position: Option<Position>) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }
}

pub type HookResult<T> = Result<T, HookError>;

// ============================================================================
// Context
// ============================================================================

/// Session state every hook can see.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub mode: BuildMode,
    pub root: &'a ResourceUrl,
    pub config: &'a GalleyConfig,
    pub graph: &'a UrlGraph,
    pub cancel: &'a CancellationToken,
}

impl HookContext<'_> {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ============================================================================
// Resolve
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub parent: ResourceUrl,
    pub specifier: String,
    pub kind: ReferenceKind,
    pub subtype: Option<String>,
    pub expected_kind: Option<ContentKind>,
}

impl ResolveRequest {
    pub fn for_reference(reference: &Reference) -> Self {
        Self {
            parent: reference.parent.clone(),
            specifier: reference.specifier.clone(),
            kind: reference.kind,
            subtype: reference.subtype.clone(),
            expected_kind: reference.expected_kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Canonical URL of the target (no fragment).
    Url(ResourceUrl),
    /// Leave the specifier as authored; never cooked.
    External,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: HookContext<'_>,
        request: &ResolveRequest,
    ) -> HookResult<Option<Resolution>>;
}

// ============================================================================
// Load
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadOutput {
    pub content: Content,
    pub content_type: Option<String>,
    /// Overrides classification from the content type.
    pub kind: Option<ContentKind>,
    pub subtype: Option<String>,
}

impl LoadOutput {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            content_type: None,
            kind: None,
            subtype: None,
        }
    }

    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::new(Content::text(text))
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, ctx: HookContext<'_>, url: &ResourceUrl)
    -> HookResult<Option<LoadOutput>>;
}

// ============================================================================
// Transform
// ============================================================================

/// Input of one transform stage, plus what the stage reports back.
pub struct TransformContext {
    pub url: ResourceUrl,
    pub kind: ContentKind,
    content: Content,
    mentions: Vec<Mention>,
    hot: HotPolicy,
    warnings: Vec<CookWarning>,
}

impl TransformContext {
    pub(crate) fn new(url: ResourceUrl, kind: ContentKind, content: Content) -> Self {
        Self {
            url,
            kind,
            content,
            mentions: Vec::new(),
            hot: HotPolicy::default(),
            warnings: Vec::new(),
        }
    }

    /// Current text (the template text, specifiers still as authored).
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Report a URL mention; its span is a byte range in [`Self::text`].
    pub fn found_reference(&mut self, mention: Mention) {
        self.mentions.push(mention);
    }

    pub fn set_hot(&mut self, policy: HotPolicy) {
        self.hot.merge(policy);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings
            .push(CookWarning::new(WarningKind::Plugin, message));
    }

    pub(crate) fn finish(self) -> (Vec<Mention>, HotPolicy, Vec<CookWarning>) {
        (self.mentions, self.hot, self.warnings)
    }
}

/// Whole-content replacement.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub content: Content,
    pub content_type: Option<String>,
    pub kind: Option<ContentKind>,
    /// Maps the new content back to the stage input; `None` loses positions.
    pub sourcemap: Option<SourceMap>,
}

impl Replacement {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            content_type: None,
            kind: None,
            sourcemap: None,
        }
    }

    pub fn with_sourcemap(mut self, map: SourceMap) -> Self {
        self.sourcemap = Some(map);
        self
    }

    pub fn with_kind(mut self, kind: ContentKind, content_type: impl Into<String>) -> Self {
        self.kind = Some(kind);
        self.content_type = Some(content_type.into());
        self
    }
}

/// How a stage changed the content.
///
/// Mentions reported alongside `Edits` refer to the text before the edits;
/// mentions reported alongside `Replace` refer to the new content.
#[derive(Debug, Clone)]
pub enum TransformOutput {
    Edits(Vec<Edit>),
    Replace(Replacement),
}

#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(
        &self,
        ctx: HookContext<'_>,
        input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>>;
}

// ============================================================================
// Optimize
// ============================================================================

/// Input of one optimize stage.
pub struct OptimizeContext {
    pub url: ResourceUrl,
    pub kind: ContentKind,
    pub content: Content,
}

impl OptimizeContext {
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn optimize(
        &self,
        ctx: HookContext<'_>,
        input: &OptimizeContext,
    ) -> HookResult<Option<Replacement>>;
}

// ============================================================================
// Format
// ============================================================================

/// Everything known about a resolved reference when its specifier is written.
pub struct FormatRequest<'a> {
    pub mode: BuildMode,
    pub root: &'a ResourceUrl,
    pub reference: &'a Reference,
    pub generated_url: Option<&'a ResourceUrl>,
    pub version: Option<&'a str>,
    /// What the engine writes when no formatter answers.
    pub default: &'a str,
}

pub trait SpecifierFormatter: Send + Sync {
    fn format(&self, request: &FormatRequest<'_>) -> Option<String>;
}
