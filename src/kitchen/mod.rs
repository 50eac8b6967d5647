//! The kitchen: per-node cooking state machine.
//!
//! # Module Structure
//!
//! ```text
//! kitchen/
//! ├── error     # CookError, CookWarning
//! ├── format    # Default generated specifiers
//! ├── template  # ContentTemplate, Edit, slots
//! └── mod.rs    # Kitchen (this file)
//! ```
//!
//! # Cook
//!
//! ```text
//! unloaded ─load─▶ loaded ─transform*─▶ resolving ─resolve*, format*, render─▶ cooked
//!     │               │          │                │
//!     └───────────────┴──────────┴────────────────┴──▶ errored
//! ```
//!
//! Everything a cook produces is written to the graph in a single commit at
//! the end; in between, the node only moves through its states. Cooks of
//! different nodes run concurrently; the loader guarantees at most one cook
//! per node at a time.

mod error;
mod format;
mod template;

pub use error::{CookError, CookErrorKind, CookWarning, WarningKind};
pub use template::{ContentTemplate, Edit, Slot, TemplateError};

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigHandle, GalleyConfig};
use crate::core::{BuildMode, ContentKind, CookState, ResourceUrl, SpecifierKind};
use crate::graph::{Content, HotPolicy, Mention, Reference, UrlGraph, UrlId};
use crate::plugin::{
    Claimed, FormatRequest, HookContext, HookError, OptimizeContext, PluginController,
    PluginFailure, Resolution, ResolveRequest, TransformContext, TransformOutput,
};
use crate::sourcemap::{Link, Position, SourcemapChain};
use crate::utils::mime;
use crate::debug;
use format::TargetView;

/// Runs cooks, optimize passes and re-renders against one graph.
pub struct Kitchen {
    graph: Arc<UrlGraph>,
    plugins: Arc<PluginController>,
    config: ConfigHandle,
    mode: BuildMode,
}

/// Result of the load phase.
struct Loaded {
    content: Content,
    content_type: String,
    kind: ContentKind,
    subtype: Option<String>,
}

/// Result of the transform phase.
struct Transformed {
    content: Content,
    content_type: String,
    kind: ContentKind,
    template: Option<ContentTemplate>,
    chain: SourcemapChain,
    mentions: Vec<(Mention, Arc<str>)>,
    hot: HotPolicy,
}

impl Kitchen {
    pub fn new(
        graph: Arc<UrlGraph>,
        plugins: Arc<PluginController>,
        config: ConfigHandle,
        mode: BuildMode,
    ) -> Self {
        Self {
            graph,
            plugins,
            config,
            mode,
        }
    }

    #[inline]
    pub fn graph(&self) -> &Arc<UrlGraph> {
        &self.graph
    }

    #[inline]
    pub fn plugins(&self) -> &Arc<PluginController> {
        &self.plugins
    }

    #[inline]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    #[inline]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    // ========================================================================
    // Cook
    // ========================================================================

    /// Cook node `id`: load, transform, resolve references, render, commit.
    ///
    /// On failure the node is `errored` (in non-fatal modes its content
    /// becomes the JSON error payload). On cancellation the node is left as-is.
    /// If the node is purged before the cook commits, nothing is written and
    /// a `Superseded` error is returned.
    pub async fn cook(&self, id: UrlId, cancel: &CancellationToken) -> Result<(), CookError> {
        let (url, epoch) = self.graph.read(id, |node| (node.url.clone(), node.epoch));
        if cancel.is_cancelled() {
            return Err(CookError::cancelled(url));
        }

        let config = self.config.get();
        let ctx = HookContext {
            mode: self.mode,
            root: self.graph.root(),
            config: &config,
            graph: &self.graph,
            cancel,
        };

        let mut warnings = Vec::new();
        let result = self.cook_phases(ctx, id, epoch, &url, &mut warnings).await;
        match result {
            Ok(()) => {
                if !warnings.is_empty() {
                    debug!("kitchen"; "{} warning(s) for {}", warnings.len(), url);
                }
                self.graph.update(id, |node| {
                    if node.epoch == epoch {
                        node.warnings = warnings;
                    }
                });
                Ok(())
            }
            Err(err) if err.is_cancelled() || err.is_superseded() => Err(err),
            Err(err) => Err(self.fail(id, epoch, err)),
        }
    }

    async fn cook_phases(
        &self,
        ctx: HookContext<'_>,
        id: UrlId,
        epoch: u64,
        url: &ResourceUrl,
        warnings: &mut Vec<CookWarning>,
    ) -> Result<(), CookError> {
        self.transition(id, epoch, CookState::Loading)?;
        let loaded = self.load(ctx, id, url, warnings).await?;
        let original = loaded.content.clone();
        let subtype = loaded.subtype.clone();

        self.transition(id, epoch, CookState::Loaded)?;
        self.transition(id, epoch, CookState::Transforming)?;
        let transformed = self.transform(ctx, url, loaded, warnings).await?;

        self.transition(id, epoch, CookState::Resolving)?;
        let mut references = self.resolve(ctx, url, &transformed, warnings).await?;
        for reference in &mut references {
            reference.generated_specifier = Some(self.specifier_for(ctx.config, reference));
        }

        let Transformed {
            content,
            content_type,
            kind,
            template,
            mut chain,
            hot,
            ..
        } = transformed;

        let content = match &template {
            Some(template) => {
                let (text, map) = template.render(url.as_str(), |slot| {
                    references
                        .get(slot.reference)
                        .and_then(|r| r.generated_specifier.clone())
                });
                chain.set_render(map);
                Content::text(text)
            }
            None => content,
        };

        let committed = self.graph.commit_at(id, epoch, references, |node| {
            debug_assert!(node.state.can_transition_to(CookState::Cooked));
            node.kind = Some(kind);
            node.subtype = subtype;
            node.content_type = Some(content_type);
            node.content = Some(content);
            node.original_content = Some(original);
            node.template = template.map(Arc::new);
            node.sourcemap = chain;
            node.hot = hot;
            node.version = None;
            node.error = None;
            node.state = CookState::Cooked;
        });
        if committed.is_none() {
            return Err(CookError::superseded(url.clone()));
        }
        debug!("kitchen"; "cooked {} as {}", url, kind);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------------

    async fn load(
        &self,
        ctx: HookContext<'_>,
        id: UrlId,
        url: &ResourceUrl,
        warnings: &mut Vec<CookWarning>,
    ) -> Result<Loaded, CookError> {
        let claimed = cancellable(ctx.cancel, url, self.plugins.load(ctx, url))
            .await?
            .map_err(|failure| {
                hook_failure(CookErrorKind::Load, url, failure, &SourcemapChain::new())
            })?;
        let Some(Claimed {
            value: output,
            plugin,
        }) = claimed
        else {
            return Err(CookError::new(
                CookErrorKind::Load,
                url.clone(),
                "no loader produced content",
            ));
        };

        let extension = url.extension();
        let mut kind = output.kind.unwrap_or_else(|| match &output.content_type {
            Some(content_type) => ContentKind::from_content_type(content_type),
            None => ContentKind::from_extension(extension.as_deref()),
        });
        let content_type = output
            .content_type
            .unwrap_or_else(|| mime::from_extension(extension.as_deref()).to_string());

        let mut content = output.content;
        if kind.is_text()
            && let Content::Binary(bytes) = &content
        {
            match std::str::from_utf8(bytes) {
                Ok(text) => content = Content::text(text),
                Err(_) => {
                    debug!("kitchen"; "{} from {} is not UTF-8, treating as asset", url, plugin);
                    kind = ContentKind::Asset;
                }
            }
        }

        // referencing parents know better which JS flavor this is
        let mut expected: Vec<ContentKind> = self
            .graph
            .incoming(id)
            .iter()
            .filter_map(|r| r.expected_kind)
            .collect();
        expected.sort_unstable();
        expected.dedup();
        for expected_kind in expected {
            if kind.is_js() && expected_kind.is_js() {
                kind = expected_kind;
            } else if !kind.is_compatible_with(expected_kind) {
                warnings.push(CookWarning::new(
                    WarningKind::ContentTypeMismatch,
                    format!("loaded as {kind} ({content_type}), referenced as {expected_kind}"),
                ));
            }
        }

        Ok(Loaded {
            content,
            content_type,
            kind,
            subtype: output.subtype,
        })
    }

    // ------------------------------------------------------------------------
    // Transform
    // ------------------------------------------------------------------------

    /// Run the transform chain registered for the loaded kind.
    ///
    /// A stage that changes the kind affects later hooks, not the chain in
    /// progress.
    async fn transform(
        &self,
        ctx: HookContext<'_>,
        url: &ResourceUrl,
        loaded: Loaded,
        warnings: &mut Vec<CookWarning>,
    ) -> Result<Transformed, CookError> {
        let Loaded {
            content,
            content_type,
            kind,
            ..
        } = loaded;
        let template = kind
            .is_text()
            .then(|| content.as_text().map(ContentTemplate::new))
            .flatten();
        let mut state = Transformed {
            template,
            content,
            content_type,
            kind,
            chain: SourcemapChain::new(),
            mentions: Vec::new(),
            hot: HotPolicy::default(),
        };

        for (plugin, transformer) in self.plugins.transformers(kind) {
            let stage_input = match &state.template {
                Some(template) => Content::text(template.text()),
                None => state.content.clone(),
            };
            let mut input = TransformContext::new(url.clone(), state.kind, stage_input);
            let output = cancellable(ctx.cancel, url, transformer.transform(ctx, &mut input))
                .await?
                .map_err(|error| {
                    let failure = PluginFailure {
                        plugin: plugin.clone(),
                        error,
                    };
                    hook_failure(CookErrorKind::Transform, url, failure, &state.chain)
                })?;

            let (mut mentions, hot, stage_warnings) = input.finish();
            state.hot.merge(hot);
            warnings.extend(stage_warnings.into_iter().map(|mut warning| {
                warning.plugin = Some(plugin.to_string());
                warning
            }));

            let transform_error = |message: String| {
                CookError::new(CookErrorKind::Transform, url.clone(), message)
                    .with_plugin(&*plugin)
            };

            match output {
                None => {}
                Some(TransformOutput::Edits(edits)) if edits.is_empty() => {}
                Some(TransformOutput::Edits(edits)) => {
                    let Some(template) = state.template.as_mut() else {
                        return Err(transform_error("edits on binary content".into()));
                    };
                    let mut spans: Vec<_> = mentions.iter().map(|m| m.span.clone()).collect();
                    let map = template
                        .apply_edits(edits, &mut spans, url.as_str())
                        .map_err(|e| transform_error(e.to_string()))?;
                    for (mention, span) in mentions.iter_mut().zip(spans) {
                        mention.span = span;
                    }
                    state.chain.push_transform(Link::Map(Arc::new(map)));
                }
                Some(TransformOutput::Replace(replacement)) => {
                    if let Some(kind) = replacement.kind {
                        state.kind = kind;
                    }
                    if let Some(content_type) = replacement.content_type {
                        state.content_type = content_type;
                    }
                    state.chain.push_transform(
                        replacement
                            .sourcemap
                            .map_or(Link::Opaque, |map| Link::Map(Arc::new(map))),
                    );

                    let dropped = match &replacement.content {
                        Content::Text(text) => match state.template.as_mut() {
                            Some(template) => template.replace(&**text),
                            None => {
                                state.template = Some(ContentTemplate::new(&**text));
                                0
                            }
                        },
                        Content::Binary(_) => state.template.take().map_or(0, |t| t.slots().len()),
                    };
                    if dropped > 0 {
                        debug!(
                            "kitchen";
                            "{} replaced {} in full, {} reference(s) no longer rewritable",
                            plugin, url, dropped
                        );
                    }
                    state.content = replacement.content;
                }
            }

            for mention in mentions {
                if let Some(template) = state.template.as_mut() {
                    template
                        .add_slot(mention.span.clone(), state.mentions.len())
                        .map_err(|e| transform_error(e.to_string()))?;
                }
                state.mentions.push((mention, plugin.clone()));
            }
        }

        Ok(state)
    }

    // ------------------------------------------------------------------------
    // Resolve
    // ------------------------------------------------------------------------

    async fn resolve(
        &self,
        ctx: HookContext<'_>,
        url: &ResourceUrl,
        transformed: &Transformed,
        warnings: &mut Vec<CookWarning>,
    ) -> Result<Vec<Reference>, CookError> {
        let mut references = Vec::with_capacity(transformed.mentions.len());

        for (index, (mention, owner)) in transformed.mentions.iter().enumerate() {
            let mut reference = Reference::from_mention(url.clone(), mention, owner.clone());
            let slot = transformed
                .template
                .as_ref()
                .and_then(|t| t.slot_for(index).map(|s| (t, s)));
            reference.span = slot.map(|(_, s)| s.range.clone());
            reference.fragment = mention
                .specifier
                .split_once('#')
                .map(|(_, fragment)| fragment.to_string());

            let position = || {
                slot.and_then(|(template, slot)| {
                    let at = Position::of_offset(template.text(), slot.range.start);
                    transformed.chain.original_position(at)
                })
            };

            match SpecifierKind::parse(&mention.specifier, mention.kind.is_js_import()) {
                SpecifierKind::Inert(_) | SpecifierKind::Fragment(_) => reference.external = true,
                _ => {
                    let request = ResolveRequest::for_reference(&reference);
                    let resolved = cancellable(ctx.cancel, url, self.plugins.resolve(ctx, &request))
                        .await?
                        .map_err(|failure| {
                            hook_failure(
                                CookErrorKind::Resolution,
                                url,
                                failure,
                                &transformed.chain,
                            )
                            .with_specifier(&mention.specifier)
                            .with_position(position())
                        })?;

                    match resolved.map(|claimed| claimed.value) {
                        Some(Resolution::Url(target)) => reference.url = Some(target),
                        Some(Resolution::External) => reference.external = true,
                        None if reference.is_resource_hint => {
                            warnings.push(CookWarning::new(
                                WarningKind::UnresolvedResourceHint,
                                format!("resource hint `{}` was not resolved", mention.specifier),
                            ));
                        }
                        None => {
                            return Err(CookError::new(
                                CookErrorKind::Resolution,
                                url.clone(),
                                format!("cannot resolve {} reference", mention.kind),
                            )
                            .with_plugin(&**owner)
                            .with_specifier(&mention.specifier)
                            .with_position(position()));
                        }
                    }
                }
            }
            references.push(reference);
        }

        Ok(references)
    }

    /// Generated specifier of `reference`: owning plugin, other formatters,
    /// then the mode default.
    fn specifier_for(&self, config: &GalleyConfig, reference: &Reference) -> String {
        let target = reference
            .url
            .as_ref()
            .filter(|_| !reference.external)
            .and_then(|url| self.graph.id_of(url))
            .map(|id| {
                self.graph
                    .read(id, |node| (node.generated_url.clone(), node.version.clone()))
            });
        let (generated_url, version) = target.unwrap_or_default();
        let view = TargetView {
            generated_url: generated_url.as_ref(),
            version: version.as_deref(),
        };

        let out_url = config.out_url().ok();
        let default = format::default_specifier(
            config,
            self.graph.root(),
            out_url.as_ref(),
            reference,
            &view,
        );
        let request = FormatRequest {
            mode: self.mode,
            root: self.graph.root(),
            reference,
            generated_url: view.generated_url,
            version: view.version,
            default: &default,
        };
        self.plugins
            .format(reference.owner.as_deref(), &request)
            .unwrap_or(default)
    }

    // ========================================================================
    // Post-cook passes (build)
    // ========================================================================

    /// Re-render node `id` from its template with current target URLs.
    ///
    /// Used by the versioner once every generated URL is final. Drops
    /// optimize fragments, since the content is rebuilt from the template.
    pub fn rewrite(&self, id: UrlId) {
        let (url, template, mut references, epoch) = self.graph.read(id, |node| {
            (
                node.url.clone(),
                node.template.clone(),
                node.references.clone(),
                node.epoch,
            )
        });
        let Some(template) = template else {
            return;
        };

        let config = self.config.get();
        for reference in &mut references {
            reference.generated_specifier = Some(self.specifier_for(&config, reference));
        }
        let (text, map) = template.render(url.as_str(), |slot| {
            references
                .get(slot.reference)
                .and_then(|r| r.generated_specifier.clone())
        });

        self.graph.update(id, |node| {
            if node.epoch != epoch {
                return;
            }
            for (current, rewritten) in node.references.iter_mut().zip(references) {
                current.generated_specifier = rewritten.generated_specifier;
            }
            node.content = Some(Content::text(text));
            node.sourcemap.set_render(map);
            node.sourcemap.clear_optimizations();
        });
    }

    /// Run the optimize chain over a cooked node.
    pub async fn optimize(&self, id: UrlId, cancel: &CancellationToken) -> Result<(), CookError> {
        let (url, kind, content, state, epoch) = self.graph.read(id, |node| {
            (
                node.url.clone(),
                node.kind,
                node.content.clone(),
                node.state,
                node.epoch,
            )
        });
        let (Some(kind), Some(mut content)) = (kind, content) else {
            return Ok(());
        };
        if state != CookState::Cooked {
            return Ok(());
        }
        let optimizers = self.plugins.optimizers(kind);
        if optimizers.is_empty() {
            return Ok(());
        }

        let config = self.config.get();
        let ctx = HookContext {
            mode: self.mode,
            root: self.graph.root(),
            config: &config,
            graph: &self.graph,
            cancel,
        };

        self.transition(id, epoch, CookState::Optimizing)?;
        let mut links = Vec::new();
        for (plugin, optimizer) in optimizers {
            let input = OptimizeContext {
                url: url.clone(),
                kind,
                content: content.clone(),
            };
            let result = cancellable(cancel, &url, optimizer.optimize(ctx, &input)).await?;
            match result {
                Ok(Some(replacement)) => {
                    content = replacement.content;
                    links.push(
                        replacement
                            .sourcemap
                            .map_or(Link::Opaque, |map| Link::Map(Arc::new(map))),
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    let failure = PluginFailure { plugin, error };
                    let err =
                        hook_failure(CookErrorKind::Optimize, &url, failure, &SourcemapChain::new());
                    return Err(self.fail(id, epoch, err));
                }
            }
        }

        let current = self.graph.update(id, |node| {
            if node.epoch != epoch {
                return false;
            }
            node.content = Some(content);
            for link in links {
                node.sourcemap.push_optimization(link);
            }
            node.state = CookState::Cooked;
            true
        });
        if !current {
            return Err(CookError::superseded(url));
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Move the node to `next`, unless it was purged since `epoch`.
    fn transition(&self, id: UrlId, epoch: u64, next: CookState) -> Result<(), CookError> {
        self.graph.update(id, |node| {
            if node.epoch != epoch {
                return Err(CookError::superseded(node.url.clone()));
            }
            debug_assert!(
                node.state.can_transition_to(next),
                "illegal transition {} -> {} for {}",
                node.state,
                next,
                node.url
            );
            node.state = next;
            Ok(())
        })
    }

    /// Record `err` on the node and hand it back with its reference trace.
    ///
    /// A node purged since `epoch` is left alone and `Superseded` is returned.
    fn fail(&self, id: UrlId, epoch: u64, err: CookError) -> CookError {
        let err = if err.trace.is_empty() {
            let trace = self.graph.reference_trace(id);
            err.with_trace(trace)
        } else {
            err
        };

        let fatal = self.mode.fatal_errors;
        let current = self.graph.update(id, |node| {
            if node.epoch != epoch {
                return false;
            }
            node.state = CookState::Errored;
            node.error = Some(err.clone());
            if !fatal {
                node.content = Some(Content::text(err.to_payload()));
                node.content_type = Some(mime::types::ERROR_PAYLOAD.to_string());
                node.template = None;
            }
            true
        });
        if !current {
            return CookError::superseded(err.url);
        }
        debug!("kitchen"; "{}", err);
        err
    }
}

/// Await `future` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    url: &ResourceUrl,
    future: impl Future<Output = T>,
) -> Result<T, CookError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CookError::cancelled(url.clone())),
        output = future => Ok(output),
    }
}

/// Turn a plugin failure into a cook error of `kind`.
///
/// Parse positions are mapped back to the loaded content through `chain`.
fn hook_failure(
    kind: CookErrorKind,
    url: &ResourceUrl,
    failure: PluginFailure,
    chain: &SourcemapChain,
) -> CookError {
    let PluginFailure { plugin, error } = failure;
    let err = match error {
        HookError::Parse { message, position } => {
            CookError::new(CookErrorKind::Parse, url.clone(), message)
                .with_position(position.and_then(|p| chain.original_position(p)))
        }
        HookError::Failed(source) => CookError::new(kind, url.clone(), format!("{source:#}")),
        HookError::Cancelled => return CookError::cancelled(url.clone()),
    };
    err.with_plugin(&*plugin)
}

#[cfg(test)]
mod tests;
