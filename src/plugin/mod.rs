//! Plugin contract and registry.
//!
//! # Module Structure
//!
//! ```text
//! plugin/
//! ├── hooks       # Resolver, Loader, Transformer, Optimizer, SpecifierFormatter
//! ├── controller  # PluginController: ordered dispatch for one session
//! └── mod.rs      # Plugin builder (this file)
//! ```
//!
//! A plugin is a name, a mode predicate and a set of hook registrations:
//!
//! ```ignore
//! let css = Plugin::new("css")
//!     .applies_during(|mode| mode.is_build())
//!     .transformer(ContentKind::Css, CssScanner)
//!     .optimizer(ContentKind::Css, CssMinifier);
//! ```

mod controller;
mod hooks;

pub use controller::{Claimed, PluginController, PluginFailure};
pub use hooks::{
    FormatRequest, HookContext, HookError, HookResult, LoadOutput, Loader, OptimizeContext,
    Optimizer, Replacement, Resolution, ResolveRequest, Resolver, SpecifierFormatter,
    TransformContext, TransformOutput, Transformer,
};

use std::fmt;
use std::sync::Arc;

use crate::core::{BuildMode, ContentKind};
use crate::graph::ReferenceKind;

type ModePredicate = Box<dyn Fn(&BuildMode) -> bool + Send + Sync>;

/// A named set of hooks.
pub struct Plugin {
    name: Arc<str>,
    applies: Option<ModePredicate>,
    resolvers: Vec<(Option<ReferenceKind>, Arc<dyn Resolver>)>,
    loader: Option<Arc<dyn Loader>>,
    transformers: Vec<(ContentKind, Arc<dyn Transformer>)>,
    optimizers: Vec<(ContentKind, Arc<dyn Optimizer>)>,
    formatter: Option<Arc<dyn SpecifierFormatter>>,
}

impl Plugin {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            applies: None,
            resolvers: Vec::new(),
            loader: None,
            transformers: Vec::new(),
            optimizers: Vec::new(),
            formatter: None,
        }
    }

    /// Only take part in sessions whose mode satisfies `predicate`.
    pub fn applies_during(
        mut self,
        predicate: impl Fn(&BuildMode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.applies = Some(Box::new(predicate));
        self
    }

    /// Resolver consulted for every reference kind.
    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push((None, Arc::new(resolver)));
        self
    }

    /// Resolver consulted only for references of `kind`.
    pub fn resolver_for(mut self, kind: ReferenceKind, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push((Some(kind), Arc::new(resolver)));
        self
    }

    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn transformer(mut self, kind: ContentKind, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push((kind, Arc::new(transformer)));
        self
    }

    pub fn optimizer(mut self, kind: ContentKind, optimizer: impl Optimizer + 'static) -> Self {
        self.optimizers.push((kind, Arc::new(optimizer)));
        self
    }

    pub fn formatter(mut self, formatter: impl SpecifierFormatter + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the plugin takes part in a session running in `mode`.
    pub fn applies_to(&self, mode: &BuildMode) -> bool {
        self.applies.as_ref().is_none_or(|predicate| predicate(mode))
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("resolvers", &self.resolvers.len())
            .field("loader", &self.loader.is_some())
            .field(
                "transformers",
                &self.transformers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field(
                "optimizers",
                &self.optimizers.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}
