//! Ordered hook dispatch for one session.
//!
//! The mode predicate of every plugin is evaluated once, when the controller
//! is built; dispatch afterwards only walks the surviving plugins in
//! registration order.

use std::sync::Arc;

use super::hooks::{
    FormatRequest, HookContext, HookError, LoadOutput, Optimizer, Resolution, ResolveRequest,
    Transformer,
};
use super::Plugin;
use crate::core::{BuildMode, ContentKind, ResourceUrl};
use crate::debug;

/// A hook result together with the plugin that produced it.
#[derive(Debug, Clone)]
pub struct Claimed<T> {
    pub value: T,
    pub plugin: Arc<str>,
}

/// A hook failure together with the plugin that raised it.
#[derive(Debug)]
pub struct PluginFailure {
    pub plugin: Arc<str>,
    pub error: HookError,
}

/// The plugins active in one session, in registration order.
#[derive(Debug)]
pub struct PluginController {
    plugins: Vec<Plugin>,
    mode: BuildMode,
}

impl PluginController {
    pub fn new(plugins: Vec<Plugin>, mode: BuildMode) -> Self {
        let total = plugins.len();
        let plugins: Vec<_> = plugins.into_iter().filter(|p| p.applies_to(&mode)).collect();
        debug!(
            "plugin";
            "{}/{} plugins active for {:?}: {}",
            plugins.len(),
            total,
            mode.kind,
            plugins.iter().map(Plugin::name).collect::<Vec<_>>().join(", ")
        );
        Self { plugins, mode }
    }

    #[inline]
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    /// First resolver returning a resolution wins.
    pub async fn resolve(
        &self,
        ctx: HookContext<'_>,
        request: &ResolveRequest,
    ) -> Result<Option<Claimed<Resolution>>, PluginFailure> {
        for plugin in &self.plugins {
            for (kind, resolver) in &plugin.resolvers {
                if kind.is_some_and(|k| k != request.kind) {
                    continue;
                }
                match resolver.resolve(ctx, request).await {
                    Ok(Some(value)) => {
                        return Ok(Some(Claimed {
                            value,
                            plugin: plugin.name.clone(),
                        }));
                    }
                    Ok(None) => {}
                    Err(error) => {
                        return Err(PluginFailure {
                            plugin: plugin.name.clone(),
                            error,
                        });
                    }
                }
            }
        }
        Ok(None)
    }

    /// First loader returning content wins.
    pub async fn load(
        &self,
        ctx: HookContext<'_>,
        url: &ResourceUrl,
    ) -> Result<Option<Claimed<LoadOutput>>, PluginFailure> {
        for plugin in &self.plugins {
            let Some(loader) = &plugin.loader else {
                continue;
            };
            match loader.load(ctx, url).await {
                Ok(Some(value)) => {
                    return Ok(Some(Claimed {
                        value,
                        plugin: plugin.name.clone(),
                    }));
                }
                Ok(None) => {}
                Err(error) => {
                    return Err(PluginFailure {
                        plugin: plugin.name.clone(),
                        error,
                    });
                }
            }
        }
        Ok(None)
    }

    /// Transform stages registered for `kind`, in order.
    pub fn transformers(&self, kind: ContentKind) -> Vec<(Arc<str>, Arc<dyn Transformer>)> {
        self.plugins
            .iter()
            .flat_map(|plugin| {
                plugin
                    .transformers
                    .iter()
                    .filter(move |(k, _)| *k == kind)
                    .map(move |(_, t)| (plugin.name.clone(), t.clone()))
            })
            .collect()
    }

    /// Optimize stages registered for `kind`, in order.
    pub fn optimizers(&self, kind: ContentKind) -> Vec<(Arc<str>, Arc<dyn Optimizer>)> {
        self.plugins
            .iter()
            .flat_map(|plugin| {
                plugin
                    .optimizers
                    .iter()
                    .filter(move |(k, _)| *k == kind)
                    .map(move |(_, o)| (plugin.name.clone(), o.clone()))
            })
            .collect()
    }

    /// Generated specifier from the owning plugin, then from any other formatter.
    pub fn format(&self, owner: Option<&str>, request: &FormatRequest<'_>) -> Option<String> {
        let owned = owner.and_then(|name| self.plugins.iter().find(|p| &*p.name == name));
        if let Some(specifier) = owned
            .and_then(|p| p.formatter.as_ref())
            .and_then(|f| f.format(request))
        {
            return Some(specifier);
        }
        self.plugins
            .iter()
            .filter(|p| owner.is_none_or(|name| &*p.name != name))
            .filter_map(|p| p.formatter.as_ref())
            .find_map(|f| f.format(request))
    }
}
