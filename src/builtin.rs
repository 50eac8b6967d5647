//! Format-agnostic plugins every session needs.
//!
//! | Plugin             | Hook     | Handles                                     |
//! |--------------------|----------|---------------------------------------------|
//! | `url_resolution()` | resolve  | relative, root-relative and absolute URLs   |
//! | `file_loader()`    | load     | `file://` URLs, read with `tokio::fs`       |
//!
//! Bare specifiers (`lodash`) are left to other resolvers.

use anyhow::{Context, anyhow};
use async_trait::async_trait;

use crate::core::{ResourceUrl, SpecifierKind};
use crate::graph::Content;
use crate::plugin::{
    HookContext, HookResult, LoadOutput, Loader, Plugin, Resolution, ResolveRequest, Resolver,
};
use crate::utils::mime;

/// WHATWG URL resolution against the parent (or the project root for `/x`).
pub fn url_resolution() -> Plugin {
    Plugin::new("url-resolution").resolver(UrlResolution)
}

/// Loads `file://` URLs from disk.
pub fn file_loader() -> Plugin {
    Plugin::new("file-loader").loader(FileLoader)
}

struct UrlResolution;

#[async_trait]
impl Resolver for UrlResolution {
    async fn resolve(
        &self,
        ctx: HookContext<'_>,
        request: &ResolveRequest,
    ) -> HookResult<Option<Resolution>> {
        let kind = SpecifierKind::parse(&request.specifier, request.kind.is_js_import());
        if kind.is_external() {
            return Ok(Some(Resolution::External));
        }

        let joined = match kind {
            SpecifierKind::Bare(_) => return Ok(None),
            SpecifierKind::Inert(_) | SpecifierKind::Fragment(_) => {
                return Ok(Some(Resolution::External));
            }
            SpecifierKind::RootRelative(path) => ctx.root.join(path),
            SpecifierKind::Absolute(specifier) | SpecifierKind::Relative(specifier) => {
                request.parent.join(specifier)
            }
        };
        let (url, _fragment) = joined.map_err(|err| {
            anyhow!("invalid specifier `{}`: {err}", request.specifier)
        })?;
        Ok(Some(Resolution::Url(url)))
    }
}

struct FileLoader;

#[async_trait]
impl Loader for FileLoader {
    async fn load(
        &self,
        _ctx: HookContext<'_>,
        url: &ResourceUrl,
    ) -> HookResult<Option<LoadOutput>> {
        if url.scheme() != "file" {
            return Ok(None);
        }
        let Some(path) = url.to_file_path() else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read `{}`", path.display()))?;

        let content_type = mime::from_extension(url.extension().as_deref());
        let content = if mime::is_text(content_type) {
            match String::from_utf8(bytes) {
                Ok(text) => Content::text(text),
                Err(err) => Content::binary(err.into_bytes()),
            }
        } else {
            Content::binary(bytes)
        };
        Ok(Some(LoadOutput::new(content).content_type(content_type)))
    }
}
