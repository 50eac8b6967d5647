//! Test fixtures: an in-memory project plus regex reference scanners.
//!
//! ```text
//! Fixture
//! ├── MemoryFiles   # file:///project/<path> -> text, load counters, delays
//! ├── plugins       # memory-loader, html, js, css, url-resolution
//! └── Kitchen + UrlGraphLoader over a fresh UrlGraph
//! ```
//!
//! The scanners only understand the handful of syntaxes the tests use.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::builtin::url_resolution;
use crate::config::{ConfigHandle, GalleyConfig, test_parse_config};
use crate::core::{BuildMode, ContentKind, ResourceUrl};
use crate::graph::{HotPolicy, Mention, ReferenceKind, UrlGraph, UrlId};
use crate::kitchen::Kitchen;
use crate::loader::{LoadOptions, UrlGraphLoader};
use crate::plugin::{
    HookContext, HookResult, LoadOutput, Loader, Plugin, PluginController, TransformContext,
    TransformOutput, Transformer,
};
use crate::utils::mime;

pub const ROOT: &str = "file:///project/";

/// `file:///project/<path>`.
pub fn file(path: &str) -> ResourceUrl {
    ResourceUrl::parse(&format!("{ROOT}{path}")).unwrap()
}

// ============================================================================
// In-memory files
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryFiles {
    files: Arc<RwLock<FxHashMap<String, String>>>,
    loads: Arc<RwLock<FxHashMap<String, usize>>>,
    delays: Arc<RwLock<FxHashMap<String, Duration>>>,
    /// Loads in flight per path: (current, highest seen).
    in_flight: Arc<RwLock<FxHashMap<String, (usize, usize)>>>,
}

impl MemoryFiles {
    pub fn write(&self, path: &str, content: &str) {
        self.files.write().insert(path.to_string(), content.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.write().remove(path);
    }

    pub fn load_count(&self, path: &str) -> usize {
        self.loads.read().get(path).copied().unwrap_or(0)
    }

    /// Make every load of `path` take `delay` before reading the file.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.write().insert(path.to_string(), delay);
    }

    /// Most loads of `path` ever running at once.
    pub fn max_in_flight(&self, path: &str) -> usize {
        self.in_flight.read().get(path).map_or(0, |(_, max)| *max)
    }

    fn enter(&self, path: &str) {
        let mut in_flight = self.in_flight.write();
        let (current, max) = in_flight.entry(path.to_string()).or_default();
        *current += 1;
        *max = (*max).max(*current);
    }

    fn leave(&self, path: &str) {
        if let Some((current, _)) = self.in_flight.write().get_mut(path) {
            *current -= 1;
        }
    }

    fn path_of(url: &ResourceUrl) -> Option<&str> {
        url.without_query().strip_prefix(ROOT)
    }
}

struct MemoryLoader(MemoryFiles);

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(
        &self,
        _ctx: HookContext<'_>,
        url: &ResourceUrl,
    ) -> HookResult<Option<LoadOutput>> {
        let Some(path) = MemoryFiles::path_of(url) else {
            return Ok(None);
        };
        let delay = self.0.delays.read().get(path).copied();
        if let Some(delay) = delay {
            self.0.enter(path);
            tokio::time::sleep(delay).await;
            self.0.leave(path);
        }
        let Some(text) = self.0.files.read().get(path).cloned() else {
            return Ok(None);
        };
        *self.0.loads.write().entry(path.to_string()).or_default() += 1;
        let content_type = mime::from_extension(url.extension().as_deref());
        Ok(Some(LoadOutput::text(text).content_type(content_type)))
    }
}

// ============================================================================
// Scanners
// ============================================================================

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(script|link|img|a)\b([^>]*)>").unwrap());
static HTML_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z-]+)\s*=\s*"([^"]*)""#).unwrap());

/// `<script src>`, `<link href>`, `<img src>`, `<a href>`.
struct HtmlScanner;

#[async_trait]
impl Transformer for HtmlScanner {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        let Some(text) = input.text().map(str::to_owned) else {
            return Ok(None);
        };
        for tag in HTML_TAG.captures_iter(&text) {
            let name = &tag[1];
            let Some(attrs) = tag.get(2) else { continue };
            let mut target = None;
            let mut module = false;
            let mut rel = None;
            for attr in HTML_ATTR.captures_iter(attrs.as_str()) {
                let Some(value) = attr.get(2) else { continue };
                let span = attrs.start() + value.start()..attrs.start() + value.end();
                match &attr[1] {
                    "src" => target = Some((ReferenceKind::HtmlSrc, value.as_str(), span)),
                    "href" => target = Some((ReferenceKind::HtmlHref, value.as_str(), span)),
                    "type" => module = value.as_str() == "module",
                    "rel" => rel = Some(value.as_str()),
                    _ => {}
                }
            }
            let Some((kind, specifier, span)) = target else {
                continue;
            };

            let mut mention = Mention::new(kind, specifier, span);
            mention = match (name, rel) {
                ("script", _) if module => mention.expecting(ContentKind::JsModule),
                ("script", _) => mention.expecting(ContentKind::JsClassic),
                ("link", Some("stylesheet")) => mention.expecting(ContentKind::Css),
                ("link", Some("modulepreload")) => mention
                    .resource_hint()
                    .subtype("modulepreload")
                    .expecting(ContentKind::JsModule),
                ("link", Some(hint @ ("preload" | "prefetch"))) => {
                    mention.resource_hint().subtype(hint)
                }
                _ => mention,
            };
            input.found_reference(mention);
        }
        Ok(None)
    }
}

static JS_STATIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import\s*|(?:import|export)\b[^'"();]*?\bfrom\s*)["']([^"']+)["']"#).unwrap()
});
static JS_DYNAMIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap());
static JS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"new\s+URL\s*\(\s*["']([^"']+)["']\s*,\s*import\.meta\.url\s*\)"#).unwrap()
});
static JS_HOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"import\.meta\.hot\.(accept|decline)\s*\(\s*(\[)?").unwrap());

/// Static/dynamic imports, `new URL(.., import.meta.url)` and `import.meta.hot`.
struct JsScanner;

#[async_trait]
impl Transformer for JsScanner {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        let Some(text) = input.text().map(str::to_owned) else {
            return Ok(None);
        };
        let found = [
            (&*JS_STATIC, ReferenceKind::JsImportStatic),
            (&*JS_DYNAMIC, ReferenceKind::JsImportDynamic),
            (&*JS_URL, ReferenceKind::JsUrl),
        ];
        for (regex, kind) in found {
            for capture in regex.captures_iter(&text) {
                let Some(specifier) = capture.get(1) else { continue };
                let mut mention = Mention::new(kind, specifier.as_str(), specifier.range());
                if kind != ReferenceKind::JsUrl {
                    mention = mention.expecting(ContentKind::JsModule);
                }
                input.found_reference(mention);
            }
        }

        for capture in JS_HOT.captures_iter(&text) {
            let mut policy = HotPolicy::default();
            match (&capture[1], capture.get(2).is_some()) {
                ("decline", _) => policy.decline = true,
                ("accept", true) => policy.accept_dependencies = true,
                _ => policy.accept_self = true,
            }
            input.set_hot(policy);
        }
        Ok(None)
    }
}

static CSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+["']([^"']+)["']"#).unwrap());
static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*["']?([^"')\s]+)["']?\s*\)"#).unwrap());

/// `@import "..."` and `url(...)`. Stylesheets accept their own updates.
struct CssScanner;

#[async_trait]
impl Transformer for CssScanner {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        let Some(text) = input.text().map(str::to_owned) else {
            return Ok(None);
        };
        for capture in CSS_IMPORT.captures_iter(&text) {
            let Some(specifier) = capture.get(1) else { continue };
            input.found_reference(
                Mention::new(ReferenceKind::CssImport, specifier.as_str(), specifier.range())
                    .expecting(ContentKind::Css),
            );
        }
        for capture in CSS_URL.captures_iter(&text) {
            let Some(specifier) = capture.get(1) else { continue };
            input.found_reference(Mention::new(
                ReferenceKind::CssUrl,
                specifier.as_str(),
                specifier.range(),
            ));
        }
        input.set_hot(HotPolicy::accepting_self());
        Ok(None)
    }
}

/// Loader, scanners and URL resolution, in that order.
pub fn standard_plugins(files: &MemoryFiles) -> Vec<Plugin> {
    vec![
        Plugin::new("memory-loader").loader(MemoryLoader(files.clone())),
        Plugin::new("html").transformer(ContentKind::Html, HtmlScanner),
        Plugin::new("js")
            .transformer(ContentKind::JsModule, JsScanner)
            .transformer(ContentKind::JsClassic, JsScanner),
        Plugin::new("css").transformer(ContentKind::Css, CssScanner),
        url_resolution(),
    ]
}

// ============================================================================
// Fixture
// ============================================================================

/// A project rooted at `file:///project/` with every engine layer wired up.
pub struct Fixture {
    pub mode: BuildMode,
    files: MemoryFiles,
    config: ConfigHandle,
    kitchen: Arc<Kitchen>,
    loader: Arc<UrlGraphLoader>,
}

impl Fixture {
    pub fn new(mode: BuildMode) -> Self {
        Self::build(mode, "", standard_plugins)
    }

    /// Fixture with `galley.toml` content `config` and custom plugins.
    pub fn build(
        mode: BuildMode,
        config: &str,
        plugins: impl FnOnce(&MemoryFiles) -> Vec<Plugin>,
    ) -> Self {
        let files = MemoryFiles::default();
        let config = project_config(config);
        let options = LoadOptions::for_mode(mode, &config);
        let config = ConfigHandle::new(config);

        let graph = Arc::new(UrlGraph::new(file("")));
        let controller = Arc::new(PluginController::new(plugins(&files), mode));
        let kitchen = Arc::new(Kitchen::new(graph, controller, config.clone(), mode));
        let loader = Arc::new(UrlGraphLoader::new(
            Arc::clone(&kitchen),
            options,
            64,
            CancellationToken::new(),
        ));

        Self {
            mode,
            files,
            config,
            kitchen,
            loader,
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files.write(path, content);
        self
    }

    pub fn with_files(self, files: &[(&str, &str)]) -> Self {
        for (path, content) in files {
            self.files.write(path, content);
        }
        self
    }

    pub fn write(&self, path: &str, content: &str) {
        self.files.write(path, content);
    }

    pub fn files(&self) -> &MemoryFiles {
        &self.files
    }

    /// Register `path` as an entry document.
    pub fn entry(&self, path: &str) -> UrlId {
        self.graph().add_entry(&file(path))
    }

    pub fn node(&self, path: &str) -> UrlId {
        self.graph().reuse_or_create_url_info(&file(path))
    }

    pub fn graph(&self) -> &Arc<UrlGraph> {
        self.kitchen.graph()
    }

    pub fn kitchen(&self) -> &Arc<Kitchen> {
        &self.kitchen
    }

    pub fn loader(&self) -> Arc<UrlGraphLoader> {
        Arc::clone(&self.loader)
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn load_count(&self, path: &str) -> usize {
        self.files.load_count(path)
    }

    /// Text content of the node for `path`.
    pub fn text(&self, path: &str) -> Option<String> {
        let id = self.graph().id_of(&file(path))?;
        self.graph().read(id, |node| node.text().map(str::to_owned))
    }
}

/// Parsed `galley.toml` rooted at `/project`.
pub fn project_config(toml: &str) -> GalleyConfig {
    test_parse_config(toml)
}
