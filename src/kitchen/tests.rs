use super::*;
use crate::core::BuildMode;
use crate::graph::ReferenceKind;
use crate::plugin::{HookResult, Optimizer, Plugin, Replacement, Resolver, Transformer};
use crate::testing::{Fixture, MemoryFiles, file, standard_plugins};
use async_trait::async_trait;

async fn cook_all(fixture: &Fixture, entry: &str) -> crate::loader::LoadSummary {
    let loader = fixture.loader();
    loader.load(fixture.entry(entry));
    loader.all_done(&CancellationToken::new()).await.unwrap()
}

async fn cook_one(fixture: &Fixture, path: &str) -> Result<(), CookError> {
    let id = fixture.node(path);
    fixture.kitchen().cook(id, &CancellationToken::new()).await
}

// ============================================================================
// Test plugins
// ============================================================================

/// Prepends a comment line through a position-based edit.
struct Banner;

#[async_trait]
impl Transformer for Banner {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        _input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        Ok(Some(TransformOutput::Edits(vec![Edit::insert(
            0,
            "/* banner */\n",
        )])))
    }
}

/// Compiles `.txt` "sources" into a module that imports `./util.js`.
struct Compile;

#[async_trait]
impl Transformer for Compile {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        let output = "import \"./util.js\";\n";
        input.found_reference(Mention::new(ReferenceKind::JsImportStatic, "./util.js", 8..17));
        Ok(Some(TransformOutput::Replace(
            Replacement::new(Content::text(output))
                .with_kind(ContentKind::JsModule, mime::types::JAVASCRIPT),
        )))
    }
}

/// Reports a parse error at line 2, column 3 of its input.
struct Unparsable;

#[async_trait]
impl Transformer for Unparsable {
    async fn transform(
        &self,
        _ctx: HookContext<'_>,
        _input: &mut TransformContext,
    ) -> HookResult<Option<TransformOutput>> {
        Err(HookError::parse("unexpected token", Some(Position::new(1, 2))))
    }
}

/// Collapses whitespace, without a source map.
struct Squash;

#[async_trait]
impl Optimizer for Squash {
    async fn optimize(
        &self,
        _ctx: HookContext<'_>,
        input: &OptimizeContext,
    ) -> HookResult<Option<Replacement>> {
        let Some(text) = input.text() else {
            return Ok(None);
        };
        let squashed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(Some(Replacement::new(Content::text(squashed))))
    }
}

/// Resolves `<script src>` only.
struct ScriptsOnly;

#[async_trait]
impl Resolver for ScriptsOnly {
    async fn resolve(
        &self,
        _ctx: HookContext<'_>,
        request: &ResolveRequest,
    ) -> HookResult<Option<Resolution>> {
        if request.kind != ReferenceKind::HtmlSrc {
            return Ok(None);
        }
        let (url, _) = request.parent.join(&request.specifier).unwrap();
        Ok(Some(Resolution::Url(url)))
    }
}

fn with_plugin_first(plugin: Plugin) -> impl FnOnce(&MemoryFiles) -> Vec<Plugin> {
    move |files| {
        let mut plugins = vec![plugin];
        plugins.extend(standard_plugins(files));
        plugins
    }
}

fn with_plugin_last(plugin: Plugin) -> impl FnOnce(&MemoryFiles) -> Vec<Plugin> {
    move |files| {
        let mut plugins = standard_plugins(files);
        plugins.push(plugin);
        plugins
    }
}

// ============================================================================
// Cook
// ============================================================================

#[tokio::test]
async fn test_cook_rewrites_specifiers() {
    let fixture = Fixture::new(BuildMode::TEST).with_files(&[
        (
            "index.html",
            r#"<script type="module" src="./src/main.js"></script>"#,
        ),
        ("src/main.js", r#"import { x } from "./util.js";"#),
        ("src/util.js", "export const x = 1;"),
    ]);
    let summary = cook_all(&fixture, "index.html").await;
    assert!(summary.failed.is_empty());

    let graph = fixture.graph();
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.stats().edges, 2);
    graph.verify().unwrap();

    assert_eq!(
        fixture.text("index.html").unwrap(),
        r#"<script type="module" src="/src/main.js"></script>"#
    );
    assert_eq!(
        fixture.text("src/main.js").unwrap(),
        r#"import { x } from "/src/util.js";"#
    );

    let main = graph.get_url_info(&file("src/main.js")).unwrap();
    assert_eq!(main.kind, Some(ContentKind::JsModule));
    assert_eq!(main.references.len(), 1);
    assert_eq!(main.references[0].url, Some(file("src/util.js")));
    assert_eq!(main.references[0].owner.as_deref(), Some("js"));
    assert_eq!(
        main.original_content.as_ref().and_then(Content::as_text),
        Some(r#"import { x } from "./util.js";"#)
    );
}

#[tokio::test]
async fn test_recook_is_idempotent() {
    let fixture = Fixture::new(BuildMode::TEST)
        .with_file("a.js", r#"import "./b.js"; import "./b.js";"#);

    cook_one(&fixture, "a.js").await.unwrap();
    let first = fixture.graph().get_url_info(&file("a.js")).unwrap();
    cook_one(&fixture, "a.js").await.unwrap();
    let second = fixture.graph().get_url_info(&file("a.js")).unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(first.references, second.references);
    let b = fixture.graph().id_of(&file("b.js")).unwrap();
    assert_eq!(fixture.graph().read(b, |n| n.incoming.len()), 2);
    fixture.graph().verify().unwrap();
}

#[tokio::test]
async fn test_fragment_is_carried_over() {
    let fixture = Fixture::new(BuildMode::TEST)
        .with_file("index.html", r##"<a href="./guide.html#setup">x</a><a href="#top">y</a>"##);
    cook_one(&fixture, "index.html").await.unwrap();

    assert_eq!(
        fixture.text("index.html").unwrap(),
        r##"<a href="/guide.html#setup">x</a><a href="#top">y</a>"##
    );
    let info = fixture.graph().get_url_info(&file("index.html")).unwrap();
    assert_eq!(info.references[0].url, Some(file("guide.html")));
    assert_eq!(info.references[0].fragment.as_deref(), Some("setup"));
    assert!(info.references[1].external);
    assert_eq!(fixture.graph().len(), 2);
    assert!(
        fixture
            .graph()
            .with_nodes(|nodes| nodes.iter().all(|n| !n.url.as_str().contains('#')))
    );
}

#[tokio::test]
async fn test_edits_shift_references() {
    let fixture = Fixture::build(
        BuildMode::TEST,
        "",
        with_plugin_first(Plugin::new("banner").transformer(ContentKind::JsModule, Banner)),
    )
    .with_file("a.js", r#"import "./b.js";"#);

    cook_one(&fixture, "a.js").await.unwrap();
    assert_eq!(
        fixture.text("a.js").unwrap(),
        "/* banner */\nimport \"/b.js\";"
    );
}

#[tokio::test]
async fn test_resolution_error_maps_position_and_trace() {
    let fixture = Fixture::build(
        BuildMode::TEST,
        "",
        with_plugin_first(Plugin::new("banner").transformer(ContentKind::JsModule, Banner)),
    )
    .with_files(&[
        ("index.html", r#"<script type="module" src="./main.js"></script>"#),
        ("main.js", "import \"lodash\";"),
    ]);
    let summary = cook_all(&fixture, "index.html").await;

    assert_eq!(summary.failed.len(), 1);
    let err = &summary.failed[0];
    assert_eq!(err.kind, CookErrorKind::Resolution);
    assert_eq!(err.url, file("main.js"));
    assert_eq!(err.specifier.as_deref(), Some("lodash"));
    assert_eq!(err.plugin.as_deref(), Some("js"));
    // the banner line is not part of the loaded content
    assert_eq!(err.position, Some(Position::new(0, 8)));
    assert_eq!(err.trace.len(), 1);
    assert_eq!(err.trace[0].parent, file("index.html"));
    assert!(err.to_string().contains("referenced by file:///project/index.html"));

    let main = fixture.graph().get_url_info(&file("main.js")).unwrap();
    assert_eq!(main.state, CookState::Errored);
    // fatal mode keeps the content of the last successful cook (none)
    assert!(main.content.is_none());
}

#[tokio::test]
async fn test_parse_error_names_plugin() {
    let fixture = Fixture::build(
        BuildMode::TEST,
        "",
        with_plugin_last(Plugin::new("strict").transformer(ContentKind::JsModule, Unparsable)),
    )
    .with_file("a.js", "export {}\n  oops");

    let err = cook_one(&fixture, "a.js").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::Parse);
    assert_eq!(err.plugin.as_deref(), Some("strict"));
    assert_eq!(err.position, Some(Position::new(1, 2)));
}

#[tokio::test]
async fn test_dev_error_becomes_payload() {
    let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_file("a.js", "import \"lodash\";");

    let err = cook_one(&fixture, "a.js").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::Resolution);

    let info = fixture.graph().get_url_info(&file("a.js")).unwrap();
    assert_eq!(info.state, CookState::Errored);
    assert_eq!(info.content_type.as_deref(), Some(mime::types::ERROR_PAYLOAD));
    let payload: serde_json::Value = serde_json::from_str(info.text().unwrap()).unwrap();
    assert_eq!(payload["error"]["specifier"], "lodash");
    assert!(payload["summary"].as_str().unwrap().contains("resolution error"));
}

#[tokio::test]
async fn test_missing_file_is_load_error() {
    let fixture = Fixture::new(BuildMode::TEST);
    let err = cook_one(&fixture, "missing.js").await.unwrap_err();
    assert_eq!(err.kind, CookErrorKind::Load);
}

#[tokio::test]
async fn test_unresolved_resource_hint_warns() {
    let fixture = Fixture::build(BuildMode::TEST, "", |files| {
        let mut plugins = standard_plugins(files);
        plugins.retain(|p| p.name() != "url-resolution");
        plugins.push(Plugin::new("scripts").resolver(ScriptsOnly));
        plugins
    })
    .with_file(
        "index.html",
        r#"<link rel="preload" href="./font.woff2"><script src="./a.js"></script>"#,
    );

    cook_one(&fixture, "index.html").await.unwrap();
    let info = fixture.graph().get_url_info(&file("index.html")).unwrap();
    assert_eq!(info.state, CookState::Cooked);
    assert_eq!(info.warnings.len(), 1);
    assert_eq!(info.warnings[0].kind, WarningKind::UnresolvedResourceHint);

    let hint = &info.references[0];
    assert!(hint.is_resource_hint);
    assert_eq!(hint.url, None);
    assert_eq!(hint.subtype.as_deref(), Some("preload"));
    // kept as authored
    assert!(info.text().unwrap().contains(r#"href="./font.woff2""#));
}

#[tokio::test]
async fn test_expected_kind_refines_js_flavor() {
    let fixture = Fixture::new(BuildMode::TEST).with_files(&[
        ("index.html", r#"<script src="./legacy.js"></script>"#),
        ("legacy.js", "var x = 1;"),
    ]);
    cook_all(&fixture, "index.html").await;

    let legacy = fixture.graph().get_url_info(&file("legacy.js")).unwrap();
    assert_eq!(legacy.kind, Some(ContentKind::JsClassic));
    assert!(legacy.warnings.is_empty());
}

#[tokio::test]
async fn test_content_type_mismatch_warns() {
    let fixture = Fixture::new(BuildMode::TEST).with_files(&[
        ("index.html", r#"<link rel="stylesheet" href="./data.json">"#),
        ("data.json", "{}"),
    ]);
    let summary = cook_all(&fixture, "index.html").await;
    assert!(summary.failed.is_empty());

    let data = fixture.graph().get_url_info(&file("data.json")).unwrap();
    assert_eq!(data.kind, Some(ContentKind::Json));
    assert_eq!(data.warnings.len(), 1);
    assert_eq!(data.warnings[0].kind, WarningKind::ContentTypeMismatch);
}

#[tokio::test]
async fn test_replace_changes_kind_and_reports_new_mentions() {
    let fixture = Fixture::build(
        BuildMode::TEST,
        "",
        with_plugin_first(Plugin::new("compile").transformer(ContentKind::Text, Compile)),
    )
    .with_file("notes.txt", "anything");

    cook_one(&fixture, "notes.txt").await.unwrap();
    let info = fixture.graph().get_url_info(&file("notes.txt")).unwrap();
    assert_eq!(info.kind, Some(ContentKind::JsModule));
    assert_eq!(info.content_type.as_deref(), Some(mime::types::JAVASCRIPT));
    assert_eq!(info.text(), Some("import \"/util.js\";\n"));
    assert_eq!(info.references[0].owner.as_deref(), Some("compile"));
    // replaced without a map: positions are lost
    assert!(info.sourcemap.materialize(info.url.as_str(), None).is_none());
}

#[tokio::test]
async fn test_hot_policy_recorded() {
    let fixture = Fixture::new(BuildMode::DEVELOPMENT).with_files(&[
        ("a.css", "body { color: red }"),
        ("b.js", "import.meta.hot.accept();"),
        ("c.js", "import.meta.hot.accept([\"./a.js\"], () => {});"),
        ("d.js", "import.meta.hot.decline();"),
    ]);
    for path in ["a.css", "b.js", "c.js", "d.js"] {
        cook_one(&fixture, path).await.unwrap();
    }
    let hot = |path: &str| fixture.graph().get_url_info(&file(path)).unwrap().hot;

    assert!(hot("a.css").accept_self);
    assert!(hot("b.js").accept_self);
    assert!(hot("c.js").accept_dependencies);
    assert!(!hot("c.js").accept_self);
    assert!(hot("d.js").decline);
}

#[tokio::test]
async fn test_cancelled_cook_leaves_node() {
    let fixture = Fixture::new(BuildMode::TEST).with_file("a.js", "export {}");
    let id = fixture.node("a.js");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fixture.kitchen().cook(id, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fixture.graph().read(id, |n| n.state), CookState::Unloaded);
    assert_eq!(fixture.load_count("a.js"), 0);
}

// ============================================================================
// Post-cook passes
// ============================================================================

#[tokio::test]
async fn test_rewrite_uses_generated_urls() {
    let fixture = Fixture::new(BuildMode::TEST).with_files(&[
        ("index.html", r#"<script type="module" src="./main.js"></script>"#),
        ("main.js", "export {}"),
    ]);
    cook_all(&fixture, "index.html").await;

    let graph = fixture.graph();
    let main = graph.id_of(&file("main.js")).unwrap();
    let index = graph.id_of(&file("index.html")).unwrap();
    graph.update(main, |node| {
        node.generated_url = Some(file("dist/main.1a2b3c4d.js"));
    });

    fixture.kitchen().rewrite(index);
    assert_eq!(
        fixture.text("index.html").unwrap(),
        r#"<script type="module" src="/main.1a2b3c4d.js"></script>"#
    );
    let reference = graph.read(index, |n| n.references[0].clone());
    assert_eq!(reference.generated_specifier.as_deref(), Some("/main.1a2b3c4d.js"));
    assert_eq!(reference.url, Some(file("main.js")));
}

#[tokio::test]
async fn test_optimize_runs_chain() {
    let fixture = Fixture::build(
        BuildMode::TEST,
        "",
        with_plugin_last(Plugin::new("squash").optimizer(ContentKind::JsModule, Squash)),
    )
    .with_file("a.js", "export  const\n  x = 1;");

    cook_one(&fixture, "a.js").await.unwrap();
    let id = fixture.node("a.js");
    fixture
        .kitchen()
        .optimize(id, &CancellationToken::new())
        .await
        .unwrap();

    let info = fixture.graph().url_info(id);
    assert_eq!(info.state, CookState::Cooked);
    assert_eq!(info.text(), Some("export const x = 1;"));
    assert!(info.sourcemap.materialize(info.url.as_str(), None).is_none());

    // re-rendering drops the optimized content again
    fixture.kitchen().rewrite(id);
    assert_eq!(fixture.text("a.js").unwrap(), "export  const\n  x = 1;");
}
