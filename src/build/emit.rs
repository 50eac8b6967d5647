//! Writes versioned outputs, source maps and the manifest.
//!
//! ```text
//! dist/
//! ├── index.html
//! ├── src/main.3f9a1c2e.js
//! ├── src/main.3f9a1c2e.js.map
//! └── asset-manifest.json
//! ```

use std::path::{Path, PathBuf};

use futures::future::join_all;

use crate::build::Manifest;
use crate::config::GalleyConfig;
use crate::core::{ContentKind, ResourceUrl};
use crate::error::GalleyError;
use crate::graph::{UrlGraph, UrlInfo};
use crate::logger::ProgressLine;
use crate::debug;

/// What an emit pass wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub files: usize,
    pub maps: usize,
    pub bytes: u64,
}

/// One file to write.
struct Output {
    kind: &'static str,
    path: PathBuf,
    bytes: Vec<u8>,
    map: Option<(PathBuf, String)>,
}

pub struct Emitter<'a> {
    graph: &'a UrlGraph,
    config: &'a GalleyConfig,
    progress: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(graph: &'a UrlGraph, config: &'a GalleyConfig) -> Self {
        Self {
            graph,
            config,
            progress: false,
        }
    }

    /// Show per-kind counters while writing.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Write every cooked node that has a generated URL, then the manifest.
    pub async fn emit(&self) -> Result<EmitSummary, GalleyError> {
        let out_dir = self.config.out_dir();
        let out_url = self.config.out_url()?;

        let outputs = self.graph.with_nodes(|nodes| {
            nodes
                .iter()
                .filter(|node| node.is_cooked())
                .filter_map(|node| self.output(node, &out_dir, &out_url).transpose())
                .collect::<Result<Vec<_>, GalleyError>>()
        })?;

        let progress = self.progress.then(|| {
            let counts: Vec<(&'static str, usize)> = ContentKind::ALL
                .iter()
                .map(|kind| {
                    let name = kind.name();
                    (name, outputs.iter().filter(|o| o.kind == name).count())
                })
                .collect();
            ProgressLine::new(&counts)
        });

        let mut summary = EmitSummary::default();
        let counters = progress.as_ref();
        let writes = outputs.iter().map(|output| async move {
            write_file(&output.path, &output.bytes).await?;
            if let Some((path, json)) = &output.map {
                write_file(path, json.as_bytes()).await?;
            }
            if let Some(progress) = counters {
                progress.inc(output.kind);
            }
            Ok::<_, GalleyError>(())
        });
        for result in join_all(writes).await {
            result?;
        }
        if let Some(progress) = progress {
            progress.finish();
        }

        for output in &outputs {
            summary.files += 1;
            summary.bytes += output.bytes.len() as u64;
            if output.map.is_some() {
                summary.maps += 1;
            }
        }

        if let Some(name) = self.config.build.manifest_name() {
            let manifest = Manifest::from_graph(self.graph, &out_url);
            let json = manifest.to_json()?;
            write_file(&out_dir.join(name), json.as_bytes()).await?;
            debug!("emit"; "manifest {} ({} entries)", name, manifest.len());
        }

        Ok(summary)
    }

    fn output(
        &self,
        node: &UrlInfo,
        out_dir: &Path,
        out_url: &ResourceUrl,
    ) -> Result<Option<Output>, GalleyError> {
        let (Some(generated), Some(content)) = (&node.generated_url, &node.content) else {
            return Ok(None);
        };
        let path = out_dir.join(generated.decoded_relative_path(out_url));
        let kind = node.kind.map_or("asset", ContentKind::name);
        let mut bytes = content.as_bytes().to_vec();

        let comment = match node.kind {
            Some(ContentKind::JsModule | ContentKind::JsClassic) => Some(("//# ", "")),
            Some(ContentKind::Css) => Some(("/*# ", " */")),
            _ => None,
        };
        let map = match comment {
            Some((open, close)) if self.config.build.sourcemaps => {
                let original = node.original_content.as_ref().and_then(|c| c.as_text());
                match node.sourcemap.materialize(node.url.as_str(), original) {
                    Some(mut map) => {
                        let file_name = generated.file_name().to_string();
                        let map_name = format!("{file_name}.map");
                        map.file = Some(file_name);
                        let json = map.to_json()?;

                        bytes.extend_from_slice(
                            format!("\n{open}sourceMappingURL={map_name}{close}").as_bytes(),
                        );
                        Some((path.with_file_name(&map_name), json))
                    }
                    None => {
                        debug!("emit"; "no source map for {}", node.url);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Some(Output {
            kind,
            path,
            bytes,
            map,
        }))
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), GalleyError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| GalleyError::io(parent, err))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| GalleyError::io(path, err))
}
