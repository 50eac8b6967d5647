//! Build manifest: original relative URL → generated relative URL.
//!
//! ```json
//! {
//!   "index.html": "index.html",
//!   "src/main.js": "src/main.3f9a1c2e.js",
//!   "src/util.js": "src/util.77b0d4a1.js"
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::ResourceUrl;
use crate::graph::UrlGraph;

/// Flat, key-sorted map written next to the build output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    /// Every node with a generated URL.
    pub fn from_graph(graph: &UrlGraph, out_url: &ResourceUrl) -> Self {
        let root = graph.root();
        graph.with_nodes(|nodes| {
            Self(
                nodes
                    .iter()
                    .filter_map(|node| {
                        let generated = node.generated_url.as_ref()?;
                        Some((node.url.relative_to(root), generated.relative_to(out_url)))
                    })
                    .collect(),
            )
        })
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.0.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
