//! Dev notification protocol.
//!
//! The session only produces these values; a transport (SSE, WebSocket)
//! serializes them for the browser.
//!
//! # Message Types
//!
//! - `hot`: re-execute the listed boundary modules
//! - `full-reload`: reload the page, optionally with a reason
//!
//! The matching input is [`InvalidationSignal`], `{"url": "..."}`.

use serde::{Deserialize, Serialize};

/// Outcome of an invalidation, sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DevNotification {
    /// Modules that accept the update, root-relative and sorted.
    Hot {
        #[serde(rename = "boundaryUrls")]
        boundary_urls: Vec<String>,
    },

    FullReload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl DevNotification {
    pub fn hot(boundary_urls: Vec<String>) -> Self {
        Self::Hot { boundary_urls }
    }

    pub fn full_reload() -> Self {
        Self::FullReload { reason: None }
    }

    pub fn full_reload_with_reason(reason: impl Into<String>) -> Self {
        Self::FullReload {
            reason: Some(reason.into()),
        }
    }

    #[inline]
    pub fn is_hot(&self) -> bool {
        matches!(self, Self::Hot { .. })
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"full-reload"}"#.to_string())
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

/// "This source changed", from a file watcher or an editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationSignal {
    /// Absolute URL, or a path relative to the project root.
    pub url: String,
}

impl InvalidationSignal {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
