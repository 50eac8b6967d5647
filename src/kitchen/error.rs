//! Structured cook errors and warnings.
//!
//! A [`CookError`] is stored on the failing node and, in dev mode, rendered
//! as the node's content through [`CookError::to_payload`].

use std::fmt;

use serde::Serialize;

use crate::core::ResourceUrl;
use crate::graph::TraceStep;
use crate::sourcemap::Position;

/// Which phase of the cook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CookErrorKind {
    /// No resolver produced a URL for a reference.
    Resolution,
    /// No loader produced content, or a loader failed.
    Load,
    /// A transformer could not parse the content.
    Parse,
    /// A transformer failed or returned an inconsistent result.
    Transform,
    /// An optimizer failed.
    Optimize,
    /// The session was cancelled mid-cook.
    Cancelled,
    /// The node was purged while this cook ran; its result was dropped.
    Superseded,
    /// Invariant violation inside the engine.
    Internal,
}

impl CookErrorKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resolution => "resolution error",
            Self::Load => "load error",
            Self::Parse => "parse error",
            Self::Transform => "transform error",
            Self::Optimize => "optimize error",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
            Self::Internal => "internal error",
        }
    }
}

/// Failure of one node's cook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookError {
    pub kind: CookErrorKind,
    pub url: ResourceUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    pub message: String,
    /// Offending specifier, for resolution errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    /// Position in the loaded content, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Entry-to-node chain of references.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceStep>,
}

impl CookError {
    pub fn new(kind: CookErrorKind, url: ResourceUrl, message: impl Into<String>) -> Self {
        Self {
            kind,
            url,
            plugin: None,
            message: message.into(),
            specifier: None,
            position: None,
            trace: Vec::new(),
        }
    }

    pub fn cancelled(url: ResourceUrl) -> Self {
        Self::new(CookErrorKind::Cancelled, url, "cook cancelled")
    }

    pub fn superseded(url: ResourceUrl) -> Self {
        Self::new(CookErrorKind::Superseded, url, "source changed during cook")
    }

    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifier = Some(specifier.into());
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceStep>) -> Self {
        self.trace = trace;
        self
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind == CookErrorKind::Cancelled
    }

    #[inline]
    pub fn is_superseded(&self) -> bool {
        self.kind == CookErrorKind::Superseded
    }

    /// JSON body served in place of the node's content in dev mode.
    pub fn to_payload(&self) -> String {
        #[derive(Serialize)]
        struct Payload<'a> {
            error: &'a CookError,
            summary: String,
        }
        serde_json::to_string_pretty(&Payload {
            error: self,
            summary: self.to_string(),
        })
        .unwrap_or_else(|_| format!("{{\"summary\":{:?}}}", self.message))
    }
}

impl fmt::Display for CookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.kind.name(), self.url)?;
        if let Some(position) = self.position {
            write!(f, ":{position}")?;
        }
        if let Some(plugin) = &self.plugin {
            write!(f, " [{plugin}]")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(specifier) = &self.specifier {
            write!(f, " (`{specifier}`)")?;
        }
        for step in &self.trace {
            write!(f, "\n  referenced by {} as `{}`", step.parent, step.specifier)?;
        }
        Ok(())
    }
}

impl std::error::Error for CookError {}

// ============================================================================
// Warnings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Loaded kind does not match what a referencing parent expected.
    ContentTypeMismatch,
    /// Resource hint pointing at a URL no resolver claimed.
    UnresolvedResourceHint,
    /// Reported by a plugin.
    Plugin,
}

/// Non-fatal diagnostic attached to a node. Never stops cooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookWarning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

impl CookWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            plugin: None,
        }
    }
}

impl fmt::Display for CookWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plugin {
            Some(plugin) => write!(f, "[{plugin}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
