//! Canonical resource URL type.
//!
//! - Identity: absolute URL, query kept, fragment stripped
//! - Casing and trailing slashes are preserved as authored
//! - Relative display: relative to a root directory URL (`util.js`)

use std::borrow::Borrow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical absolute URL of a resource in the graph.
///
/// Invariants:
/// - Always a valid absolute URL (parsed by the `url` crate)
/// - Never carries a fragment (fragments live on the reference)
/// - Query string is part of identity (`a.js?v=1` != `a.js?v=2`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUrl(Arc<str>);

impl ResourceUrl {
    /// Parse an absolute URL, dropping its fragment.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(input)?;
        Ok(Self::from_url(url))
    }

    /// Wrap an already-parsed URL, dropping its fragment.
    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self(Arc::from(url.as_str()))
    }

    /// `file://` URL of an absolute file path.
    pub fn from_file_path(path: &Path) -> Option<Self> {
        Url::from_file_path(path).ok().map(Self::from_url)
    }

    /// `file://` URL of an absolute directory path (always ends with `/`).
    pub fn from_directory_path(path: &Path) -> Option<Self> {
        Url::from_directory_path(path).ok().map(Self::from_url)
    }

    /// Resolve `specifier` against this URL.
    ///
    /// Returns the canonical target plus the fragment of the specifier, if any.
    pub fn join(&self, specifier: &str) -> Result<(Self, Option<String>), url::ParseError> {
        let base = Url::parse(&self.0)?;
        let joined = base.join(specifier)?;
        let fragment = joined.fragment().map(str::to_owned);
        Ok((Self::from_url(joined), fragment))
    }

    /// Get the URL as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme of the URL (`file`, `https`, ...).
    pub fn scheme(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// URL without its query string.
    pub fn without_query(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }

    /// Query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.0.split_once('?').map(|(_, query)| query)
    }

    /// Last path segment (`util.js` for `file:///project/src/util.js?x`).
    pub fn file_name(&self) -> &str {
        let path = self.without_query();
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Extension of the last path segment, lowercased.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Check whether this URL lives under `root` (a directory URL ending with `/`).
    #[inline]
    pub fn is_within(&self, root: &ResourceUrl) -> bool {
        self.0.starts_with(root.as_str())
    }

    /// Relative form used in manifests and notifications.
    ///
    /// `file:///project/src/util.js` relative to `file:///project/` is `src/util.js`.
    /// URLs outside of `root` are returned unchanged.
    pub fn relative_to(&self, root: &ResourceUrl) -> String {
        match self.0.strip_prefix(root.as_str()) {
            Some(rest) => rest.to_string(),
            None => self.0.to_string(),
        }
    }

    /// Local filesystem path for `file://` URLs (query dropped).
    pub fn to_file_path(&self) -> Option<PathBuf> {
        Url::parse(self.without_query()).ok()?.to_file_path().ok()
    }

    /// Decoded relative path, suitable for joining onto an output directory.
    pub fn decoded_relative_path(&self, root: &ResourceUrl) -> PathBuf {
        let relative = self.relative_to(root);
        let path = relative.split('?').next().unwrap_or(&relative);
        let decoded = percent_decode_str(path)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(decoded)
    }
}

impl std::fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceUrl {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ResourceUrl {
    type Error = url::ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
