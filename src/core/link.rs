//! Specifier classification.
//!
//! Purely syntactic: decides how a raw specifier should be resolved,
//! never touches the graph.

/// Syntactic classification of an authored specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind<'a> {
    /// Absolute URL with a scheme (`file:///x.js`, `https://cdn/x.js`).
    Absolute(&'a str),
    /// Non-fetchable scheme (`mailto:`, `tel:`, `javascript:`, `data:`, `blob:`).
    Inert(&'a str),
    /// Pure fragment (`#section`). Value is the fragment without `#`.
    Fragment(&'a str),
    /// Project-root-relative path (`/assets/logo.png`).
    RootRelative(&'a str),
    /// Parent-relative path (`./util.js`, `../lib/a.js`, `logo.png` in HTML/CSS).
    Relative(&'a str),
    /// Bare module specifier (`lodash`, `@scope/pkg`), only meaningful in JS imports.
    Bare(&'a str),
}

impl<'a> SpecifierKind<'a> {
    /// Classify a specifier.
    ///
    /// `bare_allowed` is true for JS import references, where `foo` is a
    /// package name rather than a sibling file.
    pub fn parse(specifier: &'a str, bare_allowed: bool) -> Self {
        let trimmed = specifier.trim();
        if let Some(scheme) = scheme_of(trimmed) {
            return if is_inert_scheme(scheme) {
                Self::Inert(trimmed)
            } else {
                Self::Absolute(trimmed)
            };
        }
        if let Some(fragment) = trimmed.strip_prefix('#') {
            return Self::Fragment(fragment);
        }
        if trimmed.starts_with("//") {
            // protocol-relative, treated like an absolute remote URL
            return Self::Absolute(trimmed);
        }
        if let Some(path) = trimmed.strip_prefix('/') {
            return Self::RootRelative(path);
        }
        if trimmed.starts_with("./") || trimmed.starts_with("../") || !bare_allowed {
            return Self::Relative(trimmed);
        }
        Self::Bare(trimmed)
    }

    /// Check if the specifier points outside the project (remote or inert).
    #[inline]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Inert(_)) || matches!(self, Self::Absolute(s) if !s.starts_with("file:"))
    }
}

/// Extract a URL scheme (`https` from `https://x`), if the specifier has one.
fn scheme_of(specifier: &str) -> Option<&str> {
    let (scheme, _) = specifier.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    // single letters are Windows drive letters, not schemes
    if scheme.len() < 2 || !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(scheme)
}

fn is_inert_scheme(scheme: &str) -> bool {
    matches!(
        scheme.to_ascii_lowercase().as_str(),
        "mailto" | "tel" | "javascript" | "data" | "blob" | "about"
    )
}
