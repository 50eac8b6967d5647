//! Default generated specifiers.
//!
//! | Target                             | Written specifier                   |
//! |------------------------------------|-------------------------------------|
//! | external / unresolved              | as authored                         |
//! | has a generated URL (build)        | `base` + path under the output dir  |
//! | project file (dev)                 | `/` + project-relative path         |
//! | project file, reference versioning | `/src/util.js?v=1a2b3c4d`           |
//!
//! The fragment of the authored specifier is always carried over.

use crate::config::GalleyConfig;
use crate::core::ResourceUrl;
use crate::graph::Reference;

/// What the default formatter needs to know about the target.
pub(crate) struct TargetView<'a> {
    pub generated_url: Option<&'a ResourceUrl>,
    pub version: Option<&'a str>,
}

pub(crate) fn default_specifier(
    config: &GalleyConfig,
    root: &ResourceUrl,
    out_url: Option<&ResourceUrl>,
    reference: &Reference,
    target: &TargetView<'_>,
) -> String {
    let Some(url) = reference.url.as_ref().filter(|_| !reference.external) else {
        return reference.specifier.clone();
    };

    let mut specifier = match (target.generated_url, out_url) {
        (Some(generated), Some(out)) if generated.is_within(out) => {
            format!("{}{}", config.build.base, generated.relative_to(out))
        }
        (Some(generated), _) => generated.to_string(),
        (None, _) if url.is_within(root) => {
            let mut path = format!("/{}", url.relative_to(root));
            if config.dev.reference_versioning
                && let Some(version) = target.version
            {
                let separator = if url.query().is_some() { '&' } else { '?' };
                path.push(separator);
                path.push_str("v=");
                path.push_str(version);
            }
            path
        }
        (None, _) => url.to_string(),
    };

    if let Some(fragment) = &reference.fragment {
        specifier.push('#');
        specifier.push_str(fragment);
    }
    specifier
}
