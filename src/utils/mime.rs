//! MIME type detection utilities.
//!
//! Content types are assigned during load; the kitchen derives a
//! [`ContentKind`](crate::core::ContentKind) from them when a loader
//! does not classify its output itself.

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html";
    pub const PLAIN: &str = "text/plain";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "text/javascript";
    pub const JSON: &str = "application/json";
    pub const WEBMANIFEST: &str = "application/manifest+json";
    pub const XML: &str = "application/xml";
    pub const MARKDOWN: &str = "text/markdown";

    /// Synthetic payload served in place of a node that failed to cook.
    pub const ERROR_PAYLOAD: &str = "application/vnd.galley.error+json";

    // Binary
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    // Audio / Video
    pub const MP3: &str = "audio/mpeg";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
}

/// Guess MIME type from a lowercase file extension.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    match ext {
        // Web / Text
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs" | "cjs") => types::JAVASCRIPT,
        Some("json" | "map") => types::JSON,
        Some("webmanifest") => types::WEBMANIFEST,
        Some("xml") => types::XML,
        Some("txt") => types::PLAIN,
        Some("md") => types::MARKDOWN,

        // Images
        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("avif") => types::AVIF,
        Some("ico") => types::ICO,

        // Audio / Video
        Some("mp3") => types::MP3,
        Some("mp4" | "m4v") => types::MP4,
        Some("webm") => types::WEBM,

        // Fonts
        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,
        Some("ttf") => types::TTF,
        Some("otf") => types::OTF,

        Some("wasm") => types::WASM,

        _ => types::OCTET_STREAM,
    }
}

/// Strip parameters: `text/html; charset=utf-8` -> `text/html`.
pub fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Check if the MIME type represents text content.
pub fn is_text(mime: &str) -> bool {
    let mime = essence(mime);
    mime.starts_with("text/")
        || mime == types::JSON
        || mime == types::WEBMANIFEST
        || mime == types::XML
        || mime == types::SVG
        || mime.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(from_extension(Some("html")), types::HTML);
        assert_eq!(from_extension(Some("css")), types::CSS);
        assert_eq!(from_extension(Some("mjs")), types::JAVASCRIPT);
        assert_eq!(from_extension(Some("webmanifest")), types::WEBMANIFEST);
        assert_eq!(from_extension(Some("png")), types::PNG);
        assert_eq!(from_extension(Some("xyz")), types::OCTET_STREAM);
        assert_eq!(from_extension(None), types::OCTET_STREAM);
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("text/html; charset=utf-8"), "text/html");
        assert_eq!(essence("image/png"), "image/png");
    }

    #[test]
    fn test_is_text() {
        assert!(is_text(types::HTML));
        assert!(is_text("text/css; charset=utf-8"));
        assert!(is_text(types::JSON));
        assert!(is_text(types::SVG));
        assert!(is_text(types::ERROR_PAYLOAD));
        assert!(!is_text(types::PNG));
        assert!(!is_text(types::WOFF2));
    }
}
