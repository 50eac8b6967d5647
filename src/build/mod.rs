//! Build-mode passes that run once the graph is stable.
//!
//! ```text
//! build/
//! ├── version   # Versioner: content versions + generated URLs
//! ├── manifest  # Manifest: original → generated
//! └── emit      # Emitter: files, source maps, manifest
//! ```
//!
//! | Pass      | Reads                          | Writes                          |
//! |-----------|--------------------------------|---------------------------------|
//! | version   | templates, references          | `version`, `generated_url`      |
//! | rewrite   | generated URLs of targets      | `content`, render fragment      |
//! | optimize  | content                        | `content`, optimize fragments   |
//! | emit      | content, composed source map   | `out_dir`                       |
//!
//! The rewrite and optimize passes live on the kitchen; the session drives
//! all four in order.

mod emit;
mod manifest;
mod version;

pub use emit::{EmitSummary, Emitter};
pub use manifest::Manifest;
pub use version::{VersionReport, Versioner};
