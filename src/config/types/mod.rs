//! Configuration utility types.
//!
//! | Module   | Purpose                                   |
//! |----------|-------------------------------------------|
//! | `error`  | ConfigError, ConfigDiagnostics            |
//! | `field`  | FieldPath for diagnostics                 |
//! | `handle` | Per-session swappable config handle       |

mod error;
mod field;
mod handle;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
pub use handle::ConfigHandle;
