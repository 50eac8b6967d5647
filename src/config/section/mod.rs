//! Configuration section definitions.
//!
//! Each module corresponds to a section in `galley.toml`:
//!
//! | Module    | TOML Section | Purpose                                   |
//! |-----------|--------------|-------------------------------------------|
//! | `project` | `[project]`  | Project root and entry documents          |
//! | `build`   | `[build]`    | Output dir, versioning, manifest, limits  |
//! | `dev`     | `[dev]`      | On-demand cooking and invalidation        |

mod build;
mod dev;
mod project;

pub use build::BuildConfig;
pub use dev::DevConfig;
pub use project::ProjectConfig;
