//! Core types shared by every layer of the engine.

mod driver;
mod kind;
mod link;
mod state;
mod url;

pub use driver::{BuildMode, ModeKind};
pub use kind::ContentKind;
pub use link::SpecifierKind;
pub use state::CookState;
pub use url::ResourceUrl;
