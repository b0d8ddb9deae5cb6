//! Presentation layer for skein.
//!
//! A [`PresentationTree`] shows the coroutines of the current suspend point
//! as a lazily expanded tree. Children are computed on first expansion and
//! cached on the node; a new pause swaps in a fresh root and replays the
//! previous expansion and selection by node identity.

mod config;
mod render;
mod tree;
mod view;

pub use config::*;
pub use render::*;
pub use tree::*;
pub use view::*;
