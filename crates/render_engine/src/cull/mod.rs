//! Per-frame culling and ordering tasks
//!
//! The jobs that turn a frame's view snapshot into an ordered list of items
//! to draw: fetch the spatial tree selection, cull it down with the item
//! filter plus per-item frustum and size tests, and depth-sort what
//! survives. All three stages are synchronous CPU-bound passes over the
//! frame's immutable [`crate::scene::frame::FrameView`].

mod cull;
mod fetch;
mod sort;

pub use cull::{lod_cull_functor, CullSpatialSelection, RenderDetails};
pub use fetch::FetchSpatialTree;
pub use sort::{DepthSortItems, DepthSortShapes};
