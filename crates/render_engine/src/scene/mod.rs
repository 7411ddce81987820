//! Scene model: items, keys, filters and the transaction lifecycle
//!
//! The scene side of the culling core. Items carry a bit-flag
//! classification key; filters select item buckets by (value, mask) tests
//! over those keys; the scene arena owns payloads and drives the spatial
//! tree through per-frame transactions; frame snapshots decouple the update
//! phase from the render phase.

pub mod filter;
pub mod frame;
pub mod item;
pub mod key;
#[allow(clippy::module_inception)]
pub mod scene;

pub use filter::ItemFilter;
pub use frame::FrameView;
pub use item::{Item, ItemBound, ItemBounds, ItemId, ItemIds, Payload, ShapeBounds};
pub use key::ItemKey;
pub use scene::{Scene, Transaction};
