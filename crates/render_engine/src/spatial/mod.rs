//! Spatial index for scene items
//!
//! A sparse bounded octree storing renderable items by world-space bound.
//! Three layers, leaves first: fixed-point coordinates and frustum math
//! (`coords`), the generic index-addressed cell hierarchy (`octree`), and
//! the item-aware tree that maps bounds to cells and answers frustum
//! queries (`item_tree`).

pub mod coords;
pub mod item_tree;
pub mod octree;

pub use coords::{Coord, Coord3, Depth, Intersection, Location, Octant};
pub use item_tree::{ItemSelection, ItemSpatialTree};
pub use octree::{
    Brick, Cell, CellSelection, FrustumSelector, Index, Octree, INVALID_CELL, ROOT_CELL,
};
