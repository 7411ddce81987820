//! Scene items
//!
//! An item is the proxy to a bounded "object" in the scene, described by its
//! [`ItemKey`]. The item owns its payload; the spatial index only ever sees
//! the item's ID, bound and key, and hands back the cell where it filed the
//! item so the scene can persist it for the next update.

use std::collections::HashMap;

use crate::foundation::geometry::Aabb;
use crate::scene::key::{ItemKey, Layer};
use crate::shape::ShapeKey;

/// Dense integer identity of a scene item
pub type ItemId = u32;

/// The reserved invalid item ID
pub const INVALID_ITEM_ID: ItemId = 0;

/// Index of the spatial-tree cell an item is filed under
pub type ItemCell = i32;

/// Sentinel for an item that is not filed in the spatial tree
pub const INVALID_ITEM_CELL: ItemCell = -1;

/// A list of item IDs
pub type ItemIds = Vec<ItemId>;

/// Payload interface implemented by anything renderable through the scene
///
/// Keeps the culling core decoupled from concrete geometry or material data:
/// the pipeline only asks for classification, bounds and the shape dispatch
/// key.
pub trait Payload {
    /// The render classification of this payload
    fn key(&self) -> ItemKey;

    /// World-space bound fully containing this payload; may be null
    fn bound(&self) -> Aabb;

    /// Key selecting the draw pipeline for this payload
    fn shape_key(&self) -> ShapeKey {
        ShapeKey::builder().with_own_pipeline().build()
    }

    /// For meta items: append the IDs of the represented sub-items,
    /// returning how many were appended
    fn fetch_meta_sub_items(&self, _sub_items: &mut ItemIds) -> u32 {
        0
    }

    /// Downcast to Any for type-specific payload updates
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// A scene item: payload ownership plus the cached key and spatial cell
pub struct Item {
    payload: Option<Box<dyn Payload>>,
    key: ItemKey,
    cell: ItemCell,
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("cell", &self.cell)
            .field("exists", &self.exists())
            .finish()
    }
}

impl Item {
    /// An empty item slot
    pub fn new() -> Self {
        Self {
            payload: None,
            key: ItemKey::default(),
            cell: INVALID_ITEM_CELL,
        }
    }

    /// Item exists if it has a payload
    pub fn exists(&self) -> bool {
        self.payload.is_some()
    }

    /// Replace the payload and refresh the cached key from it
    pub fn reset_payload(&mut self, payload: Box<dyn Payload>) {
        self.key = payload.key();
        self.payload = Some(payload);
    }

    /// Record the spatial cell this item was filed under and whether the
    /// tree classified it as smaller than that cell
    pub fn reset_cell(&mut self, cell: ItemCell, small: bool) {
        self.cell = cell;
        self.key.set_smaller(small);
    }

    /// Apply `functor` to the payload and refresh the cached key
    pub fn update(&mut self, functor: impl FnOnce(&mut dyn Payload)) {
        if let Some(payload) = self.payload.as_mut() {
            functor(payload.as_mut());
            self.key = payload.key();
        }
    }

    /// Forget the payload, key and cell
    pub fn kill(&mut self) {
        self.payload = None;
        self.key = ItemKey::default();
        self.cell = INVALID_ITEM_CELL;
    }

    /// The cached classification key
    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// The spatial cell this item is currently filed under
    pub fn cell(&self) -> ItemCell {
        self.cell
    }

    /// The world-space bound of the payload, null if the item is dead
    pub fn bound(&self) -> Aabb {
        self.payload.as_ref().map_or_else(Aabb::null, |p| p.bound())
    }

    /// The layer this item belongs to, reflecting the key
    pub fn layer(&self) -> Layer {
        self.key.layer()
    }

    /// The shape dispatch key of the payload
    pub fn shape_key(&self) -> ShapeKey {
        self.payload
            .as_ref()
            .map_or_else(|| ShapeKey::builder().invalid().build(), |p| p.shape_key())
    }

    /// For meta items: collect the represented sub-item IDs
    pub fn fetch_meta_sub_items(&self, sub_items: &mut ItemIds) -> u32 {
        self.payload
            .as_ref()
            .map_or(0, |p| p.fetch_meta_sub_items(sub_items))
    }
}

/// An item ID paired with its bound, the currency of the cull/sort stages
#[derive(Debug, Clone, Copy)]
pub struct ItemBound {
    /// The item's identity
    pub id: ItemId,
    /// The item's world-space bound
    pub bound: Aabb,
}

impl ItemBound {
    /// Pair an ID with its bound
    pub fn new(id: ItemId, bound: Aabb) -> Self {
        Self { id, bound }
    }
}

/// Many item bounds in a vector
pub type ItemBounds = Vec<ItemBound>;

/// Item bounds bucketed by shape dispatch key, for pipeline-ordered drawing
pub type ShapeBounds = HashMap<ShapeKey, ItemBounds>;
