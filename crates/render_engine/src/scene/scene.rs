//! Scene item arena and transaction lifecycle
//!
//! The scene owns every item and its payload; the spatial tree only files
//! item IDs. Changes arrive as [`Transaction`]s queued during the update
//! phase and are applied in one strictly-serialized pass per frame, before
//! any fetch/cull job runs. That phase discipline is what lets the whole
//! culling core run without locks: by the time readers traverse the tree,
//! no writer touches it.

use crate::scene::item::{
    Item, ItemBound, ItemBounds, ItemId, Payload, ShapeBounds, INVALID_ITEM_ID,
};
use crate::spatial::item_tree::ItemSpatialTree;

/// A payload update applied through the type-erased payload interface
pub type UpdateFunctor = Box<dyn FnOnce(&mut dyn Payload)>;

/// A batch of pending scene changes
///
/// Collected on the update side of a frame and handed to
/// [`Scene::enqueue_transaction`]; the scene applies resets, then updates,
/// then removals. The caller queues at most one change per item per frame,
/// before that frame's fetch.
#[derive(Default)]
pub struct Transaction {
    resets: Vec<(ItemId, Box<dyn Payload>)>,
    updates: Vec<(ItemId, UpdateFunctor)>,
    removals: Vec<ItemId>,
}

impl Transaction {
    /// Give an item a new payload (first-time insert or full replacement)
    pub fn reset_item(&mut self, id: ItemId, payload: Box<dyn Payload>) {
        self.resets.push((id, payload));
    }

    /// Mutate an item's payload in place
    pub fn update_item(&mut self, id: ItemId, functor: impl FnOnce(&mut dyn Payload) + 'static) {
        self.updates.push((id, Box::new(functor)));
    }

    /// Remove an item from the scene
    pub fn remove_item(&mut self, id: ItemId) {
        self.removals.push(id);
    }

    /// Fold another transaction into this one, preserving order
    pub fn merge(&mut self, other: Transaction) {
        self.resets.extend(other.resets);
        self.updates.extend(other.updates);
        self.removals.extend(other.removals);
    }

    /// Whether this transaction carries no changes
    pub fn is_empty(&self) -> bool {
        self.resets.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }
}

/// The scene: item arena, ID allocator and the spatial tree kept in sync
///
/// Item IDs are dense integers; slot 0 is reserved as the invalid ID. Freed
/// IDs are recycled before the arena grows, the same discipline the octree
/// applies to its cells.
pub struct Scene {
    items: Vec<Item>,
    free_ids: Vec<ItemId>,
    spatial_tree: ItemSpatialTree,
    pending: Vec<Transaction>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(ItemSpatialTree::default())
    }
}

impl Scene {
    /// Create a scene indexing items into the given spatial tree
    pub fn new(spatial_tree: ItemSpatialTree) -> Self {
        Self {
            // Slot 0 stays dead so INVALID_ITEM_ID never resolves
            items: vec![Item::new()],
            free_ids: Vec::new(),
            spatial_tree,
            pending: Vec::new(),
        }
    }

    /// The spatial index over this scene's items
    pub fn spatial_tree(&self) -> &ItemSpatialTree {
        &self.spatial_tree
    }

    /// Reserve an item ID, recycling freed ones first
    pub fn allocate_id(&mut self) -> ItemId {
        if let Some(id) = self.free_ids.pop() {
            return id;
        }
        let id = self.items.len() as ItemId;
        self.items.push(Item::new());
        id
    }

    fn check_id(&self, id: ItemId) -> bool {
        id != INVALID_ITEM_ID && (id as usize) < self.items.len()
    }

    /// The item behind `id`, if it exists
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        if self.check_id(id) && self.items[id as usize].exists() {
            Some(&self.items[id as usize])
        } else {
            None
        }
    }

    /// Number of live items
    pub fn num_items(&self) -> usize {
        self.items.iter().filter(|item| item.exists()).count()
    }

    /// Queue a transaction for the next [`Scene::process_transaction_frame`]
    pub fn enqueue_transaction(&mut self, transaction: Transaction) {
        if !transaction.is_empty() {
            self.pending.push(transaction);
        }
    }

    /// Apply every queued transaction, keeping the spatial tree in sync
    ///
    /// Runs in the scene transaction phase of the frame, strictly before the
    /// cull/fetch phase. Each changed item goes through the tree's
    /// `reset_item` exactly once and the returned cell is persisted on the
    /// item for the next change.
    pub fn process_transaction_frame(&mut self) {
        let transactions = std::mem::take(&mut self.pending);
        let mut num_resets = 0;
        let mut num_updates = 0;
        let mut num_removals = 0;

        for transaction in transactions {
            num_resets += transaction.resets.len();
            num_updates += transaction.updates.len();
            num_removals += transaction.removals.len();

            for (id, payload) in transaction.resets {
                self.apply_reset(id, payload);
            }
            for (id, functor) in transaction.updates {
                self.apply_update(id, functor);
            }
            for id in transaction.removals {
                self.apply_removal(id);
            }
        }

        if num_resets + num_updates + num_removals > 0 {
            log::debug!(
                "Scene transaction frame: {} resets, {} updates, {} removals, {} live items",
                num_resets,
                num_updates,
                num_removals,
                self.num_items()
            );
        }
    }

    fn apply_reset(&mut self, id: ItemId, payload: Box<dyn Payload>) {
        if !self.check_id(id) {
            log::warn!("Scene: reset for unknown item {}", id);
            return;
        }

        let (old_key, old_cell) = {
            let item = &self.items[id as usize];
            (item.key(), item.cell())
        };

        let item = &mut self.items[id as usize];
        item.reset_payload(payload);
        let bound = item.bound();
        let mut new_key = item.key();

        let new_cell = self
            .spatial_tree
            .reset_item(old_cell, old_key, &bound, id, &mut new_key);
        self.items[id as usize].reset_cell(new_cell, new_key.is_small());
    }

    fn apply_update(&mut self, id: ItemId, functor: UpdateFunctor) {
        if self.item(id).is_none() {
            log::warn!("Scene: update for unknown item {}", id);
            return;
        }

        let (old_key, old_cell) = {
            let item = &self.items[id as usize];
            (item.key(), item.cell())
        };

        let item = &mut self.items[id as usize];
        item.update(|payload| functor(payload));
        let bound = item.bound();
        let mut new_key = item.key();

        let new_cell = self
            .spatial_tree
            .reset_item(old_cell, old_key, &bound, id, &mut new_key);
        self.items[id as usize].reset_cell(new_cell, new_key.is_small());
    }

    fn apply_removal(&mut self, id: ItemId) {
        if self.item(id).is_none() {
            log::warn!("Scene: removal of unknown item {}", id);
            return;
        }

        let (key, cell) = {
            let item = &self.items[id as usize];
            (item.key(), item.cell())
        };
        self.spatial_tree.remove_item(cell, key, id);

        self.items[id as usize].kill();
        self.free_ids.push(id);
    }

    /// Pair a list of item IDs with their current bounds
    pub fn item_bounds(&self, ids: &[ItemId]) -> ItemBounds {
        ids.iter()
            .filter_map(|&id| self.item(id).map(|item| ItemBound::new(id, item.bound())))
            .collect()
    }

    /// Bucket item bounds by their shape dispatch key
    pub fn shape_bounds(&self, item_bounds: &ItemBounds) -> ShapeBounds {
        let mut shapes = ShapeBounds::new();
        for item_bound in item_bounds {
            if let Some(item) = self.item(item_bound.id) {
                shapes
                    .entry(item.shape_key())
                    .or_default()
                    .push(*item_bound);
            }
        }
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::Aabb;
    use crate::foundation::math::Vec3;
    use crate::scene::key::{Builder as KeyBuilder, ItemKey};
    use crate::spatial::octree::INVALID_CELL;

    struct CubePayload {
        corner: Vec3,
        size: f32,
    }

    impl Payload for CubePayload {
        fn key(&self) -> ItemKey {
            KeyBuilder::opaque_shape().build()
        }
        fn bound(&self) -> Aabb {
            Aabb::from_corner_size(self.corner, self.size)
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn live_cells(scene: &Scene) -> usize {
        scene.spatial_tree().octree().num_allocated_cells()
            - scene.spatial_tree().octree().num_free_cells()
    }

    #[test]
    fn test_reset_files_item_and_persists_cell() {
        let mut scene = Scene::default();
        let id = scene.allocate_id();
        assert_ne!(id, INVALID_ITEM_ID);

        let mut transaction = Transaction::default();
        transaction.reset_item(
            id,
            Box::new(CubePayload {
                corner: Vec3::new(10.0, 10.0, 10.0),
                size: 2.0,
            }),
        );
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();

        let item = scene.item(id).expect("item exists");
        assert_ne!(item.cell(), INVALID_CELL);
        assert!(item.key().is_shape());
    }

    #[test]
    fn test_update_moves_item_between_cells() {
        let mut scene = Scene::default();
        let id = scene.allocate_id();

        let mut transaction = Transaction::default();
        transaction.reset_item(
            id,
            Box::new(CubePayload {
                corner: Vec3::new(10.0, 10.0, 10.0),
                size: 2.0,
            }),
        );
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();
        let first_cell = scene.item(id).unwrap().cell();

        let mut transaction = Transaction::default();
        transaction.update_item(id, |payload| {
            if let Some(cube) = payload.as_any_mut().downcast_mut::<CubePayload>() {
                cube.corner = Vec3::new(-4000.0, 300.0, 7.0);
            }
        });
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();

        let second_cell = scene.item(id).unwrap().cell();
        assert_ne!(second_cell, first_cell);
    }

    #[test]
    fn test_removal_cleans_tree_and_recycles_id() {
        let mut scene = Scene::default();
        let baseline = live_cells(&scene);

        let id = scene.allocate_id();
        let mut transaction = Transaction::default();
        transaction.reset_item(
            id,
            Box::new(CubePayload {
                corner: Vec3::new(500.0, 500.0, 500.0),
                size: 2.0,
            }),
        );
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();
        assert!(live_cells(&scene) > baseline);

        let mut transaction = Transaction::default();
        transaction.remove_item(id);
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();

        assert!(scene.item(id).is_none());
        assert_eq!(live_cells(&scene), baseline);
        assert_eq!(scene.num_items(), 0);

        // The freed ID is recycled before the arena grows
        assert_eq!(scene.allocate_id(), id);
    }

    #[test]
    fn test_merged_transactions_apply_in_order() {
        let mut scene = Scene::default();
        let id = scene.allocate_id();

        let mut first = Transaction::default();
        first.reset_item(
            id,
            Box::new(CubePayload {
                corner: Vec3::zeros(),
                size: 1.0,
            }),
        );
        let mut second = Transaction::default();
        second.remove_item(id);
        first.merge(second);
        assert!(!first.is_empty());

        scene.enqueue_transaction(first);
        scene.process_transaction_frame();
        assert!(scene.item(id).is_none());
    }

    #[test]
    fn test_item_and_shape_bounds_helpers() {
        let mut scene = Scene::default();
        let a = scene.allocate_id();
        let b = scene.allocate_id();

        let mut transaction = Transaction::default();
        transaction.reset_item(
            a,
            Box::new(CubePayload {
                corner: Vec3::zeros(),
                size: 1.0,
            }),
        );
        transaction.reset_item(
            b,
            Box::new(CubePayload {
                corner: Vec3::new(5.0, 0.0, 0.0),
                size: 1.0,
            }),
        );
        scene.enqueue_transaction(transaction);
        scene.process_transaction_frame();

        let bounds = scene.item_bounds(&[a, b, 999]);
        assert_eq!(bounds.len(), 2);

        let shapes = scene.shape_bounds(&bounds);
        // Both payloads report the default own-pipeline shape key
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes.values().next().unwrap().len(), 2);
    }
}
