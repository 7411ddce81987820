//! Item spatial tree
//!
//! Specializes the generic [`Octree`] for AABB-bounded scene items: maps
//! world positions to integer tree coordinates, decides the per-item
//! smaller-than-cell classification, manages item membership as bounds and
//! keys change, and expands frustum selections into item-ID lists.
//!
//! The tree only cares about the bound and key of an item; payloads stay
//! owned by the scene.

use crate::foundation::geometry::{Aabb, Frustum};
use crate::foundation::math::{utils, Vec3, Vec4};
use crate::scene::filter::ItemFilter;
use crate::scene::item::{ItemBounds, ItemId, ItemIds};
use crate::scene::key::ItemKey;
use crate::spatial::coords::{
    depth_dimension_f, inv_depth_dimension, Coord, Coord3, Depth, Location, METRIC_COORD_DEPTH,
    ROOT_DEPTH,
};
use crate::spatial::octree::{CellSelection, FrustumSelector, Index, Octree, INVALID_CELL};

/// Item-level result of a frustum query
///
/// The four-way split mirrors the cell classification: items of "inside"
/// cells need no further frustum test, items of "partial" cells do; and
/// "subcell" items need an extra per-item size test regardless of cell
/// classification, while normal items do not.
#[derive(Debug, Default)]
pub struct ItemSelection {
    /// The cell-level selection this item selection was expanded from
    pub cell_selection: CellSelection,
    /// Items of cells fully inside the frustum
    pub inside_items: ItemIds,
    /// Small items of cells fully inside the frustum
    pub inside_subcell_items: ItemIds,
    /// Items of cells straddling the frustum boundary
    pub partial_items: ItemIds,
    /// Small items of cells straddling the frustum boundary
    pub partial_subcell_items: ItemIds,
}

impl ItemSelection {
    /// Number of items in the fully-inside lists
    pub fn inside_num_items(&self) -> usize {
        self.inside_items.len() + self.inside_subcell_items.len()
    }

    /// Number of items in the partial lists
    pub fn partial_num_items(&self) -> usize {
        self.partial_items.len() + self.partial_subcell_items.len()
    }

    /// Total number of selected items
    pub fn num_items(&self) -> usize {
        self.inside_num_items() + self.partial_num_items()
    }

    /// Reset all lists, keeping their capacity
    pub fn clear(&mut self) {
        self.cell_selection.clear();
        self.inside_items.clear();
        self.inside_subcell_items.clear();
        self.partial_items.clear();
        self.partial_subcell_items.clear();
    }
}

/// An octree of items organized for efficient culling
///
/// The overall size and origin of the tree are fixed at creation. Items are
/// filed under the deepest cell fully containing their bound; bounds that
/// straddle the configured volume (or are null) are filed under the root,
/// which every selection conservatively includes.
#[derive(Debug)]
pub struct ItemSpatialTree {
    octree: Octree,
    size: f32,
    inv_size: f32,
    origin: Vec3,
}

impl Default for ItemSpatialTree {
    /// The default volume: 32768 units centered on the world origin
    fn default() -> Self {
        Self::new(Vec3::new(-16384.0, -16384.0, -16384.0), 32768.0)
    }
}

impl ItemSpatialTree {
    /// Create a tree spanning `size` units from `origin` on every axis
    pub fn new(origin: Vec3, size: f32) -> Self {
        debug_assert!(size > 0.0);
        log::info!(
            "ItemSpatialTree: origin {:?}, size {}, finest cell {}",
            origin,
            size,
            size * inv_depth_dimension(METRIC_COORD_DEPTH)
        );
        Self {
            octree: Octree::new(),
            size,
            inv_size: 1.0 / size,
            origin,
        }
    }

    /// Edge length of the configured volume
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Minimum corner of the configured volume
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// The underlying cell index
    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    /// Width of a cell at the given depth, in world units
    pub fn cell_width(&self, depth: Depth) -> f32 {
        self.size * inv_depth_dimension(depth)
    }

    /// Reciprocal of [`ItemSpatialTree::cell_width`]
    pub fn inv_cell_width(&self, depth: Depth) -> f32 {
        depth_dimension_f(depth) * self.inv_size
    }

    /// World position of an integer coordinate at the given depth
    pub fn eval_pos(&self, coord: &Coord3, depth: Depth) -> Vec3 {
        self.eval_pos_with_width(coord, self.cell_width(depth))
    }

    /// World position of an integer coordinate given the cell width directly
    pub fn eval_pos_with_width(&self, coord: &Coord3, cell_width: f32) -> Vec3 {
        self.origin
            + Vec3::new(
                f32::from(coord.x),
                f32::from(coord.y),
                f32::from(coord.z),
            ) * cell_width
    }

    /// Clamp a tree-relative position into the valid coordinate range
    fn clamp_rel_pos_to_tree_range(&self, pos: &Vec3) -> Vec3 {
        const EPSILON: f32 = 0.0001;
        Vec3::new(
            pos.x.clamp(0.0, self.size - EPSILON),
            pos.y.clamp(0.0, self.size - EPSILON),
            pos.z.clamp(0.0, self.size - EPSILON),
        )
    }

    /// Integer cell coordinate of a world position at the given depth
    ///
    /// Positions outside the configured volume are clamped so the integer
    /// coordinate stays meaningful.
    pub fn eval_coord(&self, pos: &Vec3, depth: Depth) -> Coord3 {
        let npos = self.clamp_rel_pos_to_tree_range(&(pos - self.origin));
        let scaled = npos * self.inv_cell_width(depth);
        // Truncate the fractional part
        Coord3::new(scaled.x as Coord, scaled.y as Coord, scaled.z as Coord)
    }

    /// Real-valued cell coordinate of a world position at the given depth
    ///
    /// Not clamped to the tree volume, so beware of converting the result to
    /// an integer coordinate.
    pub fn eval_coordf(&self, pos: &Vec3, depth: Depth) -> Vec3 {
        (pos - self.origin) * self.inv_cell_width(depth)
    }

    /// World-space bound of a cell location
    pub fn eval_bound(&self, location: &Location) -> Aabb {
        let cell_width = self.cell_width(location.depth);
        Aabb::from_corner_size(self.eval_pos_with_width(&location.pos, cell_width), cell_width)
    }

    /// The cell location for an arbitrary bound, plus the bound's real-valued
    /// coordinate-space corners
    ///
    /// A bound that crosses any plane of the tree volume is deliberately
    /// placed at the root: a straddling bound cannot be safely localized to
    /// any finer cell. Null bounds are placed at the root too.
    pub fn eval_location(&self, bound: &Aabb) -> (Location, Vec3, Vec3) {
        if bound.is_null() {
            return (Location::root(), Vec3::zeros(), Vec3::zeros());
        }

        let min_coordf = self.eval_coordf(&bound.min, METRIC_COORD_DEPTH);
        let max_coordf = self.eval_coordf(&bound.max, METRIC_COORD_DEPTH);

        let coord_dim = depth_dimension_f(METRIC_COORD_DEPTH);
        if min_coordf.x < 0.0
            || min_coordf.y < 0.0
            || min_coordf.z < 0.0
            || max_coordf.x >= coord_dim
            || max_coordf.y >= coord_dim
            || max_coordf.z >= coord_dim
        {
            return (Location::root(), min_coordf, max_coordf);
        }

        let min_coord = Coord3::new(
            min_coordf.x as Coord,
            min_coordf.y as Coord,
            min_coordf.z as Coord,
        );
        let max_coord = Coord3::new(
            max_coordf.x as Coord,
            max_coordf.y as Coord,
            max_coordf.z as Coord,
        );
        (
            Location::eval_from_range(min_coord, max_coord, METRIC_COORD_DEPTH),
            min_coordf,
            max_coordf,
        )
    }

    /// Cell locations for a batch of item bounds
    pub fn eval_locations(&self, bounds: &ItemBounds) -> Vec<Location> {
        bounds
            .iter()
            .map(|item_bound| self.eval_location(&item_bound.bound).0)
            .collect()
    }

    /// Add an item to a cell's brick, creating the brick if needed
    pub fn insert_item(&mut self, cell_idx: Index, key: ItemKey, item: ItemId) -> Index {
        let small = key.is_small();
        self.octree.access_cell_brick(
            cell_idx,
            |cell, brick, _| {
                let item_in = if small {
                    &mut brick.subcell_items
                } else {
                    &mut brick.items
                };
                item_in.push(item);
                cell.set_brick_filled();
            },
            true,
        );
        cell_idx
    }

    /// Move an item between a brick's two lists after a key change
    ///
    /// The caller guarantees the key actually changed; a stale old key is a
    /// programming error caught in debug builds only.
    pub fn update_item(&mut self, cell_idx: Index, old_key: ItemKey, key: ItemKey, item: ItemId) -> bool {
        // In case we missed that one, nothing to do
        if cell_idx == INVALID_CELL {
            return true;
        }
        debug_assert!(old_key != key);

        let (was_small, is_small) = (old_key.is_small(), key.is_small());
        if was_small == is_small {
            // Same list either way
            return true;
        }

        let mut moved = false;
        self.octree.access_cell_brick(
            cell_idx,
            |_, brick, _| {
                let (item_out, item_in) = if is_small {
                    (&mut brick.items, &mut brick.subcell_items)
                } else {
                    (&mut brick.subcell_items, &mut brick.items)
                };
                if let Some(at) = item_out.iter().position(|&id| id == item) {
                    item_out.remove(at);
                    item_in.push(item);
                    moved = true;
                }
            },
            false, // do not create brick!
        );

        moved
    }

    /// Remove an item from a cell's brick and reclaim the branch if the
    /// brick becomes empty
    pub fn remove_item(&mut self, cell_idx: Index, key: ItemKey, item: ItemId) -> bool {
        // In case we missed that one, nothing to do
        if cell_idx == INVALID_CELL {
            return true;
        }

        let mut success = false;
        let mut empty_cell = false;
        self.octree.access_cell_brick(
            cell_idx,
            |cell, brick, _| {
                let item_list = if key.is_small() {
                    &mut brick.subcell_items
                } else {
                    &mut brick.items
                };
                if let Some(at) = item_list.iter().position(|&id| id == item) {
                    item_list.remove(at);
                    success = true;
                }

                if brick.is_empty() {
                    cell.set_brick_empty();
                    empty_cell = true;
                }
            },
            false, // do not create brick!
        );

        // The cell is now empty, try to reclaim the branch
        if empty_cell {
            self.octree.clean_cell_branch(cell_idx);
        }

        success
    }

    /// Recompute where an item belongs and move it there
    ///
    /// Computes the new location from `bound`, refreshes `new_key`'s
    /// smaller-than-cell bit (set when the bound's largest axis extent is
    /// below half the destination cell's width), then inserts, removes or
    /// moves the item as the old and new cells dictate. Returns the new cell
    /// for the caller to persist, or [`INVALID_CELL`] when the item could
    /// not be placed (view-space bound, or index-space exhaustion).
    pub fn reset_item(
        &mut self,
        old_cell: Index,
        old_key: ItemKey,
        bound: &Aabb,
        item: ItemId,
        new_key: &mut ItemKey,
    ) -> Index {
        let mut new_cell = INVALID_CELL;

        if !new_key.is_view_space() {
            let (location, _min_coordf, _max_coordf) = self.eval_location(bound);

            // Compare the bound against the destination cell and tag the key:
            // an item below half the cell width defers to the per-item test
            let subcell_item = !bound.is_null()
                && bound.largest_dimension() < 0.5 * self.cell_width(location.depth);
            new_key.set_smaller(subcell_item);

            new_cell = self.octree.index_cell(&location);
        }

        // Did we fail finding a cell for the item?
        if new_cell == INVALID_CELL {
            // Remove the item from where it was
            if old_cell != INVALID_CELL {
                self.remove_item(old_cell, old_key, item);
            }
            new_cell
        }
        // Staying in the same cell
        else if new_cell == old_cell {
            // Move between lists only if the key changed
            if *new_key != old_key {
                self.update_item(new_cell, old_key, *new_key, item);
            }
            new_cell
        }
        // Do we know about this item?
        else if old_cell == INVALID_CELL {
            self.insert_item(new_cell, *new_key, item);
            new_cell
        }
        // A true cell change is required: insert first so the destination
        // brick is non-empty before the source is touched
        else {
            self.insert_item(new_cell, *new_key, item);
            self.remove_item(old_cell, old_key, item);
            new_cell
        }
    }

    /// Select the cells and bricks visible through `frustum`
    ///
    /// Converts the world-space frustum planes and eye into normalized tree
    /// space and runs the octree traversal with the given LOD angle in
    /// degrees.
    pub fn select_cells(
        &self,
        selection: &mut CellSelection,
        frustum: &Frustum,
        lod_angle_deg: f32,
    ) -> usize {
        let mut selector = FrustumSelector::default();
        for (tree_plane, plane) in selector.frustum.iter_mut().zip(frustum.planes.iter()) {
            let tree_point = self.eval_coordf(&plane.point(), ROOT_DEPTH);
            *tree_plane = Vec4::new(
                plane.normal.x,
                plane.normal.y,
                plane.normal.z,
                -plane.normal.dot(&tree_point),
            );
        }
        selector.eye_pos = self.eval_coordf(&frustum.position, ROOT_DEPTH);
        selector.set_angle(utils::deg_to_rad(lod_angle_deg));

        self.octree.select(selection, &selector)
    }

    /// Select cells through `frustum` and expand every selected brick into
    /// the four-way item-ID lists
    ///
    /// The filter gates the query as a whole (a filter that selects nothing
    /// yields an empty selection); per-item filtering is re-applied
    /// downstream by the cull stage, which also owns the per-item frustum
    /// and size tests.
    pub fn select_cell_items(
        &self,
        selection: &mut ItemSelection,
        filter: &ItemFilter,
        frustum: &Frustum,
        lod_angle_deg: f32,
    ) -> usize {
        if filter.selects_nothing() {
            return 0;
        }

        self.select_cells(&mut selection.cell_selection, frustum, lod_angle_deg);

        // Just grab the items in every selected brick
        let ItemSelection {
            cell_selection,
            inside_items,
            inside_subcell_items,
            partial_items,
            partial_subcell_items,
        } = selection;

        for &brick_id in &cell_selection.inside_bricks {
            let brick = self.octree.concrete_brick(brick_id);
            inside_items.extend_from_slice(&brick.items);
            inside_subcell_items.extend_from_slice(&brick.subcell_items);
        }

        for &brick_id in &cell_selection.partial_bricks {
            let brick = self.octree.concrete_brick(brick_id);
            partial_items.extend_from_slice(&brick.items);
            partial_subcell_items.extend_from_slice(&brick.subcell_items);
        }

        selection.num_items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::filter::Builder as FilterBuilder;
    use crate::scene::key::Builder as KeyBuilder;
    use approx::assert_relative_eq;

    fn default_tree() -> ItemSpatialTree {
        ItemSpatialTree::default()
    }

    fn live_cells(tree: &ItemSpatialTree) -> usize {
        tree.octree().num_allocated_cells() - tree.octree().num_free_cells()
    }

    fn live_bricks(tree: &ItemSpatialTree) -> usize {
        tree.octree().num_allocated_bricks() - tree.octree().num_free_bricks()
    }

    fn all_selected_items(selection: &ItemSelection) -> Vec<ItemId> {
        let mut ids = Vec::new();
        ids.extend_from_slice(&selection.inside_items);
        ids.extend_from_slice(&selection.inside_subcell_items);
        ids.extend_from_slice(&selection.partial_items);
        ids.extend_from_slice(&selection.partial_subcell_items);
        ids
    }

    fn whole_volume_frustum(tree: &ItemSpatialTree, eye: Vec3) -> Frustum {
        let margin = 1.0;
        let region = Aabb::new(
            tree.origin() - Vec3::new(margin, margin, margin),
            tree.origin() + Vec3::new(tree.size(), tree.size(), tree.size()),
        );
        Frustum::from_aabb(&region, eye, Vec3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn test_eval_coord_pos_round_trip() {
        let tree = default_tree();
        let pos = Vec3::new(12.0, -230.0, 1000.0);
        let coord = tree.eval_coord(&pos, METRIC_COORD_DEPTH);
        let back = tree.eval_pos(&coord, METRIC_COORD_DEPTH);
        // Quantized to the finest cell width (1 unit for the default tree)
        assert_relative_eq!(back, pos, epsilon = 1.0);
    }

    #[test]
    fn test_eval_location_contains_bound() {
        let tree = default_tree();
        let bounds = [
            Aabb::from_corner_size(Vec3::new(0.0, 0.0, 0.0), 1.0),
            Aabb::from_corner_size(Vec3::new(100.5, -320.25, 7.0), 13.0),
            Aabb::from_corner_size(Vec3::new(-8000.0, 4000.0, 4000.0), 900.0),
            Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(2.0, 5.0, 2.0)),
        ];
        for bound in &bounds {
            let (location, _, _) = tree.eval_location(bound);
            let cell_bound = tree.eval_bound(&location);
            assert!(
                cell_bound.contains_aabb(bound),
                "cell {:?} does not contain {:?}",
                cell_bound,
                bound
            );
        }
    }

    #[test]
    fn test_eval_location_picks_coarsest_necessary_cell() {
        let tree = default_tree();

        // A unit bound aligned inside one finest cell
        let (tight, _, _) =
            tree.eval_location(&Aabb::from_corner_size(Vec3::new(10.25, 10.25, 10.25), 0.5));
        assert_eq!(tight.depth, METRIC_COORD_DEPTH);

        // The same extent crossing the volume midplane resolves to the root,
        // not to some deep cell on one side
        let (across, _, _) =
            tree.eval_location(&Aabb::new(Vec3::new(-0.5, 10.0, 10.0), Vec3::new(0.5, 10.5, 10.5)));
        assert_eq!(across.depth, ROOT_DEPTH);

        // Crossing a depth-1 boundary on one axis only widens as far as needed
        let (wide, _, _) = tree.eval_location(&Aabb::new(
            Vec3::new(8191.0, 10.0, 10.0),
            Vec3::new(8193.0, 11.0, 11.0),
        ));
        assert_eq!(wide.depth, 1);
    }

    #[test]
    fn test_straddling_and_null_bounds_go_to_root() {
        let tree = default_tree();

        // Sticking out of the volume on one axis
        let (out, _, _) = tree.eval_location(&Aabb::new(
            Vec3::new(-17000.0, 0.0, 0.0),
            Vec3::new(-16000.0, 1.0, 1.0),
        ));
        assert_eq!(out, Location::root());

        // Spanning the entire volume
        let whole = Aabb::new(tree.origin(), tree.origin() + Vec3::new(32768.0, 32768.0, 32768.0));
        let (span, _, _) = tree.eval_location(&whole);
        assert_eq!(span, Location::root());

        assert_eq!(tree.eval_location(&Aabb::null()).0, Location::root());
    }

    #[test]
    fn test_reset_item_classifies_small_items() {
        let mut tree = default_tree();
        let mut key = KeyBuilder::opaque_shape().build();

        // 0.4 units in a 1-unit cell: below half the cell width
        let bound = Aabb::from_corner_size(Vec3::new(10.1, 10.1, 10.1), 0.4);
        let cell = tree.reset_item(INVALID_CELL, key, &bound, 1, &mut key);
        assert!(key.is_small());

        let brick = tree.octree().concrete_cell(cell).brick();
        let brick = tree.octree().concrete_brick(brick);
        assert_eq!(brick.subcell_items, vec![1]);
        assert!(brick.items.is_empty());
    }

    #[test]
    fn test_reset_item_is_idempotent() {
        let mut tree = default_tree();
        let bound = Aabb::from_corner_size(Vec3::new(50.0, 50.0, 50.0), 2.0);

        let mut key = KeyBuilder::opaque_shape().build();
        let cell = tree.reset_item(INVALID_CELL, key, &bound, 1, &mut key);
        assert_ne!(cell, INVALID_CELL);

        let cells_after_first = live_cells(&tree);

        // Same call again, with the persisted cell and key, is a no-op
        let old_key = key;
        let cell_again = tree.reset_item(cell, old_key, &bound, 1, &mut key);
        assert_eq!(cell_again, cell);
        assert_eq!(live_cells(&tree), cells_after_first);

        let brick = tree.octree().concrete_cell(cell).brick();
        let brick = tree.octree().concrete_brick(brick);
        assert_eq!(brick.items, vec![1]);
        assert!(brick.subcell_items.is_empty());
    }

    #[test]
    fn test_reset_item_relocates_and_cleans_up() {
        let mut tree = default_tree();
        let baseline_cells = live_cells(&tree);
        let baseline_bricks = live_bricks(&tree);

        let mut key = KeyBuilder::opaque_shape().build();
        let bound_a = Aabb::from_corner_size(Vec3::new(100.0, 100.0, 100.0), 2.0);
        let cell_a = tree.reset_item(INVALID_CELL, key, &bound_a, 1, &mut key);

        // Move far away: the old branch has nothing left and is reclaimed
        let old_key = key;
        let bound_b = Aabb::from_corner_size(Vec3::new(-5000.0, 2000.0, 42.0), 2.0);
        let cell_b = tree.reset_item(cell_a, old_key, &bound_b, 1, &mut key);
        assert_ne!(cell_b, cell_a);

        let brick = tree.octree().concrete_cell(cell_b).brick();
        assert_eq!(tree.octree().concrete_brick(brick).items, vec![1]);

        // Remove entirely: allocation returns to the pre-insertion baseline
        tree.remove_item(cell_b, key, 1);
        assert_eq!(live_cells(&tree), baseline_cells);
        assert_eq!(live_bricks(&tree), baseline_bricks);
    }

    #[test]
    fn test_view_space_items_are_not_placed() {
        let mut tree = default_tree();
        let mut key = KeyBuilder::background().build();
        let cell = tree.reset_item(
            INVALID_CELL,
            key,
            &Aabb::from_corner_size(Vec3::zeros(), 1.0),
            1,
            &mut key,
        );
        assert_eq!(cell, INVALID_CELL);
        assert_eq!(live_bricks(&tree), 0);
    }

    #[test]
    fn test_select_round_trip_returns_every_item() {
        let mut tree = default_tree();
        let filter = FilterBuilder::visible_world_items().build();

        // A grid of unit items around the origin
        let mut num_items = 0;
        for i in -2..3 {
            for j in -2..3 {
                for k in -2..3 {
                    num_items += 1;
                    let mut key = KeyBuilder::opaque_shape().build();
                    let corner = Vec3::new(i as f32 * 10.0, j as f32 * 10.0, k as f32 * 10.0);
                    let cell = tree.reset_item(
                        INVALID_CELL,
                        key,
                        &Aabb::from_corner_size(corner, 1.0),
                        num_items,
                        &mut key,
                    );
                    assert_ne!(cell, INVALID_CELL);
                }
            }
        }

        // A frustum holding the whole grid, eye close enough that no cell
        // fails the minimum LOD angle
        let region = Aabb::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        let frustum = Frustum::from_aabb(&region, Vec3::new(0.0, 0.0, 60.0), Vec3::new(0.0, 0.0, -1.0));

        let mut selection = ItemSelection::default();
        let count = tree.select_cell_items(&mut selection, &filter, &frustum, 1.0 / 60.0);
        assert_eq!(count, num_items as usize);

        // No duplicates, no omissions
        let mut ids = all_selected_items(&selection);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), num_items as usize);
        assert_eq!(*ids.first().unwrap(), 1);
        assert_eq!(*ids.last().unwrap(), num_items);
    }

    #[test]
    fn test_lod_angle_is_monotonic() {
        let mut tree = default_tree();
        let filter = FilterBuilder::visible_world_items().build();

        let mut id = 0;
        for i in 0..6 {
            for j in 0..6 {
                id += 1;
                let mut key = KeyBuilder::opaque_shape().build();
                let corner = Vec3::new(i as f32 * 350.0, j as f32 * 350.0, -400.0);
                tree.reset_item(
                    INVALID_CELL,
                    key,
                    &Aabb::from_corner_size(corner, 1.0 + (i as f32)),
                    id,
                    &mut key,
                );
            }
        }

        let frustum = whole_volume_frustum(&tree, Vec3::new(0.0, 0.0, 0.0));

        let mut last_count = usize::MAX;
        for angle in [0.05, 0.5, 2.0, 10.0, 45.0] {
            let mut selection = ItemSelection::default();
            let count = tree.select_cell_items(&mut selection, &filter, &frustum, angle);
            assert!(
                count <= last_count,
                "angle {} selected {} items, more than the previous {}",
                angle,
                count,
                last_count
            );
            last_count = count;
        }
    }

    #[test]
    fn test_volume_spanning_item_is_always_partial() {
        let mut tree = default_tree();
        let filter = FilterBuilder::visible_world_items().build();

        let whole = Aabb::new(tree.origin(), tree.origin() + Vec3::new(32768.0, 32768.0, 32768.0));
        let mut key = KeyBuilder::opaque_shape().build();
        let cell = tree.reset_item(INVALID_CELL, key, &whole, 1, &mut key);
        assert_eq!(cell, crate::spatial::octree::ROOT_CELL);

        // Any frustum at all: the root is always selected partially
        let region = Aabb::new(Vec3::new(4000.0, 4000.0, 4000.0), Vec3::new(4001.0, 4001.0, 4001.0));
        let frustum = Frustum::from_aabb(&region, Vec3::new(4000.0, 4000.0, 4010.0), Vec3::new(0.0, 0.0, -1.0));

        let mut selection = ItemSelection::default();
        tree.select_cell_items(&mut selection, &filter, &frustum, 2.0);
        assert_eq!(selection.partial_items, vec![1]);
    }

    #[test]
    fn test_two_region_scenario_with_two_degree_lod() {
        let mut tree = default_tree();
        let filter = FilterBuilder::visible_world_items().build();

        // Far item first, so the near item's insertion has a clean baseline
        let mut far_key = KeyBuilder::opaque_shape().build();
        let far_cell = tree.reset_item(
            INVALID_CELL,
            far_key,
            &Aabb::new(Vec3::new(100.0, 100.0, 100.0), Vec3::new(101.0, 101.0, 101.0)),
            2,
            &mut far_key,
        );
        assert_ne!(far_cell, INVALID_CELL);

        let baseline_cells = live_cells(&tree);
        let baseline_bricks = live_bricks(&tree);

        let mut near_key = KeyBuilder::opaque_shape().build();
        let near_cell = tree.reset_item(
            INVALID_CELL,
            near_key,
            &Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
            1,
            &mut near_key,
        );
        assert_ne!(near_cell, INVALID_CELL);

        // A frustum around the first region only
        let region = Aabb::new(Vec3::new(-2.0, -2.0, -2.0), Vec3::new(3.0, 3.0, 3.0));
        let frustum = Frustum::from_aabb(&region, Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0));

        let mut selection = ItemSelection::default();
        let count = tree.select_cell_items(&mut selection, &filter, &frustum, 2.0);
        assert_eq!(count, 1);
        assert_eq!(all_selected_items(&selection), vec![1]);

        // Removing the near item returns allocation to its baseline
        tree.remove_item(near_cell, near_key, 1);
        assert_eq!(live_cells(&tree), baseline_cells);
        assert_eq!(live_bricks(&tree), baseline_bricks);
    }

    #[test]
    fn test_select_with_nothing_filter_is_empty() {
        let mut tree = default_tree();
        let mut key = KeyBuilder::opaque_shape().build();
        tree.reset_item(
            INVALID_CELL,
            key,
            &Aabb::from_corner_size(Vec3::zeros(), 1.0),
            1,
            &mut key,
        );

        let frustum = whole_volume_frustum(&tree, Vec3::zeros());
        let mut selection = ItemSelection::default();
        let count = tree.select_cell_items(
            &mut selection,
            &FilterBuilder::nothing().build(),
            &frustum,
            2.0,
        );
        assert_eq!(count, 0);
        assert_eq!(selection.num_items(), 0);
    }
}
