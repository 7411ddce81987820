//! Generic sparse octree index
//!
//! Index-based node storage for a bounded hierarchy of up to 2^(3*15)
//! addressable cells, none of which exist until a path is allocated to them.
//! Cells and bricks live in dense arenas addressed by integer index and are
//! recycled through free-lists, so steady-state insert/remove traffic causes
//! no allocation churn and no pointer invalidation.

use bitflags::bitflags;

use crate::foundation::math::{Vec3, Vec4};
use crate::scene::item::ItemId;
use crate::spatial::coords::{
    coord_subcell_width, Intersection, Location, Octant, NUM_OCTANTS,
};

/// Index of a cell or brick in the octree arenas
pub type Index = i32;

/// Sentinel for a missing cell, brick or link
pub const INVALID_CELL: Index = -1;

/// Index of the always-present root cell
pub const ROOT_CELL: Index = 0;

/// A list of cell or brick indices
pub type Indices = Vec<Index>;

// Allocation is capped by the index type; reaching the cap yields
// INVALID_CELL rather than growing unbounded.
const MAXIMUM_INDEX: Index = Index::MAX;

const PARENT_LINK: usize = NUM_OCTANTS;
const BRICK_LINK: usize = PARENT_LINK + 1;
const NUM_LINKS: usize = BRICK_LINK + 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct CellFlags: u8 {
        const HAS_CHILDREN = 0x01;
        const BRICK_FILLED = 0x02;
    }
}

/// A node of the octree
///
/// Owns up to eight child links, a parent link and one brick link, all
/// expressed as arena indices. A cell with no children and an empty (or
/// absent) brick is eligible for reclamation by [`Octree::clean_cell_branch`].
#[derive(Debug, Clone)]
pub struct Cell {
    links: [Index; NUM_LINKS],
    location: Location,
    flags: CellFlags,
}

impl Cell {
    fn new_root() -> Self {
        Self {
            links: [INVALID_CELL; NUM_LINKS],
            location: Location::root(),
            flags: CellFlags::empty(),
        }
    }

    fn with_parent(parent: Index, location: Location) -> Self {
        let mut links = [INVALID_CELL; NUM_LINKS];
        links[PARENT_LINK] = parent;
        Self {
            links,
            location,
            flags: CellFlags::empty(),
        }
    }

    /// Location of this cell in the hierarchy
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Index of the parent cell
    pub fn parent(&self) -> Index {
        self.links[PARENT_LINK]
    }

    /// Whether this cell has a parent (false only at the root)
    pub fn has_parent(&self) -> bool {
        self.parent() != INVALID_CELL
    }

    /// Index of the child cell in the given octant
    pub fn child(&self, octant: Octant) -> Index {
        self.links[octant as usize]
    }

    /// Whether a child exists in the given octant
    pub fn has_child(&self, octant: Octant) -> bool {
        self.child(octant) != INVALID_CELL
    }

    /// Whether any child exists
    pub fn has_children(&self) -> bool {
        self.flags.contains(CellFlags::HAS_CHILDREN)
    }

    fn set_child(&mut self, octant: Octant, child: Index) {
        self.links[octant as usize] = child;
        if child != INVALID_CELL {
            self.flags.insert(CellFlags::HAS_CHILDREN);
        } else if !self.check_has_children() {
            self.flags.remove(CellFlags::HAS_CHILDREN);
        }
    }

    fn check_has_children(&self) -> bool {
        (0..NUM_OCTANTS as Octant).any(|octant| self.has_child(octant))
    }

    /// Index of this cell's brick
    pub fn brick(&self) -> Index {
        self.links[BRICK_LINK]
    }

    /// Whether a brick is attached to this cell
    pub fn has_brick(&self) -> bool {
        self.brick() != INVALID_CELL
    }

    fn set_brick(&mut self, brick: Index) {
        self.links[BRICK_LINK] = brick;
    }

    /// Mark the attached brick as holding at least one item
    ///
    /// Only meaningful inside an [`Octree::access_cell_brick`] accessor, the
    /// sole place brick contents change.
    pub fn set_brick_filled(&mut self) {
        self.flags.insert(CellFlags::BRICK_FILLED);
    }

    /// Mark the attached brick as empty, making the cell reclaimable
    pub fn set_brick_empty(&mut self) {
        self.flags.remove(CellFlags::BRICK_FILLED);
    }

    /// Whether the attached brick holds no items (or no brick is attached)
    pub fn is_brick_empty(&self) -> bool {
        !self.flags.contains(CellFlags::BRICK_FILLED)
    }

    fn free(&mut self) {
        self.links = [INVALID_CELL; NUM_LINKS];
        self.location = Location::root();
        self.flags = CellFlags::empty();
    }
}

/// Per-cell item payload
///
/// Two item-ID lists: `items` for items whose bound is comparable to the
/// cell, `subcell_items` for items much smaller than the cell, which defer
/// to a finer per-item test at selection time.
#[derive(Debug, Clone, Default)]
pub struct Brick {
    /// Items sized on the order of the owning cell
    pub items: Vec<ItemId>,
    /// Items much smaller than the owning cell
    pub subcell_items: Vec<ItemId>,
}

impl Brick {
    fn free(&mut self) {
        self.items.clear();
        self.subcell_items.clear();
    }

    /// Whether both item lists are empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.subcell_items.is_empty()
    }
}

/// Result of a frustum query over the cell hierarchy
///
/// Cells fully inside the frustum are kept apart from cells straddling its
/// boundary: items of "inside" cells need no further frustum test downstream,
/// items of "partial" cells do.
#[derive(Debug, Default)]
pub struct CellSelection {
    /// Cells fully inside the frustum
    pub inside_cells: Indices,
    /// Bricks of the fully-inside cells
    pub inside_bricks: Indices,
    /// Cells straddling the frustum boundary
    pub partial_cells: Indices,
    /// Bricks of the straddling cells
    pub partial_bricks: Indices,
}

impl CellSelection {
    fn cells_mut(&mut self, inside: bool) -> &mut Indices {
        if inside {
            &mut self.inside_cells
        } else {
            &mut self.partial_cells
        }
    }

    fn bricks_mut(&mut self, inside: bool) -> &mut Indices {
        if inside {
            &mut self.inside_bricks
        } else {
            &mut self.partial_bricks
        }
    }

    /// Number of selected bricks across both classifications
    pub fn size(&self) -> usize {
        self.inside_bricks.len() + self.partial_bricks.len()
    }

    /// Reset all four lists, keeping their capacity
    pub fn clear(&mut self) {
        self.inside_cells.clear();
        self.inside_bricks.clear();
        self.partial_cells.clear();
        self.partial_bricks.clear();
    }
}

/// Smallest LOD angle accepted by [`FrustumSelector::set_angle`], one arc-minute
pub const MIN_LOD_ANGLE: f32 = std::f32::consts::PI / (180.0 * 60.0);

/// Largest LOD angle accepted by [`FrustumSelector::set_angle`], 45 degrees
pub const MAX_LOD_ANGLE: f32 = std::f32::consts::FRAC_PI_4;

/// Frustum and level-of-detail parameters for a selection traversal
///
/// Planes and eye position are expressed in normalized `[0, 1]` tree space;
/// [`crate::spatial::item_tree::ItemSpatialTree::select_cells`] performs the
/// world-to-tree conversion.
#[derive(Debug, Clone)]
pub struct FrustumSelector {
    /// Six half-planes `(nx, ny, nz, d)`, inside where `dot(n, p) + d >= 0`
    pub frustum: [Vec4; 6],
    /// Eye position in normalized tree space
    pub eye_pos: Vec3,
    angle: f32,
    square_tan_alpha: f32,
}

impl Default for FrustumSelector {
    fn default() -> Self {
        let mut selector = Self {
            frustum: [Vec4::zeros(); 6],
            eye_pos: Vec3::zeros(),
            angle: 0.0,
            square_tan_alpha: 0.0,
        };
        selector.set_angle(MIN_LOD_ANGLE);
        selector
    }
}

impl FrustumSelector {
    /// Set the LOD solid angle in radians, clamped to
    /// [[`MIN_LOD_ANGLE`], [`MAX_LOD_ANGLE`]]
    ///
    /// The clamp avoids degenerate always-select or always-reject behavior.
    pub fn set_angle(&mut self, radians: f32) {
        self.angle = radians.clamp(MIN_LOD_ANGLE, MAX_LOD_ANGLE);
        let tan_alpha = self.angle.tan();
        self.square_tan_alpha = tan_alpha * tan_alpha;
    }

    /// The clamped LOD angle in radians
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Solid-angle test margin for a feature of `size` at `point`
    ///
    /// Non-negative when the feature's apparent angular size from the eye
    /// meets the LOD threshold; negative when it is too small to matter.
    pub fn test_solid_angle(&self, point: &Vec3, size: f32) -> f32 {
        let eye_to_point = point - self.eye_pos;
        (size * size / eye_to_point.dot(&eye_to_point)) - self.square_tan_alpha
    }
}

/// Sparse bounded octree with index-addressed cells and bricks
///
/// Starts with only the root cell allocated. Paths of cells are created on
/// demand by [`Octree::index_cell_path`] and reclaimed bottom-up by
/// [`Octree::clean_cell_branch`]; freed slots are recycled before the arenas
/// grow.
#[derive(Debug)]
pub struct Octree {
    cells: Vec<Cell>,
    bricks: Vec<Brick>,
    // stacks of freed indices reused before growing the arenas
    free_cells: Indices,
    free_bricks: Indices,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new()
    }
}

impl Octree {
    /// Create an octree containing only the root cell
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::new_root()],
            bricks: Vec::new(),
            free_cells: Vec::new(),
            free_bricks: Vec::new(),
        }
    }

    /// Whether `index` addresses a cell slot in the arena
    pub fn check_cell_index(&self, index: Index) -> bool {
        index >= 0 && (index as usize) < self.cells.len()
    }

    /// Whether `index` addresses a brick slot in the arena
    pub fn check_brick_index(&self, index: Index) -> bool {
        index >= 0 && (index as usize) < self.bricks.len()
    }

    /// Location of the cell at `index`, or the root location if invalid
    pub fn cell_location(&self, index: Index) -> Location {
        if self.check_cell_index(index) {
            *self.concrete_cell(index).location()
        } else {
            Location::root()
        }
    }

    /// Access a previously allocated cell
    pub fn concrete_cell(&self, index: Index) -> &Cell {
        debug_assert!(self.check_cell_index(index));
        &self.cells[index as usize]
    }

    /// Access a previously allocated brick
    pub fn concrete_brick(&self, index: Index) -> &Brick {
        debug_assert!(self.check_brick_index(index));
        &self.bricks[index as usize]
    }

    fn edit_cell(&mut self, index: Index) -> &mut Cell {
        debug_assert!(self.check_cell_index(index));
        &mut self.cells[index as usize]
    }

    /// Cell slots currently in the arena, including free-listed ones
    pub fn num_allocated_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cell slots waiting on the free-list for reuse
    pub fn num_free_cells(&self) -> usize {
        self.free_cells.len()
    }

    /// Brick slots currently in the arena, including free-listed ones
    pub fn num_allocated_bricks(&self) -> usize {
        self.bricks.len()
    }

    /// Brick slots waiting on the free-list for reuse
    pub fn num_free_bricks(&self) -> usize {
        self.free_bricks.len()
    }

    fn allocate_cell(&mut self, parent: Index, location: &Location) -> Index {
        let octant = location.octant();
        if self.cells[parent as usize].has_child(octant) {
            return self.cells[parent as usize].child(octant);
        }
        debug_assert!(self.cells[parent as usize].location().child(octant) == *location);

        let new_index = if let Some(reused) = self.free_cells.pop() {
            self.cells[reused as usize] = Cell::with_parent(parent, *location);
            reused
        } else {
            let new_index = self.cells.len() as Index;
            if new_index >= MAXIMUM_INDEX {
                // Out of index space: report the failure instead of growing
                return INVALID_CELL;
            }
            self.cells.push(Cell::with_parent(parent, *location));
            new_index
        };

        self.cells[parent as usize].set_child(octant, new_index);
        new_index
    }

    fn free_cell(&mut self, index: Index) {
        if self.check_cell_index(index) {
            self.cells[index as usize].free();
            self.free_cells.push(index);
        }
    }

    fn allocate_brick(&mut self) -> Index {
        if let Some(reused) = self.free_bricks.pop() {
            return reused;
        }
        let brick_index = self.bricks.len() as Index;
        if brick_index >= MAXIMUM_INDEX {
            // Bricks are allocated alongside cells, which are already capped,
            // so this is not reachable in practice
            return INVALID_CELL;
        }
        self.bricks.push(Brick::default());
        brick_index
    }

    fn free_brick(&mut self, index: Index) {
        if self.check_brick_index(index) {
            self.bricks[index as usize].free();
            self.free_bricks.push(index);
        }
    }

    /// Cell indices along `path`, stopping at the deepest allocated cell
    ///
    /// Read-only counterpart of [`Octree::index_cell_path`]: never allocates,
    /// the returned list simply ends where the concrete hierarchy ends.
    pub fn index_concrete_cell_path(&self, path: &[Location]) -> Indices {
        let mut current_index = ROOT_CELL;
        let mut cell_path = vec![current_index];

        // Start the path after the root cell
        for location in path.iter().skip(1) {
            let next_index = self.concrete_cell(current_index).child(location.octant());
            if next_index == INVALID_CELL {
                break;
            }
            current_index = next_index;
            cell_path.push(current_index);
        }

        cell_path
    }

    /// Cell indices along `path`, allocating any missing cells
    ///
    /// Allocation is pay-as-you-go: only the cells literally on the path are
    /// created. On index-space exhaustion the returned list ends with
    /// [`INVALID_CELL`] so the caller knows the full path could not be
    /// resolved.
    pub fn index_cell_path(&mut self, path: &[Location]) -> Indices {
        // First run through the already-allocated cells
        let mut cell_path = self.index_concrete_cell_path(path);

        // Catch up from the last allocated cell on the path
        let mut current_index = *cell_path.last().unwrap_or(&ROOT_CELL);

        for location in path.iter().skip(cell_path.len()) {
            let new_index = self.allocate_cell(current_index, location);
            current_index = new_index;
            cell_path.push(current_index);

            if new_index == INVALID_CELL {
                // No more indices available; the trailing INVALID_CELL tells
                // the caller allocation stopped here
                break;
            }
        }

        cell_path
    }

    /// Cell index at `location`, allocating the path from the root if needed
    pub fn index_cell(&mut self, location: &Location) -> Index {
        *self
            .index_cell_path(&Location::path_to(location))
            .last()
            .unwrap_or(&INVALID_CELL)
    }

    /// Run `accessor` against a cell's brick, creating the brick on demand
    ///
    /// This is the sole mutation point for brick contents, which keeps the
    /// brick-empty bookkeeping in one place. Returns the brick index, or
    /// [`INVALID_CELL`] when the brick is absent and `create_brick` is false.
    pub fn access_cell_brick(
        &mut self,
        cell_id: Index,
        accessor: impl FnOnce(&mut Cell, &mut Brick, Index),
        create_brick: bool,
    ) -> Index {
        debug_assert!(self.check_cell_index(cell_id));

        if !self.cells[cell_id as usize].has_brick() {
            if !create_brick {
                return INVALID_CELL;
            }
            let new_brick = self.allocate_brick();
            if new_brick == INVALID_CELL {
                return INVALID_CELL;
            }
            self.cells[cell_id as usize].set_brick(new_brick);
        }

        let brick_id = self.cells[cell_id as usize].brick();
        let cell = &mut self.cells[cell_id as usize];
        let brick = &mut self.bricks[brick_id as usize];
        accessor(cell, brick, brick_id);

        brick_id
    }

    /// Reclaim a cell branch starting from a leaf
    ///
    /// Frees the brick if it is empty, then the cell itself if it also has no
    /// children, and continues with the parent. Stops at the root or at the
    /// first cell that is still non-empty or has children. Idempotent on an
    /// already-clean branch.
    pub fn clean_cell_branch(&mut self, index: Index) {
        let mut current = index;
        loop {
            if !self.check_cell_index(current) {
                return;
            }

            if !self.cells[current as usize].is_brick_empty() {
                // Still filled, stop clearing
                return;
            }
            let brick = self.cells[current as usize].brick();
            if brick != INVALID_CELL {
                self.free_brick(brick);
                self.edit_cell(current).set_brick(INVALID_CELL);
            }

            let cell = &self.cells[current as usize];
            let parent_index = cell.parent();
            if !cell.has_parent() {
                // The root, or a slot already on the free-list
                return;
            }
            if cell.has_children() {
                return;
            }

            let octant = cell.location().octant();
            self.edit_cell(parent_index).set_child(octant, INVALID_CELL);
            self.free_cell(current);

            current = parent_index;
        }
    }

    /// Select the cells and bricks visible through `selector`
    ///
    /// The root is never frustum- or LOD-tested: it is always included in the
    /// partial set so items that could not be localized deeper (null or
    /// volume-straddling bounds) are never silently dropped. Returns the
    /// number of bricks added to the selection.
    pub fn select(&self, selection: &mut CellSelection, selector: &FrustumSelector) -> usize {
        let num_selected_in = selection.size();

        self.select_cell_brick(ROOT_CELL, selection, false);

        // then traverse deeper
        for octant in 0..NUM_OCTANTS as Octant {
            let sub_cell_id = self.concrete_cell(ROOT_CELL).child(octant);
            if sub_cell_id != INVALID_CELL {
                self.select_traverse(sub_cell_id, selection, selector);
            }
        }

        selection.size() - num_selected_in
    }

    fn select_traverse(
        &self,
        cell_id: Index,
        selection: &mut CellSelection,
        selector: &FrustumSelector,
    ) -> usize {
        let num_selected_in = selection.size();
        let cell_location = *self.concrete_cell(cell_id).location();

        match Location::intersect_cell(&cell_location, &selector.frustum) {
            Intersection::Outside => {
                // cell is outside, stop traversing this branch
            }
            Intersection::Inside => {
                // traverse the whole branch and collect it as "inside"
                self.select_branch(cell_id, selection, selector);
            }
            Intersection::Intersect => {
                let lod = selector.test_solid_angle(
                    &cell_location.center(),
                    coord_subcell_width(cell_location.depth),
                );
                if lod < 0.0 {
                    return 0;
                }

                // Select this cell partially in frustum
                self.select_cell_brick(cell_id, selection, false);

                // then traverse deeper
                for octant in 0..NUM_OCTANTS as Octant {
                    let sub_cell_id = self.concrete_cell(cell_id).child(octant);
                    if sub_cell_id != INVALID_CELL {
                        self.select_traverse(sub_cell_id, selection, selector);
                    }
                }
            }
        }

        selection.size() - num_selected_in
    }

    fn select_branch(
        &self,
        cell_id: Index,
        selection: &mut CellSelection,
        selector: &FrustumSelector,
    ) -> usize {
        let num_selected_in = selection.size();
        let cell_location = *self.concrete_cell(cell_id).location();

        let lod = selector.test_solid_angle(
            &cell_location.center(),
            coord_subcell_width(cell_location.depth),
        );
        if lod < 0.0 {
            return 0;
        }

        // Select this cell fully inside the frustum
        self.select_cell_brick(cell_id, selection, true);

        // then traverse deeper
        for octant in 0..NUM_OCTANTS as Octant {
            let sub_cell_id = self.concrete_cell(cell_id).child(octant);
            if sub_cell_id != INVALID_CELL {
                self.select_branch(sub_cell_id, selection, selector);
            }
        }

        selection.size() - num_selected_in
    }

    fn select_cell_brick(&self, cell_id: Index, selection: &mut CellSelection, inside: bool) -> usize {
        let num_selected_in = selection.size();
        let cell = self.concrete_cell(cell_id);
        selection.cells_mut(inside).push(cell_id);

        if !cell.is_brick_empty() {
            // Collect the items of this cell
            selection.bricks_mut(inside).push(cell.brick());
        }

        selection.size() - num_selected_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::coords::Coord3;

    fn deep_location() -> Location {
        Location::new(Coord3::new(5, 9, 2), 4)
    }

    #[test]
    fn test_index_cell_path_allocates_on_demand() {
        let mut octree = Octree::new();
        assert_eq!(octree.num_allocated_cells(), 1);

        let path = Location::path_to(&deep_location());
        let indices = octree.index_cell_path(&path);
        assert_eq!(indices.len(), path.len());
        assert_eq!(indices[0], ROOT_CELL);
        assert!(indices.iter().all(|&index| index != INVALID_CELL));

        // One cell per path step below the root
        assert_eq!(octree.num_allocated_cells(), path.len());

        // Indexing the same path again allocates nothing new
        let again = octree.index_cell_path(&path);
        assert_eq!(again, indices);
        assert_eq!(octree.num_allocated_cells(), path.len());
    }

    #[test]
    fn test_index_concrete_cell_path_never_allocates() {
        let octree = Octree::new();
        let path = Location::path_to(&deep_location());
        let indices = octree.index_concrete_cell_path(&path);
        assert_eq!(indices, vec![ROOT_CELL]);
    }

    #[test]
    fn test_access_cell_brick_respects_create_flag() {
        let mut octree = Octree::new();
        let cell = octree.index_cell(&deep_location());

        // Without create, an absent brick is not materialized
        let result = octree.access_cell_brick(cell, |_, _, _| {}, false);
        assert_eq!(result, INVALID_CELL);
        assert_eq!(octree.num_allocated_bricks(), 0);

        // With create, the brick appears and the accessor runs
        let brick = octree.access_cell_brick(
            cell,
            |cell, brick, _| {
                brick.items.push(42);
                cell.set_brick_filled();
            },
            true,
        );
        assert!(octree.check_brick_index(brick));
        assert_eq!(octree.concrete_brick(brick).items, vec![42]);
    }

    #[test]
    fn test_clean_cell_branch_reclaims_and_reuses() {
        let mut octree = Octree::new();
        let location = deep_location();
        let cell = octree.index_cell(&location);

        octree.access_cell_brick(
            cell,
            |cell, brick, _| {
                brick.items.push(7);
                cell.set_brick_filled();
            },
            true,
        );

        let allocated = octree.num_allocated_cells();

        // Empty the brick, then reclaim the branch
        octree.access_cell_brick(
            cell,
            |cell, brick, _| {
                brick.items.clear();
                cell.set_brick_empty();
            },
            false,
        );
        octree.clean_cell_branch(cell);

        // Arena keeps its slots but every cell below the root is free-listed
        assert_eq!(octree.num_allocated_cells(), allocated);
        assert_eq!(octree.num_free_cells(), allocated - 1);
        assert_eq!(octree.num_free_bricks(), 1);

        // Cleaning again is a no-op
        octree.clean_cell_branch(cell);
        assert_eq!(octree.num_free_cells(), allocated - 1);

        // Re-indexing the same location reuses free-listed slots
        let cell_again = octree.index_cell(&location);
        assert!(octree.check_cell_index(cell_again));
        assert_eq!(octree.num_allocated_cells(), allocated);
        assert_eq!(octree.num_free_cells(), 0);
    }

    #[test]
    fn test_select_on_empty_tree_yields_root_only() {
        let octree = Octree::new();
        let mut selection = CellSelection::default();
        let selector = FrustumSelector::default();

        let count = octree.select(&mut selection, &selector);
        assert_eq!(count, 0);
        assert_eq!(selection.partial_cells, vec![ROOT_CELL]);
        assert!(selection.inside_cells.is_empty());
        assert!(selection.partial_bricks.is_empty());
    }

    #[test]
    fn test_lod_angle_is_clamped() {
        let mut selector = FrustumSelector::default();
        selector.set_angle(10.0); // way past 45 degrees
        assert!((selector.angle() - MAX_LOD_ANGLE).abs() < 1e-6);
        selector.set_angle(0.0);
        assert!((selector.angle() - MIN_LOD_ANGLE).abs() < 1e-9);
    }
}
