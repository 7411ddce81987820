//! Fixed-point octree coordinates
//!
//! Integer cell coordinates, per-depth cell widths and the half-plane
//! frustum classification used by the octree traversal. Everything in this
//! module is stateless: plain types and pure functions over them.
//!
//! Coordinates use 16-bit integers on each axis, which gives 32768 cell
//! positions at the finest depth. With the default tree size of 32768 units
//! that maps the world from 32 km root cells down to 1 m leaf cells.

use crate::foundation::math::{Vec3, Vec4};

/// Depth of a cell in the hierarchy, 0 at the root
pub type Depth = i8;

/// The root depth
pub const ROOT_DEPTH: Depth = 0;

/// Maximum subdivision depth; bounds both coordinate precision and recursion
pub const MAX_DEPTH: Depth = 15;

/// Depth at which positions are quantized to integer coordinates
pub const METRIC_COORD_DEPTH: Depth = MAX_DEPTH;

/// Integer coordinate on one axis
pub type Coord = i16;

/// Integer 3D cell coordinate
pub type Coord3 = nalgebra::Vector3<Coord>;

/// Number of child octants per cell
pub const NUM_OCTANTS: usize = 8;

/// Octant of a cell relative to its parent, in `0..8`
///
/// Bit 0 selects the upper half on X, bit 1 on Y, bit 2 on Z.
pub type Octant = u8;

const X_AXIS: Octant = 0x01;
const Y_AXIS: Octant = 0x02;
const Z_AXIS: Octant = 0x04;

const INV_DEPTH_DIM: [f32; (MAX_DEPTH + 1) as usize] = [
    1.0,
    1.0 / 2.0,
    1.0 / 4.0,
    1.0 / 8.0,
    1.0 / 16.0,
    1.0 / 32.0,
    1.0 / 64.0,
    1.0 / 128.0,
    1.0 / 256.0,
    1.0 / 512.0,
    1.0 / 1024.0,
    1.0 / 2048.0,
    1.0 / 4096.0,
    1.0 / 8192.0,
    1.0 / 16384.0,
    1.0 / 32768.0,
];

/// Number of cells along one axis at the given depth
pub fn depth_dimension(depth: Depth) -> i32 {
    1 << depth
}

/// Same as [`depth_dimension`] as a float
pub fn depth_dimension_f(depth: Depth) -> f32 {
    depth_dimension(depth) as f32
}

/// Reciprocal of the depth dimension, i.e. a cell's width in normalized
/// `[0, 1]` tree space
pub fn inv_depth_dimension(depth: Depth) -> f32 {
    INV_DEPTH_DIM[depth as usize]
}

/// Half diagonal of a cell at the given depth, in normalized tree space
///
/// Used as the size proxy for the solid-angle LOD test: sqrt(3) times half
/// the cell width.
pub fn coord_subcell_width(depth: Depth) -> f32 {
    1.7320 * inv_depth_dimension(depth) * 0.5
}

/// The single coordinate bit that distinguishes sibling cells at `depth`
pub fn depth_bitmask(depth: Depth) -> Coord {
    (1u16 << (MAX_DEPTH - depth)) as Coord
}

/// Position of a cell in the hierarchy: integer coordinate plus depth
///
/// The coordinate is expressed in cell units at the location's own depth,
/// so `pos` components are always in `0..(1 << depth)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Cell coordinate at this location's depth
    pub pos: Coord3,
    /// Depth in the hierarchy
    pub depth: Depth,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            pos: Coord3::new(0, 0, 0),
            depth: ROOT_DEPTH,
        }
    }
}

/// Classification of a cell against a view frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// Entirely outside at least one frustum plane; prune the subtree
    Outside,
    /// Straddles the frustum boundary
    Intersect,
    /// Entirely on the inside of all six planes
    Inside,
}

impl Location {
    /// Create a location, checking coordinate range in debug builds
    pub fn new(pos: Coord3, depth: Depth) -> Self {
        debug_assert!(pos.x >= 0 && pos.y >= 0 && pos.z >= 0);
        debug_assert!(
            i32::from(pos.x) < depth_dimension(depth)
                && i32::from(pos.y) < depth_dimension(depth)
                && i32::from(pos.z) < depth_dimension(depth)
        );
        Self { pos, depth }
    }

    /// The root location
    pub fn root() -> Self {
        Self::default()
    }

    /// Center of this cell in normalized `[0, 1]` tree space
    pub fn center(&self) -> Vec3 {
        let inv_dim = inv_depth_dimension(self.depth);
        Vec3::new(
            (f32::from(self.pos.x) + 0.5) * inv_dim,
            (f32::from(self.pos.y) + 0.5) * inv_dim,
            (f32::from(self.pos.z) + 0.5) * inv_dim,
        )
    }

    /// Octant of this cell relative to its parent
    pub fn octant(&self) -> Octant {
        ((self.pos.x & 1) | ((self.pos.y & 1) << 1) | ((self.pos.z & 1) << 2)) as Octant
    }

    /// Per-axis offsets (0 or 1) selecting the given octant
    pub fn octant_axes(octant: Octant) -> Coord3 {
        Coord3::new(
            Coord::from(octant & X_AXIS != 0),
            Coord::from(octant & Y_AXIS != 0),
            Coord::from(octant & Z_AXIS != 0),
        )
    }

    /// Location of this cell's parent
    pub fn parent(&self) -> Location {
        Location {
            pos: self.pos.map(|c| c >> 1),
            depth: if self.depth <= 0 { 0 } else { self.depth - 1 },
        }
    }

    /// Location of the given child octant of this cell
    pub fn child(&self, octant: Octant) -> Location {
        Location::new(self.pos.map(|c| c << 1) + Self::octant_axes(octant), self.depth + 1)
    }

    /// The list of locations from the root down to `destination`, inclusive
    pub fn path_to(destination: &Location) -> Vec<Location> {
        let mut path = vec![Location::default(); destination.depth as usize + 1];
        let mut current = *destination;
        path[destination.depth as usize] = current;
        while current.depth > 0 {
            current = current.parent();
            path[current.depth as usize] = current;
        }
        path
    }

    /// The deepest location whose cell spans the whole `[min_coord, max_coord]`
    /// coordinate range
    ///
    /// Widens a depth-indexed bitmask from the root toward `range_depth`; the
    /// deepest depth at which the masked min and max coordinates still agree
    /// identifies the coarsest-necessary cell. The coordinate is then brought
    /// from `range_depth` resolution down to that depth.
    pub fn eval_from_range(min_coord: Coord3, max_coord: Coord3, range_depth: Depth) -> Location {
        let depth_offset = MAX_DEPTH - range_depth;
        let mut depth = depth_offset;
        let mut mask = depth_bitmask(depth);

        while depth < range_depth {
            let next_mask = mask | depth_bitmask(depth + 1);
            if min_coord.map(|c| c & next_mask) != max_coord.map(|c| c & next_mask) {
                break;
            }
            mask = next_mask;
            depth += 1;
        }

        if depth == 0 {
            Location::default()
        } else {
            let source = min_coord.map(|c| c & mask);
            let shift = u32::from((range_depth - depth) as u8);
            Location::new(source.map(|c| c >> shift), depth)
        }
    }

    /// Classify a cell against six tree-space frustum half-planes
    ///
    /// Each plane is `(nx, ny, nz, d)` with the inside where
    /// `dot(n, p) + d >= 0`, expressed in normalized `[0, 1]` tree space.
    /// Per plane, only the two corners extreme along the normal are tested:
    /// if the corner farthest along the normal is outside, the whole cell is
    /// outside; if the nearest corner is outside, the cell straddles.
    pub fn intersect_cell(cell: &Location, frustum: &[Vec4; 6]) -> Intersection {
        fn corner_offset(index: usize) -> Vec3 {
            Vec3::new(
                (index & 1) as f32,
                ((index >> 1) & 1) as f32,
                ((index >> 2) & 1) as f32,
            )
        }

        fn normal_to_index(n: &Vec3) -> usize {
            let mut index = 0;
            if n.x >= 0.0 {
                index |= 1;
            }
            if n.y >= 0.0 {
                index |= 2;
            }
            if n.z >= 0.0 {
                index |= 4;
            }
            index
        }

        fn half_plane_test(plane: &Vec4, pos: &Vec3) -> bool {
            plane.dot(&Vec4::new(pos.x, pos.y, pos.z, 1.0)) >= 0.0
        }

        let cell_size = inv_depth_dimension(cell.depth);
        let cell_pos = Vec3::new(
            f32::from(cell.pos.x),
            f32::from(cell.pos.y),
            f32::from(cell.pos.z),
        ) * cell_size;

        let mut partial = false;
        for plane in frustum {
            let normal = Vec3::new(plane.x, plane.y, plane.z);

            let neg_test_point = cell_pos + corner_offset(normal_to_index(&normal)) * cell_size;
            if !half_plane_test(plane, &neg_test_point) {
                return Intersection::Outside;
            }

            let pos_test_point = cell_pos + corner_offset(normal_to_index(&-normal)) * cell_size;
            if !half_plane_test(plane, &pos_test_point) {
                partial = true;
            }
        }

        if partial {
            Intersection::Intersect
        } else {
            Intersection::Inside
        }
    }
}
