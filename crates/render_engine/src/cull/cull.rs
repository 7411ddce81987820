//! Spatial selection culling job

use crate::foundation::geometry::Aabb;
use crate::foundation::math::{utils, Vec3};
use crate::scene::filter::ItemFilter;
use crate::scene::frame::FrameView;
use crate::scene::item::{ItemBound, ItemBounds};
use crate::scene::scene::Scene;
use crate::spatial::item_tree::ItemSelection;
use crate::spatial::octree::{MAX_LOD_ANGLE, MIN_LOD_ANGLE};

/// Per-frame culling counters
///
/// Out-of-view and too-small rejections are the intended steady-state output
/// of the culling algorithm, never errors: these counters are the only place
/// they are observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderDetails {
    /// Items dropped by the per-item frustum test
    pub out_of_view: usize,
    /// Items dropped by the size/solid-angle test
    pub too_small: usize,
    /// Items that survived every active test
    pub rendered: usize,
}

/// A size/solid-angle predicate over item bounds, true to keep the item
///
/// The standard functor compares the bound's apparent angular size from the
/// eye against a threshold angle, mirroring the cell-level LOD gate of the
/// tree traversal.
pub fn lod_cull_functor(eye: Vec3, lod_angle_deg: f32) -> impl Fn(&Aabb) -> bool {
    let angle = utils::deg_to_rad(lod_angle_deg).clamp(MIN_LOD_ANGLE, MAX_LOD_ANGLE);
    let tan_alpha = angle.tan();
    let square_tan_alpha = tan_alpha * tan_alpha;

    move |bound: &Aabb| {
        if bound.is_null() {
            return true;
        }
        let eye_to_center = bound.center() - eye;
        let size = bound.largest_dimension();
        (size * size / eye_to_center.dot(&eye_to_center)) >= square_tan_alpha
    }
}

/// Per-frame job reducing an [`ItemSelection`] to the items actually worth
/// drawing
///
/// Re-applies the item filter to every candidate (defense in depth against
/// stale cell contents), then applies only the tests each bucket still
/// needs: items of fully-inside cells skip the frustum test, normal-size
/// items skip the size test, and partial subcell items get both. Rejected
/// items are simply dropped from the output, never touched in the tree.
pub struct CullSpatialSelection<F: Fn(&Aabb) -> bool> {
    /// Bucket filter re-applied per item
    pub filter: ItemFilter,
    /// Caller-supplied size/solid-angle predicate
    pub cull_functor: F,
    /// Counters accumulated by the last run
    pub details: RenderDetails,
}

impl<F: Fn(&Aabb) -> bool> CullSpatialSelection<F> {
    /// Create a culling job for the given filter and size predicate
    pub fn new(filter: ItemFilter, cull_functor: F) -> Self {
        Self {
            filter,
            cull_functor,
            details: RenderDetails::default(),
        }
    }

    fn frustum_test(&mut self, view: &FrameView, bound: &Aabb) -> bool {
        if !bound.is_null() && !view.frustum.intersects_aabb(bound) {
            self.details.out_of_view += 1;
            return false;
        }
        true
    }

    fn solid_angle_test(&mut self, bound: &Aabb) -> bool {
        if !bound.is_null() && !(self.cull_functor)(bound) {
            self.details.too_small += 1;
            return false;
        }
        true
    }

    /// Cull the selection down to the surviving item bounds
    pub fn run(&mut self, scene: &Scene, view: &FrameView, selection: &ItemSelection) -> ItemBounds {
        self.details = RenderDetails::default();
        let mut out_items = ItemBounds::with_capacity(selection.num_items());

        // Inside cells: no further frustum test on their items
        for &id in &selection.inside_items {
            if let Some(item) = scene.item(id) {
                if self.filter.test(&item.key()) {
                    self.details.rendered += 1;
                    out_items.push(ItemBound::new(id, item.bound()));
                }
            }
        }

        // Inside subcell items still answer for their own size
        for &id in &selection.inside_subcell_items {
            if let Some(item) = scene.item(id) {
                if self.filter.test(&item.key()) {
                    let bound = item.bound();
                    if self.solid_angle_test(&bound) {
                        self.details.rendered += 1;
                        out_items.push(ItemBound::new(id, bound));
                    }
                }
            }
        }

        // Partial cells: their items need the per-item frustum test
        for &id in &selection.partial_items {
            if let Some(item) = scene.item(id) {
                if self.filter.test(&item.key()) {
                    let bound = item.bound();
                    if self.frustum_test(view, &bound) {
                        self.details.rendered += 1;
                        out_items.push(ItemBound::new(id, bound));
                    }
                }
            }
        }

        // Partial subcell items get both tests
        for &id in &selection.partial_subcell_items {
            if let Some(item) = scene.item(id) {
                if self.filter.test(&item.key()) {
                    let bound = item.bound();
                    if self.frustum_test(view, &bound) && self.solid_angle_test(&bound) {
                        self.details.rendered += 1;
                        out_items.push(ItemBound::new(id, bound));
                    }
                }
            }
        }

        log::trace!(
            "CullSpatialSelection: {} rendered, {} out of view, {} too small",
            self.details.rendered,
            self.details.out_of_view,
            self.details.too_small,
        );

        out_items
    }
}
