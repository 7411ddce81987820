//! Spatial tree fetch job

use crate::foundation::geometry::Frustum;
use crate::scene::filter::ItemFilter;
use crate::scene::frame::FrameView;
use crate::spatial::item_tree::{ItemSelection, ItemSpatialTree};

/// Per-frame job querying the spatial tree with the frame's frustum
///
/// Purely a read: no item list is mutated and the tree's shape never changes
/// during a fetch. The optional frozen-frustum mode keeps using the first
/// captured frustum across frames so a debugging session can walk around a
/// culling result; the frozen frustum is the only state this job carries
/// between frames and it is strictly opt-in.
#[derive(Debug)]
pub struct FetchSpatialTree {
    /// Bucket filter forwarded to the tree query
    pub filter: ItemFilter,
    /// LOD solid angle in degrees; clamped by the traversal
    pub lod_angle_deg: f32,
    /// When set, keep querying with the first frustum seen
    pub freeze_frustum: bool,
    frozen_frustum: Option<Frustum>,
}

impl FetchSpatialTree {
    /// Create a fetch job for the given filter with a 2 degree LOD angle
    pub fn new(filter: ItemFilter) -> Self {
        Self {
            filter,
            lod_angle_deg: 2.0,
            freeze_frustum: false,
            frozen_frustum: None,
        }
    }

    /// Query the tree for the frame, honoring the freeze-frustum debug mode
    pub fn run(&mut self, tree: &ItemSpatialTree, view: &FrameView) -> ItemSelection {
        let frustum = if self.freeze_frustum {
            self.frozen_frustum
                .get_or_insert_with(|| view.frustum.clone())
                .clone()
        } else {
            self.frozen_frustum = None;
            view.frustum.clone()
        };

        let mut selection = ItemSelection::default();
        tree.select_cell_items(&mut selection, &self.filter, &frustum, self.lod_angle_deg);

        log::trace!(
            "FetchSpatialTree: {} items ({} inside, {} partial) from {} cells",
            selection.num_items(),
            selection.inside_num_items(),
            selection.partial_num_items(),
            selection.cell_selection.inside_cells.len() + selection.cell_selection.partial_cells.len(),
        );

        selection
    }
}
