//! # Render Engine
//!
//! The scene item spatial index and visibility-culling core of a real-time
//! 3D rendering client.
//!
//! ## Features
//!
//! - **Sparse bounded octree**: index-addressed cells and bricks with
//!   free-list reuse, dynamic insert/remove/relocate with no per-frame heap
//!   churn
//! - **Sub-linear frustum queries**: half-plane cell classification plus a
//!   solid-angle LOD gate that prunes distant subtrees in O(1) per level
//! - **Bit-flag item classification**: [`scene::ItemKey`] /
//!   [`scene::ItemFilter`] select item buckets without iterating the index
//! - **Frame task pipeline**: fetch, cull and depth-sort jobs over immutable
//!   per-frame view snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use render_engine::prelude::*;
//!
//! struct Cube {
//!     corner: Vec3,
//! }
//!
//! impl Payload for Cube {
//!     fn key(&self) -> ItemKey {
//!         ItemKey::builder().with_type_shape().build()
//!     }
//!     fn bound(&self) -> Aabb {
//!         Aabb::from_corner_size(self.corner, 1.0)
//!     }
//!     fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
//!         self
//!     }
//! }
//!
//! // Scene transaction phase: file one item
//! let mut scene = Scene::default();
//! let id = scene.allocate_id();
//! let mut transaction = Transaction::default();
//! transaction.reset_item(id, Box::new(Cube { corner: Vec3::zeros() }));
//! scene.enqueue_transaction(transaction);
//! scene.process_transaction_frame();
//!
//! // Cull phase: snapshot the view, fetch, cull, sort
//! let region = Aabb::new(Vec3::new(-50.0, -50.0, -50.0), Vec3::new(50.0, 50.0, 50.0));
//! let frustum = Frustum::from_aabb(&region, Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, 0.0, -1.0));
//! let view = FrameView::new(frustum);
//!
//! let filter = ItemFilter::builder().with_visible().with_world_space().build();
//! let mut fetch = FetchSpatialTree::new(filter);
//! let selection = fetch.run(scene.spatial_tree(), &view);
//!
//! let mut cull = CullSpatialSelection::new(filter, lod_cull_functor(view.eye(), 2.0));
//! let mut items = cull.run(&scene, &view, &selection);
//! DepthSortItems::new(true).run(&view, &mut items);
//!
//! assert_eq!(items.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod cull;
pub mod foundation;
pub mod scene;
pub mod shape;
pub mod spatial;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, CullingConfig},
        cull::{
            lod_cull_functor, CullSpatialSelection, DepthSortItems, DepthSortShapes,
            FetchSpatialTree, RenderDetails,
        },
        foundation::geometry::{Aabb, Frustum, Plane},
        foundation::math::{Mat4, Vec3, Vec4},
        scene::{
            FrameView, Item, ItemBound, ItemBounds, ItemFilter, ItemId, ItemKey, Payload, Scene,
            ShapeBounds, Transaction,
        },
        shape::{ShapeKey, ShapePlumber},
        spatial::{ItemSelection, ItemSpatialTree},
    };
}
