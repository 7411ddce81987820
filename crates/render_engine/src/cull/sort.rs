//! Depth ordering jobs
//!
//! Opaque items draw front-to-back for early-z efficiency; translucent items
//! draw back-to-front for correct blending. Both orders key on the distance
//! of an item's bound center along the view axis, and both sorts are stable
//! so equal-depth items keep their selection order deterministically.

use std::cmp::Ordering;

use crate::scene::frame::FrameView;
use crate::scene::item::{ItemBounds, ShapeBounds};

struct ItemBoundSort {
    center_depth: f32,
    index: usize,
}

fn sort_item_bounds(view: &FrameView, front_to_back: bool, items: &mut ItemBounds) {
    let eye = view.eye();
    let direction = view.direction();

    let mut order: Vec<ItemBoundSort> = items
        .iter()
        .enumerate()
        .map(|(index, item_bound)| {
            let center_depth = if item_bound.bound.is_null() {
                0.0
            } else {
                (item_bound.bound.center() - eye).dot(&direction)
            };
            ItemBoundSort {
                center_depth,
                index,
            }
        })
        .collect();

    order.sort_by(|a, b| {
        let ordering = a
            .center_depth
            .partial_cmp(&b.center_depth)
            .unwrap_or(Ordering::Equal);
        if front_to_back {
            ordering
        } else {
            ordering.reverse()
        }
    });

    let sorted: ItemBounds = order.iter().map(|entry| items[entry.index]).collect();
    *items = sorted;
}

/// Per-frame job ordering surviving items by view depth
#[derive(Debug, Clone, Copy)]
pub struct DepthSortItems {
    /// Front-to-back for opaque passes, back-to-front for translucent ones
    pub front_to_back: bool,
}

impl DepthSortItems {
    /// Create a sort job with the given direction
    pub fn new(front_to_back: bool) -> Self {
        Self { front_to_back }
    }

    /// Stable-sort the items in place
    pub fn run(&self, view: &FrameView, items: &mut ItemBounds) {
        sort_item_bounds(view, self.front_to_back, items);
    }
}

/// Per-frame job ordering each shape-key bucket by view depth
#[derive(Debug, Clone, Copy)]
pub struct DepthSortShapes {
    /// Front-to-back for opaque passes, back-to-front for translucent ones
    pub front_to_back: bool,
}

impl DepthSortShapes {
    /// Create a sort job with the given direction
    pub fn new(front_to_back: bool) -> Self {
        Self { front_to_back }
    }

    /// Stable-sort every bucket of the map in place
    pub fn run(&self, view: &FrameView, shapes: &mut ShapeBounds) {
        for items in shapes.values_mut() {
            sort_item_bounds(view, self.front_to_back, items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::{Aabb, Frustum};
    use crate::foundation::math::Vec3;
    use crate::scene::item::{ItemBound, ItemId};
    use crate::shape::ShapeKey;

    fn view_looking_down_z() -> FrameView {
        let region = Aabb::new(Vec3::new(-100.0, -100.0, -100.0), Vec3::new(100.0, 100.0, 100.0));
        FrameView::new(Frustum::from_aabb(
            &region,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, -1.0),
        ))
    }

    fn cube_at(id: ItemId, z: f32) -> ItemBound {
        ItemBound::new(id, Aabb::from_corner_size(Vec3::new(0.0, 0.0, z), 1.0))
    }

    fn ids(items: &ItemBounds) -> Vec<ItemId> {
        items.iter().map(|item_bound| item_bound.id).collect()
    }

    #[test]
    fn test_front_to_back_and_back_to_front() {
        let view = view_looking_down_z();
        let mut items = vec![cube_at(1, -50.0), cube_at(2, -5.0), cube_at(3, -20.0)];

        DepthSortItems::new(true).run(&view, &mut items);
        assert_eq!(ids(&items), vec![2, 3, 1]);

        DepthSortItems::new(false).run(&view, &mut items);
        assert_eq!(ids(&items), vec![1, 3, 2]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_depths() {
        let view = view_looking_down_z();
        // Same center depth, different lateral positions
        let mut items = vec![
            ItemBound::new(4, Aabb::from_corner_size(Vec3::new(5.0, 0.0, -30.0), 1.0)),
            ItemBound::new(5, Aabb::from_corner_size(Vec3::new(-5.0, 0.0, -30.0), 1.0)),
            cube_at(6, -40.0),
        ];
        DepthSortItems::new(true).run(&view, &mut items);
        assert_eq!(ids(&items), vec![4, 5, 6]);
    }

    #[test]
    fn test_shape_buckets_sort_independently()  {
        let view = view_looking_down_z();
        let mut shapes = ShapeBounds::new();
        shapes.insert(
            ShapeKey::builder().build(),
            vec![cube_at(1, -50.0), cube_at(2, -5.0)],
        );
        shapes.insert(
            ShapeKey::builder().with_translucent().build(),
            vec![cube_at(3, -50.0), cube_at(4, -5.0)],
        );

        DepthSortShapes::new(true).run(&view, &mut shapes);
        assert_eq!(ids(&shapes[&ShapeKey::builder().build()]), vec![2, 1]);

        DepthSortShapes::new(false).run(&view, &mut shapes);
        assert_eq!(
            ids(&shapes[&ShapeKey::builder().with_translucent().build()]),
            vec![3, 4]
        );
    }
}
