//! Culling pipeline demo
//!
//! Files a few thousand items into the spatial tree, then runs one frame of
//! the fetch/cull/sort pipeline and prints what survived. Run with
//! `RUST_LOG=debug` to watch the stages report.

use render_engine::foundation::logging;
use render_engine::prelude::*;

struct DemoShape {
    corner: Vec3,
    size: f32,
    transparent: bool,
}

impl Payload for DemoShape {
    fn key(&self) -> ItemKey {
        let builder = ItemKey::builder().with_type_shape();
        if self.transparent {
            builder.with_transparent().build()
        } else {
            builder.build()
        }
    }

    fn bound(&self) -> Aabb {
        Aabb::from_corner_size(self.corner, self.size)
    }

    fn shape_key(&self) -> ShapeKey {
        if self.transparent {
            ShapeKey::builder().with_translucent().build()
        } else {
            ShapeKey::builder().build()
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn main() {
    logging::init();

    let config = CullingConfig::default();
    let mut scene = Scene::new(config.build_tree().expect("default culling config"));

    // Scene transaction phase: a grid of shapes, every seventh transparent
    let mut transaction = Transaction::default();
    let mut count = 0;
    for i in -8..8 {
        for j in -2..2 {
            for k in -8..8 {
                count += 1;
                let id = scene.allocate_id();
                transaction.reset_item(
                    id,
                    Box::new(DemoShape {
                        corner: Vec3::new(i as f32 * 40.0, j as f32 * 40.0, k as f32 * 40.0),
                        size: 2.0 + (count % 5) as f32,
                        transparent: count % 7 == 0,
                    }),
                );
            }
        }
    }
    scene.enqueue_transaction(transaction);
    scene.process_transaction_frame();
    println!("scene: {} items filed", scene.num_items());

    // Cull phase: one frame looking down -Z from just outside the grid
    let region = Aabb::new(
        Vec3::new(-200.0, -100.0, -400.0),
        Vec3::new(200.0, 100.0, 50.0),
    );
    let frustum = Frustum::from_aabb(&region, Vec3::new(0.0, 0.0, 400.0), Vec3::new(0.0, 0.0, -1.0));
    let view = FrameView::new(frustum);

    let filter = ItemFilter::builder().with_visible().with_world_space().build();
    let mut fetch = config.build_fetch(filter);
    let selection = fetch.run(scene.spatial_tree(), &view);
    println!(
        "fetch: {} candidates ({} inside, {} partial)",
        selection.num_items(),
        selection.inside_num_items(),
        selection.partial_num_items()
    );

    let mut cull = CullSpatialSelection::new(filter, lod_cull_functor(view.eye(), config.lod_angle_deg));
    let items = cull.run(&scene, &view, &selection);
    println!(
        "cull: {} rendered, {} out of view, {} too small",
        cull.details.rendered, cull.details.out_of_view, cull.details.too_small
    );

    // Sort phase: opaque front-to-back, translucent back-to-front
    let mut shapes = scene.shape_bounds(&items);
    DepthSortShapes::new(true).run(&view, &mut shapes);
    if let Some(translucent) = shapes.get_mut(&ShapeKey::builder().with_translucent().build()) {
        DepthSortItems::new(false).run(&view, translucent);
    }

    for (key, bucket) in &shapes {
        println!(
            "  bucket {:?}: {} items{}",
            key,
            bucket.len(),
            if key.is_translucent() { " (back to front)" } else { " (front to back)" }
        );
    }
}
