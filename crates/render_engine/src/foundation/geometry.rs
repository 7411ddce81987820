//! Geometry primitives for bounds and visibility testing
//!
//! Axis-aligned boxes, half-space planes and the six-plane view frustum used
//! by the spatial index and the culling stages.

use crate::foundation::math::{Mat4, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a corner point and a uniform edge length
    pub fn from_corner_size(corner: Vec3, size: f32) -> Self {
        Self {
            min: corner,
            max: corner + Vec3::new(size, size, size),
        }
    }

    /// Create an AABB centered at a point with given half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// The null bound: contains nothing, min above max on every axis.
    ///
    /// Items with no meaningful spatial extent carry a null bound and are
    /// routed to the root cell so they are never culled away.
    pub fn null() -> Self {
        Self {
            min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Check whether this is the null bound
    pub fn is_null(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Get the largest edge length of the AABB
    pub fn largest_dimension(&self) -> f32 {
        let size = self.max - self.min;
        size.x.max(size.y).max(size.z)
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB fully contains another AABB
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Plane defined by normal and distance from origin
///
/// A point `p` is on the positive (inside) half-space when
/// `dot(normal, p) + distance >= 0`.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self {
            normal: normal.normalize(),
            distance,
        }
    }

    /// Create a plane from a normal and a point known to lie on it
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let n = normal.normalize();
        Self {
            normal: n,
            distance: -n.dot(&point),
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }

    /// A point on this plane (the projection of the origin onto it)
    pub fn point(&self) -> Vec3 {
        self.normal * -self.distance
    }
}

/// View frustum for visibility culling
///
/// Six half-space planes with normals pointing into the frustum volume, plus
/// the eye position and view direction used for level-of-detail and depth
/// ordering decisions.
#[derive(Debug, Clone)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
    /// Eye position in world space
    pub position: Vec3,
    /// Normalized view direction in world space
    pub direction: Vec3,
}

impl Frustum {
    /// Create a frustum from six planes, the eye position and view direction
    pub fn new(planes: [Plane; 6], position: Vec3, direction: Vec3) -> Self {
        Self {
            planes,
            position,
            direction: direction.normalize(),
        }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Uses the Gribb-Hartmann method: each clip plane is a sum or difference
    /// of the matrix's fourth row with one of the other rows.
    pub fn from_view_projection(vp: &Mat4, position: Vec3, direction: Vec3) -> Self {
        let row = |i: usize| {
            Vec3::new(vp[(i, 0)], vp[(i, 1)], vp[(i, 2)])
        };
        let row_w = |i: usize| vp[(i, 3)];

        let make_plane = |n: Vec3, d: f32| {
            let len = n.magnitude();
            Plane {
                normal: n / len,
                distance: d / len,
            }
        };

        let planes = [
            make_plane(row(3) + row(0), row_w(3) + row_w(0)), // left
            make_plane(row(3) - row(0), row_w(3) - row_w(0)), // right
            make_plane(row(3) + row(1), row_w(3) + row_w(1)), // bottom
            make_plane(row(3) - row(1), row_w(3) - row_w(1)), // top
            make_plane(row(3) + row(2), row_w(3) + row_w(2)), // near
            make_plane(row(3) - row(2), row_w(3) - row_w(2)), // far
        ];

        Self {
            planes,
            position,
            direction: direction.normalize(),
        }
    }

    /// Build a frustum whose volume is an axis-aligned box
    ///
    /// Handy for orthographic-style queries and for tests that need an exact
    /// region of acceptance.
    pub fn from_aabb(region: &Aabb, position: Vec3, direction: Vec3) -> Self {
        let planes = [
            Plane::new(Vec3::new(1.0, 0.0, 0.0), -region.min.x),
            Plane::new(Vec3::new(-1.0, 0.0, 0.0), region.max.x),
            Plane::new(Vec3::new(0.0, 1.0, 0.0), -region.min.y),
            Plane::new(Vec3::new(0.0, -1.0, 0.0), region.max.y),
            Plane::new(Vec3::new(0.0, 0.0, 1.0), -region.min.z),
            Plane::new(Vec3::new(0.0, 0.0, -1.0), region.max.z),
        ];
        Self {
            planes,
            position,
            direction: direction.normalize(),
        }
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        // For each plane, check if the AABB is completely outside
        for plane in &self.planes {
            // Get the point on the AABB farthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            // If this point is outside the plane, the entire AABB is outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_center_extents() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(aabb.center(), Vec3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(aabb.extents(), Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-6);
        assert_relative_eq!(aabb.largest_dimension(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_null_aabb() {
        let null = Aabb::null();
        assert!(null.is_null());
        assert!(!null.contains_point(Vec3::zeros()));

        let unit = Aabb::from_corner_size(Vec3::zeros(), 1.0);
        assert!(!unit.is_null());
    }

    #[test]
    fn test_aabb_containment() {
        let outer = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0));
        let inner = Aabb::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(3.0, 3.0, 3.0));
        assert!(outer.contains_aabb(&inner));
        assert!(!inner.contains_aabb(&outer));
        assert!(outer.intersects(&inner));
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::from_normal_and_point(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 5.0, 0.0));
        assert_relative_eq!(plane.distance_to_point(Vec3::new(0.0, 7.0, 0.0)), 2.0, epsilon = 1e-6);
        assert_relative_eq!(plane.distance_to_point(Vec3::new(3.0, 5.0, -1.0)), 0.0, epsilon = 1e-6);
        assert!(plane.distance_to_point(Vec3::new(0.0, 1.0, 0.0)) < 0.0);
    }

    #[test]
    fn test_box_frustum_accepts_and_rejects() {
        let region = Aabb::new(Vec3::new(-5.0, -5.0, -5.0), Vec3::new(5.0, 5.0, 5.0));
        let frustum = Frustum::from_aabb(&region, Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));

        let inside = Aabb::from_corner_size(Vec3::new(0.0, 0.0, 0.0), 1.0);
        let outside = Aabb::from_corner_size(Vec3::new(100.0, 100.0, 100.0), 1.0);
        let straddling = Aabb::new(Vec3::new(4.0, 0.0, 0.0), Vec3::new(6.0, 1.0, 1.0));

        assert!(frustum.intersects_aabb(&inside));
        assert!(!frustum.intersects_aabb(&outside));
        assert!(frustum.intersects_aabb(&straddling));
    }
}
