//! Manifold generation for circle pairs and polygon-circle pairs.

use glam::Vec2;

use crate::collision::manifold::{Manifold, ManifoldKind};
use crate::collision::shapes::{CircleShape, PolygonShape};
use crate::common::math::Transform;

/// Circle versus circle: at most one contact point.
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.p);
    let p_b = xf_b.apply(circle_b.p);
    let d = p_b - p_a;
    let dist_sqr = d.length_squared();
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldKind::Circles;
    manifold.local_point = circle_a.p;
    manifold.local_plane_normal = Vec2::ZERO;
    manifold.count = 1;
    manifold.points[0].local_point = circle_b.p;
    manifold.points[0].id = 0;
    manifold
}

/// Polygon versus circle. Finds the polygon face deepest against the
/// circle center, then branches on whether the center projects onto the
/// face or past either endpoint.
pub fn collide_polygon_and_circle(
    polygon: &PolygonShape,
    xf_a: &Transform,
    circle: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon's frame.
    let c = xf_b.apply(circle.p);
    let c_local = xf_a.apply_inv(c);

    let vertices = polygon.vertices();
    let normals = polygon.normals();
    let radius = polygon.radius + circle.radius;

    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..polygon.vertex_count() {
        let s = normals[i].dot(c_local - vertices[i]);
        if s > radius {
            // Early out: the center is beyond this face by more than the
            // combined radius.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < polygon.vertex_count() {
        vert_index1 + 1
    } else {
        0
    };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    // Center inside the polygon: use the deepest face directly.
    if separation < f32::EPSILON {
        manifold.count = 1;
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_plane_normal = normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.points[0].local_point = circle.p;
        manifold.points[0].id = 0;
        return manifold;
    }

    // Which Voronoi region of the face segment is the center in?
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);

    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return manifold;
        }
        manifold.count = 1;
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_plane_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
        manifold.points[0].local_point = circle.p;
        manifold.points[0].id = 0;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return manifold;
        }
        manifold.count = 1;
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_plane_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
        manifold.points[0].local_point = circle.p;
        manifold.points[0].id = 0;
    } else {
        let face_center = 0.5 * (v1 + v2);
        let separation = (c_local - face_center).dot(normals[vert_index1]);
        if separation > radius {
            return manifold;
        }
        manifold.count = 1;
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_plane_normal = normals[vert_index1];
        manifold.local_point = face_center;
        manifold.points[0].local_point = circle.p;
        manifold.points[0].id = 0;
    }

    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::WorldManifold;
    use approx::assert_relative_eq;

    #[test]
    fn separated_circles_produce_nothing() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), 0.0);
        let m = collide_circles(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.count, 0);
    }

    #[test]
    fn touching_circles_meet_at_midpoint() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let m = collide_circles(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.count, 1);

        let wm = WorldManifold::new(&m, &Transform::IDENTITY, 1.0, &xf_b, 1.0);
        assert_relative_eq!(wm.normal.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(wm.points[0].x, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn circle_on_polygon_face() {
        let polygon = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        // Resting on the top face, slightly overlapping.
        let xf_b = Transform::new(Vec2::new(0.0, 1.4), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.count, 1);
        assert_eq!(m.kind, ManifoldKind::FaceA);
        assert_relative_eq!(m.local_plane_normal.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn circle_near_polygon_corner_uses_vertex_normal() {
        let polygon = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        let xf_b = Transform::new(Vec2::new(1.3, 1.3), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.count, 1);
        // Normal points from the corner toward the circle center.
        assert_relative_eq!(m.local_plane_normal.x, m.local_plane_normal.y, epsilon = 1e-6);
    }

    #[test]
    fn circle_far_from_corner_misses() {
        let polygon = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        let xf_b = Transform::new(Vec2::new(2.0, 2.0), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.count, 0);
    }

    #[test]
    fn circle_center_inside_polygon_uses_deepest_face() {
        let polygon = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.9), 0.0);
        let m = collide_polygon_and_circle(&polygon, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.count, 1);
        assert_relative_eq!(m.local_plane_normal.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn edge_as_segment_collides_with_circle() {
        // An edge shape enters this path as a two-vertex polygon.
        let segment = PolygonShape::new_segment(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let circle = CircleShape::new(0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.4), 0.0);
        let m = collide_polygon_and_circle(&segment, &Transform::IDENTITY, &circle, &xf_b);
        assert_eq!(m.count, 1);
        assert_relative_eq!(m.local_plane_normal.y, 1.0, epsilon = 1e-6);
    }
}
