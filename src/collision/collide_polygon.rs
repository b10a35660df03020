//! SAT-based manifold generation for convex polygon pairs.

use glam::Vec2;

use crate::collision::manifold::{
    clip_segment_to_line, encode_feature, ClipVertex, ContactFeature, Manifold, ManifoldKind,
};
use crate::collision::shapes::PolygonShape;
use crate::common::math::{cross_vs, Transform};
use crate::common::settings::MAX_MANIFOLD_POINTS;

/// Separation of `poly2` from the given face of `poly1`, measured along
/// that face's world normal at the support vertex of `poly2`.
fn edge_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> f32 {
    let vertices1 = poly1.vertices();
    let normals1 = poly1.normals();
    let vertices2 = poly2.vertices();

    // Face normal in world space, then in poly2's frame.
    let normal1_world = xf1.q.apply(normals1[edge1]);
    let normal1 = xf2.q.apply_inv(normal1_world);

    // Deepest vertex of poly2 against the face.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, v) in vertices2.iter().enumerate() {
        let dot = v.dot(normal1);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let v1 = xf1.apply(vertices1[edge1]);
    let v2 = xf2.apply(vertices2[index]);
    (v2 - v1).dot(normal1_world)
}

/// Find the face of `poly1` with the greatest separation from `poly2`.
///
/// Starts at the face whose normal best aligns with the center-to-center
/// direction and hill-climbs to a neighboring face while separation
/// improves. Convexity makes edge separation unimodal over the face ring,
/// so the climb reaches the global maximum.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (f32, usize) {
    let count1 = poly1.vertex_count();
    let normals1 = poly1.normals();

    // Search direction: vector between centroids, in poly1's frame.
    let d = xf2.apply(poly2.centroid) - xf1.apply(poly1.centroid);
    let d_local1 = xf1.q.apply_inv(d);

    let mut edge = 0;
    let mut max_dot = f32::MIN;
    for i in 0..count1 {
        let dot = normals1[i].dot(d_local1);
        if dot > max_dot {
            max_dot = dot;
            edge = i;
        }
    }

    let s = edge_separation(poly1, xf1, edge, poly2, xf2);

    let prev_edge = (edge + count1 - 1) % count1;
    let s_prev = edge_separation(poly1, xf1, prev_edge, poly2, xf2);

    let next_edge = (edge + 1) % count1;
    let s_next = edge_separation(poly1, xf1, next_edge, poly2, xf2);

    // Pick the climb direction, or stop if the seed face is already best.
    let (mut best_edge, mut best_separation, increment) = if s_prev > s && s_prev > s_next {
        (prev_edge, s_prev, -1i32)
    } else if s_next > s {
        (next_edge, s_next, 1i32)
    } else {
        return (s, edge);
    };

    loop {
        let edge = if increment == -1 {
            (best_edge + count1 - 1) % count1
        } else {
            (best_edge + 1) % count1
        };

        let s = edge_separation(poly1, xf1, edge, poly2, xf2);
        if s > best_separation {
            best_edge = edge;
            best_separation = s;
        } else {
            break;
        }
    }

    (best_separation, best_edge)
}

/// The edge of `poly2` most anti-parallel to the reference face of `poly1`,
/// as two clip vertices in world space.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normals1 = poly1.normals();
    let count2 = poly2.vertex_count();
    let vertices2 = poly2.vertices();
    let normals2 = poly2.normals();

    // Reference normal in poly2's frame.
    let normal1 = xf2.q.apply_inv(xf1.q.apply(normals1[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..count2 {
        let dot = normals2[i].dot(normal1);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < count2 { i1 + 1 } else { 0 };

    [
        ClipVertex {
            v: xf2.apply(vertices2[i1]),
            id: encode_feature(ContactFeature {
                reference_edge: edge1 as u8,
                incident_edge: i1 as u8,
                incident_vertex: 0,
                flip: false,
            }),
        },
        ClipVertex {
            v: xf2.apply(vertices2[i2]),
            id: encode_feature(ContactFeature {
                reference_edge: edge1 as u8,
                incident_edge: i2 as u8,
                incident_vertex: 1,
                flip: false,
            }),
        },
    ]
}

/// Polygon versus polygon via SAT and reference-face clipping.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (separation_a, edge_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (separation_b, edge_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    // Prefer face A unless face B is clearly deeper, so the reference face
    // does not flip-flop between nearly equal choices frame to frame.
    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.001;

    let (poly1, poly2, xf1, xf2, edge1, flip) =
        if separation_b > RELATIVE_TOL * separation_a + ABSOLUTE_TOL {
            manifold.kind = ManifoldKind::FaceB;
            (poly_b, poly_a, xf_b, xf_a, edge_b, true)
        } else {
            manifold.kind = ManifoldKind::FaceA;
            (poly_a, poly_b, xf_a, xf_b, edge_a, false)
        };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.vertex_count();
    let vertices1 = poly1.vertices();

    let v11 = vertices1[edge1];
    let v12 = vertices1[if edge1 + 1 < count1 { edge1 + 1 } else { 0 }];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = cross_vs(local_tangent, 1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.apply(local_tangent);
    let normal = cross_vs(tangent, 1.0);

    let v11 = xf1.apply(v11);
    let v12 = xf1.apply(v12);

    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip the incident edge to the side planes of the reference face.
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1);
    if np < 2 {
        return manifold;
    }
    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2);
    if np < 2 {
        return manifold;
    }

    manifold.local_plane_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for cv in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(cv.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inv(cv.v);
            let mut feature = crate::collision::manifold::decode_feature(cv.id);
            feature.flip = flip;
            cp.id = encode_feature(feature);
            point_count += 1;
        }
    }

    manifold.count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::{decode_feature, WorldManifold};
    use approx::assert_relative_eq;

    #[test]
    fn separated_boxes_produce_nothing() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let xf_b = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let m = collide_polygons(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.count, 0);
    }

    #[test]
    fn stacked_boxes_produce_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        // Box B resting on top of A with slight overlap.
        let xf_b = Transform::new(Vec2::new(0.0, 1.99), 0.0);
        let m = collide_polygons(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.count, 2);

        let wm = WorldManifold::new(&m, &Transform::IDENTITY, a.radius, &xf_b, b.radius);
        assert_relative_eq!(wm.normal.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(wm.normal.y.abs(), 1.0, epsilon = 1e-5);
        // The contact points land on opposite ends of the shared face.
        assert!(wm.points[0].x * wm.points[1].x < 0.0);
    }

    #[test]
    fn manifold_ids_are_distinct_per_point() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let xf_b = Transform::new(Vec2::new(0.5, 1.99), 0.0);
        let m = collide_polygons(&a, &Transform::IDENTITY, &b, &xf_b);
        assert_eq!(m.count, 2);
        assert_ne!(m.points[0].id, m.points[1].id);
    }

    #[test]
    fn face_flip_marks_reference_on_b() {
        // A narrow box hitting the face of a wide box from the side, so the
        // deeper face belongs to B.
        let a = PolygonShape::new_box(0.1, 2.0);
        let b = PolygonShape::new_box(2.0, 2.0);
        let xf_a = Transform::new(Vec2::new(-2.05, 0.0), 0.0);
        let m = collide_polygons(&a, &xf_a, &b, &Transform::IDENTITY);
        if m.kind == ManifoldKind::FaceB {
            for i in 0..m.count {
                assert!(decode_feature(m.points[i].id).flip);
            }
        }
        assert!(m.count > 0);
    }

    #[test]
    fn hill_climb_matches_exhaustive_search() {
        // A hexagon against a rotated box, over a sweep of relative poses.
        // The incremental face search must land on the same face as scanning
        // every face.
        let hex: Vec<Vec2> = (0..6)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::FRAC_PI_3;
                Vec2::new(angle.cos(), angle.sin())
            })
            .collect();
        let poly1 = PolygonShape::new(&hex);
        let poly2 = PolygonShape::new_box(0.8, 0.8);
        let xf1 = Transform::IDENTITY;

        for step in 0..24 {
            let angle = step as f32 * (std::f32::consts::TAU / 24.0);
            let offset = Vec2::new(1.6 * angle.cos(), 1.6 * angle.sin());
            let xf2 = Transform::new(offset, std::f32::consts::FRAC_PI_3);

            let (sep, edge) = find_max_separation(&poly1, &xf1, &poly2, &xf2);

            let mut best_edge = 0;
            let mut best_sep = f32::MIN;
            for i in 0..poly1.vertex_count() {
                let s = edge_separation(&poly1, &xf1, i, &poly2, &xf2);
                if s > best_sep {
                    best_sep = s;
                    best_edge = i;
                }
            }

            assert_eq!(edge, best_edge, "pose step {step}");
            assert_relative_eq!(sep, best_sep, epsilon = 1e-6);
        }
    }

    #[test]
    fn polygon_against_segment_two_gon() {
        // An edge shape goes through the SAT path as a two-vertex polygon.
        let ground = PolygonShape::new_segment(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        let boxy = PolygonShape::new_box(0.5, 0.5);
        let xf_b = Transform::new(Vec2::new(0.0, 0.49), 0.0);
        let m = collide_polygons(&ground, &Transform::IDENTITY, &boxy, &xf_b);
        assert_eq!(m.count, 2);
    }
}
