//! Contact manifolds and the feature ids that keep them stable.
//!
//! A manifold stores up to two contact points in the local space of one of
//! the shapes, so it stays meaningful while bodies move between collide
//! passes. Each point carries a packed feature id describing which edges
//! and vertices produced it; matching ids across steps is what lets the
//! solver warm-start from last step's impulses.

use glam::Vec2;

use crate::common::math::Transform;
use crate::common::settings::MAX_MANIFOLD_POINTS;

/// Which geometric features of the two shapes generated a contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub reference_edge: u8,
    pub incident_edge: u8,
    pub incident_vertex: u8,
    /// Set when the reference face belongs to shape B instead of shape A.
    pub flip: bool,
}

/// Pack a feature into the id used for warm-start correlation. Equal
/// features always produce equal keys.
pub fn encode_feature(feature: ContactFeature) -> u32 {
    u32::from(feature.reference_edge)
        | u32::from(feature.incident_edge) << 8
        | u32::from(feature.incident_vertex) << 16
        | u32::from(feature.flip) << 24
}

/// Inverse of [`encode_feature`].
pub fn decode_feature(id: u32) -> ContactFeature {
    ContactFeature {
        reference_edge: (id & 0xff) as u8,
        incident_edge: (id >> 8 & 0xff) as u8,
        incident_vertex: (id >> 16 & 0xff) as u8,
        flip: id >> 24 & 0xff != 0,
    }
}

/// A single point of a manifold, in the reference shape's local space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub id: u32,
}

/// How the manifold's local data is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldKind {
    /// Two circles; `local_point` is circle A's center.
    #[default]
    Circles,
    /// Reference face on shape A; points live in B's local space.
    FaceA,
    /// Reference face on shape B; points live in A's local space.
    FaceB,
}

/// Up to two contact points plus the data needed to reconstruct the world
/// normal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub count: usize,
    pub local_plane_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldKind,
}

/// World-space view of a manifold: one shared normal (from A to B) and the
/// midpoints of the radius-adjusted contact points.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldManifold {
    pub normal: Vec2,
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = WorldManifold::default();
        if manifold.count == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                let d = point_b - point_a;
                out.normal = if d.length_squared() > f32::EPSILON * f32::EPSILON {
                    d.normalize()
                } else {
                    Vec2::new(1.0, 0.0)
                };
                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.q.apply(manifold.local_plane_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for i in 0..manifold.count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(normal)) * normal;
                    let c_b = clip_point - radius_b * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                }
                out.normal = normal;
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.q.apply(manifold.local_plane_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for i in 0..manifold.count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                }
                // Keep the convention: normal points from A to B.
                out.normal = -normal;
            }
        }
        out
    }
}

/// A clip vertex: position plus the feature id it originated from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: u32,
}

/// Sutherland-Hodgman clip of a two-point segment against the half-plane
/// `dot(normal, x) - offset <= 0`. Produces at most two points; a point
/// created by interpolation inherits the id of the vertex that was clipped
/// away.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut num_out = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    if distance0 <= 0.0 {
        v_out[num_out] = v_in[0];
        num_out += 1;
    }
    if distance1 <= 0.0 {
        v_out[num_out] = v_in[1];
        num_out += 1;
    }

    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[num_out].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        v_out[num_out].id = if distance0 > 0.0 {
            v_in[0].id
        } else {
            v_in[1].id
        };
        num_out += 1;
    }

    (v_out, num_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_id_round_trip() {
        let feature = ContactFeature {
            reference_edge: 3,
            incident_edge: 250,
            incident_vertex: 17,
            flip: true,
        };
        assert_eq!(decode_feature(encode_feature(feature)), feature);

        let plain = ContactFeature::default();
        assert_eq!(encode_feature(plain), 0);
        assert_eq!(decode_feature(0), plain);
    }

    #[test]
    fn clip_keeps_inside_points() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: 1,
            },
            ClipVertex {
                v: Vec2::new(-2.0, 0.0),
                id: 2,
            },
        ];
        // Half-plane x <= 0 keeps both.
        let (out, n) = clip_segment_to_line(&v_in, Vec2::new(1.0, 0.0), 0.0);
        assert_eq!(n, 2);
        assert_eq!(out[0].id, 1);
        assert_eq!(out[1].id, 2);
    }

    #[test]
    fn clip_interpolates_crossing_point() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(-1.0, 0.0),
                id: 1,
            },
            ClipVertex {
                v: Vec2::new(3.0, 0.0),
                id: 2,
            },
        ];
        let (out, n) = clip_segment_to_line(&v_in, Vec2::new(1.0, 0.0), 0.0);
        assert_eq!(n, 2);
        // The kept original point, then the interpolated crossing.
        assert_eq!(out[0].v, Vec2::new(-1.0, 0.0));
        assert_eq!(out[1].v, Vec2::new(0.0, 0.0));
        // The new point takes the id of the clipped-away vertex.
        assert_eq!(out[1].id, 2);
    }

    #[test]
    fn clip_rejects_fully_outside_segment() {
        let v_in = [
            ClipVertex {
                v: Vec2::new(1.0, 0.0),
                id: 1,
            },
            ClipVertex {
                v: Vec2::new(2.0, 0.0),
                id: 2,
            },
        ];
        let (_, n) = clip_segment_to_line(&v_in, Vec2::new(1.0, 0.0), 0.0);
        assert_eq!(n, 0);
    }
}
