//! Collision detection: shapes, broad phase, narrow phase, continuous.

pub mod broad_phase;
pub mod collide_circle;
pub mod collide_polygon;
pub mod distance;
pub mod dynamic_tree;
pub mod manifold;
pub mod shapes;
pub mod time_of_impact;

use glam::Vec2;

use crate::common::math::Transform;
use crate::collision::distance::{distance, DistanceInput, SimplexCache};
use crate::collision::shapes::{DistanceProxy, Shape};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Aabb { lower, upper }
    }

    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && self.lower.is_finite() && self.upper.is_finite()
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.lower + self.upper)
    }

    pub fn extents(&self) -> Vec2 {
        0.5 * (self.upper - self.lower)
    }

    /// Smallest box containing both inputs.
    pub fn combine(a: &Aabb, b: &Aabb) -> Aabb {
        Aabb {
            lower: a.lower.min(b.lower),
            upper: a.upper.max(b.upper),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    /// True when the boxes share any area: overlap requires no separating
    /// axis on either dimension.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        d1.x <= 0.0 && d1.y <= 0.0 && d2.x <= 0.0 && d2.y <= 0.0
    }

    /// Segment intersection test used by broad-phase ray casts. Returns the
    /// entry fraction along `p1 → p2` if the segment hits the box within
    /// `max_fraction`.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();

        let mut normal = Vec2::ZERO;

        for i in 0..2 {
            let (p_i, d_i, abs_d_i, lower_i, upper_i) = if i == 0 {
                (p.x, d.x, abs_d.x, self.lower.x, self.upper.x)
            } else {
                (p.y, d.y, abs_d.y, self.lower.y, self.upper.y)
            };

            if abs_d_i < f32::MIN_POSITIVE {
                // Parallel to this slab.
                if p_i < lower_i || upper_i < p_i {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d_i;
                let mut t1 = (lower_i - p_i) * inv_d;
                let mut t2 = (upper_i - p_i) * inv_d;
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }
                if t1 > tmin {
                    normal = if i == 0 {
                        Vec2::new(s, 0.0)
                    } else {
                        Vec2::new(0.0, s)
                    };
                    tmin = t1;
                }
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            fraction: tmin,
            normal,
        })
    }
}

/// A ray cast expressed as a segment from `p1` toward `p2`, clipped to
/// `max_fraction` of that segment.
#[derive(Debug, Clone, Copy)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

/// A ray cast hit: fraction along the input segment plus surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub fraction: f32,
    pub normal: Vec2,
}

/// Exact overlap test between two shapes, via the distance query with skin
/// radii applied.
pub fn test_overlap(shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::new(shape_a),
        proxy_b: DistanceProxy::new(shape_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&input, &mut cache);
    output.distance < 10.0 * f32::MIN_POSITIVE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(lx: f32, ly: f32, ux: f32, uy: f32) -> Aabb {
        Aabb::new(Vec2::new(lx, ly), Vec2::new(ux, uy))
    }

    #[test]
    fn overlap_requires_both_axes() {
        let a = aabb(0.0, 0.0, 1.0, 1.0);
        // Overlaps on x only.
        let b = aabb(0.5, 2.0, 1.5, 3.0);
        assert!(!a.overlaps(&b));
        // Overlaps on both.
        let c = aabb(0.5, 0.5, 1.5, 1.5);
        assert!(a.overlaps(&c));
        // Touching edges count as overlap.
        let d = aabb(1.0, 0.0, 2.0, 1.0);
        assert!(a.overlaps(&d));
    }

    #[test]
    fn combine_contains_both_inputs() {
        let a = aabb(-1.0, -1.0, 0.0, 0.0);
        let b = aabb(2.0, 0.5, 3.0, 4.0);
        let c = Aabb::combine(&a, &b);
        assert!(c.contains(&a));
        assert!(c.contains(&b));
    }

    #[test]
    fn ray_cast_reports_entry_face() {
        let a = aabb(1.0, -1.0, 2.0, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = a.ray_cast(&input).unwrap();
        assert!((hit.fraction - 0.25).abs() < 1e-6);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn ray_cast_misses_past_max_fraction() {
        let a = aabb(10.0, -1.0, 11.0, 1.0);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        assert!(a.ray_cast(&input).is_none());
    }
}
