//! Math value types for rigid-body simulation.
//!
//! [`glam::Vec2`] is the vector type throughout the crate; this module adds
//! the rotation, rigid-transform, motion-sweep and small-matrix types the
//! solver needs on top of it.

use glam::{Vec2, Vec3};

/// 2D cross product (a scalar in 2D).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross a vector with a scalar: `v × s`.
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross a scalar with a vector: `s × v`. This is how an angular velocity
/// turns a lever arm into a linear velocity.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// A 2D rotation stored as sine/cosine so applying it is two multiplies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: 0.0, c: 1.0 };

    #[inline]
    pub fn new(angle: f32) -> Self {
        Rot {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// The rotated x-axis.
    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// The rotated y-axis.
    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector.
    #[inline]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Default for Rot {
    fn default() -> Self {
        Rot::IDENTITY
    }
}

/// A rigid transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Transform {
            p: position,
            q: Rot::new(angle),
        }
    }

    /// Map a point from local space to world space.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.p + self.q.apply(v)
    }

    /// Map a world-space point into local space.
    #[inline]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.apply_inv(v - self.p)
    }
}

/// Describes the motion of a body's center of mass over one step.
///
/// Stores center positions and angles at the start (`c0`, `a0`) and end
/// (`c`, `a`) of the step. `t0` marks the fraction of the step already
/// consumed by time-of-impact resolution, so a later TOI query for the same
/// body does not re-resolve time that has been accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    pub t0: f32,
}

impl Sweep {
    /// Interpolated body-origin transform at `alpha` within `[t0, 1]`.
    pub fn transform_at(&self, alpha: f32) -> Transform {
        let center = self.c0.lerp(self.c, alpha);
        let angle = (1.0 - alpha) * self.a0 + alpha * self.a;
        let q = Rot::new(angle);
        Transform {
            p: center - q.apply(self.local_center),
            q,
        }
    }

    /// Advance the start of the sweep to time `t`, keeping the endpoint.
    pub fn advance(&mut self, t: f32) {
        if self.t0 < t && 1.0 - self.t0 > f32::MIN_POSITIVE {
            let alpha = (t - self.t0) / (1.0 - self.t0);
            self.c0 = self.c0.lerp(self.c, alpha);
            self.a0 = (1.0 - alpha) * self.a0 + alpha * self.a;
            self.t0 = t;
        }
    }
}

/// Column-major 2×2 matrix used for effective-mass computations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat22 {
    pub col1: Vec2,
    pub col2: Vec2,
}

impl Mat22 {
    pub const ZERO: Mat22 = Mat22 {
        col1: Vec2::ZERO,
        col2: Vec2::ZERO,
    };

    #[inline]
    pub fn new(col1: Vec2, col2: Vec2) -> Self {
        Mat22 { col1, col2 }
    }

    #[inline]
    pub fn mul(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.col1.x * v.x + self.col2.x * v.y,
            self.col1.y * v.x + self.col2.y * v.y,
        )
    }

    pub fn inverse(&self) -> Mat22 {
        let a = self.col1.x;
        let b = self.col2.x;
        let c = self.col1.y;
        let d = self.col2.y;
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat22 {
            col1: Vec2::new(det * d, -det * c),
            col2: Vec2::new(-det * b, det * a),
        }
    }

    /// Solve `A x = b`. Cheaper than computing the inverse when solving
    /// once per step.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let a11 = self.col1.x;
        let a12 = self.col2.x;
        let a21 = self.col1.y;
        let a22 = self.col2.y;
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

impl std::ops::Add for Mat22 {
    type Output = Mat22;

    fn add(self, rhs: Mat22) -> Mat22 {
        Mat22 {
            col1: self.col1 + rhs.col1,
            col2: self.col2 + rhs.col2,
        }
    }
}

/// Column-major 3×3 matrix for joints that couple two linear rows with one
/// angular row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat33 {
    pub col1: Vec3,
    pub col2: Vec3,
    pub col3: Vec3,
}

impl Mat33 {
    pub const ZERO: Mat33 = Mat33 {
        col1: Vec3::ZERO,
        col2: Vec3::ZERO,
        col3: Vec3::ZERO,
    };

    /// Solve `A x = b` by Cramer's rule.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let a11 = self.col1.x;
        let a21 = self.col1.y;
        let a31 = self.col1.z;
        let a12 = self.col2.x;
        let a22 = self.col2.y;
        let a32 = self.col2.z;
        let a13 = self.col3.x;
        let a23 = self.col3.y;
        let a33 = self.col3.z;

        let mut det = a11 * (a22 * a33 - a32 * a23)
            + a21 * (a32 * a13 - a12 * a33)
            + a31 * (a12 * a23 - a22 * a13);
        if det != 0.0 {
            det = 1.0 / det;
        }

        Vec3::new(
            det * (b.x * (a22 * a33 - a32 * a23)
                + b.y * (a32 * a13 - a12 * a33)
                + b.z * (a12 * a23 - a22 * a13)),
            det * (a11 * (b.y * a33 - b.z * a23)
                + a21 * (b.z * a13 - b.x * a33)
                + a31 * (b.x * a23 - b.y * a13)),
            det * (a11 * (a22 * b.z - a32 * b.y)
                + a21 * (a32 * b.x - a12 * b.z)
                + a31 * (a12 * b.y - a22 * b.x)),
        )
    }

    /// Solve the upper-left 2×2 block only. Used when a joint's angular
    /// limit row is inactive.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let a11 = self.col1.x;
        let a21 = self.col1.y;
        let a12 = self.col2.x;
        let a22 = self.col2.y;
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn rotation_round_trip() {
        let q = Rot::new(0.7);
        let v = Vec2::new(3.0, -2.0);
        let back = q.apply_inv(q.apply(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-6);
    }

    #[test]
    fn transform_maps_local_to_world() {
        let xf = Transform::new(Vec2::new(1.0, 2.0), FRAC_PI_2);
        let p = xf.apply(Vec2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn sweep_advance_preserves_endpoint() {
        let mut sweep = Sweep {
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            ..Default::default()
        };
        sweep.advance(0.5);
        assert_relative_eq!(sweep.c0.x, 5.0);
        assert_relative_eq!(sweep.a0, 0.5);
        assert_eq!(sweep.t0, 0.5);
        assert_relative_eq!(sweep.c.x, 10.0);
    }

    #[test]
    fn sweep_transform_subtracts_local_center() {
        let sweep = Sweep {
            local_center: Vec2::new(0.0, 1.0),
            c0: Vec2::new(2.0, 2.0),
            c: Vec2::new(2.0, 2.0),
            ..Default::default()
        };
        let xf = sweep.transform_at(1.0);
        // Body origin sits below the center of mass.
        assert_relative_eq!(xf.p.x, 2.0);
        assert_relative_eq!(xf.p.y, 1.0);
    }

    #[test]
    fn mat22_solve_matches_inverse() {
        let m = Mat22::new(Vec2::new(3.0, 1.0), Vec2::new(1.0, 2.0));
        let b = Vec2::new(5.0, 4.0);
        let x = m.solve(b);
        let xi = m.inverse().mul(b);
        assert_relative_eq!(x.x, xi.x, epsilon = 1e-6);
        assert_relative_eq!(x.y, xi.y, epsilon = 1e-6);
        let r = m.mul(x);
        assert_relative_eq!(r.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(r.y, b.y, epsilon = 1e-5);
    }

    #[test]
    fn mat33_solve_recovers_rhs() {
        let m = Mat33 {
            col1: Vec3::new(2.0, 0.5, 0.0),
            col2: Vec3::new(0.5, 3.0, 0.1),
            col3: Vec3::new(0.0, 0.1, 1.5),
        };
        let b = Vec3::new(1.0, -2.0, 0.5);
        let x = m.solve33(b);
        let r = Vec3::new(
            m.col1.x * x.x + m.col2.x * x.y + m.col3.x * x.z,
            m.col1.y * x.x + m.col2.y * x.y + m.col3.y * x.z,
            m.col1.z * x.x + m.col2.z * x.y + m.col3.z * x.z,
        );
        assert_relative_eq!(r.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(r.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(r.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn cross_helpers_are_consistent() {
        let v = Vec2::new(2.0, 3.0);
        assert_eq!(cross_sv(1.0, v), Vec2::new(-3.0, 2.0));
        assert_eq!(cross_vs(v, 1.0), Vec2::new(3.0, -2.0));
        assert_eq!(cross(v, cross_sv(1.0, v)), v.length_squared());
    }
}
