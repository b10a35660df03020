//! Conservative-advancement time of impact between two swept shapes.
//!
//! Repeatedly measures separation along an axis derived from the closest
//! features, then root-finds the earliest time where that separation drops
//! to a small target above zero. Stopping short of actual touching keeps
//! the contact solver fed with a usable manifold instead of a deep overlap.

use glam::Vec2;

use crate::collision::distance::{distance, DistanceInput, SimplexCache};
use crate::collision::shapes::DistanceProxy;
use crate::common::math::{cross_vs, Sweep, Transform};

const MAX_ITERATIONS: usize = 1000;
const MAX_ROOT_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    pub tolerance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Separation along a fixed axis, re-evaluated at arbitrary sweep times
/// using support points.
struct SeparationFunction {
    proxy_a: DistanceProxy,
    proxy_b: DistanceProxy,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl SeparationFunction {
    /// Build the axis from the simplex the distance query ended with: a
    /// point-point axis, or a face normal when two cached indices on one
    /// side coincide.
    fn new(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count > 0 && cache.count < 3);

        let (kind, local_point, axis);

        if cache.count == 1 {
            kind = SeparationKind::Points;
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0]));
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0]));
            local_point = Vec2::ZERO;
            axis = (point_b - point_a).normalize();
        } else if cache.index_b[0] == cache.index_b[1] {
            // Two points on A, one on B: the axis is A's face normal.
            kind = SeparationKind::FaceA;
            let local_a1 = proxy_a.vertex(cache.index_a[0]);
            let local_a2 = proxy_a.vertex(cache.index_a[1]);
            let local_b = proxy_b.vertex(cache.index_b[0]);
            local_point = 0.5 * (local_a1 + local_a2);

            let mut a = cross_vs(local_a2 - local_a1, 1.0).normalize();
            let normal = xf_a.q.apply(a);
            let point_a = xf_a.apply(local_point);
            let point_b = xf_b.apply(local_b);
            if (point_b - point_a).dot(normal) < 0.0 {
                a = -a;
            }
            axis = a;
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two points on B, one on A.
            kind = SeparationKind::FaceB;
            let local_b1 = proxy_b.vertex(cache.index_b[0]);
            let local_b2 = proxy_b.vertex(cache.index_b[1]);
            let local_a = proxy_a.vertex(cache.index_a[0]);
            local_point = 0.5 * (local_b1 + local_b2);

            let mut a = cross_vs(local_b2 - local_b1, 1.0).normalize();
            let normal = xf_b.q.apply(a);
            let point_b = xf_b.apply(local_point);
            let point_a = xf_a.apply(local_a);
            if (point_a - point_b).dot(normal) < 0.0 {
                a = -a;
            }
            axis = a;
        } else {
            // An edge on each side: find the closest points between the two
            // segments and take the face whose interior they hit.
            let local_a1 = proxy_a.vertex(cache.index_a[0]);
            let local_a2 = proxy_a.vertex(cache.index_a[1]);
            let local_b1 = proxy_b.vertex(cache.index_b[0]);
            let local_b2 = proxy_b.vertex(cache.index_b[1]);

            let p_a = xf_a.apply(local_a1);
            let d_a = xf_a.q.apply(local_a2 - local_a1);
            let p_b = xf_b.apply(local_b1);
            let d_b = xf_b.q.apply(local_b2 - local_b1);

            let a = d_a.length_squared();
            let e = d_b.length_squared();
            let r = p_b - p_a;
            let c = d_a.dot(r);
            let f = d_b.dot(r);
            let b = d_a.dot(d_b);

            let denom = a * e - b * b;
            let mut s = 0.0;
            if denom != 0.0 {
                s = ((b * f - c * e) / denom).clamp(0.0, 1.0);
            }
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }

            let local_point_a = local_a1 + s * (local_a2 - local_a1);
            let local_point_b = local_b1 + t * (local_b2 - local_b1);

            if s == 0.0 || s == 1.0 {
                kind = SeparationKind::FaceB;
                local_point = local_point_b;
                let mut ax = cross_vs(local_b2 - local_b1, 1.0).normalize();
                let normal = xf_b.q.apply(ax);
                let point_a = xf_a.apply(local_point_a);
                let point_b = xf_b.apply(local_point_b);
                if (point_a - point_b).dot(normal) < 0.0 {
                    ax = -ax;
                }
                axis = ax;
            } else {
                kind = SeparationKind::FaceA;
                local_point = local_point_a;
                let mut ax = cross_vs(local_a2 - local_a1, 1.0).normalize();
                let normal = xf_a.q.apply(ax);
                let point_a = xf_a.apply(local_point_a);
                let point_b = xf_b.apply(local_point_b);
                if (point_b - point_a).dot(normal) < 0.0 {
                    ax = -ax;
                }
                axis = ax;
            }
        }

        SeparationFunction {
            proxy_a: *proxy_a,
            proxy_b: *proxy_b,
            kind,
            local_point,
            axis,
        }
    }

    /// Separation at the given transforms, using the support point deepest
    /// against the axis on each side.
    fn evaluate(&self, xf_a: &Transform, xf_b: &Transform) -> f32 {
        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.apply_inv(self.axis);
                let axis_b = xf_b.q.apply_inv(-self.axis);
                let local_a = self.proxy_a.vertex(self.proxy_a.support(axis_a));
                let local_b = self.proxy_b.vertex(self.proxy_b.support(axis_b));
                let point_a = xf_a.apply(local_a);
                let point_b = xf_b.apply(local_b);
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let axis_b = xf_b.q.apply_inv(-normal);
                let local_b = self.proxy_b.vertex(self.proxy_b.support(axis_b));
                let point_b = xf_b.apply(local_b);
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let axis_a = xf_a.q.apply_inv(-normal);
                let local_a = self.proxy_a.vertex(self.proxy_a.support(axis_a));
                let point_a = xf_a.apply(local_a);
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// The fraction of the sweep interval at which the shapes reach the target
/// separation, or 1 when they do not meet within the interval. Both sweeps
/// must start at the same time.
pub fn time_of_impact(input: &ToiInput) -> f32 {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    debug_assert!(sweep_a.t0 == sweep_b.t0);
    debug_assert!(1.0 - sweep_a.t0 > f32::EPSILON);

    let radius = proxy_a.radius + proxy_b.radius;
    let tolerance = input.tolerance;

    let mut alpha = 0.0f32;
    let mut target = 0.0f32;

    let mut cache = SimplexCache::default();

    let mut iter = 0;
    loop {
        let xf_a = sweep_a.transform_at(alpha);
        let xf_b = sweep_b.transform_at(alpha);

        // Closest features at the current time seed the separation axis.
        let dist_input = DistanceInput {
            proxy_a: *proxy_a,
            proxy_b: *proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let dist_output = distance(&dist_input, &mut cache);

        if dist_output.distance <= 0.0 {
            alpha = 1.0;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, &xf_a, proxy_b, &xf_b);
        let separation = fcn.evaluate(&xf_a, &xf_b);
        if separation <= 0.0 {
            alpha = 1.0;
            break;
        }

        if iter == 0 {
            // Aim to land just inside the skin radius, not at contact.
            target = if separation > radius {
                (radius - tolerance).max(0.75 * radius)
            } else {
                (separation - tolerance).max(0.02 * radius)
            };
        }

        if separation - target < 0.5 * tolerance {
            if iter == 0 {
                alpha = 1.0;
            }
            break;
        }

        let mut new_alpha = alpha;
        {
            let mut x1 = alpha;
            let mut x2 = 1.0f32;
            let mut f1 = separation;

            let xf_a = sweep_a.transform_at(x2);
            let xf_b = sweep_b.transform_at(x2);
            let mut f2 = fcn.evaluate(&xf_a, &xf_b);

            // Still separated at the end of the interval.
            if f2 >= target {
                alpha = 1.0;
                break;
            }

            // Mixed bisection and secant steps.
            let mut root_iter = 0;
            loop {
                let x = if root_iter & 1 == 1 {
                    x1 + (target - f1) * (x2 - x1) / (f2 - f1)
                } else {
                    0.5 * (x1 + x2)
                };

                let xf_a = sweep_a.transform_at(x);
                let xf_b = sweep_b.transform_at(x);
                let f = fcn.evaluate(&xf_a, &xf_b);

                if (f - target).abs() < 0.025 * tolerance {
                    new_alpha = x;
                    break;
                }

                if f > target {
                    x1 = x;
                    f1 = f;
                } else {
                    x2 = x;
                    f2 = f;
                }

                root_iter += 1;
                if root_iter == MAX_ROOT_ITERATIONS {
                    break;
                }
            }
        }

        // Stalled advancement means the root finder cannot improve.
        if new_alpha < (1.0 + 100.0 * f32::EPSILON) * alpha {
            break;
        }
        alpha = new_alpha;

        iter += 1;
        if iter == MAX_ITERATIONS {
            break;
        }
    }

    alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Shape;
    use crate::common::settings::{LINEAR_SLOP, TOI_SLOP};

    fn sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            t0: 0.0,
        }
    }

    #[test]
    fn shapes_that_never_meet_return_one() {
        let a = Shape::circle(0.5);
        let b = Shape::circle(0.5);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO),
            sweep_b: sweep(Vec2::new(10.0, 0.0), Vec2::new(10.0, 5.0)),
            tolerance: TOI_SLOP,
        };
        assert_eq!(time_of_impact(&input), 1.0);
    }

    #[test]
    fn head_on_circles_stop_just_before_contact() {
        let a = Shape::circle(0.5);
        let b = Shape::circle(0.5);
        // B closes 11 units over the interval. The centers reach the
        // target separation (combined radius less the tolerance, 0.96)
        // at t = 10.04 / 11.
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO),
            sweep_b: sweep(Vec2::new(11.0, 0.0), Vec2::ZERO),
            tolerance: TOI_SLOP,
        };
        let t = time_of_impact(&input);
        assert!(t < 1.0);
        assert!((t - 0.913).abs() < 0.02, "t = {t}");
    }

    #[test]
    fn bullet_against_thin_wall_is_caught() {
        let wall = Shape::rect(0.05, 2.0);
        let bullet = Shape::circle(0.1);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&wall),
            proxy_b: DistanceProxy::new(&bullet),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO),
            // Fast enough to tunnel in a discrete step.
            sweep_b: sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            tolerance: 8.0 * LINEAR_SLOP,
        };
        let t = time_of_impact(&input);
        assert!(t < 0.5, "t = {t}");
        assert!(t > 0.0);
    }

    #[test]
    fn overlapping_start_backs_off_to_target_separation() {
        let a = Shape::circle(0.5);
        let b = Shape::circle(0.5);
        // The surfaces already overlap by 0.1 at the start. The target
        // band is the initial center separation less the tolerance
        // (0.86), reached at t = 0.4 of the 0.9 -> 0.8 sweep.
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO),
            sweep_b: sweep(Vec2::new(0.9, 0.0), Vec2::new(0.8, 0.0)),
            tolerance: TOI_SLOP,
        };
        let t = time_of_impact(&input);
        assert!((t - 0.4).abs() < 0.01, "t = {t}");
    }

    #[test]
    fn deeply_overlapping_shapes_return_one() {
        let a = Shape::circle(0.5);
        let b = Shape::circle(0.5);
        // Centers nearly coincide, so the separation already sits inside
        // the clamped target band and no advancement happens.
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO),
            sweep_b: sweep(Vec2::new(0.02, 0.0), Vec2::new(0.01, 0.0)),
            tolerance: TOI_SLOP,
        };
        assert_eq!(time_of_impact(&input), 1.0);
    }
}
