//! GJK distance between convex shape proxies.
//!
//! Works in Minkowski-difference space: a simplex of one to three support
//! points is refined until it contains the closest point to the origin.
//! A small cache carries the final simplex between queries so that the
//! next frame's query usually converges in one or two iterations.

use glam::Vec2;

use crate::collision::shapes::DistanceProxy;
use crate::common::math::{cross, cross_sv, cross_vs, Transform};

const MAX_ITERATIONS: usize = 20;

/// Seeds a distance query from the previous result. `count == 0` means
/// cold start.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexCache {
    /// Length or area measure of the cached simplex, used to detect
    /// staleness after large relative motion.
    pub metric: f32,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Shrink the result by both skin radii, collapsing witness points to
    /// their midpoint if the skins already overlap.
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceOutput {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on proxy A in world space.
    w_a: Vec2,
    /// Support point on proxy B in world space.
    w_b: Vec2,
    /// Minkowski difference `w_b - w_a`.
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        &mut self,
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) {
        debug_assert!(cache.count <= 3);

        self.count = cache.count;
        for i in 0..self.count {
            let v = &mut self.v[i];
            v.index_a = cache.index_a[i];
            v.index_b = cache.index_b[i];
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // A stale cache from large relative motion is worse than a cold
        // start; compare the cached metric against the recomputed one.
        if self.count > 1 {
            let metric1 = cache.metric;
            let metric2 = self.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::MIN_POSITIVE {
                self.count = 0;
            }
        }

        if self.count == 0 {
            let v = &mut self.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            self.count = 1;
        }
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    cross_sv(1.0, e12)
                } else {
                    cross_vs(e12, 1.0)
                }
            }
            _ => {
                debug_assert!(false, "simplex count out of range");
                Vec2::ZERO
            }
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            3 => Vec2::ZERO,
            _ => {
                debug_assert!(false, "simplex count out of range");
                Vec2::ZERO
            }
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].a * self.v[0].w_a + self.v[1].a * self.v[1].w_a,
                self.v[0].a * self.v[0].w_b + self.v[1].a * self.v[1].w_b,
            ),
            3 => {
                let p = self.v[0].a * self.v[0].w_a
                    + self.v[1].a * self.v[1].w_a
                    + self.v[2].a * self.v[2].w_a;
                (p, p)
            }
            _ => {
                debug_assert!(false, "simplex count out of range");
                (Vec2::ZERO, Vec2::ZERO)
            }
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => (self.v[1].w - self.v[0].w).length(),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => {
                debug_assert!(false, "simplex count out of range");
                0.0
            }
        }
    }

    /// Closed-form closest point on a segment to the origin, expressed in
    /// barycentric coordinates. Collapses to a vertex when the origin
    /// projects outside the segment.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point on a triangle to the origin: test each vertex region,
    /// each edge region, then fall through to the interior.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // Vertex w1.
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Edge w1-w2.
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // Edge w1-w3.
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // Vertex w2.
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Vertex w3.
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // Edge w2-w3.
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Interior: the origin is inside the triangle, distance is zero.
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Compute the distance and witness points between two proxies. Capped at
/// 20 iterations; on cap exhaustion the best simplex found is reported.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::default();
    simplex.read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => debug_assert!(false, "simplex count out of range"),
        }

        // A full triangle contains the origin: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::MIN_POSITIVE {
            // The origin sits exactly on an edge or vertex; a support in
            // a degenerate direction would be garbage.
            break;
        }

        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.apply_inv(-d));
        vertex.w_a = xf_a.apply(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.apply_inv(d));
        vertex.w_b = xf_b.apply(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iter += 1;

        // A repeated support point means no further progress is possible.
        let mut duplicate = false;
        for i in 0..save_count {
            if vertex.index_a == save_a[i] && vertex.index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_a - point_b).length();

    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;
        if dist > r_a + r_b && dist > f32::MIN_POSITIVE {
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Shape;
    use approx::assert_relative_eq;

    fn query(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> DistanceOutput {
        let input = DistanceInput {
            proxy_a: DistanceProxy::new(shape_a),
            proxy_b: DistanceProxy::new(shape_b),
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: true,
        };
        let mut cache = SimplexCache::default();
        distance(&input, &mut cache)
    }

    #[test]
    fn coincident_shape_reports_zero() {
        let shape = Shape::rect(1.0, 1.0);
        let out = query(&shape, Transform::IDENTITY, &shape, Transform::IDENTITY);
        assert_eq!(out.distance, 0.0);
    }

    #[test]
    fn circle_gap_is_exact() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(2.0);
        let eps = 0.25;
        let xf_b = Transform::new(Vec2::new(3.0 + eps, 0.0), 0.0);
        let out = query(&a, Transform::IDENTITY, &b, xf_b);
        assert_relative_eq!(out.distance, eps, epsilon = 1e-5);
        assert_relative_eq!(out.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(out.point_b.x, 1.0 + eps, epsilon = 1e-5);
    }

    #[test]
    fn separated_boxes_measure_face_gap() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let xf_b = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let out = query(&a, Transform::IDENTITY, &b, xf_b);
        // Face gap of 3 minus both skin radii.
        assert_relative_eq!(out.distance, 3.0 - 2.0 * crate::common::settings::LINEAR_SLOP, epsilon = 1e-4);
    }

    #[test]
    fn warm_cache_converges_immediately() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let xf_b = Transform::new(Vec2::new(5.0, 0.5), 0.0);
        let input = DistanceInput {
            proxy_a: DistanceProxy::new(&a),
            proxy_b: DistanceProxy::new(&b),
            transform_a: Transform::IDENTITY,
            transform_b: xf_b,
            use_radii: false,
        };
        let mut cache = SimplexCache::default();
        let cold = distance(&input, &mut cache);
        let warm = distance(&input, &mut cache);
        assert_relative_eq!(cold.distance, warm.distance, epsilon = 1e-6);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn overlapping_circles_collapse_witness_points() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(1.0);
        let xf_b = Transform::new(Vec2::new(1.0, 0.0), 0.0);
        let out = query(&a, Transform::IDENTITY, &b, xf_b);
        assert_eq!(out.distance, 0.0);
        assert_eq!(out.point_a, out.point_b);
    }
}
