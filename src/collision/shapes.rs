//! Collision shapes: circle, convex polygon, edge segment.
//!
//! Shapes are plain geometry. They are copied by value into fixtures and
//! never reference the body that carries them, so one shape description can
//! seed any number of fixtures.

use glam::Vec2;

use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::common::math::{cross, Transform};
use crate::common::settings::LINEAR_SLOP;

/// Hard cap on polygon vertex count. Convex decomposition is expected for
/// anything bigger.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Mass, center of mass (local) and rotational inertia about the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    /// Rotational inertia about the body-local origin, not the centroid.
    pub i: f32,
}

/// A circle with a local-space center offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleShape {
    pub p: Vec2,
    pub radius: f32,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        CircleShape {
            p: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_offset(radius: f32, p: Vec2) -> Self {
        CircleShape { p, radius }
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let center = xf.apply(self.p);
        (point - center).length_squared() <= self.radius * self.radius
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.p);
        let s = input.p1 - position;
        let b = s.length_squared() - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.length_squared();
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < f32::MIN_POSITIVE {
            return None;
        }

        let mut a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            a /= rr;
            return Some(RayCastOutput {
                fraction: a,
                normal: (s + a * r).normalize(),
            });
        }
        None
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let center = xf.apply(self.p);
        let r = Vec2::splat(self.radius);
        Aabb::new(center - r, center + r)
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.p,
            i: mass * (0.5 * self.radius * self.radius + self.p.length_squared()),
        }
    }

    /// Area below the plane `normal . x = offset` and its world-space
    /// centroid. Zero area when the circle sits entirely above the plane.
    pub fn compute_submerged_area(&self, normal: Vec2, offset: f32, xf: &Transform) -> (f32, Vec2) {
        let p = xf.apply(self.p);
        let l = -(normal.dot(p) - offset);

        if l < -self.radius + f32::EPSILON {
            return (0.0, p);
        }
        if l > self.radius {
            return (std::f32::consts::PI * self.radius * self.radius, p);
        }

        // Circular segment cut off by the surface line.
        let r2 = self.radius * self.radius;
        let l2 = l * l;
        let area = r2 * ((l / self.radius).asin() + std::f32::consts::FRAC_PI_2)
            + l * (r2 - l2).sqrt();
        let com = -2.0 / 3.0 * (r2 - l2).powf(1.5) / area;
        (area, p + com * normal)
    }
}

/// A convex polygon. Vertices wind counter-clockwise; normals point
/// outward. Carries a small skin radius for contact stability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonShape {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub centroid: Vec2,
    pub radius: f32,
}

impl PolygonShape {
    /// Build from a counter-clockwise convex hull. Callers are trusted to
    /// hand in a valid hull; only vertex count and edge lengths are
    /// checked.
    pub fn new(points: &[Vec2]) -> Self {
        debug_assert!(2 <= points.len() && points.len() <= MAX_POLYGON_VERTICES);
        let count = points.len().min(MAX_POLYGON_VERTICES);

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(&points[..count]);

        for i in 0..count {
            let i2 = if i + 1 < count { i + 1 } else { 0 };
            let edge = vertices[i2] - vertices[i];
            debug_assert!(edge.length_squared() > f32::MIN_POSITIVE);
            normals[i] = Vec2::new(edge.y, -edge.x).normalize();
        }

        let centroid = compute_centroid(&vertices[..count]);
        PolygonShape {
            vertices,
            normals,
            count,
            centroid,
            radius: LINEAR_SLOP,
        }
    }

    /// Axis-aligned box centered on the local origin.
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        Self::new(&[
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
    }

    /// Box with an arbitrary local center and rotation.
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let xf = Transform::new(center, angle);
        let mut shape = Self::new_box(half_width, half_height);
        for i in 0..shape.count {
            shape.vertices[i] = xf.apply(shape.vertices[i]);
            shape.normals[i] = xf.q.apply(shape.normals[i]);
        }
        shape.centroid = xf.apply(shape.centroid);
        shape
    }

    /// Degenerate two-vertex polygon. This is how an [`EdgeShape`] enters
    /// the polygon clipping path.
    pub fn new_segment(v1: Vec2, v2: Vec2) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[0] = v1;
        vertices[1] = v2;
        let edge = v2 - v1;
        debug_assert!(edge.length_squared() > f32::MIN_POSITIVE);
        let n = Vec2::new(edge.y, -edge.x).normalize();
        normals[0] = n;
        normals[1] = -n;
        PolygonShape {
            vertices,
            normals,
            count: 2,
            centroid: 0.5 * (v1 + v2),
            radius: LINEAR_SLOP,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.count
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        let local = xf.apply_inv(point);
        for i in 0..self.count {
            if self.normals[i].dot(local - self.vertices[i]) > 0.0 {
                return false;
            }
        }
        true
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Work in local space; walk every face slab.
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0_f32;
        let mut upper = input.max_fraction;
        let mut index: Option<usize> = None;

        for i in 0..self.count {
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else {
                let t = numerator / denominator;
                if denominator < 0.0 && numerator < lower * denominator {
                    // Entering the half-plane later than any entry so far.
                    lower = t;
                    index = Some(i);
                } else if denominator > 0.0 && numerator < upper * denominator {
                    upper = t;
                }
            }

            if upper < lower - f32::MIN_POSITIVE {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            fraction: lower,
            normal: xf.q.apply(self.normals[i]),
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let mut lower = xf.apply(self.vertices[0]);
        let mut upper = lower;
        for i in 1..self.count {
            let v = xf.apply(self.vertices[i]);
            lower = lower.min(v);
            upper = upper.max(v);
        }
        let r = Vec2::splat(self.radius);
        Aabb::new(lower - r, upper + r)
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        if self.count == 2 {
            return MassData {
                mass: 0.0,
                center: 0.5 * (self.vertices[0] + self.vertices[1]),
                i: 0.0,
            };
        }

        let mut center = Vec2::ZERO;
        let mut area = 0.0_f32;
        let mut inertia = 0.0_f32;
        let k_inv3 = 1.0 / 3.0;

        // Triangle fan from the local origin; signed areas make the choice
        // of reference point irrelevant.
        for i in 0..self.count {
            let p1 = Vec2::ZERO;
            let p2 = self.vertices[i];
            let p3 = self.vertices[if i + 1 < self.count { i + 1 } else { 0 }];

            let e1 = p2 - p1;
            let e2 = p3 - p1;
            let d = cross(e1, e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * k_inv3 * (p1 + p2 + p3);

            let int_x2 = k_inv3 * (0.25 * (e1.x * e1.x + e2.x * e1.x + e2.x * e2.x));
            let int_y2 = k_inv3 * (0.25 * (e1.y * e1.y + e2.y * e1.y + e2.y * e2.y));
            inertia += d * (int_x2 + int_y2);
        }

        MassData {
            mass: density * area,
            center: center / area,
            i: density * inertia,
        }
    }

    /// Clip the polygon against the plane `normal . x = offset` and return
    /// the submerged area with its world-space centroid.
    pub fn compute_submerged_area(&self, normal: Vec2, offset: f32, xf: &Transform) -> (f32, Vec2) {
        let normal_l = xf.q.apply_inv(normal);
        let offset_l = offset - normal.dot(xf.p);

        let mut depths = [0.0_f32; MAX_POLYGON_VERTICES];
        let mut dive_count = 0;
        let mut into_index = usize::MAX;
        let mut outo_index = usize::MAX;
        let mut last_submerged = false;
        for i in 0..self.count {
            depths[i] = normal_l.dot(self.vertices[i]) - offset_l;
            let submerged = depths[i] < -f32::EPSILON;
            if i > 0 {
                if submerged && !last_submerged {
                    into_index = i - 1;
                    dive_count += 1;
                } else if !submerged && last_submerged {
                    outo_index = i - 1;
                    dive_count += 1;
                }
            }
            last_submerged = submerged;
        }

        match dive_count {
            0 => {
                return if last_submerged {
                    let md = self.compute_mass(1.0);
                    (md.mass, xf.apply(md.center))
                } else {
                    (0.0, xf.apply(self.centroid))
                };
            }
            1 => {
                // The missing transition crosses the wrap-around edge.
                if into_index == usize::MAX {
                    into_index = self.count - 1;
                } else {
                    outo_index = self.count - 1;
                }
            }
            _ => {}
        }

        let into_index2 = (into_index + 1) % self.count;
        let outo_index2 = (outo_index + 1) % self.count;

        let into_lambda = -depths[into_index] / (depths[into_index2] - depths[into_index]);
        let outo_lambda = -depths[outo_index] / (depths[outo_index2] - depths[outo_index]);
        let into_vec = self.vertices[into_index].lerp(self.vertices[into_index2], into_lambda);
        let outo_vec = self.vertices[outo_index].lerp(self.vertices[outo_index2], outo_lambda);

        // Fan over the submerged vertex run, closed by the two surface
        // intersection points.
        let mut area = 0.0_f32;
        let mut center = Vec2::ZERO;
        let mut p2 = self.vertices[into_index2];
        let mut i = into_index2;
        while i != outo_index2 {
            i = (i + 1) % self.count;
            let p3 = if i == outo_index2 {
                outo_vec
            } else {
                self.vertices[i]
            };
            let triangle_area = 0.5 * cross(p2 - into_vec, p3 - into_vec);
            area += triangle_area;
            center += triangle_area * (into_vec + p2 + p3) / 3.0;
            p2 = p3;
        }

        if area < f32::MIN_POSITIVE {
            return (0.0, xf.apply(into_vec));
        }
        (area, xf.apply(center / area))
    }

    /// Index of the vertex furthest along `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    if vertices.len() == 2 {
        return 0.5 * (vertices[0] + vertices[1]);
    }
    let mut center = Vec2::ZERO;
    let mut area = 0.0_f32;
    let inv3 = 1.0 / 3.0;
    for i in 0..vertices.len() {
        let p1 = Vec2::ZERO;
        let p2 = vertices[i];
        let p3 = vertices[if i + 1 < vertices.len() { i + 1 } else { 0 }];
        let triangle_area = 0.5 * cross(p2 - p1, p3 - p1);
        area += triangle_area;
        center += triangle_area * inv3 * (p1 + p2 + p3);
    }
    debug_assert!(area > f32::MIN_POSITIVE);
    center / area
}

/// A one-sided line segment. Massless; typically used for static terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeShape {
    pub v1: Vec2,
    pub v2: Vec2,
    pub radius: f32,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        EdgeShape {
            v1,
            v2,
            radius: LINEAR_SLOP,
        }
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.apply_inv(input.p1);
        let p2 = xf.apply_inv(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = Vec2::new(e.y, -e.x).normalize();

        // p1 + t * d crosses the segment's infinite line at t.
        let numerator = normal.dot(self.v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }
        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        let rr = e.length_squared();
        if rr == 0.0 {
            return None;
        }
        let s = (q - self.v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = xf.q.apply(normal);
        Some(RayCastOutput {
            fraction: t,
            normal: if numerator > 0.0 {
                -world_normal
            } else {
                world_normal
            },
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let v1 = xf.apply(self.v1);
        let v2 = xf.apply(self.v2);
        let r = Vec2::splat(self.radius);
        Aabb::new(v1.min(v2) - r, v1.max(v2) + r)
    }

    pub fn compute_mass(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.v1 + self.v2),
            i: 0.0,
        }
    }
}

/// The closed set of shape kinds. Matches are exhaustive, so a new kind is
/// a compile error at every dispatch site instead of a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle(CircleShape::new(radius))
    }

    pub fn polygon(points: &[Vec2]) -> Self {
        Shape::Polygon(PolygonShape::new(points))
    }

    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Shape::Polygon(PolygonShape::new_box(half_width, half_height))
    }

    pub fn edge(v1: Vec2, v2: Vec2) -> Self {
        Shape::Edge(EdgeShape::new(v1, v2))
    }

    /// Skin radius used by the distance and manifold routines.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(e) => e.radius,
        }
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, point),
            Shape::Polygon(p) => p.test_point(xf, point),
            // A segment has no interior.
            Shape::Edge(_) => false,
        }
    }

    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
        }
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(),
        }
    }

    /// Area below the plane `normal . x = offset` and its world-space
    /// centroid.
    pub fn compute_submerged_area(&self, normal: Vec2, offset: f32, xf: &Transform) -> (f32, Vec2) {
        match self {
            Shape::Circle(c) => c.compute_submerged_area(normal, offset, xf),
            Shape::Polygon(p) => p.compute_submerged_area(normal, offset, xf),
            // A segment encloses no area.
            Shape::Edge(e) => (0.0, xf.apply(0.5 * (e.v1 + e.v2))),
        }
    }
}

/// The vertex-cloud-plus-radius view of a shape consumed by the distance
/// and time-of-impact algorithms. Circles degenerate to one vertex.
#[derive(Debug, Clone, Copy)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f32,
}

impl DistanceProxy {
    pub fn new(shape: &Shape) -> Self {
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let (count, radius) = match shape {
            Shape::Circle(c) => {
                vertices[0] = c.p;
                (1, c.radius)
            }
            Shape::Polygon(p) => {
                vertices[..p.vertex_count()].copy_from_slice(p.vertices());
                (p.vertex_count(), p.radius)
            }
            Shape::Edge(e) => {
                vertices[0] = e.v1;
                vertices[1] = e.v2;
                (2, e.radius)
            }
        };
        DistanceProxy {
            vertices,
            count,
            radius,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.count
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }

    /// Index of the support vertex in direction `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_mass_properties() {
        let shape = PolygonShape::new_box(1.0, 2.0);
        let data = shape.compute_mass(2.0);
        // 2x4 box at density 2.
        assert_relative_eq!(data.mass, 16.0, epsilon = 1e-4);
        assert_relative_eq!(data.center.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(data.center.y, 0.0, epsilon = 1e-6);
        // I = m (w^2 + h^2) / 12 about the centroid, which is the origin.
        assert_relative_eq!(data.i, 16.0 * (4.0 + 16.0) / 12.0, epsilon = 1e-3);
    }

    #[test]
    fn box_centroid_is_geometric_center() {
        let shape = PolygonShape::new_oriented_box(1.0, 1.0, Vec2::new(3.0, -1.0), 0.5);
        assert_relative_eq!(shape.centroid.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(shape.centroid.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn half_submerged_box_area_and_centroid() {
        let shape = PolygonShape::new_box(0.5, 0.5);
        let xf = Transform::IDENTITY;
        let (area, c) = shape.compute_submerged_area(Vec2::new(0.0, 1.0), 0.0, &xf);
        assert_relative_eq!(area, 0.5, epsilon = 1e-5);
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(c.y, -0.25, epsilon = 1e-5);
    }

    #[test]
    fn fully_submerged_box_matches_its_area() {
        let shape = PolygonShape::new_box(0.5, 0.5);
        let xf = Transform::new(Vec2::new(2.0, -3.0), 0.3);
        let (area, c) = shape.compute_submerged_area(Vec2::new(0.0, 1.0), 10.0, &xf);
        assert_relative_eq!(area, 1.0, epsilon = 1e-5);
        assert_relative_eq!(c.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(c.y, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn circle_submerged_area_bands() {
        let circle = CircleShape::new(1.0);
        let xf = Transform::IDENTITY;
        let up = Vec2::new(0.0, 1.0);

        let (dry, _) = circle.compute_submerged_area(up, -5.0, &xf);
        assert_eq!(dry, 0.0);

        let (wet, c) = circle.compute_submerged_area(up, 5.0, &xf);
        assert_relative_eq!(wet, std::f32::consts::PI, epsilon = 1e-5);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-6);

        // Half in the water: half the disc, centroid 4r / 3 pi below.
        let (half, c) = circle.compute_submerged_area(up, 0.0, &xf);
        assert_relative_eq!(half, 0.5 * std::f32::consts::PI, epsilon = 1e-4);
        assert_relative_eq!(c.y, -4.0 / (3.0 * std::f32::consts::PI), epsilon = 1e-4);
    }

    #[test]
    fn polygon_containment() {
        let shape = PolygonShape::new_box(1.0, 1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        assert!(shape.test_point(&xf, Vec2::new(5.5, 0.5)));
        assert!(!shape.test_point(&xf, Vec2::new(6.5, 0.0)));
    }

    #[test]
    fn circle_ray_cast_front_hit() {
        let circle = CircleShape::new(1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = circle.ray_cast(&input, &xf).unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn polygon_ray_cast_hits_entry_face() {
        let shape = PolygonShape::new_box(1.0, 1.0);
        let xf = Transform::new(Vec2::new(4.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(8.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf).unwrap();
        assert_relative_eq!(hit.fraction, 3.0 / 8.0, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn edge_ray_cast_normal_opposes_ray() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 1.0), Vec2::new(1.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&input, &Transform::IDENTITY).unwrap();
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-5);
        assert!(hit.normal.y < 0.0);
    }

    #[test]
    fn edge_has_no_mass() {
        let edge = EdgeShape::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0));
        let data = edge.compute_mass();
        assert_eq!(data.mass, 0.0);
        assert_eq!(data.center, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn proxy_support_picks_extreme_vertex() {
        let shape = Shape::rect(1.0, 1.0);
        let proxy = DistanceProxy::new(&shape);
        let i = proxy.support(Vec2::new(1.0, 1.0));
        assert_eq!(proxy.vertex(i), Vec2::new(1.0, 1.0));
    }
}
