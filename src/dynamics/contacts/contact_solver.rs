//! Sequential-impulse solver for contact constraints.
//!
//! Velocity constraints are solved with accumulated impulses and warm
//! starting; two-point manifolds get a 2x2 block solve when the K matrix
//! is well conditioned. Position correction runs on the body sweeps with
//! pseudo impulses that do not feed back into velocity.

use glam::Vec2;

use crate::collision::manifold::{ManifoldKind, WorldManifold};
use crate::common::arena::Arena;
use crate::common::math::{cross, cross_sv, cross_vs, Mat22, Transform};
use crate::common::settings::{
    mix_friction, mix_restitution, LINEAR_SLOP, MAX_LINEAR_CORRECTION, VELOCITY_THRESHOLD,
};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::contacts::{Contact, ContactHandle};
use crate::dynamics::fixture::Fixture;
use crate::dynamics::TimeStep;

const MAX_CONDITION_NUMBER: f32 = 100.0;

#[derive(Debug, Clone, Copy, Default)]
struct ConstraintPoint {
    local_point: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    /// Mass computed as if both bodies were dynamic; used only by the
    /// position solver so static stacks settle symmetrically.
    equalized_mass: f32,
    velocity_bias: f32,
}

#[derive(Debug)]
struct ContactConstraint {
    contact: ContactHandle,
    body_a: BodyHandle,
    body_b: BodyHandle,

    points: [ConstraintPoint; 2],
    point_count: usize,
    normal: Vec2,
    local_plane_normal: Vec2,
    local_point: Vec2,
    kind: ManifoldKind,
    radius: f32,
    friction: f32,

    k: Mat22,
    normal_mass: Mat22,

    inv_mass_a: f32,
    inv_i_a: f32,
    inv_mass_b: f32,
    inv_i_b: f32,
    /// `mass * inv_mass` products, 1 for dynamic and 0 for static bodies.
    eq_mass_a: f32,
    eq_i_a: f32,
    eq_mass_b: f32,
    eq_i_b: f32,
}

/// World-space contact data for one position-solver point.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(cc: &ContactConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        debug_assert!(cc.point_count > 0);

        match cc.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.apply(cc.local_point);
                let point_b = xf_b.apply(cc.points[0].local_point);
                let d = point_b - point_a;
                let normal = if d.length_squared() > f32::EPSILON * f32::EPSILON {
                    d.normalize()
                } else {
                    Vec2::new(1.0, 0.0)
                };
                PositionSolverManifold {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: d.dot(normal) - cc.radius,
                }
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.q.apply(cc.local_plane_normal);
                let plane_point = xf_a.apply(cc.local_point);
                let clip_point = xf_b.apply(cc.points[index].local_point);
                PositionSolverManifold {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - cc.radius,
                }
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.q.apply(cc.local_plane_normal);
                let plane_point = xf_b.apply(cc.local_point);
                let clip_point = xf_a.apply(cc.points[index].local_point);
                PositionSolverManifold {
                    // Flipped so the normal points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - cc.radius,
                }
            }
        }
    }
}

pub struct ContactSolver {
    constraints: Vec<ContactConstraint>,
}

impl ContactSolver {
    /// Build constraints from the touching contacts of an island. Reads
    /// body velocities for restitution bias, so call after force
    /// integration.
    pub fn new(
        contacts: &[ContactHandle],
        contact_arena: &Arena<Contact>,
        fixtures: &Arena<Fixture>,
        bodies: &Arena<Body>,
    ) -> Self {
        let mut constraints = Vec::with_capacity(contacts.len());

        for &handle in contacts {
            let contact = contact_arena.get(handle).expect("island contact missing");
            let fixture_a = fixtures.get(contact.fixture_a).expect("fixture missing");
            let fixture_b = fixtures.get(contact.fixture_b).expect("fixture missing");
            let body_a = bodies.get(contact.body_a).expect("body missing");
            let body_b = bodies.get(contact.body_b).expect("body missing");
            let manifold = &contact.manifold;
            debug_assert!(manifold.count > 0);

            let radius_a = fixture_a.shape.radius();
            let radius_b = fixture_b.shape.radius();
            let friction = mix_friction(fixture_a.friction, fixture_b.friction);
            let restitution = mix_restitution(fixture_a.restitution, fixture_b.restitution);

            let v_a = body_a.linear_velocity;
            let w_a = body_a.angular_velocity;
            let v_b = body_b.linear_velocity;
            let w_b = body_b.angular_velocity;

            let world_manifold =
                WorldManifold::new(manifold, &body_a.xf, radius_a, &body_b.xf, radius_b);
            let normal = world_manifold.normal;
            let tangent = cross_vs(normal, 1.0);

            let mut cc = ContactConstraint {
                contact: handle,
                body_a: contact.body_a,
                body_b: contact.body_b,
                points: [ConstraintPoint::default(); 2],
                point_count: manifold.count,
                normal,
                local_plane_normal: manifold.local_plane_normal,
                local_point: manifold.local_point,
                kind: manifold.kind,
                radius: radius_a + radius_b,
                friction,
                k: Mat22::default(),
                normal_mass: Mat22::default(),
                inv_mass_a: body_a.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_mass_b: body_b.inv_mass,
                inv_i_b: body_b.inv_inertia,
                eq_mass_a: body_a.mass * body_a.inv_mass,
                eq_i_a: body_a.mass * body_a.inv_inertia,
                eq_mass_b: body_b.mass * body_b.inv_mass,
                eq_i_b: body_b.mass * body_b.inv_inertia,
            };

            for k in 0..manifold.count {
                let mp = &manifold.points[k];
                let ccp = &mut cc.points[k];

                ccp.normal_impulse = mp.normal_impulse;
                ccp.tangent_impulse = mp.tangent_impulse;
                ccp.local_point = mp.local_point;
                ccp.r_a = world_manifold.points[k] - body_a.sweep.c;
                ccp.r_b = world_manifold.points[k] - body_b.sweep.c;

                let rn_a = cross(ccp.r_a, normal);
                let rn_b = cross(ccp.r_b, normal);
                let k_normal = body_a.inv_mass
                    + body_b.inv_mass
                    + body_a.inv_inertia * rn_a * rn_a
                    + body_b.inv_inertia * rn_b * rn_b;
                debug_assert!(k_normal > f32::EPSILON);
                ccp.normal_mass = 1.0 / k_normal;

                let k_equalized = body_a.mass * body_a.inv_mass
                    + body_b.mass * body_b.inv_mass
                    + body_a.mass * body_a.inv_inertia * rn_a * rn_a
                    + body_b.mass * body_b.inv_inertia * rn_b * rn_b;
                debug_assert!(k_equalized > f32::EPSILON);
                ccp.equalized_mass = 1.0 / k_equalized;

                let rt_a = cross(ccp.r_a, tangent);
                let rt_b = cross(ccp.r_b, tangent);
                let k_tangent = body_a.inv_mass
                    + body_b.inv_mass
                    + body_a.inv_inertia * rt_a * rt_a
                    + body_b.inv_inertia * rt_b * rt_b;
                debug_assert!(k_tangent > f32::EPSILON);
                ccp.tangent_mass = 1.0 / k_tangent;

                // Restitution only kicks in above the velocity threshold so
                // resting contacts do not jitter.
                let v_rel =
                    normal.dot(v_b + cross_sv(w_b, ccp.r_b) - v_a - cross_sv(w_a, ccp.r_a));
                ccp.velocity_bias = if v_rel < -VELOCITY_THRESHOLD {
                    -restitution * v_rel
                } else {
                    0.0
                };
            }

            if cc.point_count == 2 {
                let ccp1 = cc.points[0];
                let ccp2 = cc.points[1];

                let inv_mass = body_a.inv_mass + body_b.inv_mass;
                let rn1_a = cross(ccp1.r_a, normal);
                let rn1_b = cross(ccp1.r_b, normal);
                let rn2_a = cross(ccp2.r_a, normal);
                let rn2_b = cross(ccp2.r_b, normal);

                let k11 = inv_mass
                    + body_a.inv_inertia * rn1_a * rn1_a
                    + body_b.inv_inertia * rn1_b * rn1_b;
                let k22 = inv_mass
                    + body_a.inv_inertia * rn2_a * rn2_a
                    + body_b.inv_inertia * rn2_b * rn2_b;
                let k12 = inv_mass
                    + body_a.inv_inertia * rn1_a * rn2_a
                    + body_b.inv_inertia * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    cc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    cc.normal_mass = cc.k.inverse();
                } else {
                    // Nearly redundant points; solve one and let the other
                    // warm-start lapse.
                    cc.point_count = 1;
                }
            }

            constraints.push(cc);
        }

        ContactSolver { constraints }
    }

    /// Apply last step's impulses, scaled for any step-size change.
    pub fn init_velocity_constraints(&mut self, step: &TimeStep, bodies: &mut Arena<Body>) {
        for cc in &mut self.constraints {
            let (body_a, body_b) = bodies
                .pair_mut(cc.body_a, cc.body_b)
                .expect("constraint bodies missing");

            if step.warm_starting {
                let tangent = cross_vs(cc.normal, 1.0);
                for ccp in cc.points.iter_mut().take(cc.point_count) {
                    ccp.normal_impulse *= step.dt_ratio;
                    ccp.tangent_impulse *= step.dt_ratio;
                    let p = ccp.normal_impulse * cc.normal + ccp.tangent_impulse * tangent;
                    body_a.angular_velocity -= cc.inv_i_a * cross(ccp.r_a, p);
                    body_a.linear_velocity -= cc.inv_mass_a * p;
                    body_b.angular_velocity += cc.inv_i_b * cross(ccp.r_b, p);
                    body_b.linear_velocity += cc.inv_mass_b * p;
                }
            } else {
                for ccp in cc.points.iter_mut().take(cc.point_count) {
                    ccp.normal_impulse = 0.0;
                    ccp.tangent_impulse = 0.0;
                }
            }
        }
    }

    pub fn solve_velocity_constraints(&mut self, bodies: &mut Arena<Body>) {
        for cc in &mut self.constraints {
            let (body_a, body_b) = bodies
                .pair_mut(cc.body_a, cc.body_b)
                .expect("constraint bodies missing");

            let mut v_a = body_a.linear_velocity;
            let mut w_a = body_a.angular_velocity;
            let mut v_b = body_b.linear_velocity;
            let mut w_b = body_b.angular_velocity;

            let inv_mass_a = cc.inv_mass_a;
            let inv_i_a = cc.inv_i_a;
            let inv_mass_b = cc.inv_mass_b;
            let inv_i_b = cc.inv_i_b;
            let normal = cc.normal;
            let tangent = cross_vs(normal, 1.0);
            let friction = cc.friction;

            // Friction first, bounded by the accumulated normal impulse.
            for ccp in cc.points.iter_mut().take(cc.point_count) {
                let dv = v_b + cross_sv(w_b, ccp.r_b) - v_a - cross_sv(w_a, ccp.r_a);
                let vt = dv.dot(tangent);
                let lambda = ccp.tangent_mass * -vt;

                let max_friction = friction * ccp.normal_impulse;
                let new_impulse =
                    (ccp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - ccp.tangent_impulse;

                let p = lambda * tangent;
                v_a -= inv_mass_a * p;
                w_a -= inv_i_a * cross(ccp.r_a, p);
                v_b += inv_mass_b * p;
                w_b += inv_i_b * cross(ccp.r_b, p);
                ccp.tangent_impulse = new_impulse;
            }

            if cc.point_count == 1 {
                let ccp = &mut cc.points[0];
                let dv = v_b + cross_sv(w_b, ccp.r_b) - v_a - cross_sv(w_a, ccp.r_a);
                let vn = dv.dot(normal);
                let lambda = -ccp.normal_mass * (vn - ccp.velocity_bias);

                let new_impulse = (ccp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - ccp.normal_impulse;

                let p = lambda * normal;
                v_a -= inv_mass_a * p;
                w_a -= inv_i_a * cross(ccp.r_a, p);
                v_b += inv_mass_b * p;
                w_b += inv_i_b * cross(ccp.r_b, p);
                ccp.normal_impulse = new_impulse;
            } else {
                // Block solver: enumerate the four complementarity cases of
                // the 2x2 LCP. Accumulated impulses must stay nonnegative
                // and each point must end with nonnegative normal velocity
                // or positive impulse.
                let cp1 = cc.points[0];
                let cp2 = cc.points[1];

                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = v_b + cross_sv(w_b, cp1.r_b) - v_a - cross_sv(w_a, cp1.r_a);
                let dv2 = v_b + cross_sv(w_b, cp2.r_b) - v_a - cross_sv(w_a, cp2.r_a);
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let mut b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                b -= cc.k.mul(a);

                let x = {
                    // Case 1: both points active.
                    let x1 = -cc.normal_mass.mul(b);
                    // Case 2: point 1 active, point 2 separating.
                    let x2 = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                    // Case 3: point 2 active, point 1 separating.
                    let x3 = Vec2::new(0.0, -cp2.normal_mass * b.y);

                    if x1.x >= 0.0 && x1.y >= 0.0 {
                        x1
                    } else if x2.x >= 0.0 && cc.k.col1.y * x2.x + b.y >= 0.0 {
                        x2
                    } else if x3.y >= 0.0 && cc.k.col2.x * x3.y + b.x >= 0.0 {
                        x3
                    } else if b.x >= 0.0 && b.y >= 0.0 {
                        // Case 4: both separating.
                        Vec2::ZERO
                    } else {
                        // Degenerate manifold; keep the existing impulses.
                        a
                    }
                };

                let d = x - a;
                let p1 = d.x * normal;
                let p2 = d.y * normal;
                v_a -= inv_mass_a * (p1 + p2);
                w_a -= inv_i_a * (cross(cp1.r_a, p1) + cross(cp2.r_a, p2));
                v_b += inv_mass_b * (p1 + p2);
                w_b += inv_i_b * (cross(cp1.r_b, p1) + cross(cp2.r_b, p2));
                cc.points[0].normal_impulse = x.x;
                cc.points[1].normal_impulse = x.y;
            }

            body_a.linear_velocity = v_a;
            body_a.angular_velocity = w_a;
            body_b.linear_velocity = v_b;
            body_b.angular_velocity = w_b;
        }
    }

    /// Store the accumulated impulses back into the manifolds for next
    /// step's warm start, and report them per contact.
    pub fn finalize_velocity_constraints<F>(
        &self,
        contact_arena: &mut Arena<Contact>,
        mut report: F,
    ) where
        F: FnMut(ContactHandle, &[f32; 2], &[f32; 2], usize),
    {
        for cc in &self.constraints {
            let contact = contact_arena
                .get_mut(cc.contact)
                .expect("island contact missing");
            let mut normal_impulses = [0.0f32; 2];
            let mut tangent_impulses = [0.0f32; 2];
            for i in 0..cc.point_count {
                contact.manifold.points[i].normal_impulse = cc.points[i].normal_impulse;
                contact.manifold.points[i].tangent_impulse = cc.points[i].tangent_impulse;
                normal_impulses[i] = cc.points[i].normal_impulse;
                tangent_impulses[i] = cc.points[i].tangent_impulse;
            }
            report(cc.contact, &normal_impulses, &tangent_impulses, cc.point_count);
        }
    }

    /// Push overlapping bodies apart along the sweep. Returns true once the
    /// worst separation is within tolerance of the slop.
    pub fn solve_position_constraints(&mut self, baumgarte: f32, bodies: &mut Arena<Body>) -> bool {
        let mut min_separation = 0.0f32;

        for cc in &self.constraints {
            let (body_a, body_b) = bodies
                .pair_mut(cc.body_a, cc.body_b)
                .expect("constraint bodies missing");

            // Equalized masses treat every dynamic body as unit mass so a
            // heavy body does not shove a light one out of a deep stack.
            let inv_mass_a = cc.eq_mass_a;
            let inv_i_a = cc.eq_i_a;
            let inv_mass_b = cc.eq_mass_b;
            let inv_i_b = cc.eq_i_b;

            for index in 0..cc.point_count {
                let psm = PositionSolverManifold::new(cc, &body_a.xf, &body_b.xf, index);
                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                let r_a = point - body_a.sweep.c;
                let r_b = point - body_b.sweep.c;

                min_separation = min_separation.min(separation);

                let c = (baumgarte * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);
                let impulse = -cc.points[index].equalized_mass * c;
                let p = impulse * normal;

                body_a.sweep.c -= inv_mass_a * p;
                body_a.sweep.a -= inv_i_a * cross(r_a, p);
                body_a.synchronize_transform();

                body_b.sweep.c += inv_mass_b * p;
                body_b.sweep.a += inv_i_b * cross(r_b, p);
                body_b.synchronize_transform();
            }
        }

        min_separation >= -1.5 * LINEAR_SLOP
    }
}
