//! A weld joint locks two bodies together completely.

use glam::{Vec2, Vec3};

use crate::common::math::{cross, cross_sv, Mat33};
use crate::common::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct WeldJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    pub collide_connected: bool,
}

impl WeldJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        WeldJointDef {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            collide_connected: false,
        }
    }

    pub fn initialize(
        body_a: BodyHandle,
        body_b: BodyHandle,
        a: &Body,
        b: &Body,
        anchor: Vec2,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.local_anchor_a = a.local_point(anchor);
        def.local_anchor_b = b.local_point(anchor);
        def.reference_angle = b.angle() - a.angle();
        def
    }
}

#[derive(Debug)]
pub struct WeldJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,

    pub(crate) impulse: Vec3,
    mass: Mat33,
}

fn weld_mass(a: &Body, b: &Body, r1: Vec2, r2: Vec2) -> Mat33 {
    let m1 = a.inv_mass;
    let m2 = b.inv_mass;
    let i1 = a.inv_inertia;
    let i2 = b.inv_inertia;

    Mat33 {
        col1: Vec3::new(
            m1 + m2 + r1.y * r1.y * i1 + r2.y * r2.y * i2,
            -r1.y * r1.x * i1 - r2.y * r2.x * i2,
            -r1.y * i1 - r2.y * i2,
        ),
        col2: Vec3::new(
            -r1.y * r1.x * i1 - r2.y * r2.x * i2,
            m1 + m2 + r1.x * r1.x * i1 + r2.x * r2.x * i2,
            r1.x * i1 + r2.x * i2,
        ),
        col3: Vec3::new(-r1.y * i1 - r2.y * i2, r1.x * i1 + r2.x * i2, i1 + i2),
    }
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        WeldJoint {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            impulse: Vec3::ZERO,
            mass: Mat33::default(),
        }
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * Vec2::new(self.impulse.x, self.impulse.y)
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        self.mass = weld_mass(a, b, r1, r2);

        if step.warm_starting {
            self.impulse *= step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);
            a.linear_velocity -= a.inv_mass * p;
            a.angular_velocity -= a.inv_inertia * (cross(r1, p) + self.impulse.z);
            b.linear_velocity += b.inv_mass * p;
            b.angular_velocity += b.inv_inertia * (cross(r2, p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let cdot1 = b.linear_velocity + cross_sv(b.angular_velocity, r2)
            - a.linear_velocity
            - cross_sv(a.angular_velocity, r1);
        let cdot2 = b.angular_velocity - a.angular_velocity;

        let impulse = self.mass.solve33(-Vec3::new(cdot1.x, cdot1.y, cdot2));
        self.impulse += impulse;

        let p = Vec2::new(impulse.x, impulse.y);
        a.linear_velocity -= a.inv_mass * p;
        a.angular_velocity -= a.inv_inertia * (cross(r1, p) + impulse.z);
        b.linear_velocity += b.inv_mass * p;
        b.angular_velocity += b.inv_inertia * (cross(r2, p) + impulse.z);
    }

    pub(crate) fn solve_position_constraints(&mut self, a: &mut Body, b: &mut Body) -> bool {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let c1 = b.sweep.c + r2 - a.sweep.c - r1;
        let c2 = b.sweep.a - a.sweep.a - self.reference_angle;

        let position_error = c1.length();
        let angular_error = c2.abs();

        let mass = weld_mass(a, b, r1, r2);
        let impulse = mass.solve33(-Vec3::new(c1.x, c1.y, c2));

        let p = Vec2::new(impulse.x, impulse.y);
        a.sweep.c -= a.inv_mass * p;
        a.sweep.a -= a.inv_inertia * (cross(r1, p) + impulse.z);
        b.sweep.c += b.inv_mass * p;
        b.sweep.a += b.inv_inertia * (cross(r2, p) + impulse.z);
        a.synchronize_transform();
        b.synchronize_transform();

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
