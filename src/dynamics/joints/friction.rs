//! A friction joint damps relative motion between two bodies with capped
//! force and torque, useful for top-down surface friction.

use glam::Vec2;

use crate::common::math::{cross, cross_sv, Mat22};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct FrictionJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f32,
    pub max_torque: f32,
    pub collide_connected: bool,
}

impl FrictionJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        FrictionJointDef {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_force: 0.0,
            max_torque: 0.0,
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
        FrictionJointDef {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor),
            local_anchor_b: b.local_point(anchor),
            max_force: 0.0,
            max_torque: 0.0,
            collide_connected: false,
        }
    }
}

#[derive(Debug)]
pub struct FrictionJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) max_force: f32,
    pub(crate) max_torque: f32,

    linear_mass: Mat22,
    angular_mass: f32,
    linear_impulse: Vec2,
    pub(crate) angular_impulse: f32,
}

impl FrictionJoint {
    pub(crate) fn new(def: &FrictionJointDef) -> Self {
        FrictionJoint {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_force: def.max_force,
            max_torque: def.max_torque,
            linear_mass: Mat22::default(),
            angular_mass: 0.0,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
        }
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.linear_impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r_a = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r_b = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let m_a = a.inv_mass;
        let m_b = b.inv_mass;
        let i_a = a.inv_inertia;
        let i_b = b.inv_inertia;

        let k = Mat22::new(
            Vec2::new(
                m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
            ),
            Vec2::new(
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
            ),
        );

        self.linear_mass = k.inverse();
        let i_sum = i_a + i_b;
        self.angular_mass = if i_sum > 0.0 { 1.0 / i_sum } else { 0.0 };

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;

            let p = self.linear_impulse;
            a.linear_velocity -= m_a * p;
            a.angular_velocity -= i_a * (cross(r_a, p) + self.angular_impulse);
            b.linear_velocity += m_b * p;
            b.angular_velocity += i_b * (cross(r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r_a = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r_b = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let m_a = a.inv_mass;
        let m_b = b.inv_mass;
        let i_a = a.inv_inertia;
        let i_b = b.inv_inertia;

        // Angular friction.
        {
            let cdot = b.angular_velocity - a.angular_velocity;
            let mut impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = step.dt * self.max_torque;
            self.angular_impulse =
                (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            a.angular_velocity -= i_a * impulse;
            b.angular_velocity += i_b * impulse;
        }

        // Linear friction.
        {
            let cdot = b.linear_velocity + cross_sv(b.angular_velocity, r_b)
                - a.linear_velocity
                - cross_sv(a.angular_velocity, r_a);

            let mut impulse = -self.linear_mass.mul(cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = step.dt * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize() * max_impulse;
            }
            impulse = self.linear_impulse - old_impulse;

            a.linear_velocity -= m_a * impulse;
            a.angular_velocity -= i_a * cross(r_a, impulse);
            b.linear_velocity += m_b * impulse;
            b.angular_velocity += i_b * cross(r_b, impulse);
        }
    }
}
