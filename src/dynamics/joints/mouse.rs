//! A mouse joint drags a body toward a world-space target through a soft
//! critically-dampable spring. Meant for interactive picking.

use glam::Vec2;

use crate::common::math::{cross, cross_sv, Mat22};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct MouseJointDef {
    /// Usually the static ground body; not constrained by this joint.
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Initial target, normally the grab point on body B.
    pub target: Vec2,
    pub max_force: f32,
    pub frequency_hz: f32,
    pub damping_ratio: f32,
    pub collide_connected: bool,
}

impl MouseJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, target: Vec2) -> Self {
        MouseJointDef {
            body_a,
            body_b,
            target,
            max_force: 0.0,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
            collide_connected: false,
        }
    }
}

#[derive(Debug)]
pub struct MouseJoint {
    pub(crate) local_anchor: Vec2,
    pub(crate) target: Vec2,
    max_force: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    impulse: Vec2,
    mass: Mat22,
    c: Vec2,
    gamma: f32,
    beta: f32,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, b: &Body) -> Self {
        MouseJoint {
            local_anchor: b.local_point(def.target),
            target: def.target,
            max_force: def.max_force,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            impulse: Vec2::ZERO,
            mass: Mat22::default(),
            c: Vec2::ZERO,
            gamma: 0.0,
            beta: 0.0,
        }
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target; the body spring-follows next step.
    pub fn set_target(&mut self, target: Vec2, b: &mut Body) {
        if !b.is_awake() {
            b.set_awake(true);
        }
        self.target = target;
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b: &mut Body) {
        let mass = b.mass;

        let omega = std::f32::consts::TAU * self.frequency_hz;
        let d = 2.0 * mass * self.damping_ratio * omega;
        let k = mass * omega * omega;

        debug_assert!(d + step.dt * k > f32::EPSILON);
        self.gamma = step.dt * (d + step.dt * k);
        self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
        self.beta = step.dt * k * self.gamma;

        let r = b.xf.q.apply(self.local_anchor - b.sweep.local_center);

        let inv_mass = b.inv_mass;
        let inv_i = b.inv_inertia;
        let k_mat = Mat22::new(
            Vec2::new(
                inv_mass + inv_i * r.y * r.y + self.gamma,
                -inv_i * r.x * r.y,
            ),
            Vec2::new(-inv_i * r.x * r.y, inv_mass + inv_i * r.x * r.x + self.gamma),
        );
        self.mass = k_mat.inverse();

        self.c = b.sweep.c + r - self.target;

        // Light extra damping keeps dragged bodies from spinning up.
        b.angular_velocity *= 0.98;

        self.impulse *= step.dt_ratio;
        b.linear_velocity += inv_mass * self.impulse;
        b.angular_velocity += inv_i * cross(r, self.impulse);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, b: &mut Body) {
        let r = b.xf.q.apply(self.local_anchor - b.sweep.local_center);

        let cdot = b.linear_velocity + cross_sv(b.angular_velocity, r);
        let impulse = self
            .mass
            .mul(-(cdot + self.beta * self.c + self.gamma * self.impulse));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        let impulse = self.impulse - old_impulse;

        b.linear_velocity += b.inv_mass * impulse;
        b.angular_velocity += b.inv_inertia * cross(r, impulse);
    }
}
