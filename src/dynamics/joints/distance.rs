//! A distance joint holds two anchor points at a fixed length, optionally
//! softened into a damped spring.

use glam::Vec2;

use crate::common::math::cross;
use crate::common::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct DistanceJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    /// Zero for a rigid rod; positive for a spring at this frequency.
    pub frequency_hz: f32,
    pub damping_ratio: f32,
    pub collide_connected: bool,
}

impl DistanceJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        DistanceJointDef {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length: 1.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }

    /// Set the anchors from world points, taking the current gap as the
    /// rest length.
    pub fn initialize(
        body_a: BodyHandle,
        body_b: BodyHandle,
        a: &Body,
        b: &Body,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Self {
        DistanceJointDef {
            body_a,
            body_b,
            local_anchor_a: a.local_point(anchor_a),
            local_anchor_b: b.local_point(anchor_b),
            length: (anchor_b - anchor_a).length(),
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }
}

#[derive(Debug)]
pub struct DistanceJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) length: f32,
    pub(crate) frequency_hz: f32,
    pub(crate) damping_ratio: f32,

    u: Vec2,
    mass: f32,
    impulse: f32,
    gamma: f32,
    bias: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        DistanceJoint {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            u: Vec2::ZERO,
            mass: 0.0,
            impulse: 0.0,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        self.u = b.sweep.c + r2 - a.sweep.c - r1;
        let length = self.u.length();
        if length > LINEAR_SLOP {
            self.u /= length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr1u = cross(r1, self.u);
        let cr2u = cross(r2, self.u);
        let inv_mass =
            a.inv_mass + a.inv_inertia * cr1u * cr1u + b.inv_mass + b.inv_inertia * cr2u * cr2u;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;
            let omega = std::f32::consts::TAU * self.frequency_hz;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;

            self.gamma = step.dt * (d + step.dt * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * step.dt * k * self.gamma;

            let soft_mass = inv_mass + self.gamma;
            self.mass = if soft_mass != 0.0 { 1.0 / soft_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            let p = self.impulse * self.u;
            a.linear_velocity -= a.inv_mass * p;
            a.angular_velocity -= a.inv_inertia * cross(r1, p);
            b.linear_velocity += b.inv_mass * p;
            b.angular_velocity += b.inv_inertia * cross(r2, p);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let v1 = a.linear_velocity + crate::common::math::cross_sv(a.angular_velocity, r1);
        let v2 = b.linear_velocity + crate::common::math::cross_sv(b.angular_velocity, r2);
        let cdot = self.u.dot(v2 - v1);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        a.linear_velocity -= a.inv_mass * p;
        a.angular_velocity -= a.inv_inertia * cross(r1, p);
        b.linear_velocity += b.inv_mass * p;
        b.angular_velocity += b.inv_inertia * cross(r2, p);
    }

    pub(crate) fn solve_position_constraints(&mut self, a: &mut Body, b: &mut Body) -> bool {
        // A spring stretches by design; no position correction.
        if self.frequency_hz > 0.0 {
            return true;
        }

        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let mut d = b.sweep.c + r2 - a.sweep.c - r1;
        let length = d.length();
        if length > f32::MIN_POSITIVE {
            d /= length;
        }
        let c = (length - self.length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        self.u = d;
        let p = impulse * self.u;

        a.sweep.c -= a.inv_mass * p;
        a.sweep.a -= a.inv_inertia * cross(r1, p);
        b.sweep.c += b.inv_mass * p;
        b.sweep.a += b.inv_inertia * cross(r2, p);
        a.synchronize_transform();
        b.synchronize_transform();

        c.abs() < LINEAR_SLOP
    }
}
