//! A pulley joint connects two bodies through an idealized rope over two
//! fixed ground anchors: `length_a + ratio * length_b == constant`.

use glam::Vec2;

use crate::common::math::{cross, cross_sv};
use crate::common::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::joints::LimitState;
use crate::dynamics::TimeStep;

/// The rope segments never shrink below this length.
const MIN_PULLEY_LENGTH: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct PulleyJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Fixed world-space points the rope hangs from.
    pub ground_anchor_a: Vec2,
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length_a: f32,
    pub max_length_a: f32,
    pub length_b: f32,
    pub max_length_b: f32,
    /// Mechanical advantage: side B's length counts `ratio` times.
    pub ratio: f32,
    pub collide_connected: bool,
}

impl PulleyJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        PulleyJointDef {
            body_a,
            body_b,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            max_length_a: 0.0,
            length_b: 0.0,
            max_length_b: 0.0,
            ratio: 1.0,
            collide_connected: true,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        body_a: BodyHandle,
        body_b: BodyHandle,
        a: &Body,
        b: &Body,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.ground_anchor_a = ground_anchor_a;
        def.ground_anchor_b = ground_anchor_b;
        def.local_anchor_a = a.local_point(anchor_a);
        def.local_anchor_b = b.local_point(anchor_b);
        def.length_a = (anchor_a - ground_anchor_a).length();
        def.length_b = (anchor_b - ground_anchor_b).length();
        debug_assert!(ratio > f32::EPSILON);
        def.ratio = ratio;
        let c = def.length_a + ratio * def.length_b;
        def.max_length_a = c - ratio * MIN_PULLEY_LENGTH;
        def.max_length_b = (c - MIN_PULLEY_LENGTH) / ratio;
        def
    }
}

#[derive(Debug)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,

    constant: f32,
    ratio: f32,
    max_length_a: f32,
    max_length_b: f32,

    u1: Vec2,
    u2: Vec2,

    state: LimitState,
    limit_state_a: LimitState,
    limit_state_b: LimitState,

    pulley_mass: f32,
    limit_mass_a: f32,
    limit_mass_b: f32,

    impulse: f32,
    limit_impulse_a: f32,
    limit_impulse_b: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        debug_assert!(def.ratio != 0.0);
        let constant = def.length_a + def.ratio * def.length_b;
        PulleyJoint {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            constant,
            ratio: def.ratio,
            max_length_a: def
                .max_length_a
                .min(constant - def.ratio * MIN_PULLEY_LENGTH),
            max_length_b: def.max_length_b.min((constant - MIN_PULLEY_LENGTH) / def.ratio),
            u1: Vec2::ZERO,
            u2: Vec2::ZERO,
            state: LimitState::Inactive,
            limit_state_a: LimitState::Inactive,
            limit_state_b: LimitState::Inactive,
            pulley_mass: 0.0,
            limit_mass_a: 0.0,
            limit_mass_b: 0.0,
            impulse: 0.0,
            limit_impulse_a: 0.0,
            limit_impulse_b: 0.0,
        }
    }

    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn length_a(&self, a: &Body) -> f32 {
        (a.world_point(self.local_anchor_a) - self.ground_anchor_a).length()
    }

    pub fn length_b(&self, b: &Body) -> f32 {
        (b.world_point(self.local_anchor_b) - self.ground_anchor_b).length()
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u2
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let p1 = a.sweep.c + r1;
        let p2 = b.sweep.c + r2;

        let s1 = self.ground_anchor_a;
        let s2 = self.ground_anchor_b;

        self.u1 = p1 - s1;
        self.u2 = p2 - s2;

        let length1 = self.u1.length();
        let length2 = self.u2.length();

        if length1 > LINEAR_SLOP {
            self.u1 /= length1;
        } else {
            self.u1 = Vec2::ZERO;
        }
        if length2 > LINEAR_SLOP {
            self.u2 /= length2;
        } else {
            self.u2 = Vec2::ZERO;
        }

        let c = self.constant - length1 - self.ratio * length2;
        if c > 0.0 {
            self.state = LimitState::Inactive;
            self.impulse = 0.0;
        } else {
            self.state = LimitState::AtUpper;
        }

        if length1 < self.max_length_a {
            self.limit_state_a = LimitState::Inactive;
            self.limit_impulse_a = 0.0;
        } else {
            self.limit_state_a = LimitState::AtUpper;
        }
        if length2 < self.max_length_b {
            self.limit_state_b = LimitState::Inactive;
            self.limit_impulse_b = 0.0;
        } else {
            self.limit_state_b = LimitState::AtUpper;
        }

        let cr1u1 = cross(r1, self.u1);
        let cr2u2 = cross(r2, self.u2);

        self.limit_mass_a = a.inv_mass + a.inv_inertia * cr1u1 * cr1u1;
        self.limit_mass_b = b.inv_mass + b.inv_inertia * cr2u2 * cr2u2;
        self.pulley_mass = self.limit_mass_a + self.ratio * self.ratio * self.limit_mass_b;
        debug_assert!(self.limit_mass_a > f32::EPSILON);
        debug_assert!(self.limit_mass_b > f32::EPSILON);
        debug_assert!(self.pulley_mass > f32::EPSILON);
        self.limit_mass_a = 1.0 / self.limit_mass_a;
        self.limit_mass_b = 1.0 / self.limit_mass_b;
        self.pulley_mass = 1.0 / self.pulley_mass;

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.limit_impulse_a *= step.dt_ratio;
            self.limit_impulse_b *= step.dt_ratio;

            // Both the pulley and the per-side limits pull inward.
            let p1 = -(self.impulse + self.limit_impulse_a) * self.u1;
            let p2 = (-self.ratio * self.impulse - self.limit_impulse_b) * self.u2;
            a.linear_velocity += a.inv_mass * p1;
            a.angular_velocity += a.inv_inertia * cross(r1, p1);
            b.linear_velocity += b.inv_mass * p2;
            b.angular_velocity += b.inv_inertia * cross(r2, p2);
        } else {
            self.impulse = 0.0;
            self.limit_impulse_a = 0.0;
            self.limit_impulse_b = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        if self.state == LimitState::AtUpper {
            let v1 = a.linear_velocity + cross_sv(a.angular_velocity, r1);
            let v2 = b.linear_velocity + cross_sv(b.angular_velocity, r2);

            let cdot = -self.u1.dot(v1) - self.ratio * self.u2.dot(v2);
            let impulse = self.pulley_mass * -cdot;
            let old_impulse = self.impulse;
            self.impulse = (self.impulse + impulse).max(0.0);
            let impulse = self.impulse - old_impulse;

            let p1 = -impulse * self.u1;
            let p2 = -self.ratio * impulse * self.u2;
            a.linear_velocity += a.inv_mass * p1;
            a.angular_velocity += a.inv_inertia * cross(r1, p1);
            b.linear_velocity += b.inv_mass * p2;
            b.angular_velocity += b.inv_inertia * cross(r2, p2);
        }

        if self.limit_state_a == LimitState::AtUpper {
            let v1 = a.linear_velocity + cross_sv(a.angular_velocity, r1);

            let cdot = -self.u1.dot(v1);
            let impulse = -self.limit_mass_a * cdot;
            let old_impulse = self.limit_impulse_a;
            self.limit_impulse_a = (self.limit_impulse_a + impulse).max(0.0);
            let impulse = self.limit_impulse_a - old_impulse;

            let p1 = -impulse * self.u1;
            a.linear_velocity += a.inv_mass * p1;
            a.angular_velocity += a.inv_inertia * cross(r1, p1);
        }

        if self.limit_state_b == LimitState::AtUpper {
            let v2 = b.linear_velocity + cross_sv(b.angular_velocity, r2);

            let cdot = -self.u2.dot(v2);
            let impulse = -self.limit_mass_b * cdot;
            let old_impulse = self.limit_impulse_b;
            self.limit_impulse_b = (self.limit_impulse_b + impulse).max(0.0);
            let impulse = self.limit_impulse_b - old_impulse;

            let p2 = -impulse * self.u2;
            b.linear_velocity += b.inv_mass * p2;
            b.angular_velocity += b.inv_inertia * cross(r2, p2);
        }
    }

    pub(crate) fn solve_position_constraints(&mut self, a: &mut Body, b: &mut Body) -> bool {
        let s1 = self.ground_anchor_a;
        let s2 = self.ground_anchor_b;

        let mut linear_error = 0.0f32;

        if self.state == LimitState::AtUpper {
            let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
            let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

            let p1 = a.sweep.c + r1;
            let p2 = b.sweep.c + r2;

            self.u1 = p1 - s1;
            self.u2 = p2 - s2;

            let length1 = self.u1.length();
            let length2 = self.u2.length();

            if length1 > LINEAR_SLOP {
                self.u1 /= length1;
            } else {
                self.u1 = Vec2::ZERO;
            }
            if length2 > LINEAR_SLOP {
                self.u2 /= length2;
            } else {
                self.u2 = Vec2::ZERO;
            }

            let mut c = self.constant - length1 - self.ratio * length2;
            linear_error = linear_error.max(-c);

            c = (c + LINEAR_SLOP).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            let impulse = -self.pulley_mass * c;

            let p1 = -impulse * self.u1;
            let p2 = -self.ratio * impulse * self.u2;

            a.sweep.c += a.inv_mass * p1;
            a.sweep.a += a.inv_inertia * cross(r1, p1);
            b.sweep.c += b.inv_mass * p2;
            b.sweep.a += b.inv_inertia * cross(r2, p2);
            a.synchronize_transform();
            b.synchronize_transform();
        }

        if self.limit_state_a == LimitState::AtUpper {
            let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
            let p1 = a.sweep.c + r1;

            self.u1 = p1 - s1;
            let length1 = self.u1.length();

            if length1 > LINEAR_SLOP {
                self.u1 /= length1;
            } else {
                self.u1 = Vec2::ZERO;
            }

            let mut c = self.max_length_a - length1;
            linear_error = linear_error.max(-c);
            c = (c + LINEAR_SLOP).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            let impulse = -self.limit_mass_a * c;

            let p1 = -impulse * self.u1;
            a.sweep.c += a.inv_mass * p1;
            a.sweep.a += a.inv_inertia * cross(r1, p1);
            a.synchronize_transform();
        }

        if self.limit_state_b == LimitState::AtUpper {
            let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);
            let p2 = b.sweep.c + r2;

            self.u2 = p2 - s2;
            let length2 = self.u2.length();

            if length2 > LINEAR_SLOP {
                self.u2 /= length2;
            } else {
                self.u2 = Vec2::ZERO;
            }

            let mut c = self.max_length_b - length2;
            linear_error = linear_error.max(-c);
            c = (c + LINEAR_SLOP).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            let impulse = -self.limit_mass_b * c;

            let p2 = -impulse * self.u2;
            b.sweep.c += b.inv_mass * p2;
            b.sweep.a += b.inv_inertia * cross(r2, p2);
            b.synchronize_transform();
        }

        linear_error < LINEAR_SLOP
    }
}
