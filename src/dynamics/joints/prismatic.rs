//! A prismatic joint allows translation along one axis and forbids
//! relative rotation, with an optional motor and translation limits.

use glam::{Vec2, Vec3};

use crate::common::math::{cross, cross_sv, Mat33, Rot};
use crate::common::settings::{
    ANGULAR_SLOP, LINEAR_SLOP, MAX_LINEAR_CORRECTION,
};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::joints::LimitState;
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct PrismaticJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Slide axis in body A's frame, unit length.
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,
    pub collide_connected: bool,
}

impl PrismaticJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        PrismaticJointDef {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::new(1.0, 0.0),
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            collide_connected: false,
        }
    }

    pub fn initialize(
        body_a: BodyHandle,
        body_b: BodyHandle,
        a: &Body,
        b: &Body,
        anchor: Vec2,
        axis: Vec2,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.local_anchor_a = a.local_point(anchor);
        def.local_anchor_b = b.local_point(anchor);
        def.local_axis_a = a.local_vector(axis);
        def.reference_angle = b.angle() - a.angle();
        def
    }
}

#[derive(Debug)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) local_x_axis: Vec2,
    local_y_axis: Vec2,
    pub(crate) reference_angle: f32,

    pub(crate) enable_limit: bool,
    pub(crate) lower_translation: f32,
    pub(crate) upper_translation: f32,
    pub(crate) enable_motor: bool,
    pub(crate) motor_speed: f32,
    pub(crate) max_motor_force: f32,

    /// x: perpendicular, y: angular, z: limit along the axis.
    pub(crate) impulse: Vec3,
    motor_impulse: f32,
    limit_state: LimitState,

    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat33,
    motor_mass: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        PrismaticJoint {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis: def.local_axis_a,
            local_y_axis: cross_sv(1.0, def.local_axis_a),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_force: def.max_motor_force,
            impulse: Vec3::ZERO,
            motor_impulse: 0.0,
            limit_state: LimitState::Inactive,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat33::default(),
            motor_mass: 0.0,
        }
    }

    pub fn joint_translation(&self, a: &Body, b: &Body) -> f32 {
        let p_a = a.world_point(self.local_anchor_a);
        let p_b = b.world_point(self.local_anchor_b);
        let axis = a.world_vector(self.local_x_axis);
        (p_b - p_a).dot(axis)
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse.x * self.perp + (self.motor_impulse + self.impulse.z) * self.axis)
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);
        let d = b.sweep.c + r2 - a.sweep.c - r1;

        let m1 = a.inv_mass;
        let m2 = b.inv_mass;
        let i1 = a.inv_inertia;
        let i2 = b.inv_inertia;

        // Motor and limit share the slide axis.
        self.axis = a.xf.q.apply(self.local_x_axis);
        self.a1 = cross(d + r1, self.axis);
        self.a2 = cross(r2, self.axis);

        let motor_mass = m1 + m2 + i1 * self.a1 * self.a1 + i2 * self.a2 * self.a2;
        self.motor_mass = if motor_mass > f32::MIN_POSITIVE {
            1.0 / motor_mass
        } else {
            motor_mass
        };

        self.perp = a.xf.q.apply(self.local_y_axis);
        self.s1 = cross(d + r1, self.perp);
        self.s2 = cross(r2, self.perp);

        let k11 = m1 + m2 + i1 * self.s1 * self.s1 + i2 * self.s2 * self.s2;
        let k12 = i1 * self.s1 + i2 * self.s2;
        let k13 = i1 * self.s1 * self.a1 + i2 * self.s2 * self.a2;
        let k22 = i1 + i2;
        let k23 = i1 * self.a1 + i2 * self.a2;
        let k33 = m1 + m2 + i1 * self.a1 * self.a1 + i2 * self.a2 * self.a2;

        self.k = Mat33 {
            col1: Vec3::new(k11, k12, k13),
            col2: Vec3::new(k12, k22, k23),
            col3: Vec3::new(k13, k23, k33),
        };

        if self.enable_limit {
            let joint_translation = self.axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_state = LimitState::AtLower;
                    self.impulse.z = 0.0;
                }
            } else if joint_translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_state = LimitState::AtUpper;
                    self.impulse.z = 0.0;
                }
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;

            let p = self.impulse.x * self.perp + (self.motor_impulse + self.impulse.z) * self.axis;
            let l1 =
                self.impulse.x * self.s1 + self.impulse.y + (self.motor_impulse + self.impulse.z) * self.a1;
            let l2 =
                self.impulse.x * self.s2 + self.impulse.y + (self.motor_impulse + self.impulse.z) * self.a2;

            a.linear_velocity -= m1 * p;
            a.angular_velocity -= i1 * l1;
            b.linear_velocity += m2 * p;
            b.angular_velocity += i2 * l2;
        } else {
            self.impulse = Vec3::ZERO;
            self.motor_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let m1 = a.inv_mass;
        let m2 = b.inv_mass;
        let i1 = a.inv_inertia;
        let i2 = b.inv_inertia;

        let mut v1 = a.linear_velocity;
        let mut w1 = a.angular_velocity;
        let mut v2 = b.linear_velocity;
        let mut w2 = b.angular_velocity;

        // Motor.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = self.axis.dot(v2 - v1) + self.a2 * w2 - self.a1 * w1;
            let mut impulse = self.motor_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = step.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = impulse * self.axis;
            v1 -= m1 * p;
            w1 -= i1 * impulse * self.a1;
            v2 += m2 * p;
            w2 += i2 * impulse * self.a2;
        }

        let cdot1 = Vec2::new(
            self.perp.dot(v2 - v1) + self.s2 * w2 - self.s1 * w1,
            w2 - w1,
        );

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            // Limit active: solve the full 3x3 block, clamp the limit row,
            // then re-solve the unconstrained rows against the clamped one.
            let cdot2 = self.axis.dot(v2 - v1) + self.a2 * w2 - self.a1 * w1;

            let f1 = self.impulse;
            let df = self.k.solve33(-Vec3::new(cdot1.x, cdot1.y, cdot2));
            self.impulse += df;

            match self.limit_state {
                LimitState::AtLower => self.impulse.z = self.impulse.z.max(0.0),
                LimitState::AtUpper => self.impulse.z = self.impulse.z.min(0.0),
                _ => {}
            }

            let b_vec =
                -cdot1 - (self.impulse.z - f1.z) * Vec2::new(self.k.col3.x, self.k.col3.y);
            let f2r = self.k.solve22(b_vec) + Vec2::new(f1.x, f1.y);
            self.impulse.x = f2r.x;
            self.impulse.y = f2r.y;

            let df = self.impulse - f1;

            let p = df.x * self.perp + df.z * self.axis;
            let l1 = df.x * self.s1 + df.y + df.z * self.a1;
            let l2 = df.x * self.s2 + df.y + df.z * self.a2;

            v1 -= m1 * p;
            w1 -= i1 * l1;
            v2 += m2 * p;
            w2 += i2 * l2;
        } else {
            // No limit: 2x2 solve for the perpendicular and angular rows.
            let df = self.k.solve22(-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            let p = df.x * self.perp;
            let l1 = df.x * self.s1 + df.y;
            let l2 = df.x * self.s2 + df.y;

            v1 -= m1 * p;
            w1 -= i1 * l1;
            v2 += m2 * p;
            w2 += i2 * l2;
        }

        a.linear_velocity = v1;
        a.angular_velocity = w1;
        b.linear_velocity = v2;
        b.angular_velocity = w2;
    }

    pub(crate) fn solve_position_constraints(&mut self, a: &mut Body, b: &mut Body) -> bool {
        let mut c1_center = a.sweep.c;
        let mut a1_angle = a.sweep.a;
        let mut c2_center = b.sweep.c;
        let mut a2_angle = b.sweep.a;

        let m1 = a.inv_mass;
        let m2 = b.inv_mass;
        let i1 = a.inv_inertia;
        let i2 = b.inv_inertia;

        let mut linear_error;
        let mut limit_c = 0.0f32;
        let mut active = false;

        let q1 = Rot::new(a1_angle);
        let q2 = Rot::new(a2_angle);

        let r1 = q1.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = q2.apply(self.local_anchor_b - b.sweep.local_center);
        let d = c2_center + r2 - c1_center - r1;

        let mut axis = Vec2::ZERO;
        let mut a1_term = 0.0;
        let mut a2_term = 0.0;

        linear_error = 0.0;
        if self.enable_limit {
            axis = q1.apply(self.local_x_axis);
            a1_term = cross(d + r1, axis);
            a2_term = cross(r2, axis);

            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                limit_c = translation.clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = translation.abs();
                active = true;
            } else if translation <= self.lower_translation {
                limit_c = (translation - self.lower_translation + LINEAR_SLOP)
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);
                linear_error = self.lower_translation - translation;
                active = true;
            } else if translation >= self.upper_translation {
                limit_c = (translation - self.upper_translation - LINEAR_SLOP)
                    .clamp(0.0, MAX_LINEAR_CORRECTION);
                linear_error = translation - self.upper_translation;
                active = true;
            }
        }

        let perp = q1.apply(self.local_y_axis);
        let s1 = cross(d + r1, perp);
        let s2 = cross(r2, perp);

        let c1 = Vec2::new(perp.dot(d), a2_angle - a1_angle - self.reference_angle);
        linear_error = linear_error.max(c1.x.abs());
        let angular_error = c1.y.abs();

        let impulse;
        if active {
            let k11 = m1 + m2 + i1 * s1 * s1 + i2 * s2 * s2;
            let k12 = i1 * s1 + i2 * s2;
            let k13 = i1 * s1 * a1_term + i2 * s2 * a2_term;
            let k22 = i1 + i2;
            let k23 = i1 * a1_term + i2 * a2_term;
            let k33 = m1 + m2 + i1 * a1_term * a1_term + i2 * a2_term * a2_term;

            let k = Mat33 {
                col1: Vec3::new(k11, k12, k13),
                col2: Vec3::new(k12, k22, k23),
                col3: Vec3::new(k13, k23, k33),
            };
            impulse = k.solve33(-Vec3::new(c1.x, c1.y, limit_c));
        } else {
            let k11 = m1 + m2 + i1 * s1 * s1 + i2 * s2 * s2;
            let k12 = i1 * s1 + i2 * s2;
            let mut k22 = i1 + i2;
            if k22 == 0.0 {
                k22 = 1.0;
            }

            let k = crate::common::math::Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse1 = k.solve(-c1);
            impulse = Vec3::new(impulse1.x, impulse1.y, 0.0);
        }

        let p = impulse.x * perp + impulse.z * axis;
        let l1 = impulse.x * s1 + impulse.y + impulse.z * a1_term;
        let l2 = impulse.x * s2 + impulse.y + impulse.z * a2_term;

        c1_center -= m1 * p;
        a1_angle -= i1 * l1;
        c2_center += m2 * p;
        a2_angle += i2 * l2;

        a.sweep.c = c1_center;
        a.sweep.a = a1_angle;
        b.sweep.c = c2_center;
        b.sweep.a = a2_angle;
        a.synchronize_transform();
        b.synchronize_transform();

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
