//! A revolute joint pins two bodies at a point, with an optional motor and
//! angle limits.

use glam::{Vec2, Vec3};

use crate::common::math::{cross, cross_sv, Mat22, Mat33};
use crate::common::settings::{
    ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION,
};
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::joints::LimitState;
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct RevoluteJointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// `angle_b - angle_a` at rest.
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    pub collide_connected: bool,
}

impl RevoluteJointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        RevoluteJointDef {
            body_a,
            body_b,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
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
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,

    pub(crate) enable_limit: bool,
    pub(crate) lower_angle: f32,
    pub(crate) upper_angle: f32,
    pub(crate) enable_motor: bool,
    pub(crate) motor_speed: f32,
    pub(crate) max_motor_torque: f32,

    /// x, y: point-to-point impulse; z: limit impulse.
    pub(crate) impulse: Vec3,
    motor_impulse: f32,
    mass: Mat33,
    motor_mass: f32,
    limit_state: LimitState,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        RevoluteJoint {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec3::ZERO,
            motor_impulse: 0.0,
            mass: Mat33::default(),
            motor_mass: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    pub fn joint_angle(&self, a: &Body, b: &Body) -> f32 {
        b.sweep.a - a.sweep.a - self.reference_angle
    }

    pub fn joint_speed(&self, a: &Body, b: &Body) -> f32 {
        b.angular_velocity - a.angular_velocity
    }

    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * Vec2::new(self.impulse.x, self.impulse.y)
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let m1 = a.inv_mass;
        let m2 = b.inv_mass;
        let i1 = a.inv_inertia;
        let i2 = b.inv_inertia;

        self.mass = Mat33 {
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
        };

        let i_sum = i1 + i2;
        self.motor_mass = if i_sum > 0.0 { 1.0 / i_sum } else { 0.0 };

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit {
            let joint_angle = b.sweep.a - a.sweep.a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);
            a.linear_velocity -= m1 * p;
            a.angular_velocity -= i1 * (cross(r1, p) + self.motor_impulse + self.impulse.z);
            b.linear_velocity += m2 * p;
            b.angular_velocity += i2 * (cross(r2, p) + self.motor_impulse + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
            self.motor_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
        let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

        let m1 = a.inv_mass;
        let m2 = b.inv_mass;
        let i1 = a.inv_inertia;
        let i2 = b.inv_inertia;

        // Motor.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = b.angular_velocity - a.angular_velocity - self.motor_speed;
            let mut impulse = self.motor_mass * -cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            a.angular_velocity -= i1 * impulse;
            b.angular_velocity += i2 * impulse;
        }

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            // Point-to-point plus limit as a 3x3 block.
            let cdot1 = b.linear_velocity + cross_sv(b.angular_velocity, r2)
                - a.linear_velocity
                - cross_sv(a.angular_velocity, r1);
            let cdot2 = b.angular_velocity - a.angular_velocity;

            let mut impulse = self.mass.solve33(-Vec3::new(cdot1.x, cdot1.y, cdot2));

            match self.limit_state {
                LimitState::Equal => {
                    self.impulse += impulse;
                }
                LimitState::AtLower => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse < 0.0 {
                        // The limit impulse went attractive; fall back to
                        // point-to-point only and zero the limit.
                        let reduced = self.mass.solve22(-cdot1);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse > 0.0 {
                        let reduced = self.mass.solve22(-cdot1);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => unreachable!(),
            }

            let p = Vec2::new(impulse.x, impulse.y);
            a.linear_velocity -= m1 * p;
            a.angular_velocity -= i1 * (cross(r1, p) + impulse.z);
            b.linear_velocity += m2 * p;
            b.angular_velocity += i2 * (cross(r2, p) + impulse.z);
        } else {
            // Point-to-point only.
            let cdot = b.linear_velocity + cross_sv(b.angular_velocity, r2)
                - a.linear_velocity
                - cross_sv(a.angular_velocity, r1);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            a.linear_velocity -= m1 * impulse;
            a.angular_velocity -= i1 * cross(r1, impulse);
            b.linear_velocity += m2 * impulse;
            b.angular_velocity += i2 * cross(r2, impulse);
        }
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        _baumgarte: f32,
        a: &mut Body,
        b: &mut Body,
    ) -> bool {
        let mut angular_error = 0.0f32;
        let mut position_error;

        // Limit correction first, with the anchors following after.
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let angle = b.sweep.a - a.sweep.a - self.reference_angle;
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    let c = (angle - self.lower_angle)
                        .clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                    angular_error = c.abs();
                }
                LimitState::AtLower => {
                    let mut c = angle - self.lower_angle;
                    angular_error = -c;
                    c = (c + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::AtUpper => {
                    let mut c = angle - self.upper_angle;
                    angular_error = c;
                    c = (c - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::Inactive => {}
            }

            a.sweep.a -= a.inv_inertia * limit_impulse;
            b.sweep.a += b.inv_inertia * limit_impulse;
            a.synchronize_transform();
            b.synchronize_transform();
        }

        // Point-to-point correction.
        {
            let r1 = a.xf.q.apply(self.local_anchor_a - a.sweep.local_center);
            let r2 = b.xf.q.apply(self.local_anchor_b - b.sweep.local_center);

            let mut c = b.sweep.c + r2 - a.sweep.c - r1;
            position_error = c.length();

            let inv_mass1 = a.inv_mass;
            let inv_mass2 = b.inv_mass;
            let inv_i1 = a.inv_inertia;
            let inv_i2 = b.inv_inertia;

            // Large detachment gets a particle solution (no rotation)
            // first, half strength, then the stiff solve cleans up.
            let allowed_stretch = 10.0 * LINEAR_SLOP;
            if c.length_squared() > allowed_stretch * allowed_stretch {
                let k = inv_mass1 + inv_mass2;
                debug_assert!(k > f32::EPSILON);
                let m = 1.0 / k;
                let impulse = m * -c;
                let beta = 0.5;
                a.sweep.c -= beta * inv_mass1 * impulse;
                b.sweep.c += beta * inv_mass2 * impulse;
                c = b.sweep.c + r2 - a.sweep.c - r1;
            }

            let k1 = Mat22::new(
                Vec2::new(inv_mass1 + inv_mass2, 0.0),
                Vec2::new(0.0, inv_mass1 + inv_mass2),
            );
            let k2 = Mat22::new(
                Vec2::new(inv_i1 * r1.y * r1.y, -inv_i1 * r1.x * r1.y),
                Vec2::new(-inv_i1 * r1.x * r1.y, inv_i1 * r1.x * r1.x),
            );
            let k3 = Mat22::new(
                Vec2::new(inv_i2 * r2.y * r2.y, -inv_i2 * r2.x * r2.y),
                Vec2::new(-inv_i2 * r2.x * r2.y, inv_i2 * r2.x * r2.x),
            );

            let k = k1 + k2 + k3;
            let impulse = k.solve(-c);

            a.sweep.c -= a.inv_mass * impulse;
            a.sweep.a -= a.inv_inertia * cross(r1, impulse);
            b.sweep.c += b.inv_mass * impulse;
            b.sweep.a += b.inv_inertia * cross(r2, impulse);
            a.synchronize_transform();
            b.synchronize_transform();
        }

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
