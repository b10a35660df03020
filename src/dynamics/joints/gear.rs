//! A gear joint couples the coordinates of two existing joints:
//! `coordinate_a + ratio * coordinate_b == constant`. Each side is either
//! a revolute joint (angle) or a prismatic joint (translation) against a
//! static ground body, whose pose is captured when the gear is made.

use glam::Vec2;

use crate::common::math::cross;
use crate::dynamics::body::Body;
use crate::dynamics::joints::{Jacobian, JointHandle};
use crate::dynamics::TimeStep;

#[derive(Debug, Clone)]
pub struct GearJointDef {
    /// A revolute or prismatic joint; its second body becomes the gear's
    /// body A.
    pub joint_a: JointHandle,
    /// Same, for the gear's body B.
    pub joint_b: JointHandle,
    pub ratio: f32,
}

impl GearJointDef {
    pub fn new(joint_a: JointHandle, joint_b: JointHandle) -> Self {
        GearJointDef {
            joint_a,
            joint_b,
            ratio: 1.0,
        }
    }
}

/// One side of the gear train, with the ground geometry frozen at
/// creation time.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GearSide {
    Revolute {
        ground_angle: f32,
        reference_angle: f32,
    },
    Prismatic {
        /// World-space anchor on the ground body.
        ground_anchor: Vec2,
        /// World-space unit slide axis.
        ground_axis: Vec2,
        local_anchor: Vec2,
    },
}

impl GearSide {
    fn coordinate(&self, body: &Body) -> f32 {
        match *self {
            GearSide::Revolute {
                ground_angle,
                reference_angle,
            } => body.sweep.a - ground_angle - reference_angle,
            GearSide::Prismatic {
                ground_anchor,
                ground_axis,
                local_anchor,
            } => (body.world_point(local_anchor) - ground_anchor).dot(ground_axis),
        }
    }
}

#[derive(Debug)]
pub struct GearJoint {
    pub(crate) side_a: GearSide,
    pub(crate) side_b: GearSide,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,

    constant: f32,
    ratio: f32,

    j: Jacobian,
    mass: f32,
    impulse: f32,
}

impl GearJoint {
    /// `constant` is fixed from the coordinates at creation.
    pub(crate) fn new(
        side_a: GearSide,
        side_b: GearSide,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        ratio: f32,
        body_a: &Body,
        body_b: &Body,
    ) -> Self {
        let coordinate_a = side_a.coordinate(body_a);
        let coordinate_b = side_b.coordinate(body_b);
        GearJoint {
            side_a,
            side_b,
            local_anchor_a,
            local_anchor_b,
            constant: coordinate_a + ratio * coordinate_b,
            ratio,
            j: Jacobian::default(),
            mass: 0.0,
            impulse: 0.0,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.j.linear_b
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.j.angular_b
    }

    /// Jacobian and effective mass for the current body poses.
    fn build_jacobian(&self, a: &Body, b: &Body) -> (Jacobian, f32) {
        let mut j = Jacobian::default();
        let mut k = 0.0f32;

        match self.side_a {
            GearSide::Revolute { .. } => {
                j.angular_a = -1.0;
                k += a.inv_inertia;
            }
            GearSide::Prismatic {
                ground_axis,
                local_anchor,
                ..
            } => {
                let r = a.xf.q.apply(local_anchor - a.sweep.local_center);
                let crug = cross(r, ground_axis);
                j.linear_a = -ground_axis;
                j.angular_a = -crug;
                k += a.inv_mass + a.inv_inertia * crug * crug;
            }
        }

        match self.side_b {
            GearSide::Revolute { .. } => {
                j.angular_b = -self.ratio;
                k += self.ratio * self.ratio * b.inv_inertia;
            }
            GearSide::Prismatic {
                ground_axis,
                local_anchor,
                ..
            } => {
                let r = b.xf.q.apply(local_anchor - b.sweep.local_center);
                let crug = cross(r, ground_axis);
                j.linear_b = -self.ratio * ground_axis;
                j.angular_b = -self.ratio * crug;
                k += self.ratio * self.ratio * (b.inv_mass + b.inv_inertia * crug * crug);
            }
        }

        let mass = if k > 0.0 { 1.0 / k } else { 0.0 };
        (j, mass)
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, a: &mut Body, b: &mut Body) {
        let (j, mass) = self.build_jacobian(a, b);
        self.j = j;
        self.mass = mass;

        if step.warm_starting {
            a.linear_velocity += a.inv_mass * self.impulse * self.j.linear_a;
            a.angular_velocity += a.inv_inertia * self.impulse * self.j.angular_a;
            b.linear_velocity += b.inv_mass * self.impulse * self.j.linear_b;
            b.angular_velocity += b.inv_inertia * self.impulse * self.j.angular_b;
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, a: &mut Body, b: &mut Body) {
        let cdot = self.j.compute(
            a.linear_velocity,
            a.angular_velocity,
            b.linear_velocity,
            b.angular_velocity,
        );
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        a.linear_velocity += a.inv_mass * impulse * self.j.linear_a;
        a.angular_velocity += a.inv_inertia * impulse * self.j.angular_a;
        b.linear_velocity += b.inv_mass * impulse * self.j.linear_b;
        b.angular_velocity += b.inv_inertia * impulse * self.j.angular_b;
    }

    pub(crate) fn solve_position_constraints(&mut self, a: &mut Body, b: &mut Body) -> bool {
        let (j, mass) = self.build_jacobian(a, b);

        let coordinate_a = self.side_a.coordinate(a);
        let coordinate_b = self.side_b.coordinate(b);
        let c = self.constant - (coordinate_a + self.ratio * coordinate_b);

        let impulse = -mass * c;

        a.sweep.c += a.inv_mass * impulse * j.linear_a;
        a.sweep.a += a.inv_inertia * impulse * j.angular_a;
        b.sweep.c += b.inv_mass * impulse * j.linear_b;
        b.sweep.a += b.inv_inertia * impulse * j.angular_b;
        a.synchronize_transform();
        b.synchronize_transform();

        true
    }
}
