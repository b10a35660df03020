//! Joints constrain pairs of bodies.
//!
//! Each joint type keeps its own solver state; the island drives them
//! through the same init/solve-velocity/solve-position protocol as
//! contacts. All joints run on two distinct bodies; the mouse joint
//! formally targets only its second body.

pub mod distance;
pub mod friction;
pub mod gear;
pub mod mouse;
pub mod prismatic;
pub mod pulley;
pub mod revolute;
pub mod weld;

use glam::Vec2;

use crate::common::arena::Handle;
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::TimeStep;

pub use distance::DistanceJointDef;
pub use friction::FrictionJointDef;
pub use gear::GearJointDef;
pub use mouse::MouseJointDef;
pub use prismatic::PrismaticJointDef;
pub use pulley::PulleyJointDef;
pub use revolute::RevoluteJointDef;
pub use weld::WeldJointDef;

pub type JointHandle = Handle<Joint>;

/// Where a joint limit currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    /// Lower and upper limits coincide; the joint is locked.
    Equal,
}

/// A constraint row `J v` over two bodies.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Jacobian {
    pub linear_a: Vec2,
    pub angular_a: f32,
    pub linear_b: Vec2,
    pub angular_b: f32,
}

impl Jacobian {
    pub fn compute(&self, v_a: Vec2, w_a: f32, v_b: Vec2, w_b: f32) -> f32 {
        self.linear_a.dot(v_a) + self.angular_a * w_a + self.linear_b.dot(v_b) + self.angular_b * w_b
    }
}

#[derive(Debug)]
pub enum JointData {
    Distance(distance::DistanceJoint),
    Friction(friction::FrictionJoint),
    Gear(gear::GearJoint),
    Mouse(mouse::MouseJoint),
    Prismatic(prismatic::PrismaticJoint),
    Pulley(pulley::PulleyJoint),
    Revolute(revolute::RevoluteJoint),
    Weld(weld::WeldJoint),
}

#[derive(Debug)]
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) island_flag: bool,
    pub(crate) data: JointData,
}

impl Joint {
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn data(&self) -> &JointData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut JointData {
        &mut self.data
    }

    /// World anchor on body A.
    pub fn anchor_a(&self, a: &Body) -> Vec2 {
        match &self.data {
            JointData::Distance(j) => a.world_point(j.local_anchor_a),
            JointData::Friction(j) => a.world_point(j.local_anchor_a),
            JointData::Gear(j) => a.world_point(j.local_anchor_a),
            JointData::Mouse(j) => j.target,
            JointData::Prismatic(j) => a.world_point(j.local_anchor_a),
            JointData::Pulley(j) => a.world_point(j.local_anchor_a),
            JointData::Revolute(j) => a.world_point(j.local_anchor_a),
            JointData::Weld(j) => a.world_point(j.local_anchor_a),
        }
    }

    /// World anchor on body B.
    pub fn anchor_b(&self, b: &Body) -> Vec2 {
        match &self.data {
            JointData::Distance(j) => b.world_point(j.local_anchor_b),
            JointData::Friction(j) => b.world_point(j.local_anchor_b),
            JointData::Gear(j) => b.world_point(j.local_anchor_b),
            JointData::Mouse(j) => b.world_point(j.local_anchor),
            JointData::Prismatic(j) => b.world_point(j.local_anchor_b),
            JointData::Pulley(j) => b.world_point(j.local_anchor_b),
            JointData::Revolute(j) => b.world_point(j.local_anchor_b),
            JointData::Weld(j) => b.world_point(j.local_anchor_b),
        }
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.data {
            JointData::Distance(j) => j.reaction_force(inv_dt),
            JointData::Friction(j) => j.reaction_force(inv_dt),
            JointData::Gear(j) => j.reaction_force(inv_dt),
            JointData::Mouse(j) => j.reaction_force(inv_dt),
            JointData::Prismatic(j) => j.reaction_force(inv_dt),
            JointData::Pulley(j) => j.reaction_force(inv_dt),
            JointData::Revolute(j) => j.reaction_force(inv_dt),
            JointData::Weld(j) => j.reaction_force(inv_dt),
        }
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.data {
            JointData::Distance(_) => 0.0,
            JointData::Friction(j) => inv_dt * j.angular_impulse,
            JointData::Gear(j) => j.reaction_torque(inv_dt),
            JointData::Mouse(_) => 0.0,
            JointData::Prismatic(j) => inv_dt * j.impulse.y,
            JointData::Pulley(_) => 0.0,
            JointData::Revolute(j) => inv_dt * j.impulse.z,
            JointData::Weld(j) => inv_dt * j.impulse.z,
        }
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        step: &TimeStep,
        a: &mut Body,
        b: &mut Body,
    ) {
        match &mut self.data {
            JointData::Distance(j) => j.init_velocity_constraints(step, a, b),
            JointData::Friction(j) => j.init_velocity_constraints(step, a, b),
            JointData::Gear(j) => j.init_velocity_constraints(step, a, b),
            JointData::Mouse(j) => j.init_velocity_constraints(step, b),
            JointData::Prismatic(j) => j.init_velocity_constraints(step, a, b),
            JointData::Pulley(j) => j.init_velocity_constraints(step, a, b),
            JointData::Revolute(j) => j.init_velocity_constraints(step, a, b),
            JointData::Weld(j) => j.init_velocity_constraints(step, a, b),
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        step: &TimeStep,
        a: &mut Body,
        b: &mut Body,
    ) {
        match &mut self.data {
            JointData::Distance(j) => j.solve_velocity_constraints(a, b),
            JointData::Friction(j) => j.solve_velocity_constraints(step, a, b),
            JointData::Gear(j) => j.solve_velocity_constraints(a, b),
            JointData::Mouse(j) => j.solve_velocity_constraints(step, b),
            JointData::Prismatic(j) => j.solve_velocity_constraints(step, a, b),
            JointData::Pulley(j) => j.solve_velocity_constraints(a, b),
            JointData::Revolute(j) => j.solve_velocity_constraints(step, a, b),
            JointData::Weld(j) => j.solve_velocity_constraints(a, b),
        }
    }

    pub(crate) fn solve_position_constraints(
        &mut self,
        baumgarte: f32,
        a: &mut Body,
        b: &mut Body,
    ) -> bool {
        match &mut self.data {
            JointData::Distance(j) => j.solve_position_constraints(a, b),
            JointData::Friction(_) => true,
            JointData::Gear(j) => j.solve_position_constraints(a, b),
            JointData::Mouse(_) => true,
            JointData::Prismatic(j) => j.solve_position_constraints(a, b),
            JointData::Pulley(j) => j.solve_position_constraints(a, b),
            JointData::Revolute(j) => j.solve_position_constraints(baumgarte, a, b),
            JointData::Weld(j) => j.solve_position_constraints(a, b),
        }
    }
}

/// Definition for any joint type; `World::create_joint` consumes one.
#[derive(Debug, Clone)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Weld(WeldJointDef),
}

impl JointDef {
    pub(crate) fn body_a(&self) -> BodyHandle {
        match self {
            JointDef::Distance(d) => d.body_a,
            JointDef::Friction(d) => d.body_a,
            JointDef::Gear(_) => Handle::NONE,
            JointDef::Mouse(d) => d.body_a,
            JointDef::Prismatic(d) => d.body_a,
            JointDef::Pulley(d) => d.body_a,
            JointDef::Revolute(d) => d.body_a,
            JointDef::Weld(d) => d.body_a,
        }
    }

    pub(crate) fn body_b(&self) -> BodyHandle {
        match self {
            JointDef::Distance(d) => d.body_b,
            JointDef::Friction(d) => d.body_b,
            JointDef::Gear(_) => Handle::NONE,
            JointDef::Mouse(d) => d.body_b,
            JointDef::Prismatic(d) => d.body_b,
            JointDef::Pulley(d) => d.body_b,
            JointDef::Revolute(d) => d.body_b,
            JointDef::Weld(d) => d.body_b,
        }
    }

    pub(crate) fn collide_connected(&self) -> bool {
        match self {
            JointDef::Distance(d) => d.collide_connected,
            JointDef::Friction(d) => d.collide_connected,
            JointDef::Gear(_) => false,
            JointDef::Mouse(d) => d.collide_connected,
            JointDef::Prismatic(d) => d.collide_connected,
            JointDef::Pulley(d) => d.collide_connected,
            JointDef::Revolute(d) => d.collide_connected,
            JointDef::Weld(d) => d.collide_connected,
        }
    }
}
