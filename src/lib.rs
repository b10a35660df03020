//! A deterministic 2D rigid-body physics engine.
//!
//! The pipeline: a dynamic AABB tree finds candidate fixture pairs, GJK and
//! SAT-based manifold routines resolve exact contact geometry, and a
//! warm-started sequential-impulse solver advances islands of bodies while
//! honoring joints, friction, restitution and sleep. Fast-moving bodies are
//! kept from tunneling by a conservative-advancement time-of-impact pass.
//!
//! Everything hangs off [`World`]: create bodies through it, attach fixtures
//! to bodies, connect bodies with joints, then call [`World::step`] at a
//! fixed cadence.

pub mod collision;
pub mod common;
pub mod dynamics;

pub use common::arena::{Arena, Handle};
pub use common::math::{Mat22, Mat33, Rot, Sweep, Transform};
pub use common::settings;

pub use collision::shapes::{CircleShape, EdgeShape, MassData, PolygonShape, Shape};
pub use collision::{Aabb, RayCastInput, RayCastOutput};

pub use dynamics::body::{Body, BodyBuilder, BodyDef, BodyHandle, BodyType};
pub use dynamics::contacts::{Contact, ContactHandle};
pub use dynamics::controllers::{
    BuoyancyController, ConstantAccelController, ConstantForceController, Controller,
    ControllerHandle, GravityController, TensorDampingController,
};
pub use dynamics::fixture::{Filter, Fixture, FixtureDef, FixtureHandle};
pub use dynamics::joints::{
    DistanceJointDef, FrictionJointDef, GearJointDef, Joint, JointDef, JointHandle,
    MouseJointDef, PrismaticJointDef, PulleyJointDef, RevoluteJointDef, WeldJointDef,
};
pub use dynamics::world::{RayCastHit, World, WorldError};
pub use dynamics::world_callbacks::{
    Color, ContactFilter, ContactImpulse, ContactListener, DebugDraw, DestructionListener,
    DrawFlags, RayCastBehavior,
};

pub use glam::Vec2;
