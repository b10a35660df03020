//! The world ties the arenas, broad phase, and solver together and owns
//! the stepping pipeline.

use glam::Vec2;

use log::{debug, info, trace};
use thiserror::Error;

use crate::collision::shapes::{DistanceProxy, MassData, Shape};
use crate::collision::time_of_impact::{time_of_impact, ToiInput};
use crate::collision::{test_overlap, Aabb, RayCastInput};
use crate::common::arena::Arena;
use crate::common::math::Transform;
use crate::common::settings::{
    LINEAR_SLOP, MAX_TOI_CONTACTS_PER_ISLAND, MAX_TOI_JOINTS_PER_ISLAND, TOI_SLOP,
};
use crate::dynamics::body::{Body, BodyDef, BodyHandle, BodyType};
use crate::dynamics::contact_manager::ContactManager;
use crate::dynamics::contacts::{Contact, ContactHandle};
use crate::dynamics::controllers::{Controller, ControllerEntry, ControllerHandle};
use crate::dynamics::fixture::{Filter, Fixture, FixtureDef, FixtureHandle};
use crate::dynamics::island::Island;
use crate::dynamics::joints::gear::GearSide;
use crate::dynamics::joints::{
    distance::DistanceJoint, friction::FrictionJoint, gear::GearJoint, mouse::MouseJoint,
    prismatic::PrismaticJoint, pulley::PulleyJoint, revolute::RevoluteJoint, weld::WeldJoint,
    Joint, JointData, JointDef, JointHandle,
};
use crate::dynamics::world_callbacks::{
    Color, ContactFilter, ContactListener, DebugDraw, DestructionListener, RayCastBehavior,
};
use crate::dynamics::TimeStep;

#[derive(Debug, Error)]
pub enum WorldError {
    /// Structural mutation attempted while the world is stepping.
    #[error("world is locked during a step")]
    Locked,
    /// A handle that is stale or was never issued by this world.
    #[error("invalid handle")]
    InvalidHandle,
    /// A gear joint referenced something other than a revolute or
    /// prismatic joint.
    #[error("gear joints require revolute or prismatic joints")]
    InvalidGearJoint,
}

/// One hit from a world ray cast.
#[derive(Debug, Clone, Copy)]
pub struct RayCastHit {
    pub fixture: FixtureHandle,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: f32,
}

pub struct World {
    pub(crate) bodies: Arena<Body>,
    pub(crate) fixtures: Arena<Fixture>,
    pub(crate) joints: Arena<Joint>,
    pub(crate) contact_manager: ContactManager,
    controllers: Arena<ControllerEntry>,

    gravity: Vec2,
    allow_sleep: bool,
    warm_starting: bool,
    continuous_physics: bool,
    auto_clear_forces: bool,

    locked: bool,
    new_fixture: bool,
    inv_dt0: f32,

    /// Static body with no fixtures; a convenient anchor for mouse joints
    /// and similar single-body constraints.
    ground_body: BodyHandle,

    listener: Option<Box<dyn ContactListener>>,
    filter: Option<Box<dyn ContactFilter>>,
    destruction_listener: Option<Box<dyn DestructionListener>>,
    debug_draw: Option<Box<dyn DebugDraw>>,

    island: Island,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        info!("creating world, gravity {gravity:?}");
        let mut bodies = Arena::new();
        let ground_body = bodies.insert(Body::new(&BodyDef::default()));

        World {
            bodies,
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::new(),
            controllers: Arena::new(),
            gravity,
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            auto_clear_forces: true,
            locked: false,
            new_fixture: false,
            inv_dt0: 0.0,
            ground_body,
            listener: None,
            filter: None,
            destruction_listener: None,
            debug_draw: None,
            island: Island::default(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn ground_body(&self) -> BodyHandle {
        self.ground_body
    }

    pub fn set_allow_sleep(&mut self, flag: bool) {
        self.allow_sleep = flag;
    }

    pub fn set_warm_starting(&mut self, flag: bool) {
        self.warm_starting = flag;
    }

    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.continuous_physics = flag;
    }

    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.auto_clear_forces = flag;
    }

    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = Some(listener);
    }

    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.filter = Some(filter);
    }

    pub fn set_destruction_listener(&mut self, listener: Box<dyn DestructionListener>) {
        self.destruction_listener = Some(listener);
    }

    pub fn set_debug_draw(&mut self, draw: Box<dyn DebugDraw>) {
        self.debug_draw = Some(draw);
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter()
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures.get_mut(handle)
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contact_manager.contacts.get(handle)
    }

    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.contact_manager.contacts.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle, WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let handle = self.bodies.insert(Body::new(def));
        debug!("created body {handle:?} ({:?})", def.body_type);
        Ok(handle)
    }

    /// Destroy a body and everything attached to it. Attached joints and
    /// fixtures are reported to the destruction listener.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self.bodies.get(handle).ok_or(WorldError::InvalidHandle)?;

        let joint_list = body.joints.clone();
        for jh in joint_list {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.joint_destroyed(jh);
            }
            self.destroy_joint_internal(jh);
        }

        let contact_list = self.bodies.get(handle).unwrap().contacts.clone();
        for ch in contact_list {
            self.contact_manager
                .destroy(ch, &mut self.bodies, self.listener.as_deref_mut());
        }

        let fixture_list = self.bodies.get(handle).unwrap().fixtures.clone();
        for fh in fixture_list {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.fixture_destroyed(fh);
            }
            if let Some(fixture) = self.fixtures.get_mut(fh) {
                fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
            }
            self.fixtures.remove(fh);
        }

        for (_, entry) in self.controllers.iter_mut() {
            entry.bodies.retain(|&b| b != handle);
        }

        self.bodies.remove(handle);
        debug!("destroyed body {handle:?}");
        Ok(())
    }

    pub fn create_fixture(
        &mut self,
        body_handle: BodyHandle,
        def: &FixtureDef,
    ) -> Result<FixtureHandle, WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self
            .bodies
            .get(body_handle)
            .ok_or(WorldError::InvalidHandle)?;
        let xf = body.xf;
        let active = body.active;

        let handle = self.fixtures.insert(Fixture::new(body_handle, def));
        if active {
            let fixture = self.fixtures.get_mut(handle).unwrap();
            fixture.create_proxy(&mut self.contact_manager.broad_phase, &xf, handle);
        }

        let body = self.bodies.get_mut(body_handle).unwrap();
        body.fixtures.push(handle);
        if def.density > 0.0 {
            self.reset_mass_data(body_handle);
        }

        // New proxies need a broad-phase pass before the next collide.
        self.new_fixture = true;
        Ok(handle)
    }

    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let fixture = self.fixtures.get(handle).ok_or(WorldError::InvalidHandle)?;
        let body_handle = fixture.body;

        // Contacts through this fixture die with it.
        let contact_list = self
            .bodies
            .get(body_handle)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for ch in contact_list {
            let dead = self
                .contact_manager
                .contacts
                .get(ch)
                .map(|c| c.fixture_a == handle || c.fixture_b == handle)
                .unwrap_or(false);
            if dead {
                self.contact_manager
                    .destroy(ch, &mut self.bodies, self.listener.as_deref_mut());
            }
        }

        if let Some(fixture) = self.fixtures.get_mut(handle) {
            fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
        }
        self.fixtures.remove(handle);
        if let Some(body) = self.bodies.get_mut(body_handle) {
            body.fixtures.retain(|&f| f != handle);
        }
        self.reset_mass_data(body_handle);
        Ok(())
    }

    /// Change a fixture's collision filter; existing contacts re-run the
    /// filter on the next step.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> Result<(), WorldError> {
        let fixture = self
            .fixtures
            .get_mut(handle)
            .ok_or(WorldError::InvalidHandle)?;
        fixture.filter = filter;
        let body_handle = fixture.body;
        self.flag_contacts_for_filtering(body_handle, handle);
        Ok(())
    }

    pub fn set_sensor(&mut self, handle: FixtureHandle, flag: bool) -> Result<(), WorldError> {
        let fixture = self
            .fixtures
            .get_mut(handle)
            .ok_or(WorldError::InvalidHandle)?;
        if fixture.is_sensor == flag {
            return Ok(());
        }
        fixture.is_sensor = flag;
        let body_handle = fixture.body;

        let contact_list = self
            .bodies
            .get(body_handle)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for ch in contact_list {
            if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                if contact.fixture_a == handle || contact.fixture_b == handle {
                    let other = if contact.fixture_a == handle {
                        contact.fixture_b
                    } else {
                        contact.fixture_a
                    };
                    let other_sensor = self
                        .fixtures
                        .get(other)
                        .map(|f| f.is_sensor)
                        .unwrap_or(false);
                    contact.sensor = flag || other_sensor;
                }
            }
        }
        Ok(())
    }

    /// Teleport a body. Velocities are untouched; contacts update on the
    /// next step.
    pub fn set_transform(
        &mut self,
        handle: BodyHandle,
        position: Vec2,
        angle: f32,
    ) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidHandle)?;
        body.xf = Transform::new(position, angle);
        body.sweep.c = body.xf.apply(body.sweep.local_center);
        body.sweep.a = angle;
        body.sweep.c0 = body.sweep.c;
        body.sweep.a0 = angle;

        let xf = body.xf;
        let fixture_list = body.fixtures.clone();
        for fh in fixture_list {
            if let Some(fixture) = self.fixtures.get_mut(fh) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }
        Ok(())
    }

    /// Change the simulation type of a body. Contacts re-filter so pairs
    /// that became static-static drop out.
    pub fn set_body_type(
        &mut self,
        handle: BodyHandle,
        body_type: BodyType,
    ) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidHandle)?;
        if body.body_type == body_type {
            return Ok(());
        }
        body.body_type = body_type;
        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
        }
        body.set_awake(true);
        self.reset_mass_data(handle);

        let contact_list = self
            .bodies
            .get(handle)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for ch in contact_list {
            if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                contact.flag_for_filtering();
            }
        }
        Ok(())
    }

    /// Activate or deactivate a body. Inactive bodies keep their fixtures
    /// but leave the broad phase entirely.
    pub fn set_active(&mut self, handle: BodyHandle, flag: bool) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self.bodies.get(handle).ok_or(WorldError::InvalidHandle)?;
        if body.active == flag {
            return Ok(());
        }

        if flag {
            let xf = body.xf;
            let fixture_list = body.fixtures.clone();
            for fh in fixture_list {
                if let Some(fixture) = self.fixtures.get_mut(fh) {
                    fixture.create_proxy(&mut self.contact_manager.broad_phase, &xf, fh);
                }
            }
            self.bodies.get_mut(handle).unwrap().active = true;
            self.new_fixture = true;
        } else {
            let fixture_list = body.fixtures.clone();
            for fh in fixture_list {
                if let Some(fixture) = self.fixtures.get_mut(fh) {
                    fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
                }
            }
            let contact_list = self.bodies.get(handle).unwrap().contacts.clone();
            for ch in contact_list {
                self.contact_manager
                    .destroy(ch, &mut self.bodies, self.listener.as_deref_mut());
            }
            self.bodies.get_mut(handle).unwrap().active = false;
        }
        Ok(())
    }

    /// Recompute a body's mass properties from its fixtures.
    pub fn reset_mass_data(&mut self, handle: BodyHandle) {
        let body = match self.bodies.get(handle) {
            Some(b) => b,
            None => return,
        };

        let mut mass = 0.0;
        let mut center = Vec2::ZERO;
        let mut inertia = 0.0;
        for &fh in &body.fixtures {
            if let Some(fixture) = self.fixtures.get(fh) {
                if fixture.density == 0.0 {
                    continue;
                }
                let data = fixture.compute_mass();
                mass += data.mass;
                center += data.mass * data.center;
                inertia += data.i;
            }
        }

        let body = self.bodies.get_mut(handle).unwrap();
        body.reset_mass_data(mass, center, inertia);
    }

    /// Override a dynamic body's mass properties. The override lasts until
    /// the next fixture change recomputes them from densities.
    pub fn set_mass_data(
        &mut self,
        handle: BodyHandle,
        data: &MassData,
    ) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidHandle)?;
        body.set_mass_data(data);
        Ok(())
    }

    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointHandle, WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }

        let (body_a, body_b, collide_connected, data) = match def {
            JointDef::Gear(d) => {
                let (side_a, anchor_a, body_a) = self.gear_side(d.joint_a)?;
                let (side_b, anchor_b, body_b) = self.gear_side(d.joint_b)?;
                let a = self.bodies.get(body_a).ok_or(WorldError::InvalidHandle)?;
                let b = self.bodies.get(body_b).ok_or(WorldError::InvalidHandle)?;
                let gear = GearJoint::new(side_a, side_b, anchor_a, anchor_b, d.ratio, a, b);
                (body_a, body_b, false, JointData::Gear(gear))
            }
            JointDef::Mouse(d) => {
                let b = self.bodies.get(d.body_b).ok_or(WorldError::InvalidHandle)?;
                let joint = MouseJoint::new(d, b);
                (d.body_a, d.body_b, d.collide_connected, JointData::Mouse(joint))
            }
            JointDef::Distance(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Distance(DistanceJoint::new(d)),
            ),
            JointDef::Friction(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Friction(FrictionJoint::new(d)),
            ),
            JointDef::Prismatic(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Prismatic(PrismaticJoint::new(d)),
            ),
            JointDef::Pulley(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Pulley(PulleyJoint::new(d)),
            ),
            JointDef::Revolute(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Revolute(RevoluteJoint::new(d)),
            ),
            JointDef::Weld(d) => (
                d.body_a,
                d.body_b,
                d.collide_connected,
                JointData::Weld(WeldJoint::new(d)),
            ),
        };

        if self.bodies.get(body_a).is_none() || self.bodies.get(body_b).is_none() {
            return Err(WorldError::InvalidHandle);
        }

        let handle = self.joints.insert(Joint {
            body_a,
            body_b,
            collide_connected,
            island_flag: false,
            data,
        });
        self.bodies.get_mut(body_a).unwrap().joints.push(handle);
        self.bodies.get_mut(body_b).unwrap().joints.push(handle);

        // Existing contacts between the pair must re-run the filter so a
        // non-colliding joint suppresses them.
        if !collide_connected {
            let contact_list = self.bodies.get(body_b).unwrap().contacts.clone();
            for ch in contact_list {
                if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                    let connects = (contact.body_a == body_a && contact.body_b == body_b)
                        || (contact.body_a == body_b && contact.body_b == body_a);
                    if connects {
                        contact.flag_for_filtering();
                    }
                }
            }
        }

        debug!("created joint {handle:?}");
        Ok(handle)
    }

    /// Resolve one side of a gear train from a revolute or prismatic
    /// joint, freezing the ground body's frame.
    fn gear_side(
        &self,
        handle: JointHandle,
    ) -> Result<(GearSide, Vec2, BodyHandle), WorldError> {
        let joint = self.joints.get(handle).ok_or(WorldError::InvalidHandle)?;
        let ground = self
            .bodies
            .get(joint.body_a)
            .ok_or(WorldError::InvalidHandle)?;

        match &joint.data {
            JointData::Revolute(r) => Ok((
                GearSide::Revolute {
                    ground_angle: ground.angle(),
                    reference_angle: r.reference_angle,
                },
                r.local_anchor_b,
                joint.body_b,
            )),
            JointData::Prismatic(p) => Ok((
                GearSide::Prismatic {
                    ground_anchor: ground.world_point(p.local_anchor_a),
                    ground_axis: ground.world_vector(p.local_x_axis),
                    local_anchor: p.local_anchor_b,
                },
                p.local_anchor_b,
                joint.body_b,
            )),
            _ => Err(WorldError::InvalidGearJoint),
        }
    }

    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        if self.joints.get(handle).is_none() {
            return Err(WorldError::InvalidHandle);
        }
        self.destroy_joint_internal(handle);
        Ok(())
    }

    fn destroy_joint_internal(&mut self, handle: JointHandle) {
        let joint = match self.joints.remove(handle) {
            Some(j) => j,
            None => return,
        };
        let (body_a, body_b) = (joint.body_a, joint.body_b);

        for bh in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(bh) {
                body.joints.retain(|&j| j != handle);
                body.set_awake(true);
            }
        }

        // Collision between the pair may come back now.
        if !joint.collide_connected {
            let contact_list = self
                .bodies
                .get(body_b)
                .map(|b| b.contacts.clone())
                .unwrap_or_default();
            for ch in contact_list {
                if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                    let connects = (contact.body_a == body_a && contact.body_b == body_b)
                        || (contact.body_a == body_b && contact.body_b == body_a);
                    if connects {
                        contact.flag_for_filtering();
                    }
                }
            }
        }
        debug!("destroyed joint {handle:?}");
    }

    fn flag_contacts_for_filtering(&mut self, body: BodyHandle, fixture: FixtureHandle) {
        let contact_list = self
            .bodies
            .get(body)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for ch in contact_list {
            if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                if contact.fixture_a == fixture || contact.fixture_b == fixture {
                    contact.flag_for_filtering();
                }
            }
        }
    }

    /// Register a controller. Bodies are attached separately through
    /// [`add_body_to_controller`](Self::add_body_to_controller).
    pub fn create_controller(
        &mut self,
        controller: Box<dyn Controller>,
    ) -> Result<ControllerHandle, WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        Ok(self.controllers.insert(ControllerEntry {
            controller,
            bodies: Vec::new(),
        }))
    }

    pub fn destroy_controller(&mut self, handle: ControllerHandle) -> Result<(), WorldError> {
        if self.locked {
            return Err(WorldError::Locked);
        }
        self.controllers
            .remove(handle)
            .map(|_| ())
            .ok_or(WorldError::InvalidHandle)
    }

    pub fn controller(&self, handle: ControllerHandle) -> Option<&ControllerEntry> {
        self.controllers.get(handle)
    }

    pub fn add_body_to_controller(
        &mut self,
        controller: ControllerHandle,
        body: BodyHandle,
    ) -> Result<(), WorldError> {
        if self.bodies.get(body).is_none() {
            return Err(WorldError::InvalidHandle);
        }
        let entry = self
            .controllers
            .get_mut(controller)
            .ok_or(WorldError::InvalidHandle)?;
        if !entry.bodies.contains(&body) {
            entry.bodies.push(body);
        }
        Ok(())
    }

    pub fn remove_body_from_controller(
        &mut self,
        controller: ControllerHandle,
        body: BodyHandle,
    ) -> Result<(), WorldError> {
        let entry = self
            .controllers
            .get_mut(controller)
            .ok_or(WorldError::InvalidHandle)?;
        entry.bodies.retain(|&b| b != body);
        Ok(())
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        // Proxies created since the last step need pairing before the
        // narrow phase sees them.
        if self.new_fixture {
            self.contact_manager.find_new_contacts(
                &mut self.bodies,
                &self.fixtures,
                &self.joints,
                self.filter.as_deref_mut(),
            );
            self.new_fixture = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.warm_starting,
        };

        self.contact_manager.collide(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            self.filter.as_deref_mut(),
            self.listener.as_deref_mut(),
        );

        // Controllers push forces in before the islands are solved.
        let mut controllers = std::mem::take(&mut self.controllers);
        for (_, entry) in controllers.iter_mut() {
            entry
                .controller
                .step(&step, &entry.bodies, &mut self.bodies, &self.fixtures);
        }
        self.controllers = controllers;

        if step.dt > 0.0 {
            self.solve(&step);
            if self.continuous_physics {
                self.solve_toi(&step);
            }
            self.inv_dt0 = step.inv_dt;
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;
    }

    /// Discrete solve: flood-fill islands over awake bodies and run the
    /// solver on each.
    fn solve(&mut self, step: &TimeStep) {
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let mut island = std::mem::take(&mut self.island);
        let mut stack: Vec<BodyHandle> = Vec::new();

        for seed in self.bodies.handles() {
            {
                let body = self.bodies.get(seed).unwrap();
                if body.island_flag
                    || !body.awake
                    || !body.active
                    || body.body_type == BodyType::Static
                {
                    continue;
                }
            }

            island.clear();
            stack.clear();
            stack.push(seed);
            self.bodies.get_mut(seed).unwrap().island_flag = true;

            while let Some(bh) = stack.pop() {
                island.bodies.push(bh);
                let body = self.bodies.get_mut(bh).unwrap();
                body.set_awake(true);
                // Static bodies bound islands without joining them.
                if body.body_type == BodyType::Static {
                    continue;
                }

                let contact_list = body.contacts.clone();
                let joint_list = body.joints.clone();

                for ch in contact_list {
                    let contact = self.contact_manager.contacts.get_mut(ch).unwrap();
                    if contact.island_flag
                        || !contact.touching
                        || !contact.enabled
                        || contact.sensor
                    {
                        continue;
                    }
                    contact.island_flag = true;
                    island.contacts.push(ch);

                    let other = if contact.body_a == bh {
                        contact.body_b
                    } else {
                        contact.body_a
                    };
                    let other_body = self.bodies.get_mut(other).unwrap();
                    if !other_body.island_flag {
                        other_body.island_flag = true;
                        stack.push(other);
                    }
                }

                for jh in joint_list {
                    let joint = self.joints.get_mut(jh).unwrap();
                    if joint.island_flag {
                        continue;
                    }
                    let other = if joint.body_a == bh {
                        joint.body_b
                    } else {
                        joint.body_a
                    };
                    if !self.bodies.get(other).unwrap().active {
                        continue;
                    }
                    self.joints.get_mut(jh).unwrap().island_flag = true;
                    island.joints.push(jh);

                    let other_body = self.bodies.get_mut(other).unwrap();
                    if !other_body.island_flag {
                        other_body.island_flag = true;
                        stack.push(other);
                    }
                }
            }

            trace!(
                "solving island: {} bodies, {} contacts, {} joints",
                island.bodies.len(),
                island.contacts.len(),
                island.joints.len()
            );
            island.solve(
                step,
                self.gravity,
                self.allow_sleep,
                &mut self.bodies,
                &self.fixtures,
                &mut self.contact_manager.contacts,
                &mut self.joints,
                self.listener.as_deref_mut(),
            );

            // Statics may participate in several islands.
            for &bh in &island.bodies {
                let body = self.bodies.get_mut(bh).unwrap();
                if body.body_type == BodyType::Static {
                    body.island_flag = false;
                }
            }
        }
        self.island = island;

        for bh in self.bodies.handles() {
            let body = self.bodies.get(bh).unwrap();
            if !body.island_flag || body.body_type == BodyType::Static {
                continue;
            }
            if !body.awake || !body.active {
                continue;
            }
            self.synchronize_fixtures(bh);
        }

        self.contact_manager.find_new_contacts(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            self.filter.as_deref_mut(),
        );
    }

    /// Continuous solve: repeatedly find the earliest time of impact,
    /// advance the involved bodies to it, and run a sub-step solve.
    fn solve_toi(&mut self, step: &TimeStep) {
        for (_, body) in self.bodies.iter_mut() {
            body.island_flag = false;
            body.sweep.t0 = 0.0;
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.island_flag = false;
            contact.toi_valid = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let mut island = std::mem::take(&mut self.island);
        let mut queue: Vec<BodyHandle> = Vec::new();

        loop {
            let mut min_contact: Option<ContactHandle> = None;
            let mut min_toi = 1.0f32;

            for ch in self.contact_manager.contacts.handles() {
                let (sensor, enabled, continuous, toi_valid, cached_toi, fa, fb, ba, bb) = {
                    let c = self.contact_manager.contacts.get(ch).unwrap();
                    (
                        c.sensor, c.enabled, c.continuous, c.toi_valid, c.toi, c.fixture_a,
                        c.fixture_b, c.body_a, c.body_b,
                    )
                };
                if sensor || !enabled || !continuous {
                    continue;
                }

                let toi = if toi_valid {
                    cached_toi
                } else {
                    {
                        let b1 = self.bodies.get(ba).unwrap();
                        let b2 = self.bodies.get(bb).unwrap();
                        if (b1.body_type != BodyType::Dynamic || !b1.awake)
                            && (b2.body_type != BodyType::Dynamic || !b2.awake)
                        {
                            continue;
                        }
                    }

                    // Bring both sweeps to the same start time.
                    let (b1, b2) = self.bodies.pair_mut(ba, bb).unwrap();
                    let t0 = if b1.sweep.t0 < b2.sweep.t0 {
                        let t0 = b2.sweep.t0;
                        b1.sweep.advance(t0);
                        t0
                    } else if b2.sweep.t0 < b1.sweep.t0 {
                        let t0 = b1.sweep.t0;
                        b2.sweep.advance(t0);
                        t0
                    } else {
                        b1.sweep.t0
                    };
                    debug_assert!(t0 < 1.0);

                    let shape_a = &self.fixtures.get(fa).unwrap().shape;
                    let shape_b = &self.fixtures.get(fb).unwrap().shape;
                    let input = ToiInput {
                        proxy_a: DistanceProxy::new(shape_a),
                        proxy_b: DistanceProxy::new(shape_b),
                        sweep_a: b1.sweep,
                        sweep_b: b2.sweep,
                        tolerance: TOI_SLOP,
                    };
                    let toi = t0 + (1.0 - t0) * time_of_impact(&input);

                    let contact = self.contact_manager.contacts.get_mut(ch).unwrap();
                    contact.toi = toi;
                    contact.toi_valid = true;
                    toi
                };

                if 0.0 < toi && toi < min_toi {
                    min_toi = toi;
                    min_contact = Some(ch);
                }
            }

            let seed_contact = match min_contact {
                Some(c) if min_toi < 1.0 - 100.0 * f32::EPSILON => c,
                _ => break,
            };

            let (fa, fb, ba, bb) = {
                let c = self.contact_manager.contacts.get(seed_contact).unwrap();
                (c.fixture_a, c.fixture_b, c.body_a, c.body_b)
            };

            // Advance to impact, keeping the old sweeps in case the shapes
            // turn out not to touch there.
            let (backup_a, backup_b) = {
                let (b1, b2) = self.bodies.pair_mut(ba, bb).unwrap();
                let backups = (b1.sweep, b2.sweep);
                b1.advance(min_toi);
                b2.advance(min_toi);
                backups
            };

            let xf_a = self.bodies.get(ba).unwrap().xf;
            let xf_b = self.bodies.get(bb).unwrap().xf;
            let shape_a = &self.fixtures.get(fa).unwrap().shape;
            let shape_b = &self.fixtures.get(fb).unwrap().shape;
            let contact = self.contact_manager.contacts.get_mut(seed_contact).unwrap();
            let update = contact.update(shape_a, &xf_a, shape_b, &xf_b);
            contact.toi_valid = false;
            let (touching, sensor) = (contact.touching, contact.sensor);

            if let Some(listener) = self.listener.as_deref_mut() {
                let contact = self.contact_manager.contacts.get_mut(seed_contact).unwrap();
                if update.began {
                    listener.begin_contact(contact);
                }
                if update.ended {
                    listener.end_contact(contact);
                }
                if contact.touching && !contact.sensor {
                    let enabled = listener.pre_solve(contact, &update.old_manifold);
                    contact.enabled = enabled;
                }
            }

            if sensor || !touching {
                let (b1, b2) = self.bodies.pair_mut(ba, bb).unwrap();
                b1.sweep = backup_a;
                b2.sweep = backup_b;
                b1.synchronize_transform();
                b2.synchronize_transform();
                continue;
            }

            let seed = if self.bodies.get(ba).unwrap().body_type == BodyType::Dynamic {
                ba
            } else {
                bb
            };

            // Flood the TOI island, capped so one impact cannot pull in
            // the whole scene.
            island.clear();
            queue.clear();
            queue.push(seed);
            self.bodies.get_mut(seed).unwrap().island_flag = true;

            while let Some(bh) = queue.pop() {
                island.bodies.push(bh);
                let body = self.bodies.get_mut(bh).unwrap();
                if !body.awake {
                    body.set_awake(true);
                }
                if body.body_type != BodyType::Dynamic {
                    continue;
                }

                let contact_list = body.contacts.clone();
                let joint_list = body.joints.clone();

                for ch in contact_list {
                    if island.contacts.len() == MAX_TOI_CONTACTS_PER_ISLAND {
                        break;
                    }
                    let contact = self.contact_manager.contacts.get_mut(ch).unwrap();
                    if contact.island_flag
                        || !contact.touching
                        || !contact.enabled
                        || contact.sensor
                    {
                        continue;
                    }
                    contact.island_flag = true;
                    island.contacts.push(ch);

                    let other = if contact.body_a == bh {
                        contact.body_b
                    } else {
                        contact.body_a
                    };
                    let other_body = self.bodies.get_mut(other).unwrap();
                    if !other_body.island_flag {
                        if other_body.body_type != BodyType::Static {
                            other_body.advance(min_toi);
                            other_body.set_awake(true);
                        }
                        other_body.island_flag = true;
                        queue.push(other);
                    }
                }

                for jh in joint_list {
                    if island.joints.len() == MAX_TOI_JOINTS_PER_ISLAND {
                        continue;
                    }
                    let joint = self.joints.get(jh).unwrap();
                    if joint.island_flag {
                        continue;
                    }
                    let other = if joint.body_a == bh {
                        joint.body_b
                    } else {
                        joint.body_a
                    };
                    if !self.bodies.get(other).unwrap().active {
                        continue;
                    }
                    self.joints.get_mut(jh).unwrap().island_flag = true;
                    island.joints.push(jh);

                    let other_body = self.bodies.get_mut(other).unwrap();
                    if !other_body.island_flag {
                        if other_body.body_type != BodyType::Static {
                            other_body.advance(min_toi);
                            other_body.set_awake(true);
                        }
                        other_body.island_flag = true;
                        queue.push(other);
                    }
                }
            }

            let dt = (1.0 - min_toi) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
                dt_ratio: 0.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: step.position_iterations,
                warm_starting: false,
            };
            trace!(
                "toi sub-step at {min_toi}: {} bodies, {} contacts",
                island.bodies.len(),
                island.contacts.len()
            );
            island.solve_toi(
                &sub_step,
                &mut self.bodies,
                &self.fixtures,
                &mut self.contact_manager.contacts,
                &mut self.joints,
            );

            for &bh in &island.bodies {
                {
                    let body = self.bodies.get_mut(bh).unwrap();
                    body.island_flag = false;
                    if !body.awake || body.body_type != BodyType::Dynamic {
                        continue;
                    }
                }
                self.synchronize_fixtures(bh);

                // Moving a body invalidates every TOI that involves it.
                let contact_list = self.bodies.get(bh).unwrap().contacts.clone();
                for ch in contact_list {
                    if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                        contact.toi_valid = false;
                    }
                }
            }
            for &ch in &island.contacts {
                if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                    contact.island_flag = false;
                    contact.toi_valid = false;
                }
            }
            for &jh in &island.joints {
                if let Some(joint) = self.joints.get_mut(jh) {
                    joint.island_flag = false;
                }
            }

            // The sub-step may have pushed proxies into new overlaps.
            self.contact_manager.find_new_contacts(
                &mut self.bodies,
                &self.fixtures,
                &self.joints,
                self.filter.as_deref_mut(),
            );
        }
        self.island = island;
    }

    fn synchronize_fixtures(&mut self, handle: BodyHandle) {
        let body = self.bodies.get(handle).expect("body missing");
        let xf1 = body.sweep_start_transform();
        let xf2 = body.xf;
        let fixture_list = body.fixtures.clone();
        for fh in fixture_list {
            if let Some(fixture) = self.fixtures.get_mut(fh) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
            }
        }
    }

    /// Report every fixture whose fat AABB overlaps `aabb`. The callback
    /// returns false to stop early.
    pub fn query_aabb<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(FixtureHandle) -> bool,
    {
        self.contact_manager.broad_phase.query(aabb, |proxy_id| {
            let handle = self.contact_manager.broad_phase.user_data(proxy_id);
            callback(handle)
        });
    }

    /// Like [`query_aabb`](Self::query_aabb) but confirms overlap with an
    /// exact shape test.
    pub fn query_shape<F>(&self, shape: &Shape, xf: &Transform, mut callback: F)
    where
        F: FnMut(FixtureHandle) -> bool,
    {
        let aabb = shape.compute_aabb(xf);
        self.query_aabb(&aabb, |handle| {
            let fixture = match self.fixtures.get(handle) {
                Some(f) => f,
                None => return true,
            };
            let body = match self.bodies.get(fixture.body) {
                Some(b) => b,
                None => return true,
            };
            if test_overlap(shape, xf, &fixture.shape, &body.xf) {
                return callback(handle);
            }
            true
        });
    }

    /// Report fixtures containing the point.
    pub fn query_point<F>(&self, point: Vec2, mut callback: F)
    where
        F: FnMut(FixtureHandle) -> bool,
    {
        let slop = Vec2::splat(LINEAR_SLOP);
        let aabb = Aabb::new(point - slop, point + slop);
        self.query_aabb(&aabb, |handle| {
            let fixture = match self.fixtures.get(handle) {
                Some(f) => f,
                None => return true,
            };
            let body = match self.bodies.get(fixture.body) {
                Some(b) => b,
                None => return true,
            };
            if fixture.test_point(&body.xf, point) {
                return callback(handle);
            }
            true
        });
    }

    /// Cast a ray from `point1` to `point2`. The callback sees each hit in
    /// tree order (not sorted) and steers the cast via its return value.
    pub fn ray_cast<F>(&self, point1: Vec2, point2: Vec2, mut callback: F)
    where
        F: FnMut(FixtureHandle, Vec2, Vec2, f32) -> RayCastBehavior,
    {
        let input = RayCastInput {
            p1: point1,
            p2: point2,
            max_fraction: 1.0,
        };
        self.contact_manager
            .broad_phase
            .ray_cast(&input, |sub_input, proxy_id| {
                let handle = self.contact_manager.broad_phase.user_data(proxy_id);
                let fixture = match self.fixtures.get(handle) {
                    Some(f) => f,
                    None => return sub_input.max_fraction,
                };
                let body = match self.bodies.get(fixture.body) {
                    Some(b) => b,
                    None => return sub_input.max_fraction,
                };

                if let Some(output) = fixture.ray_cast(&body.xf, sub_input) {
                    let point = sub_input.p1 + output.fraction * (sub_input.p2 - sub_input.p1);
                    match callback(handle, point, output.normal, output.fraction) {
                        RayCastBehavior::Ignore => sub_input.max_fraction,
                        RayCastBehavior::Stop => 0.0,
                        RayCastBehavior::Clip(fraction) => fraction,
                        RayCastBehavior::Continue => 1.0,
                    }
                } else {
                    sub_input.max_fraction
                }
            });
    }

    /// The closest hit along the ray, if any.
    pub fn ray_cast_one(&self, point1: Vec2, point2: Vec2) -> Option<RayCastHit> {
        let mut best: Option<RayCastHit> = None;
        self.ray_cast(point1, point2, |fixture, point, normal, fraction| {
            best = Some(RayCastHit {
                fixture,
                point,
                normal,
                fraction,
            });
            RayCastBehavior::Clip(fraction)
        });
        best
    }

    /// Every hit along the ray, sorted near to far.
    pub fn ray_cast_all(&self, point1: Vec2, point2: Vec2) -> Vec<RayCastHit> {
        let mut hits = Vec::new();
        self.ray_cast(point1, point2, |fixture, point, normal, fraction| {
            hits.push(RayCastHit {
                fixture,
                point,
                normal,
                fraction,
            });
            RayCastBehavior::Continue
        });
        hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        hits
    }

    /// Emit the scene through the registered debug draw.
    pub fn debug_draw(&mut self) {
        let mut draw = match self.debug_draw.take() {
            Some(d) => d,
            None => return,
        };
        let flags = draw.flags();

        if flags.shapes {
            for (_, body) in self.bodies.iter() {
                for &fh in &body.fixtures {
                    let fixture = match self.fixtures.get(fh) {
                        Some(f) => f,
                        None => continue,
                    };
                    let color = if !body.active {
                        Color::new(0.5, 0.5, 0.3)
                    } else if body.body_type == BodyType::Static {
                        Color::new(0.5, 0.9, 0.5)
                    } else if body.body_type == BodyType::Kinematic {
                        Color::new(0.5, 0.5, 0.9)
                    } else if !body.awake {
                        Color::new(0.6, 0.6, 0.6)
                    } else {
                        Color::new(0.9, 0.7, 0.7)
                    };
                    draw_shape(draw.as_mut(), &fixture.shape, &body.xf, color);
                }
            }
        }

        if flags.joints {
            let color = Color::new(0.5, 0.8, 0.8);
            for (_, joint) in self.joints.iter() {
                let body_a = self.bodies.get(joint.body_a);
                let body_b = self.bodies.get(joint.body_b);
                if let (Some(a), Some(b)) = (body_a, body_b) {
                    let p1 = joint.anchor_a(a);
                    let p2 = joint.anchor_b(b);
                    match joint.data() {
                        JointData::Pulley(p) => {
                            draw.draw_segment(p.ground_anchor_a(), p1, color);
                            draw.draw_segment(p.ground_anchor_b(), p2, color);
                            draw.draw_segment(p.ground_anchor_a(), p.ground_anchor_b(), color);
                        }
                        JointData::Mouse(_) => {
                            draw.draw_segment(p1, p2, color);
                        }
                        _ => {
                            draw.draw_segment(a.transform().p, p1, color);
                            draw.draw_segment(p1, p2, color);
                            draw.draw_segment(b.transform().p, p2, color);
                        }
                    }
                }
            }
        }

        if flags.pairs {
            let color = Color::new(0.3, 0.9, 0.9);
            for (_, contact) in self.contact_manager.contacts.iter() {
                let fa = self.fixtures.get(contact.fixture_a);
                let fb = self.fixtures.get(contact.fixture_b);
                if let (Some(fa), Some(fb)) = (fa, fb) {
                    draw.draw_segment(fa.aabb().center(), fb.aabb().center(), color);
                }
            }
        }

        if flags.aabbs {
            let color = Color::new(0.9, 0.3, 0.9);
            for (_, fixture) in self.fixtures.iter() {
                let aabb = fixture.aabb();
                let vs = [
                    aabb.lower,
                    Vec2::new(aabb.upper.x, aabb.lower.y),
                    aabb.upper,
                    Vec2::new(aabb.lower.x, aabb.upper.y),
                ];
                draw.draw_polygon(&vs, color);
            }
        }

        if flags.center_of_mass {
            for (_, body) in self.bodies.iter() {
                let mut xf = body.xf;
                xf.p = body.sweep.c;
                draw.draw_transform(&xf);
            }
        }

        self.debug_draw = Some(draw);
    }
}

fn draw_shape(draw: &mut dyn DebugDraw, shape: &Shape, xf: &Transform, color: Color) {
    match shape {
        Shape::Circle(c) => {
            let center = xf.apply(c.p);
            draw.draw_solid_circle(center, c.radius, xf.q.x_axis(), color);
        }
        Shape::Polygon(p) => {
            let vertices: Vec<Vec2> = p.vertices().iter().map(|&v| xf.apply(v)).collect();
            draw.draw_solid_polygon(&vertices, color);
        }
        Shape::Edge(e) => {
            draw.draw_segment(xf.apply(e.v1), xf.apply(e.v2), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::collision::manifold::Manifold;
    use crate::dynamics::body::BodyBuilder;
    use crate::dynamics::controllers::{BuoyancyController, ConstantForceController};
    use crate::dynamics::joints::{DistanceJointDef, GearJointDef, RevoluteJointDef};
    use crate::dynamics::world_callbacks::ContactImpulse;

    const DT: f32 = 1.0 / 60.0;

    fn step_n(world: &mut World, steps: usize) {
        for _ in 0..steps {
            world.step(DT, 8, 3);
        }
    }

    fn create_ground(world: &mut World) -> BodyHandle {
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(Shape::rect(50.0, 1.0)))
            .unwrap();
        ground
    }

    fn drop_circle(world: &mut World, position: Vec2, radius: f32) -> BodyHandle {
        let body = world
            .create_body(&BodyBuilder::new_dynamic().position(position).build())
            .unwrap();
        world
            .create_fixture(body, &FixtureDef::new(Shape::circle(radius)).with_density(1.0))
            .unwrap();
        body
    }

    #[derive(Clone, Default)]
    struct Counters {
        begins: Rc<Cell<usize>>,
        ends: Rc<Cell<usize>>,
        post_solves: Rc<Cell<usize>>,
    }

    struct CountingListener(Counters);

    impl ContactListener for CountingListener {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.0.begins.set(self.0.begins.get() + 1);
        }

        fn end_contact(&mut self, _contact: &Contact) {
            self.0.ends.set(self.0.ends.get() + 1);
        }

        fn pre_solve(&mut self, _contact: &Contact, _old_manifold: &Manifold) -> bool {
            true
        }

        fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {
            self.0.post_solves.set(self.0.post_solves.get() + 1);
        }
    }

    #[test]
    fn dropped_circle_rests_on_ground_and_sleeps() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        create_ground(&mut world);
        let ball = drop_circle(&mut world, Vec2::new(0.0, 5.0), 0.5);

        step_n(&mut world, 240);

        let body = world.body(ball).unwrap();
        // Ground top is at y = 1; the ball rests on it, give or take slop.
        assert!(
            (body.position().y - 1.5).abs() < 0.05,
            "rest height {}",
            body.position().y
        );
        assert!(!body.is_awake(), "resting body should fall asleep");
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
    }

    #[test]
    fn box_stack_stays_upright() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        create_ground(&mut world);

        let mut boxes = Vec::new();
        for i in 0..3 {
            let body = world
                .create_body(
                    &BodyBuilder::new_dynamic()
                        .position(Vec2::new(0.0, 1.5 + i as f32))
                        .build(),
                )
                .unwrap();
            world
                .create_fixture(
                    body,
                    &FixtureDef::new(Shape::rect(0.5, 0.5))
                        .with_density(1.0)
                        .with_friction(0.5),
                )
                .unwrap();
            boxes.push(body);
        }

        step_n(&mut world, 240);

        for (i, &handle) in boxes.iter().enumerate() {
            let body = world.body(handle).unwrap();
            assert!(
                body.position().x.abs() < 0.1,
                "box {i} drifted to x = {}",
                body.position().x
            );
            assert!(
                (body.position().y - (1.5 + i as f32)).abs() < 0.1,
                "box {i} sank to y = {}",
                body.position().y
            );
        }
    }

    #[test]
    fn bullet_stops_at_thin_wall() {
        let mut world = World::new(Vec2::ZERO);

        let wall = world
            .create_body(&BodyBuilder::new_static().position(Vec2::new(10.0, 0.0)).build())
            .unwrap();
        world
            .create_fixture(wall, &FixtureDef::new(Shape::rect(0.1, 10.0)))
            .unwrap();

        let bullet = world
            .create_body(
                &BodyBuilder::new_dynamic()
                    .linear_velocity(Vec2::new(200.0, 0.0))
                    .bullet()
                    .build(),
            )
            .unwrap();
        world
            .create_fixture(bullet, &FixtureDef::new(Shape::circle(0.1)).with_density(1.0))
            .unwrap();

        step_n(&mut world, 20);

        let body = world.body(bullet).unwrap();
        assert!(
            body.position().x < 10.0,
            "bullet tunneled to x = {}",
            body.position().x
        );
    }

    #[test]
    fn sleeping_is_per_island() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        create_ground(&mut world);
        let left = drop_circle(&mut world, Vec2::new(-20.0, 2.0), 0.5);
        let right = drop_circle(&mut world, Vec2::new(20.0, 2.0), 0.5);

        step_n(&mut world, 240);
        assert!(!world.body(left).unwrap().is_awake());
        assert!(!world.body(right).unwrap().is_awake());

        world
            .body_mut(left)
            .unwrap()
            .apply_linear_impulse(Vec2::new(0.0, 2.0), Vec2::new(-20.0, 1.5));
        step_n(&mut world, 2);

        assert!(world.body(left).unwrap().is_awake());
        assert!(
            !world.body(right).unwrap().is_awake(),
            "waking one island must not wake the other"
        );
    }

    #[test]
    fn contact_listener_sees_begin_solve_and_end() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let counters = Counters::default();
        world.set_contact_listener(Box::new(CountingListener(counters.clone())));

        create_ground(&mut world);
        let ball = drop_circle(&mut world, Vec2::new(0.0, 2.0), 0.5);

        step_n(&mut world, 120);
        assert!(counters.begins.get() >= 1, "no begin_contact fired");
        assert!(counters.post_solves.get() >= 1, "no post_solve fired");

        world.destroy_body(ball).unwrap();
        assert!(counters.ends.get() >= 1, "no end_contact on destruction");
    }

    #[test]
    fn sensors_report_overlap_without_pushing_back() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let counters = Counters::default();
        world.set_contact_listener(Box::new(CountingListener(counters.clone())));

        let gate = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(gate, &FixtureDef::new(Shape::rect(5.0, 0.5)).sensor())
            .unwrap();

        let ball = drop_circle(&mut world, Vec2::new(0.0, 3.0), 0.5);
        step_n(&mut world, 180);

        assert!(counters.begins.get() >= 1, "sensor overlap not reported");
        assert!(
            world.body(ball).unwrap().position().y < -5.0,
            "sensor should not block motion"
        );
    }

    #[test]
    fn ray_cast_one_returns_nearest_hit() {
        let mut world = World::new(Vec2::ZERO);

        let near = world
            .create_body(&BodyBuilder::new_static().position(Vec2::new(5.0, 0.0)).build())
            .unwrap();
        let near_fixture = world
            .create_fixture(near, &FixtureDef::new(Shape::circle(1.0)))
            .unwrap();
        let far = world
            .create_body(&BodyBuilder::new_static().position(Vec2::new(10.0, 0.0)).build())
            .unwrap();
        world
            .create_fixture(far, &FixtureDef::new(Shape::circle(1.0)))
            .unwrap();

        let hit = world
            .ray_cast_one(Vec2::ZERO, Vec2::new(20.0, 0.0))
            .expect("ray should hit");
        assert_eq!(hit.fixture, near_fixture);
        assert!((hit.fraction - 0.2).abs() < 0.01, "fraction {}", hit.fraction);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-3);

        let all = world.ray_cast_all(Vec2::ZERO, Vec2::new(20.0, 0.0));
        assert_eq!(all.len(), 2);
        assert!(all[0].fraction < all[1].fraction);
    }

    #[test]
    fn point_query_confirms_containment() {
        let mut world = World::new(Vec2::ZERO);
        let body = world
            .create_body(&BodyBuilder::new_static().position(Vec2::new(3.0, 0.0)).build())
            .unwrap();
        let fixture = world
            .create_fixture(body, &FixtureDef::new(Shape::rect(1.0, 1.0)))
            .unwrap();

        let mut inside = Vec::new();
        world.query_point(Vec2::new(3.2, 0.5), |f| {
            inside.push(f);
            true
        });
        assert_eq!(inside, vec![fixture]);

        let mut outside = Vec::new();
        world.query_point(Vec2::new(3.0, 1.6), |f| {
            outside.push(f);
            true
        });
        assert!(outside.is_empty());
    }

    #[test]
    fn revolute_pendulum_keeps_its_radius() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let pivot = world.create_body(&BodyDef::default()).unwrap();
        let bob = world
            .create_body(&BodyBuilder::new_dynamic().position(Vec2::new(2.0, 0.0)).build())
            .unwrap();
        world
            .create_fixture(bob, &FixtureDef::new(Shape::rect(0.25, 0.25)).with_density(1.0))
            .unwrap();

        let def = RevoluteJointDef::initialize(
            pivot,
            bob,
            world.body(pivot).unwrap(),
            world.body(bob).unwrap(),
            Vec2::ZERO,
        );
        world.create_joint(&JointDef::Revolute(def)).unwrap();

        step_n(&mut world, 60);

        let body = world.body(bob).unwrap();
        assert!(body.position().y < -0.5, "pendulum did not swing down");
        let radius = body.position().length();
        assert!((radius - 2.0).abs() < 0.05, "radius drifted to {radius}");
    }

    #[test]
    fn rigid_distance_joint_holds_length() {
        let mut world = World::new(Vec2::ZERO);
        let a = drop_circle(&mut world, Vec2::ZERO, 0.5);
        let b = drop_circle(&mut world, Vec2::new(2.0, 0.0), 0.5);

        let def = DistanceJointDef::initialize(
            a,
            b,
            world.body(a).unwrap(),
            world.body(b).unwrap(),
            Vec2::ZERO,
            Vec2::new(2.0, 0.0),
        );
        world.create_joint(&JointDef::Distance(def)).unwrap();

        world
            .body_mut(b)
            .unwrap()
            .apply_linear_impulse(Vec2::new(1.0, 1.5), Vec2::new(2.0, 0.0));
        step_n(&mut world, 120);

        let pa = world.body(a).unwrap().position();
        let pb = world.body(b).unwrap().position();
        let gap = (pb - pa).length();
        assert!((gap - 2.0).abs() < 0.05, "length drifted to {gap}");
    }

    #[test]
    fn gear_joint_couples_wheel_angles() {
        let mut world = World::new(Vec2::ZERO);
        let ground = world.create_body(&BodyDef::default()).unwrap();

        let mut wheel = |world: &mut World, x: f32| {
            let body = world
                .create_body(&BodyBuilder::new_dynamic().position(Vec2::new(x, 0.0)).build())
                .unwrap();
            world
                .create_fixture(body, &FixtureDef::new(Shape::circle(1.0)).with_density(1.0))
                .unwrap();
            body
        };
        let wheel_a = wheel(&mut world, -2.0);
        let wheel_b = wheel(&mut world, 2.0);

        let rev_a = world
            .create_joint(&JointDef::Revolute(RevoluteJointDef::initialize(
                ground,
                wheel_a,
                world.body(ground).unwrap(),
                world.body(wheel_a).unwrap(),
                Vec2::new(-2.0, 0.0),
            )))
            .unwrap();
        let rev_b = world
            .create_joint(&JointDef::Revolute(RevoluteJointDef::initialize(
                ground,
                wheel_b,
                world.body(ground).unwrap(),
                world.body(wheel_b).unwrap(),
                Vec2::new(2.0, 0.0),
            )))
            .unwrap();

        let mut gear = GearJointDef::new(rev_a, rev_b);
        gear.ratio = 2.0;
        world.create_joint(&JointDef::Gear(gear)).unwrap();

        world.body_mut(wheel_a).unwrap().set_angular_velocity(1.0);
        step_n(&mut world, 60);

        let angle_a = world.body(wheel_a).unwrap().angle();
        let angle_b = world.body(wheel_b).unwrap().angle();
        assert!(angle_a > 0.5, "driven wheel barely turned: {angle_a}");
        assert!(
            (angle_a + 2.0 * angle_b).abs() < 0.02,
            "gear constraint violated: {angle_a} vs {angle_b}"
        );
    }

    #[test]
    fn gear_joint_rejects_other_joint_kinds() {
        let mut world = World::new(Vec2::ZERO);
        let a = drop_circle(&mut world, Vec2::ZERO, 0.5);
        let b = drop_circle(&mut world, Vec2::new(2.0, 0.0), 0.5);

        let rod = world
            .create_joint(&JointDef::Distance(DistanceJointDef::initialize(
                a,
                b,
                world.body(a).unwrap(),
                world.body(b).unwrap(),
                Vec2::ZERO,
                Vec2::new(2.0, 0.0),
            )))
            .unwrap();

        let gear = GearJointDef::new(rod, rod);
        assert!(matches!(
            world.create_joint(&JointDef::Gear(gear)),
            Err(WorldError::InvalidGearJoint)
        ));
    }

    #[test]
    fn destroying_a_body_takes_its_joints_and_fixtures() {
        struct Goodbyes(Rc<Cell<usize>>, Rc<Cell<usize>>);
        impl DestructionListener for Goodbyes {
            fn fixture_destroyed(&mut self, _fixture: FixtureHandle) {
                self.0.set(self.0.get() + 1);
            }
            fn joint_destroyed(&mut self, _joint: JointHandle) {
                self.1.set(self.1.get() + 1);
            }
        }

        let mut world = World::new(Vec2::ZERO);
        let fixtures_gone = Rc::new(Cell::new(0));
        let joints_gone = Rc::new(Cell::new(0));
        world.set_destruction_listener(Box::new(Goodbyes(
            fixtures_gone.clone(),
            joints_gone.clone(),
        )));

        let a = drop_circle(&mut world, Vec2::ZERO, 0.5);
        let b = drop_circle(&mut world, Vec2::new(2.0, 0.0), 0.5);
        world
            .create_joint(&JointDef::Distance(DistanceJointDef::initialize(
                a,
                b,
                world.body(a).unwrap(),
                world.body(b).unwrap(),
                Vec2::ZERO,
                Vec2::new(2.0, 0.0),
            )))
            .unwrap();

        assert_eq!(world.joint_count(), 1);
        world.destroy_body(b).unwrap();

        assert_eq!(world.joint_count(), 0);
        assert_eq!(joints_gone.get(), 1);
        assert_eq!(fixtures_gone.get(), 1);
        assert!(world.body(a).unwrap().joints().is_empty());
    }

    #[test]
    fn filter_changes_apply_to_existing_contacts() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        create_ground(&mut world);
        let ball = drop_circle(&mut world, Vec2::new(0.0, 2.0), 0.5);
        let fixture = world.body(ball).unwrap().fixtures()[0];

        step_n(&mut world, 120);
        assert!((world.body(ball).unwrap().position().y - 1.5).abs() < 0.05);

        // Move the ball to a group that collides with nothing.
        world
            .set_filter(
                fixture,
                Filter {
                    category_bits: 0x0002,
                    mask_bits: 0x0000,
                    group_index: 0,
                },
            )
            .unwrap();
        world.body_mut(ball).unwrap().set_awake(true);
        step_n(&mut world, 120);

        assert!(
            world.body(ball).unwrap().position().y < 0.0,
            "ball should fall through after refiltering"
        );
    }

    #[test]
    fn set_mass_data_overrides_fixture_mass() {
        let mut world = World::new(Vec2::ZERO);
        let body = drop_circle(&mut world, Vec2::ZERO, 0.5);
        let computed = world.body(body).unwrap().mass();
        assert!((computed - std::f32::consts::PI * 0.25).abs() < 1e-3);

        world
            .set_mass_data(
                body,
                &MassData {
                    mass: 10.0,
                    center: Vec2::ZERO,
                    i: 4.0,
                },
            )
            .unwrap();
        let heavy = world.body(body).unwrap();
        assert_eq!(heavy.mass(), 10.0);
        assert_eq!(heavy.inertia(), 4.0);

        // Fixture changes recompute from densities again.
        world
            .create_fixture(body, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0))
            .unwrap();
        assert!((world.body(body).unwrap().mass() - 2.0 * computed).abs() < 1e-3);
    }

    #[test]
    fn buoyancy_floats_a_light_box() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let boxy = world
            .create_body(
                &BodyBuilder::new_dynamic()
                    .position(Vec2::new(0.0, 2.0))
                    .no_sleep()
                    .build(),
            )
            .unwrap();
        world
            .create_fixture(boxy, &FixtureDef::new(Shape::rect(0.5, 0.5)).with_density(1.0))
            .unwrap();

        let mut fluid = BuoyancyController::new(world.gravity());
        fluid.density = 2.0;
        fluid.linear_drag = 5.0;
        fluid.angular_drag = 2.0;
        let water = world.create_controller(Box::new(fluid)).unwrap();
        world.add_body_to_controller(water, boxy).unwrap();

        step_n(&mut world, 600);

        // A density-1 body in a density-2 fluid floats half submerged,
        // its center at the surface.
        let body = world.body(boxy).unwrap();
        assert!(body.position().y.abs() < 0.2, "settled at y = {}", body.position().y);
        assert!(body.linear_velocity().length() < 0.5);
    }

    #[test]
    fn destroying_a_body_detaches_it_from_controllers() {
        let mut world = World::new(Vec2::ZERO);
        let body = drop_circle(&mut world, Vec2::ZERO, 0.5);

        let pull = world
            .create_controller(Box::new(ConstantForceController {
                force: Vec2::new(1.0, 0.0),
            }))
            .unwrap();
        world.add_body_to_controller(pull, body).unwrap();
        assert_eq!(world.controller(pull).unwrap().bodies().len(), 1);

        world.destroy_body(body).unwrap();
        assert!(world.controller(pull).unwrap().bodies().is_empty());
        // Stepping afterwards must not touch the stale handle.
        world.step(DT, 8, 3);
    }
}
