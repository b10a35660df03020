//! Rigid bodies: mass, velocity, and the swept transform.

use glam::Vec2;

use crate::collision::shapes::MassData;
use crate::common::arena::Handle;
use crate::common::math::{cross, cross_sv, Sweep, Transform};
use crate::dynamics::contacts::ContactHandle;
use crate::dynamics::fixture::FixtureHandle;
use crate::dynamics::joints::JointHandle;

pub type BodyHandle = Handle<Body>;

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Infinite mass, never moves.
    #[default]
    Static,
    /// Infinite mass, moved by velocity only.
    Kinematic,
    /// Finite mass, fully simulated.
    Dynamic,
}

/// Everything needed to create a body.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Bullets get continuous collision against other dynamic bodies.
    pub bullet: bool,
    pub active: bool,
    pub inertia_scale: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        BodyDef {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            inertia_scale: 1.0,
        }
    }
}

/// Chained construction of a [`BodyDef`].
#[derive(Debug, Clone, Default)]
pub struct BodyBuilder {
    def: BodyDef,
}

impl BodyBuilder {
    pub fn new_dynamic() -> Self {
        BodyBuilder {
            def: BodyDef {
                body_type: BodyType::Dynamic,
                ..BodyDef::default()
            },
        }
    }

    pub fn new_kinematic() -> Self {
        BodyBuilder {
            def: BodyDef {
                body_type: BodyType::Kinematic,
                ..BodyDef::default()
            },
        }
    }

    pub fn new_static() -> Self {
        BodyBuilder {
            def: BodyDef::default(),
        }
    }

    pub fn position(mut self, position: Vec2) -> Self {
        self.def.position = position;
        self
    }

    pub fn angle(mut self, angle: f32) -> Self {
        self.def.angle = angle;
        self
    }

    pub fn linear_velocity(mut self, velocity: Vec2) -> Self {
        self.def.linear_velocity = velocity;
        self
    }

    pub fn angular_velocity(mut self, velocity: f32) -> Self {
        self.def.angular_velocity = velocity;
        self
    }

    pub fn linear_damping(mut self, damping: f32) -> Self {
        self.def.linear_damping = damping;
        self
    }

    pub fn angular_damping(mut self, damping: f32) -> Self {
        self.def.angular_damping = damping;
        self
    }

    pub fn fixed_rotation(mut self) -> Self {
        self.def.fixed_rotation = true;
        self
    }

    pub fn bullet(mut self) -> Self {
        self.def.bullet = true;
        self
    }

    pub fn no_sleep(mut self) -> Self {
        self.def.allow_sleep = false;
        self
    }

    pub fn build(self) -> BodyDef {
        self.def
    }
}

#[derive(Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,

    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) inertia_scale: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,

    pub(crate) sleep_time: f32,

    pub(crate) island_flag: bool,
    pub(crate) awake: bool,
    pub(crate) auto_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) active: bool,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joints: Vec<JointHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            t0: 0.0,
        };

        let (mass, inv_mass) = match def.body_type {
            BodyType::Dynamic => (1.0, 1.0),
            _ => (0.0, 0.0),
        };

        Body {
            body_type: def.body_type,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            inertia_scale: def.inertia_scale,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            sleep_time: 0.0,
            island_flag: false,
            awake: def.awake,
            auto_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            active: def.active,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// World-space center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        self.linear_velocity = v;
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        self.angular_velocity = w;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.length_squared()
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn set_bullet(&mut self, flag: bool) {
        self.bullet = flag;
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Wake or sleep the body. Sleeping zeroes all motion.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.auto_sleep
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.auto_sleep = flag;
        if !flag {
            self.set_awake(true);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.apply(local_vector)
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inv(world_point)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.apply_inv(world_vector)
    }

    /// Velocity of a world-space point attached to the body.
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + cross_sv(self.angular_velocity, world_point - self.sweep.c)
    }

    pub fn apply_force(&mut self, force: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if !self.awake {
            self.set_awake(true);
        }
        self.force += force;
        self.torque += cross(point - self.sweep.c, force);
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if !self.awake {
            self.set_awake(true);
        }
        self.torque += torque;
    }

    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if !self.awake {
            self.set_awake(true);
        }
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * cross(point - self.sweep.c, impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if !self.awake {
            self.set_awake(true);
        }
        self.angular_velocity += self.inv_inertia * impulse;
    }

    /// Align the transform with the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf = Transform::new(Vec2::ZERO, self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.apply(self.sweep.local_center);
    }

    /// Advance the sweep origin to time `t` and drop the interval behind it.
    pub(crate) fn advance(&mut self, t: f32) {
        self.sweep.advance(t);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Transform at the start of the current sweep interval.
    pub(crate) fn sweep_start_transform(&self) -> Transform {
        let mut xf1 = Transform::new(Vec2::ZERO, self.sweep.a0);
        xf1.p = self.sweep.c0 - xf1.q.apply(self.sweep.local_center);
        xf1
    }

    /// Recompute mass, center, and inertia from the attached fixtures.
    /// `mass_data` is the sum over fixtures, computed by the world since
    /// fixtures live in their own arena.
    pub(crate) fn reset_mass_data(&mut self, total_mass: f32, total_center: Vec2, total_i: f32) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        if self.body_type != BodyType::Dynamic {
            self.sweep.local_center = Vec2::ZERO;
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            return;
        }

        self.mass = total_mass;
        let mut center = total_center;
        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            center *= self.inv_mass;
        } else {
            // A dynamic body with no density still needs finite mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if total_i > 0.0 && !self.fixed_rotation {
            // Shift to the center of mass.
            let i = total_i - self.mass * center.length_squared();
            debug_assert!(i > 0.0);
            self.inertia = i * self.inertia_scale;
            self.inv_inertia = 1.0 / self.inertia;
        }

        let old_center = self.sweep.c;
        self.sweep.local_center = center;
        self.sweep.c = self.xf.apply(center);
        self.sweep.c0 = self.sweep.c;

        // Keep the velocity of the new center of mass continuous.
        self.linear_velocity += cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }

    /// Override the fixture-derived mass properties. Only meaningful for
    /// dynamic bodies; the next fixture change recomputes from densities.
    pub(crate) fn set_mass_data(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        self.mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;

        if data.i > 0.0 && !self.fixed_rotation {
            let i = data.i - self.mass * data.center.length_squared();
            debug_assert!(i > 0.0);
            self.inertia = i * self.inertia_scale;
            self.inv_inertia = 1.0 / self.inertia;
        }

        let old_center = self.sweep.c;
        self.sweep.local_center = data.center;
        self.sweep.c = self.xf.apply(data.center);
        self.sweep.c0 = self.sweep.c;

        self.linear_velocity += cross_sv(self.angular_velocity, self.sweep.c - old_center);
    }

    /// Whether contacts against `other` should exist at all. Joints can
    /// suppress collision between the bodies they connect; that check needs
    /// joint data and lives in the contact manager.
    pub(crate) fn should_collide(&self, _other: &Body) -> bool {
        // At least one body must be dynamic.
        self.body_type == BodyType::Dynamic || _other.body_type == BodyType::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_matching_def() {
        let def = BodyBuilder::new_dynamic()
            .position(Vec2::new(1.0, 2.0))
            .angle(0.5)
            .bullet()
            .no_sleep()
            .build();
        assert_eq!(def.body_type, BodyType::Dynamic);
        assert_eq!(def.position, Vec2::new(1.0, 2.0));
        assert!(def.bullet);
        assert!(!def.allow_sleep);
    }

    #[test]
    fn static_body_ignores_velocity() {
        let mut body = Body::new(&BodyDef::default());
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
    }

    #[test]
    fn dynamic_body_defaults_to_unit_mass() {
        let def = BodyBuilder::new_dynamic().build();
        let body = Body::new(&def);
        assert_eq!(body.mass(), 1.0);
    }

    #[test]
    fn sleep_zeroes_motion() {
        let def = BodyBuilder::new_dynamic()
            .linear_velocity(Vec2::new(3.0, 0.0))
            .angular_velocity(1.0)
            .build();
        let mut body = Body::new(&def);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
    }

    #[test]
    fn massless_dynamic_body_falls_back_to_unit_mass() {
        let def = BodyBuilder::new_dynamic().build();
        let mut body = Body::new(&def);
        body.reset_mass_data(0.0, Vec2::ZERO, 0.0);
        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inv_mass, 1.0);
        assert_eq!(body.inv_inertia, 0.0);
    }
}
