//! Fixtures attach shapes and surface material to bodies.

use glam::Vec2;

use crate::collision::broad_phase::BroadPhase;
use crate::collision::dynamic_tree::NULL_NODE;
use crate::collision::shapes::{MassData, Shape};
use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::common::arena::Handle;
use crate::common::math::Transform;
use crate::dynamics::body::BodyHandle;

pub type FixtureHandle = Handle<Fixture>;

/// Collision filtering data. Two fixtures in the same nonzero group always
/// collide (positive) or never collide (negative); otherwise the category
/// and mask bits decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            category_bits: 0x0001,
            mask_bits: 0xffff,
            group_index: 0,
        }
    }
}

/// Everything needed to create a fixture.
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub is_sensor: bool,
    pub filter: Filter,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        FixtureDef {
            shape,
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// A shape bound to a body, registered on the broad phase.
#[derive(Debug)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) density: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxy_id: usize,
    pub(crate) aabb: Aabb,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Fixture {
            body,
            shape: def.shape.clone(),
            friction: def.friction,
            restitution: def.restitution,
            density: def.density,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxy_id: NULL_NODE,
            aabb: Aabb::default(),
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The fattened box last pushed to the broad phase.
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    pub fn ray_cast(&self, xf: &Transform, input: &RayCastInput) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf)
    }

    pub fn compute_mass(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    pub(crate) fn create_proxy(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureHandle>,
        xf: &Transform,
        handle: FixtureHandle,
    ) {
        debug_assert!(self.proxy_id == NULL_NODE);
        self.aabb = self.shape.compute_aabb(xf);
        self.proxy_id = broad_phase.create_proxy(&self.aabb, handle);
    }

    pub(crate) fn destroy_proxy(&mut self, broad_phase: &mut BroadPhase<FixtureHandle>) {
        if self.proxy_id != NULL_NODE {
            broad_phase.destroy_proxy(self.proxy_id);
            self.proxy_id = NULL_NODE;
        }
    }

    /// Push an updated box covering both the old and new transform, so a
    /// body moving within one step cannot slip out of its proxy.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureHandle>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        if self.proxy_id == NULL_NODE {
            return;
        }

        let aabb1 = self.shape.compute_aabb(xf1);
        let aabb2 = self.shape.compute_aabb(xf2);
        self.aabb = Aabb::combine(&aabb1, &aabb2);

        let displacement = xf2.p - xf1.p;
        broad_phase.move_proxy(self.proxy_id, &self.aabb, displacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_collides_with_everything() {
        let f = Filter::default();
        assert_eq!(f.category_bits, 0x0001);
        assert_eq!(f.mask_bits, 0xffff);
        assert_eq!(f.group_index, 0);
    }

    #[test]
    fn def_builder_sets_material() {
        let def = FixtureDef::new(Shape::circle(1.0))
            .with_density(2.0)
            .with_friction(0.6)
            .with_restitution(0.4)
            .sensor();
        assert_eq!(def.density, 2.0);
        assert_eq!(def.friction, 0.6);
        assert_eq!(def.restitution, 0.4);
        assert!(def.is_sensor);
    }
}
