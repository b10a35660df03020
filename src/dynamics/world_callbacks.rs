//! Traits the world calls back into during stepping, plus the debug draw
//! surface. Implementations must not touch the world re-entrantly; the
//! world is locked while these run.

use glam::Vec2;

use crate::collision::manifold::Manifold;
use crate::common::math::Transform;
use crate::common::settings::MAX_MANIFOLD_POINTS;
use crate::dynamics::contacts::Contact;
use crate::dynamics::fixture::{Filter, Fixture, FixtureHandle};
use crate::dynamics::joints::JointHandle;

/// Solver impulses for one contact, reported through
/// [`ContactListener::post_solve`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Contact lifecycle events. All methods default to no-ops.
pub trait ContactListener {
    /// Two fixtures began touching.
    fn begin_contact(&mut self, contact: &Contact) {
        let _ = contact;
    }

    /// Two fixtures stopped touching.
    fn end_contact(&mut self, contact: &Contact) {
        let _ = contact;
    }

    /// Called after collision detection but before the solver runs.
    /// `old_manifold` holds the points from the previous step. Return
    /// false to disable the contact for this step.
    fn pre_solve(&mut self, contact: &Contact, old_manifold: &Manifold) -> bool {
        let _ = (contact, old_manifold);
        true
    }

    /// Called after the solver finished with the impulses it applied.
    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        let _ = (contact, impulse);
    }
}

/// Notified when an attached object dies because its owner was destroyed.
pub trait DestructionListener {
    fn fixture_destroyed(&mut self, fixture: FixtureHandle) {
        let _ = fixture;
    }

    fn joint_destroyed(&mut self, joint: JointHandle) {
        let _ = joint;
    }
}

/// Collision filtering by group index, then category and mask bits.
pub(crate) fn filter_should_collide(a: &Filter, b: &Filter) -> bool {
    if a.group_index == b.group_index && a.group_index != 0 {
        return a.group_index > 0;
    }
    (a.mask_bits & b.category_bits) != 0 && (a.category_bits & b.mask_bits) != 0
}

/// Custom contact filtering. The default mirrors the fixture filter
/// data semantics.
pub trait ContactFilter {
    fn should_collide(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        filter_should_collide(fixture_a.filter(), fixture_b.filter())
    }
}

/// What a ray cast callback wants done with the rest of the ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayCastBehavior {
    /// Pretend this fixture was never hit and keep going.
    Ignore,
    /// Stop the cast at this hit.
    Stop,
    /// Clip the ray to this fraction and keep looking for closer hits.
    Clip(f32),
    /// Keep the full ray and report any further hits.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b }
    }
}

/// Which primitives [`World::debug_draw`](crate::World::debug_draw)
/// emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawFlags {
    pub shapes: bool,
    pub joints: bool,
    pub aabbs: bool,
    pub pairs: bool,
    pub center_of_mass: bool,
}

/// Receives debug geometry. Lengths are in physics units.
pub trait DebugDraw {
    fn flags(&self) -> DrawFlags;

    fn draw_polygon(&mut self, vertices: &[Vec2], color: Color);

    fn draw_solid_polygon(&mut self, vertices: &[Vec2], color: Color);

    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Color);

    fn draw_solid_circle(&mut self, center: Vec2, radius: f32, axis: Vec2, color: Color);

    fn draw_segment(&mut self, p1: Vec2, p2: Vec2, color: Color);

    fn draw_transform(&mut self, xf: &Transform);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_same_positive_group_always_collides() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.group_index = 3;
        b.group_index = 3;
        // Masks that would normally reject each other.
        a.mask_bits = 0;
        b.mask_bits = 0;
        assert!(filter_should_collide(&a, &b));
    }

    #[test]
    fn filter_same_negative_group_never_collides() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.group_index = -2;
        b.group_index = -2;
        assert!(!filter_should_collide(&a, &b));
    }

    #[test]
    fn filter_category_mask() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.category_bits = 0x0002;
        b.mask_bits = 0x0001;
        assert!(!filter_should_collide(&a, &b));
        b.mask_bits = 0x0003;
        assert!(filter_should_collide(&a, &b));
    }
}
