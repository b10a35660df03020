//! Controllers apply per-step forces to a set of bodies before the solver
//! runs: fluids, force fields, extra damping.
//!
//! A controller owns no bodies; the world keeps a handle list per
//! registered controller and hands it back each step together with the
//! body and fixture arenas.

use glam::Vec2;

use crate::common::arena::{Arena, Handle};
use crate::common::math::Mat22;
use crate::dynamics::body::{Body, BodyHandle};
use crate::dynamics::fixture::Fixture;
use crate::dynamics::TimeStep;

pub type ControllerHandle = Handle<ControllerEntry>;

/// A registered controller plus the bodies it acts on.
pub struct ControllerEntry {
    pub(crate) controller: Box<dyn Controller>,
    pub(crate) bodies: Vec<BodyHandle>,
}

impl ControllerEntry {
    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }
}

/// Stepped by the world right before the island solve. Implementations
/// read and write bodies through the arena; they must not assume every
/// handle in `bodies` is still live.
pub trait Controller {
    fn step(
        &mut self,
        step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
    );
}

/// A planar fluid surface. Everything below the plane
/// `normal . x = offset` gets buoyancy and drag.
pub struct BuoyancyController {
    /// Outward (up) surface normal.
    pub normal: Vec2,
    /// Plane offset along the normal.
    pub offset: f32,
    /// Fluid density.
    pub density: f32,
    /// Fluid velocity, for drag.
    pub velocity: Vec2,
    pub linear_drag: f32,
    pub angular_drag: f32,
    /// Weigh the submerged area by fixture density instead of treating
    /// the body as uniform.
    pub use_density: bool,
    /// Gravity the buoyancy force opposes.
    pub gravity: Vec2,
}

impl BuoyancyController {
    pub fn new(gravity: Vec2) -> Self {
        BuoyancyController {
            normal: Vec2::new(0.0, 1.0),
            offset: 0.0,
            density: 0.0,
            velocity: Vec2::ZERO,
            linear_drag: 0.0,
            angular_drag: 0.0,
            use_density: false,
            gravity,
        }
    }
}

impl Controller for BuoyancyController {
    fn step(
        &mut self,
        _step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
    ) {
        for &handle in bodies {
            let body = match arena.get_mut(handle) {
                Some(b) => b,
                None => continue,
            };
            if !body.is_awake() {
                continue;
            }

            let mut area = 0.0_f32;
            let mut mass = 0.0_f32;
            let mut area_c = Vec2::ZERO;
            let mut mass_c = Vec2::ZERO;

            for &fh in body.fixtures() {
                let fixture = match fixtures.get(fh) {
                    Some(f) => f,
                    None => continue,
                };
                let (sub_area, sub_c) = fixture.shape().compute_submerged_area(
                    self.normal,
                    self.offset,
                    body.transform(),
                );
                area += sub_area;
                area_c += sub_area * sub_c;

                let shape_density = if self.use_density { fixture.density() } else { 1.0 };
                mass += sub_area * shape_density;
                mass_c += sub_area * shape_density * sub_c;
            }

            if area < f32::EPSILON {
                continue;
            }
            area_c /= area;
            mass_c /= mass;

            let buoyancy = -self.density * area * self.gravity;
            body.apply_force(buoyancy, mass_c);

            let drag = (body.linear_velocity_from_world_point(area_c) - self.velocity)
                * (-self.linear_drag * area);
            body.apply_force(drag, area_c);
            body.apply_torque(
                -body.inertia() / body.mass() * area * body.angular_velocity() * self.angular_drag,
            );
        }
    }
}

/// Applies a fixed world-space force to every attached body.
pub struct ConstantForceController {
    pub force: Vec2,
}

impl Controller for ConstantForceController {
    fn step(
        &mut self,
        _step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        _fixtures: &Arena<Fixture>,
    ) {
        for &handle in bodies {
            if let Some(body) = arena.get_mut(handle) {
                if !body.is_awake() {
                    continue;
                }
                let center = body.world_center();
                body.apply_force(self.force, center);
            }
        }
    }
}

/// Applies a fixed acceleration, independent of mass.
pub struct ConstantAccelController {
    pub acceleration: Vec2,
}

impl Controller for ConstantAccelController {
    fn step(
        &mut self,
        step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        _fixtures: &Arena<Fixture>,
    ) {
        for &handle in bodies {
            if let Some(body) = arena.get_mut(handle) {
                if !body.is_awake() {
                    continue;
                }
                let v = body.linear_velocity();
                body.set_linear_velocity(v + step.dt * self.acceleration);
            }
        }
    }
}

/// Pairwise gravitational attraction between the attached bodies.
pub struct GravityController {
    /// Gravitational constant.
    pub g: f32,
    /// Scale force with 1 / r^2 instead of linearly with distance.
    pub inv_sqr: bool,
}

impl Controller for GravityController {
    fn step(
        &mut self,
        _step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        _fixtures: &Arena<Fixture>,
    ) {
        for (i, &handle_a) in bodies.iter().enumerate() {
            for &handle_b in &bodies[..i] {
                let (body_a, body_b) = match arena.pair_mut(handle_a, handle_b) {
                    Some(pair) => pair,
                    None => continue,
                };
                let d = body_b.world_center() - body_a.world_center();
                let r2 = d.length_squared();
                if r2 < f32::EPSILON {
                    continue;
                }

                let force = if self.inv_sqr {
                    self.g / r2 / r2.sqrt() * body_a.mass() * body_b.mass() * d
                } else {
                    self.g * body_a.mass() * body_b.mass() * d
                };

                let center_a = body_a.world_center();
                let center_b = body_b.world_center();
                body_a.apply_force(force, center_a);
                body_b.apply_force(-force, center_b);
            }
        }
    }
}

/// Damps velocity through a body-local tensor, letting each local axis
/// decay at its own rate.
pub struct TensorDampingController {
    /// Local-frame damping tensor. Negative diagonal entries damp.
    pub tensor: Mat22,
    /// Caps the effective time step so strong damping cannot reverse a
    /// velocity on a long frame. Zero means uncapped.
    pub max_timestep: f32,
}

impl TensorDampingController {
    /// Independent decay rates along the body's local axes.
    pub fn axis_aligned(x_damping: f32, y_damping: f32) -> Self {
        TensorDampingController {
            tensor: Mat22::new(Vec2::new(-x_damping, 0.0), Vec2::new(0.0, -y_damping)),
            max_timestep: if x_damping.max(y_damping) > 0.0 {
                1.0 / x_damping.max(y_damping)
            } else {
                0.0
            },
        }
    }
}

impl Controller for TensorDampingController {
    fn step(
        &mut self,
        step: &TimeStep,
        bodies: &[BodyHandle],
        arena: &mut Arena<Body>,
        _fixtures: &Arena<Fixture>,
    ) {
        let mut dt = step.dt;
        if dt <= f32::EPSILON {
            return;
        }
        if self.max_timestep > 0.0 && dt > self.max_timestep {
            dt = self.max_timestep;
        }

        for &handle in bodies {
            if let Some(body) = arena.get_mut(handle) {
                if !body.is_awake() {
                    continue;
                }
                let local_v = body.local_vector(body.linear_velocity());
                let damping = body.world_vector(self.tensor.mul(local_v));
                let v = body.linear_velocity();
                body.set_linear_velocity(v + dt * damping);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::collision::shapes::MassData;
    use crate::dynamics::body::BodyBuilder;

    fn step() -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
        }
    }

    fn dynamic_body(arena: &mut Arena<Body>, position: Vec2) -> BodyHandle {
        let def = BodyBuilder::new_dynamic().position(position).build();
        let mut body = Body::new(&def);
        // Unit mass keeps force and acceleration interchangeable here.
        body.set_mass_data(&MassData {
            mass: 1.0,
            center: Vec2::ZERO,
            i: 1.0,
        });
        arena.insert(body)
    }

    #[test]
    fn constant_accel_integrates_velocity() {
        let mut arena = Arena::new();
        let fixtures = Arena::new();
        let handle = dynamic_body(&mut arena, Vec2::ZERO);

        let mut controller = ConstantAccelController {
            acceleration: Vec2::new(12.0, 0.0),
        };
        let s = step();
        for _ in 0..60 {
            controller.step(&s, &[handle], &mut arena, &fixtures);
        }

        let v = arena.get(handle).unwrap().linear_velocity();
        assert_relative_eq!(v.x, 12.0, epsilon = 1e-3);
    }

    #[test]
    fn tensor_damping_decays_velocity() {
        let mut arena = Arena::new();
        let fixtures = Arena::new();
        let handle = dynamic_body(&mut arena, Vec2::ZERO);
        arena
            .get_mut(handle)
            .unwrap()
            .set_linear_velocity(Vec2::new(5.0, 0.0));

        let mut controller = TensorDampingController::axis_aligned(2.0, 2.0);
        let s = step();
        for _ in 0..60 {
            controller.step(&s, &[handle], &mut arena, &fixtures);
        }

        let v = arena.get(handle).unwrap().linear_velocity();
        assert!(v.x > 0.0);
        assert!(v.x < 1.0, "velocity barely damped: {}", v.x);
    }

    #[test]
    fn gravity_controller_attracts_pairs() {
        let mut arena = Arena::new();
        let fixtures = Arena::new();
        let a = dynamic_body(&mut arena, Vec2::new(-1.0, 0.0));
        let b = dynamic_body(&mut arena, Vec2::new(1.0, 0.0));

        let mut controller = GravityController {
            g: 1.0,
            inv_sqr: true,
        };
        controller.step(&step(), &[a, b], &mut arena, &fixtures);

        // Equal masses pull toward each other along x with equal and
        // opposite forces.
        let force_a = arena.get(a).unwrap().force;
        let force_b = arena.get(b).unwrap().force;
        assert!(force_a.x > 0.0, "force on a: {force_a:?}");
        assert_relative_eq!(force_a.x, -force_b.x, epsilon = 1e-6);
        assert_relative_eq!(force_a.y, 0.0, epsilon = 1e-6);
    }
}
