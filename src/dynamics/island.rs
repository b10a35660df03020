//! Island solver.
//!
//! The world partitions awake bodies into islands connected through
//! contacts and joints, then solves each island independently so sleeping
//! and waking stay localized.

use glam::Vec2;

use crate::common::arena::Arena;
use crate::common::settings::{
    ANGULAR_SLEEP_TOLERANCE, CONTACT_BAUMGARTE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION,
    MAX_ROTATION_SQUARED, MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
};
use crate::dynamics::body::{Body, BodyHandle, BodyType};
use crate::dynamics::contacts::contact_solver::ContactSolver;
use crate::dynamics::contacts::{Contact, ContactHandle};
use crate::dynamics::fixture::Fixture;
use crate::dynamics::joints::{Joint, JointHandle};
use crate::dynamics::world_callbacks::{ContactImpulse, ContactListener};
use crate::dynamics::TimeStep;

#[derive(Debug, Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyHandle>,
    pub contacts: Vec<ContactHandle>,
    pub joints: Vec<JointHandle>,
}

impl Island {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Integrate one full step for this island's bodies and solve its
    /// constraints. `allow_sleep` puts the whole island to sleep once
    /// every body has idled long enough.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        bodies: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
        contact_arena: &mut Arena<Contact>,
        joint_arena: &mut Arena<Joint>,
        listener: Option<&mut (dyn ContactListener + '_)>,
    ) {
        for &handle in &self.bodies {
            let body = bodies.get_mut(handle).expect("island body missing");
            if body.body_type != BodyType::Dynamic {
                continue;
            }

            body.linear_velocity += step.dt * (gravity + body.inv_mass * body.force);
            body.angular_velocity += step.dt * body.inv_inertia * body.torque;

            // Padé approximation of exponential decay, clamped so large
            // damping cannot reverse the velocity.
            body.linear_velocity *= (1.0 - step.dt * body.linear_damping).clamp(0.0, 1.0);
            body.angular_velocity *= (1.0 - step.dt * body.angular_damping).clamp(0.0, 1.0);
        }

        let mut contact_solver = ContactSolver::new(&self.contacts, contact_arena, fixtures, bodies);
        contact_solver.init_velocity_constraints(step, bodies);

        for &handle in &self.joints {
            let joint = joint_arena.get_mut(handle).expect("island joint missing");
            let (a, b) = bodies
                .pair_mut(joint.body_a, joint.body_b)
                .expect("joint bodies missing");
            joint.init_velocity_constraints(step, a, b);
        }

        for _ in 0..step.velocity_iterations {
            for &handle in &self.joints {
                let joint = joint_arena.get_mut(handle).expect("island joint missing");
                let (a, b) = bodies
                    .pair_mut(joint.body_a, joint.body_b)
                    .expect("joint bodies missing");
                joint.solve_velocity_constraints(step, a, b);
            }
            contact_solver.solve_velocity_constraints(bodies);
        }

        let mut impulses: Vec<(ContactHandle, ContactImpulse)> = Vec::new();
        contact_solver.finalize_velocity_constraints(
            contact_arena,
            |handle, normal, tangent, count| {
                impulses.push((
                    handle,
                    ContactImpulse {
                        normal_impulses: *normal,
                        tangent_impulses: *tangent,
                        count,
                    },
                ));
            },
        );

        for &handle in &self.bodies {
            let body = bodies.get_mut(handle).expect("island body missing");
            if body.body_type == BodyType::Static {
                continue;
            }

            // Cap per-step motion so tunnelling stays bounded even for
            // fast non-bullet bodies.
            let translation = step.dt * body.linear_velocity;
            if translation.length_squared() > MAX_TRANSLATION_SQUARED {
                body.linear_velocity *= MAX_TRANSLATION / translation.length();
            }
            let rotation = step.dt * body.angular_velocity;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                body.angular_velocity *= MAX_ROTATION / rotation.abs();
            }

            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c += step.dt * body.linear_velocity;
            body.sweep.a += step.dt * body.angular_velocity;
            body.synchronize_transform();
        }

        for _ in 0..step.position_iterations {
            let contacts_okay =
                contact_solver.solve_position_constraints(CONTACT_BAUMGARTE, bodies);

            let mut joints_okay = true;
            for &handle in &self.joints {
                let joint = joint_arena.get_mut(handle).expect("island joint missing");
                let (a, b) = bodies
                    .pair_mut(joint.body_a, joint.body_b)
                    .expect("joint bodies missing");
                joints_okay &= joint.solve_position_constraints(CONTACT_BAUMGARTE, a, b);
            }

            if contacts_okay && joints_okay {
                break;
            }
        }

        if let Some(listener) = listener {
            for (handle, impulse) in &impulses {
                let contact = contact_arena.get(*handle).expect("island contact missing");
                listener.post_solve(contact, impulse);
            }
        }

        if allow_sleep {
            let mut min_sleep_time = f32::MAX;

            let lin_tol_sqr = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            let ang_tol_sqr = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for &handle in &self.bodies {
                let body = bodies.get_mut(handle).expect("island body missing");
                if body.body_type == BodyType::Static {
                    continue;
                }

                if !body.auto_sleep
                    || body.angular_velocity * body.angular_velocity > ang_tol_sqr
                    || body.linear_velocity.length_squared() > lin_tol_sqr
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += step.dt;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP {
                for &handle in &self.bodies {
                    let body = bodies.get_mut(handle).expect("island body missing");
                    body.set_awake(false);
                }
            }
        }
    }

    /// Solve a continuous-collision sub-step. Runs without warm starting
    /// and with a stiffer position correction; impulses are not kept
    /// because sub-step contacts can carry very large forces.
    pub fn solve_toi(
        &self,
        sub_step: &TimeStep,
        bodies: &mut Arena<Body>,
        fixtures: &Arena<Fixture>,
        contact_arena: &mut Arena<Contact>,
        joint_arena: &mut Arena<Joint>,
    ) {
        let mut contact_solver = ContactSolver::new(&self.contacts, contact_arena, fixtures, bodies);
        contact_solver.init_velocity_constraints(sub_step, bodies);

        // Joint warm starting is off here, but init still computes the
        // Jacobians.
        for &handle in &self.joints {
            let joint = joint_arena.get_mut(handle).expect("island joint missing");
            let (a, b) = bodies
                .pair_mut(joint.body_a, joint.body_b)
                .expect("joint bodies missing");
            joint.init_velocity_constraints(sub_step, a, b);
        }

        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(bodies);
            for &handle in &self.joints {
                let joint = joint_arena.get_mut(handle).expect("island joint missing");
                let (a, b) = bodies
                    .pair_mut(joint.body_a, joint.body_b)
                    .expect("joint bodies missing");
                joint.solve_velocity_constraints(sub_step, a, b);
            }
        }

        for &handle in &self.bodies {
            let body = bodies.get_mut(handle).expect("island body missing");
            if body.body_type == BodyType::Static {
                continue;
            }

            let translation = sub_step.dt * body.linear_velocity;
            if translation.length_squared() > MAX_TRANSLATION_SQUARED {
                body.linear_velocity *= MAX_TRANSLATION / translation.length();
            }
            let rotation = sub_step.dt * body.angular_velocity;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                body.angular_velocity *= MAX_ROTATION / rotation.abs();
            }

            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c += sub_step.dt * body.linear_velocity;
            body.sweep.a += sub_step.dt * body.angular_velocity;
            body.synchronize_transform();
        }

        const TOI_BAUMGARTE: f32 = 0.75;
        for _ in 0..sub_step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(TOI_BAUMGARTE, bodies);

            let mut joints_okay = true;
            for &handle in &self.joints {
                let joint = joint_arena.get_mut(handle).expect("island joint missing");
                let (a, b) = bodies
                    .pair_mut(joint.body_a, joint.body_b)
                    .expect("joint bodies missing");
                joints_okay &= joint.solve_position_constraints(TOI_BAUMGARTE, a, b);
            }

            if contacts_okay && joints_okay {
                break;
            }
        }
    }
}
