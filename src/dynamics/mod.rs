//! Rigid bodies, constraints, and the solver pipeline.

pub mod body;
pub(crate) mod contact_manager;
pub mod contacts;
pub mod controllers;
pub mod fixture;
pub(crate) mod island;
pub mod joints;
pub mod world;
pub mod world_callbacks;

/// Per-step timing data handed to the solvers.
#[derive(Debug, Clone, Copy)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt * inv_dt0`: scales warm-started impulses when the step size
    /// changes between frames.
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}
