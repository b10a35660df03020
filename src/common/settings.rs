//! Global tuning constants.
//!
//! These numbers are load-bearing: they balance stability against
//! performance for worlds measured in meters, kilograms and seconds.
//! Changing them changes simulation behavior everywhere.

use std::f32::consts::PI;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// How much broad-phase AABBs are fattened beyond the tight shape bounds.
/// Lets bodies drift a little without triggering tree updates.
pub const AABB_EXTENSION: f32 = 0.1;

/// Multiplier on per-step displacement used to predictively fatten a moved
/// proxy in the direction of travel.
pub const AABB_MULTIPLIER: f32 = 2.0;

/// Collision/constraint tolerance in meters. Chosen to be numerically
/// significant but visually insignificant.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular counterpart of [`LINEAR_SLOP`], in radians.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Slop used by the time-of-impact pass.
pub const TOI_SLOP: f32 = 8.0 * LINEAR_SLOP;

/// Caps on how much a single TOI island may contain.
pub const MAX_TOI_CONTACTS_PER_ISLAND: usize = 32;
pub const MAX_TOI_JOINTS_PER_ISLAND: usize = 32;

/// Relative normal velocity below which restitution is not applied.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Maximum position correction applied per solver iteration. Prevents
/// overshoot when resolving deep overlap.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Angular counterpart of [`MAX_LINEAR_CORRECTION`].
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Largest translation a body may make in one step. Integration clamps to
/// this so the solver's linearization stays valid.
pub const MAX_TRANSLATION: f32 = 2.0;
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Largest rotation a body may make in one step.
pub const MAX_ROTATION: f32 = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Fraction of position error corrected per position iteration.
pub const CONTACT_BAUMGARTE: f32 = 0.2;

/// Seconds a body must stay under the sleep tolerances before it sleeps.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Sleep tolerances: linear in m/s, angular in rad/s.
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

/// Combine friction of two fixtures. The geometric mean means one slick
/// surface makes the pair slick.
#[inline]
pub fn mix_friction(friction1: f32, friction2: f32) -> f32 {
    (friction1 * friction2).sqrt()
}

/// Combine restitution of two fixtures. A bouncy surface wins so inelastic
/// surfaces don't kill bounce.
#[inline]
pub fn mix_restitution(restitution1: f32, restitution2: f32) -> f32 {
    restitution1.max(restitution2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friction_mixing_is_geometric_mean() {
        assert_eq!(mix_friction(0.0, 0.9), 0.0);
        assert_eq!(mix_friction(0.5, 0.5), 0.5);
    }

    #[test]
    fn restitution_mixing_takes_the_bouncier_surface() {
        assert_eq!(mix_restitution(0.1, 0.8), 0.8);
        assert_eq!(mix_restitution(0.8, 0.1), 0.8);
    }
}
