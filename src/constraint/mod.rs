//! Velocity-level constraint solving.

pub mod penetration;

/// Baumgarte stabilization factor feeding penetration depth back as a
/// velocity bias.
pub const BAUMGARTE_FACTOR: f32 = 0.24;

/// Penetration depth tolerated without any positional correction, suppresses
/// jitter on resting contacts.
pub const PENETRATION_SLOP: f32 = 0.01;

/// How many sequential-impulse iterations run every step.
pub const SOLVER_ITERATIONS: usize = 12;
