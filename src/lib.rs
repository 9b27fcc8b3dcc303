//! ship-sync - client-side state reconciliation for a networked 2D ship arena
//!
//! Core modules:
//! - `input`: Fixed-rate input sampling, sequencing and transmit decisions
//! - `sim`: Pure fixed-timestep integrator and the local predictor built on it
//! - `reconcile`: Tiered correction of the prediction against snapshots
//! - `interpolation`: Delayed blending of remote entities between snapshots
//! - `session`: Single-threaded façade wiring the above to the wire protocol
//! - `protocol`: Typed wire records and the JSON codec
//! - `settings`: Externally supplied tuning

pub mod diagnostics;
pub mod error;
pub mod input;
pub mod interpolation;
pub mod latency;
pub mod platform;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod settings;
pub mod sim;

pub use error::{ProtocolError, SettingsError};
pub use session::{ClientSession, FrameView};
pub use settings::Settings;

/// Reference tuning shared with the authoritative simulation.
///
/// These only seed `Settings::default()`; nothing reads them directly.
pub mod consts {
    /// Authoritative simulation rate (Hz)
    pub const SIM_TICK_RATE: f32 = 15.0;
    /// Snapshot rate (Hz), one snapshot per simulation tick
    pub const SNAPSHOT_RATE: f32 = 15.0;
    /// Maximum integrator steps per `advance` call
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest wall-clock delta one `advance` call accepts (s)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Rigid-body damping coefficients (must match the server bodies)
    pub const LINEAR_DAMPING: f32 = 0.4;
    pub const ANGULAR_DAMPING: f32 = 1.0;
    /// Multiplier in `torque = -turn * turn_rate * mass * TORQUE_GAIN`
    pub const TORQUE_GAIN: f32 = 100.0;
    /// Velocity factor applied to an axis clamped at the arena edge
    pub const BOUNDARY_VELOCITY_FACTOR: f32 = 0.5;

    /// Arena rectangle, centred on the origin
    pub const ARENA_WIDTH: f32 = 1920.0;
    pub const ARENA_HEIGHT: f32 = 1080.0;

    /// Position error beyond which the prediction is overwritten
    pub const EMERGENCY_DISTANCE: f32 = 50.0;
    /// Minimum spacing between two hard overwrites (ms)
    pub const EMERGENCY_COOLDOWN_MS: f64 = 100.0;
    /// Dead zone as a fraction of each error term's scale
    pub const DEAD_ZONE_FRACTION: f32 = 0.05;
    /// Fraction of the error removed per convergence correction
    pub const CONVERGENCE_GAIN: f32 = 0.01;
    /// Correction reports kept for diagnostics
    pub const DRIFT_HISTORY_LEN: usize = 120;

    /// Remote entities are rendered this far in the past (ms)
    pub const RENDER_DELAY_MS: f64 = 120.0;

    /// Active input is re-sent at least this often (ms)
    pub const INPUT_HEARTBEAT_MS: f64 = 250.0;
    /// Local input history window (ms)
    pub const INPUT_WINDOW_MS: f64 = 2000.0;
}

use std::f32::consts::{PI, TAU};

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    if (-PI..PI).contains(&angle) {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can round up to TAU for tiny negative inputs
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Signed shortest rotation taking `from` to `to`, in (-π, π]
#[inline]
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    let delta = normalize_angle(to - from);
    if delta <= -PI { delta + TAU } else { delta }
}

/// Unsigned angular distance between two headings, in [0, π]
#[inline]
pub fn angle_distance(a: f32, b: f32) -> f32 {
    shortest_angle_delta(a, b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle_range() {
        for raw in [-10.0_f32, -PI, -0.5, 0.0, 0.5, PI, 7.0, 100.0] {
            let a = normalize_angle(raw);
            assert!((-PI..PI).contains(&a), "{raw} -> {a}");
        }
        assert!((normalize_angle(PI) + PI).abs() < 1e-6);
    }

    #[test]
    fn test_shortest_delta_crosses_boundary() {
        // 3.0 -> -3.0 is a short hop forward across ±π, not a 6 rad sweep
        let d = shortest_angle_delta(3.0, -3.0);
        assert!((d - (TAU - 6.0)).abs() < 1e-5);
        assert!((angle_distance(3.0, -3.0) - 0.2832).abs() < 1e-3);
    }

    #[test]
    fn test_shortest_delta_half_turn_is_positive() {
        let d = shortest_angle_delta(0.0, PI);
        assert!((d - PI).abs() < 1e-6);
        let d = shortest_angle_delta(PI, 0.0);
        assert!((d - PI).abs() < 1e-6);
    }
}
