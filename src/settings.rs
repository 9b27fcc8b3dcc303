//! Netcode tuning
//!
//! Every constant the prediction, reconciliation and interpolation paths
//! depend on lives here so it can be supplied by the host (JSON file on
//! native, a string from the page on the web) instead of being baked in.
//! The physics block must match the authoritative simulation exactly.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;

/// Network conditions the host expects to run under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LinkProfile {
    Lan,
    #[default]
    Broadband,
    Cellular,
}

impl LinkProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkProfile::Lan => "LAN",
            LinkProfile::Broadband => "Broadband",
            LinkProfile::Cellular => "Cellular",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lan" | "local" => Some(LinkProfile::Lan),
            "broadband" | "default" => Some(LinkProfile::Broadband),
            "cellular" | "mobile" => Some(LinkProfile::Cellular),
            _ => None,
        }
    }

    /// Render delay for remote entities (ms)
    ///
    /// Snapshot interval at 15 Hz is ~67 ms; each profile adds its
    /// expected jitter on top.
    pub fn render_delay_ms(&self) -> f64 {
        match self {
            LinkProfile::Lan => 90.0,
            LinkProfile::Broadband => RENDER_DELAY_MS,
            LinkProfile::Cellular => 200.0,
        }
    }

    /// Heartbeat interval for held input (ms)
    pub fn heartbeat_ms(&self) -> f64 {
        match self {
            LinkProfile::Lan => INPUT_HEARTBEAT_MS,
            LinkProfile::Broadband => INPUT_HEARTBEAT_MS,
            // Lossier links re-affirm held input more often
            LinkProfile::Cellular => 150.0,
        }
    }
}

/// Axis-aligned arena rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaBounds {
    pub width: f32,
    pub height: f32,
    pub center: Vec2,
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            center: Vec2::ZERO,
        }
    }
}

impl ArenaBounds {
    pub fn min(&self) -> Vec2 {
        self.center - Vec2::new(self.width, self.height) / 2.0
    }

    pub fn max(&self) -> Vec2 {
        self.center + Vec2::new(self.width, self.height) / 2.0
    }

    /// Inclusive of the edges
    pub fn contains(&self, p: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }
}

/// Integrator constants mirrored from the authoritative simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Fixed step rate (Hz)
    pub tick_rate: f32,
    /// Cap on steps per `advance`; the remainder carries over
    pub max_substeps: u32,
    /// Frame deltas longer than this (s) are cut down before stepping
    pub max_frame_dt: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub torque_gain: f32,
    /// Factor applied to a velocity component that hit the arena edge
    pub boundary_velocity_factor: f32,
    pub arena: ArenaBounds,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            tick_rate: SIM_TICK_RATE,
            max_substeps: MAX_SUBSTEPS,
            max_frame_dt: MAX_FRAME_DT,
            linear_damping: LINEAR_DAMPING,
            angular_damping: ANGULAR_DAMPING,
            torque_gain: TORQUE_GAIN,
            boundary_velocity_factor: BOUNDARY_VELOCITY_FACTOR,
            arena: ArenaBounds::default(),
        }
    }
}

impl PhysicsTuning {
    /// Fixed timestep in seconds
    pub fn timestep(&self) -> f32 {
        1.0 / self.tick_rate
    }
}

/// Reconciliation thresholds and gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileTuning {
    pub emergency_distance: f32,
    pub emergency_cooldown_ms: f64,
    pub dead_zone_fraction: f32,
    pub convergence_gain: f32,
    /// Reports retained by the drift history
    pub history_len: usize,
}

impl Default for ReconcileTuning {
    fn default() -> Self {
        Self {
            emergency_distance: EMERGENCY_DISTANCE,
            emergency_cooldown_ms: EMERGENCY_COOLDOWN_MS,
            dead_zone_fraction: DEAD_ZONE_FRACTION,
            convergence_gain: CONVERGENCE_GAIN,
            history_len: DRIFT_HISTORY_LEN,
        }
    }
}

/// Remote entity rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationTuning {
    pub render_delay_ms: f64,
    /// Expected snapshot rate (Hz); sets the blend window length
    pub snapshot_rate: f32,
    /// Blend rotation along the shorter arc
    pub shortest_path_rotation: bool,
}

impl Default for InterpolationTuning {
    fn default() -> Self {
        Self {
            render_delay_ms: RENDER_DELAY_MS,
            snapshot_rate: SNAPSHOT_RATE,
            shortest_path_rotation: true,
        }
    }
}

impl InterpolationTuning {
    pub fn snapshot_interval_ms(&self) -> f64 {
        1000.0 / self.snapshot_rate as f64
    }
}

/// Input sampling and transmission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputTuning {
    /// Sampling rate (Hz), normally the simulation tick rate
    pub sample_rate: f32,
    pub heartbeat_ms: f64,
    /// Age beyond which buffered commands are dropped
    pub window_ms: f64,
}

impl Default for InputTuning {
    fn default() -> Self {
        Self {
            sample_rate: SIM_TICK_RATE,
            heartbeat_ms: INPUT_HEARTBEAT_MS,
            window_ms: INPUT_WINDOW_MS,
        }
    }
}

impl InputTuning {
    pub fn sample_interval_ms(&self) -> f64 {
        1000.0 / self.sample_rate as f64
    }
}

/// Complete tuning for a client session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: LinkProfile,
    pub physics: PhysicsTuning,
    pub reconcile: ReconcileTuning,
    pub interpolation: InterpolationTuning,
    pub input: InputTuning,
}

impl Settings {
    /// Create settings from a link profile (applies profile defaults)
    pub fn from_profile(profile: LinkProfile) -> Self {
        let mut settings = Self::default();
        settings.apply_profile(profile);
        settings
    }

    /// Apply a link profile (updates latency-dependent settings)
    pub fn apply_profile(&mut self, profile: LinkProfile) {
        self.profile = profile;
        self.interpolation.render_delay_ms = profile.render_delay_ms();
        self.input.heartbeat_ms = profile.heartbeat_ms();
    }

    /// Parse and validate settings from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the integrator or the timers cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), SettingsError> {
            Err(SettingsError::Invalid { field, reason })
        }

        let p = &self.physics;
        if !(p.tick_rate > 0.0) {
            return invalid("physics.tick_rate", "must be positive");
        }
        if p.max_substeps == 0 {
            return invalid("physics.max_substeps", "must be at least 1");
        }
        if !(p.max_frame_dt > 0.0) {
            return invalid("physics.max_frame_dt", "must be positive");
        }
        if !(p.linear_damping >= 0.0 && p.angular_damping >= 0.0) {
            return invalid("physics.damping", "must not be negative");
        }
        if !(p.torque_gain >= 0.0 && p.torque_gain.is_finite()) {
            return invalid("physics.torque_gain", "must be finite and not negative");
        }
        if !(0.0..=1.0).contains(&p.boundary_velocity_factor) {
            return invalid("physics.boundary_velocity_factor", "must be within [0, 1]");
        }
        if !(p.arena.width > 0.0 && p.arena.height > 0.0) {
            return invalid("physics.arena", "width and height must be positive");
        }

        let r = &self.reconcile;
        if !(r.emergency_distance > 0.0) {
            return invalid("reconcile.emergency_distance", "must be positive");
        }
        if !(r.emergency_cooldown_ms >= 0.0) {
            return invalid("reconcile.emergency_cooldown_ms", "must not be negative");
        }
        if !(r.dead_zone_fraction >= 0.0) {
            return invalid("reconcile.dead_zone_fraction", "must not be negative");
        }
        if !(r.convergence_gain > 0.0 && r.convergence_gain <= 1.0) {
            return invalid("reconcile.convergence_gain", "must be within (0, 1]");
        }
        if r.history_len == 0 {
            return invalid("reconcile.history_len", "must be at least 1");
        }

        let i = &self.interpolation;
        if !(i.snapshot_rate > 0.0) {
            return invalid("interpolation.snapshot_rate", "must be positive");
        }
        if !(i.render_delay_ms >= 0.0) {
            return invalid("interpolation.render_delay_ms", "must not be negative");
        }
        if i.render_delay_ms <= i.snapshot_interval_ms() {
            log::warn!(
                "render delay {:.0}ms does not cover the {:.0}ms snapshot interval; remote entities will stall",
                i.render_delay_ms,
                i.snapshot_interval_ms()
            );
        }

        let n = &self.input;
        if !(n.sample_rate > 0.0) {
            return invalid("input.sample_rate", "must be positive");
        }
        if !(n.heartbeat_ms > 0.0) {
            return invalid("input.heartbeat_ms", "must be positive");
        }
        if !(n.window_ms > 0.0) {
            return invalid("input.window_ms", "must be positive");
        }

        Ok(())
    }

    /// Load settings from a JSON file (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Save settings as pretty JSON (native only)
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), SettingsError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reference_tuning() {
        let s = Settings::default();
        assert_eq!(s.physics.linear_damping, 0.4);
        assert_eq!(s.physics.angular_damping, 1.0);
        assert_eq!(s.physics.torque_gain, 100.0);
        assert_eq!(s.reconcile.emergency_distance, 50.0);
        assert_eq!(s.reconcile.emergency_cooldown_ms, 100.0);
        assert_eq!(s.interpolation.render_delay_ms, 120.0);
        assert!((s.interpolation.snapshot_interval_ms() - 66.666).abs() < 0.01);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s = Settings::from_json(r#"{ "reconcile": { "emergency_distance": 80.0 } }"#)
            .expect("valid settings");
        assert_eq!(s.reconcile.emergency_distance, 80.0);
        assert_eq!(s.reconcile.convergence_gain, CONVERGENCE_GAIN);
        assert_eq!(s.physics, PhysicsTuning::default());
    }

    #[test]
    fn test_json_roundtrip_preserves_profile() {
        let s = Settings::from_profile(LinkProfile::Cellular);
        let back = Settings::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.interpolation.render_delay_ms, 200.0);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let err = Settings::from_json(r#"{ "physics": { "tick_rate": 0.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid { field: "physics.tick_rate", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_nan_tuning() {
        let mut s = Settings::default();
        s.reconcile.emergency_cooldown_ms = f64::NAN;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { field: "reconcile.emergency_cooldown_ms", .. })
        ));

        let mut s = Settings::default();
        s.physics.linear_damping = f32::NAN;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { field: "physics.damping", .. })
        ));

        let mut s = Settings::default();
        s.physics.torque_gain = f32::INFINITY;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { field: "physics.torque_gain", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_frame_cap() {
        let err = Settings::from_json(r#"{ "physics": { "max_frame_dt": 0.0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid { field: "physics.max_frame_dt", .. }
        ));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!(LinkProfile::from_str("LAN"), Some(LinkProfile::Lan));
        assert_eq!(LinkProfile::from_str("mobile"), Some(LinkProfile::Cellular));
        assert_eq!(LinkProfile::from_str("satellite"), None);
    }

    #[test]
    fn test_arena_bounds() {
        let arena = ArenaBounds::default();
        assert_eq!(arena.min(), Vec2::new(-960.0, -540.0));
        assert_eq!(arena.max(), Vec2::new(960.0, 540.0));
        assert!(arena.contains(Vec2::new(960.0, 0.0)));
        assert!(!arena.contains(Vec2::new(961.0, 0.0)));
    }
}
