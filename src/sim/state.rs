//! Rigid-body state and per-tick forces for one ship

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::protocol::{EntitySnapshot, ShipConfig, Transform, Velocity};
use crate::settings::PhysicsTuning;

/// Kinematic state of a ship body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec2,
    /// Radians, [-π, π)
    pub rotation: f32,
    pub linear_velocity: Vec2,
    /// Radians per second
    pub angular_velocity: f32,
}

impl BodyState {
    pub fn at(position: Vec2, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Take the pose and velocities reported by a snapshot
    pub fn from_snapshot(entity: &EntitySnapshot) -> Self {
        Self {
            position: entity.transform.position,
            rotation: entity.transform.rotation,
            linear_velocity: entity.velocity.linear,
            angular_velocity: entity.velocity.angular,
        }
    }

    /// Unit vector along the nose
    pub fn heading(&self) -> Vec2 {
        Vec2::new(self.rotation.cos(), self.rotation.sin())
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
        }
    }

    pub fn velocity(&self) -> Velocity {
        Velocity {
            linear: self.linear_velocity,
            angular: self.angular_velocity,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// Force and torque held on a body for the current tick
///
/// Never accumulated: each input replaces the previous tick's values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    pub force: Vec2,
    pub torque: f32,
}

impl Forces {
    pub const ZERO: Self = Self {
        force: Vec2::ZERO,
        torque: 0.0,
    };

    /// Thrust along `heading_rotation` and turning torque for one input
    ///
    /// The torque sign matches the server: positive `turn` yields a
    /// negative (clockwise) torque.
    pub fn from_controls(
        thrust: f32,
        turn: f32,
        heading_rotation: f32,
        config: &ShipConfig,
        tuning: &PhysicsTuning,
    ) -> Self {
        let heading = Vec2::new(heading_rotation.cos(), heading_rotation.sin());
        Self {
            force: heading * config.thrust_power * thrust,
            torque: -turn * config.turn_rate * config.mass * tuning.torque_gain,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.force == Vec2::ZERO && self.torque == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_thrust_follows_heading() {
        let cfg = ShipConfig::default();
        let tuning = PhysicsTuning::default();
        let f = Forces::from_controls(1.0, 0.0, FRAC_PI_2, &cfg, &tuning);
        assert!(f.force.x.abs() < 1e-3);
        assert!((f.force.y - 500.0).abs() < 1e-3);
        assert_eq!(f.torque, 0.0);
    }

    #[test]
    fn test_torque_scale_and_sign() {
        let cfg = ShipConfig {
            mass: 2.0,
            ..Default::default()
        };
        let tuning = PhysicsTuning::default();
        let f = Forces::from_controls(0.0, 0.5, 0.0, &cfg, &tuning);
        // 0.5 * 3.0 rad/s * 2.0 * 100
        assert_eq!(f.torque, -300.0);
        assert_eq!(f.force, Vec2::ZERO);
    }

    #[test]
    fn test_reverse_thrust() {
        let cfg = ShipConfig::default();
        let f = Forces::from_controls(-1.0, 0.0, 0.0, &cfg, &PhysicsTuning::default());
        assert_eq!(f.force, Vec2::new(-500.0, 0.0));
    }
}
