//! Fixed timestep integration step
//!
//! The one stepping rule shared with the authoritative simulation. Any
//! change here has to land on the server as well or predictions drift.

use super::state::{BodyState, Forces};
use crate::normalize_angle;
use crate::protocol::ShipConfig;
use crate::settings::{ArenaBounds, PhysicsTuning};

/// Advance a ship body by one fixed timestep
///
/// Semi-implicit Euler, matching the server's rigid-body engine:
/// forces change velocity, velocities are damped by `1 / (1 + dt * c)`,
/// the damped velocities move the body, then the arena clamp runs.
pub fn integrate(
    state: &BodyState,
    config: &ShipConfig,
    forces: &Forces,
    tuning: &PhysicsTuning,
    dt: f32,
) -> BodyState {
    let inv_mass = inverse(config.mass);
    let inv_inertia = inverse(config.angular_inertia());

    let mut linvel = state.linear_velocity + forces.force * inv_mass * dt;
    let mut angvel = state.angular_velocity + forces.torque * inv_inertia * dt;

    linvel *= 1.0 / (1.0 + dt * tuning.linear_damping);
    angvel *= 1.0 / (1.0 + dt * tuning.angular_damping);

    let next = BodyState {
        position: state.position + linvel * dt,
        rotation: normalize_angle(state.rotation + angvel * dt),
        linear_velocity: linvel,
        angular_velocity: angvel,
    };

    clamp_to_arena(&next, &tuning.arena, tuning.boundary_velocity_factor).0
}

/// Keep a body inside the arena
///
/// Each axis that crossed an edge is pinned to it and its velocity
/// component scaled by `velocity_factor`. Returns whether anything moved.
pub fn clamp_to_arena(
    state: &BodyState,
    arena: &ArenaBounds,
    velocity_factor: f32,
) -> (BodyState, bool) {
    if arena.contains(state.position) {
        return (*state, false);
    }

    let (min, max) = (arena.min(), arena.max());
    let mut out = *state;
    let mut clamped = false;

    for axis in 0..2 {
        let p = out.position[axis];
        let pinned = p.clamp(min[axis], max[axis]);
        if pinned != p {
            out.position[axis] = pinned;
            out.linear_velocity[axis] *= velocity_factor;
            clamped = true;
        }
    }

    (out, clamped)
}

/// Zero mass or inertia means "not driven", like an infinite-mass body
fn inverse(value: f32) -> f32 {
    if value > 0.0 { 1.0 / value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    const DT: f32 = 1.0 / 15.0;

    fn tuning() -> PhysicsTuning {
        PhysicsTuning::default()
    }

    #[test]
    fn test_rest_is_fixed_point() {
        let state = BodyState::at(Vec2::new(10.0, -5.0), 0.3);
        let next = integrate(&state, &ShipConfig::default(), &Forces::ZERO, &tuning(), DT);
        assert_eq!(next, state);
    }

    #[test]
    fn test_thrust_then_damp_then_move() {
        let cfg = ShipConfig::default();
        let forces = Forces {
            force: Vec2::new(500.0, 0.0),
            torque: 0.0,
        };
        let next = integrate(&BodyState::default(), &cfg, &forces, &tuning(), DT);

        let expected_v = (500.0 / 1.0) * DT / (1.0 + DT * 0.4);
        assert!((next.linear_velocity.x - expected_v).abs() < 1e-4);
        assert!((next.position.x - expected_v * DT).abs() < 1e-5);
        assert_eq!(next.position.y, 0.0);
    }

    #[test]
    fn test_damping_keeps_direction() {
        let state = BodyState {
            linear_velocity: Vec2::new(30.0, -40.0),
            angular_velocity: 2.0,
            ..Default::default()
        };
        let next = integrate(&state, &ShipConfig::default(), &Forces::ZERO, &tuning(), DT);
        assert!(next.linear_velocity.length() < 50.0);
        assert!(next.linear_velocity.normalize().abs_diff_eq(Vec2::new(0.6, -0.8), 1e-5));
        assert!((next.angular_velocity - 2.0 / (1.0 + DT)).abs() < 1e-6);
    }

    #[test]
    fn test_torque_spins_against_turn_sign() {
        let cfg = ShipConfig::default();
        let forces = Forces::from_controls(0.0, 1.0, 0.0, &cfg, &tuning());
        let next = integrate(&BodyState::default(), &cfg, &forces, &tuning(), DT);
        assert!(next.angular_velocity < 0.0);
        assert!(next.rotation < 0.0);
    }

    #[test]
    fn test_rotation_stays_wrapped() {
        let state = BodyState {
            rotation: 3.1,
            angular_velocity: 5.0,
            ..Default::default()
        };
        let next = integrate(&state, &ShipConfig::default(), &Forces::ZERO, &tuning(), DT);
        assert!(next.rotation < 0.0 && next.rotation >= -std::f32::consts::PI);
    }

    #[test]
    fn test_clamp_halves_only_violating_axis() {
        let arena = ArenaBounds::default();
        let state = BodyState {
            position: Vec2::new(975.0, 10.0),
            linear_velocity: Vec2::new(40.0, 20.0),
            ..Default::default()
        };
        let (out, clamped) = clamp_to_arena(&state, &arena, 0.5);
        assert!(clamped);
        assert_eq!(out.position, Vec2::new(960.0, 10.0));
        assert_eq!(out.linear_velocity, Vec2::new(20.0, 20.0));
    }

    #[test]
    fn test_clamp_both_axes() {
        let arena = ArenaBounds::default();
        let state = BodyState {
            position: Vec2::new(-1000.0, -600.0),
            linear_velocity: Vec2::new(-10.0, -8.0),
            ..Default::default()
        };
        let (out, clamped) = clamp_to_arena(&state, &arena, 0.5);
        assert!(clamped);
        assert_eq!(out.position, Vec2::new(-960.0, -540.0));
        assert_eq!(out.linear_velocity, Vec2::new(-5.0, -4.0));
    }

    #[test]
    fn test_inside_arena_untouched() {
        let state = BodyState {
            position: Vec2::new(100.0, 100.0),
            linear_velocity: Vec2::new(5.0, 5.0),
            ..Default::default()
        };
        let (out, clamped) = clamp_to_arena(&state, &ArenaBounds::default(), 0.5);
        assert!(!clamped);
        assert_eq!(out, state);
    }
}
