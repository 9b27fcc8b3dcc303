//! Tiered reconciliation of the local prediction against snapshots
//!
//! Each local-entity snapshot lands in exactly one tier:
//! - **Bootstrap**: no prediction yet, so the snapshot becomes it
//! - **Emergency**: position error past the hard limit, overwrite everything
//!   (rate limited by a wall-clock cooldown)
//! - **Convergence**: nudge each error term that is outside its dead zone
//!   by a small fixed fraction of the error
//!
//! The engine holds no history besides the cooldown timer. Each call
//! returns a [`CorrectionReport`] for the caller to keep or drop.

use std::f32::consts::TAU;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::protocol::{EntitySnapshot, ShipConfig};
use crate::settings::{PhysicsTuning, ReconcileTuning};
use crate::sim::{BodyState, LocalPredictor};
use crate::{angle_distance, normalize_angle, shortest_angle_delta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionTier {
    Bootstrap,
    Emergency,
    Convergence,
}

impl CorrectionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionTier::Bootstrap => "bootstrap",
            CorrectionTier::Emergency => "emergency",
            CorrectionTier::Convergence => "convergence",
        }
    }
}

/// Magnitudes of the four error terms between prediction and snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorTerms {
    pub position: f32,
    pub velocity: f32,
    /// Wrapped into [0, π]
    pub rotation: f32,
    pub angular_velocity: f32,
}

impl ErrorTerms {
    pub fn between(predicted: &BodyState, authoritative: &BodyState) -> Self {
        Self {
            position: predicted.position.distance(authoritative.position),
            velocity: predicted
                .linear_velocity
                .distance(authoritative.linear_velocity),
            rotation: angle_distance(predicted.rotation, authoritative.rotation),
            angular_velocity: (predicted.angular_velocity - authoritative.angular_velocity).abs(),
        }
    }
}

/// Dead zone per error term; errors at or below it are left alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub position: f32,
    pub velocity: f32,
    pub rotation: f32,
    pub angular_velocity: f32,
}

impl Thresholds {
    /// Scale each term by the ship's own dimensions
    pub fn for_ship(config: &ShipConfig, fraction: f32) -> Self {
        Self {
            position: config.size * fraction,
            velocity: config.max_speed * fraction,
            rotation: TAU * fraction,
            angular_velocity: config.turn_rate * fraction,
        }
    }
}

/// Deltas actually written into the prediction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AppliedCorrection {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub angular_velocity: f32,
}

impl AppliedCorrection {
    pub fn is_zero(&self) -> bool {
        self.position == Vec2::ZERO
            && self.velocity == Vec2::ZERO
            && self.rotation == 0.0
            && self.angular_velocity == 0.0
    }
}

/// Outcome of reconciling one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub tier: CorrectionTier,
    /// Errors measured before correcting
    pub errors: ErrorTerms,
    pub applied: AppliedCorrection,
    /// An emergency-sized error was held back by the cooldown
    pub cooldown_blocked: bool,
    pub at_ms: f64,
}

impl CorrectionReport {
    /// Nothing changed in the prediction
    pub fn is_noop(&self) -> bool {
        self.tier == CorrectionTier::Convergence && self.applied.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    tuning: ReconcileTuning,
    physics: PhysicsTuning,
    last_emergency_ms: Option<f64>,
}

impl ReconciliationEngine {
    pub fn new(tuning: ReconcileTuning, physics: PhysicsTuning) -> Self {
        Self {
            tuning,
            physics,
            last_emergency_ms: None,
        }
    }

    /// Reconcile the local entity's snapshot, creating the predictor on first sight
    pub fn reconcile(
        &mut self,
        predictor: &mut Option<LocalPredictor>,
        entity: &EntitySnapshot,
        now_ms: f64,
    ) -> CorrectionReport {
        let target = BodyState::from_snapshot(entity);

        let Some(local) = predictor.as_mut() else {
            let config = entity
                .ship_config
                .filter(ShipConfig::is_usable)
                .unwrap_or_default();
            log::info!(
                "bootstrapping local ship {} at ({:.1}, {:.1})",
                entity.entity_id,
                target.position.x,
                target.position.y
            );
            *predictor = Some(LocalPredictor::new(target, config, self.physics));
            return CorrectionReport {
                tier: CorrectionTier::Bootstrap,
                errors: ErrorTerms::default(),
                applied: AppliedCorrection::default(),
                cooldown_blocked: false,
                at_ms: now_ms,
            };
        };

        if let Some(config) = entity.ship_config {
            local.set_ship_config(config);
        }
        let config = *local.ship_config();
        self.correct(local.state_mut(), &config, &target, now_ms)
    }

    /// Apply the emergency or convergence tier to `predicted`
    pub fn correct(
        &mut self,
        predicted: &mut BodyState,
        config: &ShipConfig,
        target: &BodyState,
        now_ms: f64,
    ) -> CorrectionReport {
        let errors = ErrorTerms::between(predicted, target);

        let over_limit = errors.position > self.tuning.emergency_distance;
        let cooled_down = self
            .last_emergency_ms
            .is_none_or(|last| now_ms - last >= self.tuning.emergency_cooldown_ms);

        if over_limit && cooled_down {
            let applied = AppliedCorrection {
                position: target.position - predicted.position,
                velocity: target.linear_velocity - predicted.linear_velocity,
                rotation: shortest_angle_delta(predicted.rotation, target.rotation),
                angular_velocity: target.angular_velocity - predicted.angular_velocity,
            };
            *predicted = *target;
            self.last_emergency_ms = Some(now_ms);
            log::debug!(
                "emergency correction: {:.1} units off, snapped to ({:.1}, {:.1})",
                errors.position,
                target.position.x,
                target.position.y
            );
            return CorrectionReport {
                tier: CorrectionTier::Emergency,
                errors,
                applied,
                cooldown_blocked: false,
                at_ms: now_ms,
            };
        }

        if over_limit {
            log::debug!(
                "emergency held by cooldown ({:.1} units off), converging instead",
                errors.position
            );
        }

        let applied = self.converge(predicted, config, target, &errors);
        CorrectionReport {
            tier: CorrectionTier::Convergence,
            errors,
            applied,
            cooldown_blocked: over_limit,
            at_ms: now_ms,
        }
    }

    fn converge(
        &self,
        predicted: &mut BodyState,
        config: &ShipConfig,
        target: &BodyState,
        errors: &ErrorTerms,
    ) -> AppliedCorrection {
        let limits = Thresholds::for_ship(config, self.tuning.dead_zone_fraction);
        let gain = self.tuning.convergence_gain;
        let mut applied = AppliedCorrection::default();

        if errors.position > limits.position {
            applied.position = (target.position - predicted.position) * gain;
            predicted.position += applied.position;
        }
        if errors.velocity > limits.velocity {
            applied.velocity = (target.linear_velocity - predicted.linear_velocity) * gain;
            predicted.linear_velocity += applied.velocity;
        }
        if errors.rotation > limits.rotation {
            applied.rotation = shortest_angle_delta(predicted.rotation, target.rotation) * gain;
            predicted.rotation = normalize_angle(predicted.rotation + applied.rotation);
        }
        if errors.angular_velocity > limits.angular_velocity {
            applied.angular_velocity =
                (target.angular_velocity - predicted.angular_velocity) * gain;
            predicted.angular_velocity += applied.angular_velocity;
        }

        applied
    }

    /// Forget the cooldown timer (new session)
    pub fn reset(&mut self) {
        self.last_emergency_ms = None;
    }

    pub fn last_emergency_ms(&self) -> Option<f64> {
        self.last_emergency_ms
    }

    pub fn tuning(&self) -> &ReconcileTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ControlState, InputCommand};
    use crate::protocol::{EntityKind, Transform, Velocity};

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(ReconcileTuning::default(), PhysicsTuning::default())
    }

    fn snapshot(position: Vec2, rotation: f32) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: 1,
            kind: EntityKind::Enemy,
            transform: Transform { position, rotation },
            velocity: Velocity::default(),
            ship_config: None,
        }
    }

    #[test]
    fn test_small_error_converges_one_percent() {
        let mut e = engine();
        let mut predicted = BodyState::at(Vec2::new(100.0, 0.0), 0.0);
        let target = BodyState::at(Vec2::new(95.0, 0.0), 0.0);
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 0.0);

        assert_eq!(report.tier, CorrectionTier::Convergence);
        assert!((report.errors.position - 5.0).abs() < 1e-5);
        assert!((predicted.position.x - 99.95).abs() < 1e-4);
        assert_eq!(predicted.position.y, 0.0);
        assert_eq!(report.applied.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_predicted_thrust_converges_toward_snapshot() {
        let mut e = engine();
        let mut predictor = None;
        // 3 steps at 1/15 s from rest with 3917.5 units/s² land at x ≈ 100
        let config = ShipConfig {
            thrust_power: 7835.0,
            mass: 2.0,
            ..Default::default()
        };
        let mut snap = snapshot(Vec2::ZERO, 0.0);
        snap.ship_config = Some(config);
        e.reconcile(&mut predictor, &snap, 0.0);

        let local = predictor.as_mut().unwrap();
        local.apply_input(&InputCommand::new(
            1,
            0.0,
            ControlState {
                thrust: 1.0,
                ..Default::default()
            },
        ));
        for _ in 0..3 {
            local.step_once();
        }
        let before = *local.state();
        assert!((before.position.x - 100.0).abs() < 0.05);
        assert_eq!(before.position.y, 0.0);

        let mut snap = snapshot(Vec2::new(95.0, 0.0), 0.0);
        snap.velocity.linear = before.linear_velocity;
        snap.ship_config = Some(config);
        let report = e.reconcile(&mut predictor, &snap, 200.0);

        assert_eq!(report.tier, CorrectionTier::Convergence);
        let after = predictor.unwrap().state().position;
        assert!((after.x - 99.95).abs() < 0.05);
        assert!((after.x - (before.position.x + (95.0 - before.position.x) * 0.01)).abs() < 1e-4);
        assert_eq!(report.applied.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_large_error_hard_overwrites() {
        let mut e = engine();
        let mut predicted = BodyState {
            position: Vec2::new(0.0, 0.0),
            rotation: 1.0,
            linear_velocity: Vec2::new(10.0, 0.0),
            angular_velocity: 0.5,
        };
        let target = BodyState {
            position: Vec2::new(80.0, 0.0),
            rotation: -2.0,
            linear_velocity: Vec2::new(-3.0, 4.0),
            angular_velocity: -1.0,
        };
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 1000.0);
        assert_eq!(report.tier, CorrectionTier::Emergency);
        assert_eq!(predicted, target);
        assert_eq!(e.last_emergency_ms(), Some(1000.0));
    }

    #[test]
    fn test_exactly_at_limit_is_not_emergency() {
        let mut e = engine();
        let mut predicted = BodyState::at(Vec2::ZERO, 0.0);
        let target = BodyState::at(Vec2::new(50.0, 0.0), 0.0);
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 0.0);
        assert_eq!(report.tier, CorrectionTier::Convergence);
        assert!((predicted.position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_emergency_cooldown() {
        let mut e = engine();
        let cfg = ShipConfig::default();
        let far = BodyState::at(Vec2::new(100.0, 0.0), 0.0);

        let mut predicted = BodyState::default();
        assert_eq!(
            e.correct(&mut predicted, &cfg, &far, 0.0).tier,
            CorrectionTier::Emergency
        );

        let mut predicted = BodyState::default();
        let report = e.correct(&mut predicted, &cfg, &far, 60.0);
        assert_eq!(report.tier, CorrectionTier::Convergence);
        assert!(report.cooldown_blocked);
        assert!((predicted.position.x - 1.0).abs() < 1e-5);

        let mut predicted = BodyState::default();
        assert_eq!(
            e.correct(&mut predicted, &cfg, &far, 100.0).tier,
            CorrectionTier::Emergency
        );
        assert_eq!(predicted, far);
    }

    #[test]
    fn test_rotation_error_wraps() {
        let mut e = engine();
        let mut predicted = BodyState::at(Vec2::ZERO, 3.0);
        let target = BodyState::at(Vec2::ZERO, -3.0);
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 0.0);

        assert!((report.errors.rotation - 0.2832).abs() < 1e-3);
        // 0.283 is under the 0.314 dead zone
        assert_eq!(report.applied.rotation, 0.0);
        assert_eq!(predicted.rotation, 3.0);
    }

    #[test]
    fn test_rotation_correction_takes_short_way() {
        let mut e = engine();
        let mut predicted = BodyState::at(Vec2::ZERO, 2.9);
        let target = BodyState::at(Vec2::ZERO, -2.9);
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 0.0);

        // Error is 2π - 5.8 ≈ 0.483, pushed forward across +π
        assert!(report.applied.rotation > 0.0);
        assert!((report.applied.rotation - 0.00483).abs() < 1e-4);
        assert!(predicted.rotation > 2.9);
    }

    #[test]
    fn test_terms_corrected_independently() {
        let mut e = engine();
        let mut predicted = BodyState {
            position: Vec2::new(0.1, 0.0),
            linear_velocity: Vec2::new(0.0, 0.0),
            angular_velocity: 1.0,
            ..Default::default()
        };
        let target = BodyState {
            linear_velocity: Vec2::new(20.0, 0.0),
            ..Default::default()
        };
        let report = e.correct(&mut predicted, &ShipConfig::default(), &target, 0.0);

        // Position 0.1 < 0.4, velocity 20 > 10, angular 1.0 > 0.15
        assert_eq!(report.applied.position, Vec2::ZERO);
        assert_eq!(predicted.position.x, 0.1);
        assert!((predicted.linear_velocity.x - 0.2).abs() < 1e-6);
        assert!((predicted.angular_velocity - 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_equilibrium_is_noop() {
        let mut e = engine();
        let target = BodyState {
            position: Vec2::new(10.0, 10.0),
            rotation: 1.0,
            linear_velocity: Vec2::new(5.0, 0.0),
            angular_velocity: 0.1,
        };
        let mut predicted = target;
        predicted.position.x += 0.3;
        let before = predicted;
        for i in 0..10 {
            let report = e.correct(&mut predicted, &ShipConfig::default(), &target, i as f64);
            assert!(report.is_noop());
        }
        assert_eq!(predicted, before);
    }

    #[test]
    fn test_bootstrap_then_reconcile() {
        let mut e = engine();
        let mut predictor = None;
        let mut snap = snapshot(Vec2::new(40.0, -20.0), 0.5);
        snap.ship_config = Some(ShipConfig {
            size: 20.0,
            ..Default::default()
        });

        let report = e.reconcile(&mut predictor, &snap, 0.0);
        assert_eq!(report.tier, CorrectionTier::Bootstrap);
        let local = predictor.as_ref().unwrap();
        assert_eq!(local.state().position, Vec2::new(40.0, -20.0));
        assert_eq!(local.ship_config().size, 20.0);

        // Config missing from the next snapshot: cached one survives
        let snap = snapshot(Vec2::new(40.5, -20.0), 0.5);
        let report = e.reconcile(&mut predictor, &snap, 66.0);
        assert!(report.is_noop(), "0.5 is inside the 1.0 dead zone of a size-20 ship");
        assert_eq!(predictor.unwrap().ship_config().size, 20.0);
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut e = engine();
        let far = BodyState::at(Vec2::new(100.0, 0.0), 0.0);
        e.correct(&mut BodyState::default(), &ShipConfig::default(), &far, 0.0);
        e.reset();
        let report = e.correct(&mut BodyState::default(), &ShipConfig::default(), &far, 10.0);
        assert_eq!(report.tier, CorrectionTier::Emergency);
    }
}
