//! Local ship prediction
//!
//! Runs the local player's ship ahead of the server on a fixed-timestep
//! accumulator. Wall-clock deltas go in, whole integrator steps come out,
//! and any remainder waits for the next frame.

use super::state::{BodyState, Forces};
use super::tick::integrate;
use crate::input::InputCommand;
use crate::protocol::ShipConfig;
use crate::settings::PhysicsTuning;

/// Predicted kinematic state of the local ship
pub type PredictedState = BodyState;

#[derive(Debug, Clone)]
pub struct LocalPredictor {
    state: PredictedState,
    config: ShipConfig,
    tuning: PhysicsTuning,
    /// Held until the next input replaces it
    forces: Forces,
    accumulator: f32,
    /// Integrator steps run since creation
    steps: u64,
}

impl LocalPredictor {
    pub fn new(state: PredictedState, config: ShipConfig, tuning: PhysicsTuning) -> Self {
        Self {
            state,
            config,
            tuning,
            forces: Forces::ZERO,
            accumulator: 0.0,
            steps: 0,
        }
    }

    /// Replace the held forces with those of `input`
    ///
    /// Thrust points along the heading at the moment the input is applied.
    pub fn apply_input(&mut self, input: &InputCommand) {
        self.forces = Forces::from_controls(
            input.thrust,
            input.turn,
            self.state.rotation,
            &self.config,
            &self.tuning,
        );
    }

    /// Feed `dt` seconds of wall clock; returns the number of steps run
    ///
    /// Deltas past `max_frame_dt` are cut down, so a stalled host resumes
    /// from where it stopped instead of replaying the gap.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if dt.is_finite() && dt > 0.0 {
            if dt > self.tuning.max_frame_dt {
                log::debug!(
                    "frame delta {:.0}ms cut to {:.0}ms",
                    dt * 1000.0,
                    self.tuning.max_frame_dt * 1000.0
                );
            }
            self.accumulator += dt.min(self.tuning.max_frame_dt);
        }

        let step = self.tuning.timestep();
        let mut substeps = 0;
        while self.accumulator >= step && substeps < self.tuning.max_substeps {
            self.step_once();
            self.accumulator -= step;
            substeps += 1;
        }

        if substeps == self.tuning.max_substeps && self.accumulator >= step {
            log::debug!(
                "predictor behind by {:.1}ms after {} substeps",
                self.accumulator * 1000.0,
                substeps
            );
        }

        substeps
    }

    /// Run exactly one integrator step, ignoring the accumulator
    pub fn step_once(&mut self) {
        self.state = integrate(
            &self.state,
            &self.config,
            &self.forces,
            &self.tuning,
            self.tuning.timestep(),
        );
        self.steps += 1;
    }

    pub fn state(&self) -> &PredictedState {
        &self.state
    }

    /// Mutable access for reconciliation
    pub fn state_mut(&mut self) -> &mut PredictedState {
        &mut self.state
    }

    pub fn ship_config(&self) -> &ShipConfig {
        &self.config
    }

    /// Adopt a new authoritative config; unusable configs are ignored
    pub fn set_ship_config(&mut self, config: ShipConfig) {
        if !config.is_usable() {
            log::warn!("ignoring unusable ship config {config:?}");
            return;
        }
        if config != self.config {
            log::debug!("ship config updated: {config:?}");
            self.config = config;
        }
    }

    pub fn forces(&self) -> &Forces {
        &self.forces
    }

    /// Unspent wall clock waiting in the accumulator (seconds)
    pub fn pending_time(&self) -> f32 {
        self.accumulator
    }

    pub fn total_steps(&self) -> u64 {
        self.steps
    }
}
