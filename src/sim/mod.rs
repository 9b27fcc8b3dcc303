//! Deterministic ship simulation
//!
//! The stepping rule and the local predictor built on it. This module must
//! stay pure:
//! - Fixed timestep only
//! - Time is passed in, never read
//! - No rendering, network or platform dependencies

pub mod predictor;
pub mod state;
pub mod tick;

pub use predictor::{LocalPredictor, PredictedState};
pub use state::{BodyState, Forces};
pub use tick::{clamp_to_arena, integrate};
