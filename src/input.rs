//! Input sampling, sequencing and transmit decisions
//!
//! The sampler is called at the simulation rate. Every call produces a
//! sequenced command that is buffered locally and handed to the predictor;
//! only some of them are worth putting on the wire.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::protocol::InputData;
use crate::settings::InputTuning;

/// Raw control state read from the host each sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlState {
    /// Forward (+) / reverse (-), [-1, 1]
    pub thrust: f32,
    /// [-1, 1]
    pub turn: f32,
    pub primary_fire: bool,
    pub secondary_fire: bool,
}

impl ControlState {
    /// Any axis deflected or button held
    pub fn is_active(&self) -> bool {
        self.thrust != 0.0 || self.turn != 0.0 || self.primary_fire || self.secondary_fire
    }

    fn sanitized(self) -> Self {
        Self {
            thrust: clamp_axis(self.thrust),
            turn: clamp_axis(self.turn),
            ..self
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// One sampled, sequenced input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    pub sequence: u32,
    /// Client clock at sampling time (ms)
    pub client_timestamp: f64,
    pub thrust: f32,
    pub turn: f32,
    pub primary_fire: bool,
    pub secondary_fire: bool,
}

impl InputCommand {
    /// Build a command; axes are clamped into [-1, 1] and NaN becomes 0
    pub fn new(sequence: u32, client_timestamp: f64, controls: ControlState) -> Self {
        let c = controls.sanitized();
        Self {
            sequence,
            client_timestamp,
            thrust: c.thrust,
            turn: c.turn,
            primary_fire: c.primary_fire,
            secondary_fire: c.secondary_fire,
        }
    }

    pub fn controls(&self) -> ControlState {
        ControlState {
            thrust: self.thrust,
            turn: self.turn,
            primary_fire: self.primary_fire,
            secondary_fire: self.secondary_fire,
        }
    }

    /// True when both commands carry the same controls, whatever their sequence
    pub fn same_controls(&self, other: &InputCommand) -> bool {
        self.controls() == other.controls()
    }

    /// Record sent inside an `Input` frame
    pub fn to_wire(&self) -> InputData {
        InputData {
            sequence: self.sequence,
            timestamp: self.client_timestamp.max(0.0).round() as u64,
            thrust: self.thrust,
            turn: self.turn,
            primary_fire: self.primary_fire,
            secondary_fire: self.secondary_fire,
        }
    }
}

/// Why a command goes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitReason {
    /// First command of the session
    First,
    /// Controls differ from the last transmitted command
    Changed,
    /// Controls held past the heartbeat interval
    Heartbeat,
}

/// Output of one sampling call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub command: InputCommand,
    /// `None` means keep it local
    pub transmit: Option<TransmitReason>,
}

/// Fixed-rate input sampler with a time-windowed local history
#[derive(Debug, Clone)]
pub struct InputSampler {
    tuning: InputTuning,
    next_sequence: u32,
    buffer: VecDeque<InputCommand>,
    last_sent: Option<InputCommand>,
    last_sent_at: f64,
    running: bool,
}

impl InputSampler {
    pub fn new(tuning: InputTuning) -> Self {
        Self {
            tuning,
            next_sequence: 1,
            buffer: VecDeque::new(),
            last_sent: None,
            last_sent_at: 0.0,
            running: true,
        }
    }

    /// Sample the controls at `now_ms`
    ///
    /// Returns `None` only once the sampler has been stopped.
    pub fn sample(&mut self, controls: ControlState, now_ms: f64) -> Option<Sample> {
        if !self.running {
            return None;
        }

        let command = InputCommand::new(self.next_sequence, now_ms, controls);
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.buffer.push_back(command);
        let horizon = now_ms - self.tuning.window_ms;
        while self
            .buffer
            .front()
            .is_some_and(|c| c.client_timestamp < horizon)
        {
            self.buffer.pop_front();
        }

        let transmit = match &self.last_sent {
            None => Some(TransmitReason::First),
            Some(last) if !last.same_controls(&command) => Some(TransmitReason::Changed),
            Some(_)
                if command.controls().is_active()
                    && now_ms - self.last_sent_at >= self.tuning.heartbeat_ms =>
            {
                Some(TransmitReason::Heartbeat)
            }
            Some(_) => None,
        };

        if transmit.is_some() {
            self.last_sent = Some(command);
            self.last_sent_at = now_ms;
        }

        Some(Sample { command, transmit })
    }

    /// Commands still inside the history window, oldest first
    pub fn buffered(&self) -> impl Iterator<Item = &InputCommand> {
        self.buffer.iter()
    }

    pub fn latest(&self) -> Option<&InputCommand> {
        self.buffer.back()
    }

    /// Buffered commands with a sequence after `sequence`
    pub fn since(&self, sequence: u32) -> impl Iterator<Item = &InputCommand> {
        self.buffer.iter().filter(move |c| c.sequence > sequence)
    }

    /// Halt sampling; later `sample` calls return `None`
    pub fn stop(&mut self) {
        if self.running {
            log::debug!("input sampler stopped at sequence {}", self.next_sequence);
        }
        self.running = false;
        self.buffer.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start a fresh session: sequences restart and the next command is sent
    pub fn reset(&mut self) {
        self.next_sequence = 1;
        self.buffer.clear();
        self.last_sent = None;
        self.last_sent_at = 0.0;
        self.running = true;
    }

    pub fn tuning(&self) -> &InputTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> InputSampler {
        InputSampler::new(InputTuning::default())
    }

    fn thrust(v: f32) -> ControlState {
        ControlState {
            thrust: v,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_sample_always_transmits() {
        let mut s = sampler();
        let out = s.sample(ControlState::default(), 0.0).unwrap();
        assert_eq!(out.command.sequence, 1);
        assert_eq!(out.transmit, Some(TransmitReason::First));
    }

    #[test]
    fn test_idle_unchanged_stays_local() {
        let mut s = sampler();
        s.sample(ControlState::default(), 0.0);
        for i in 1..40 {
            let out = s.sample(ControlState::default(), i as f64 * 66.7).unwrap();
            assert_eq!(out.transmit, None);
        }
        assert_eq!(s.latest().unwrap().sequence, 40);
    }

    #[test]
    fn test_change_transmits_immediately() {
        let mut s = sampler();
        s.sample(ControlState::default(), 0.0);
        let out = s.sample(thrust(1.0), 10.0).unwrap();
        assert_eq!(out.transmit, Some(TransmitReason::Changed));

        let out = s.sample(thrust(1.0), 20.0).unwrap();
        assert_eq!(out.transmit, None);

        let out = s.sample(ControlState::default(), 30.0).unwrap();
        assert_eq!(out.transmit, Some(TransmitReason::Changed));
    }

    #[test]
    fn test_held_input_heartbeats() {
        let mut s = sampler();
        s.sample(thrust(1.0), 0.0);
        let step = 1000.0 / 15.0;
        let mut sent = Vec::new();
        for i in 1..=15 {
            let now = i as f64 * step;
            if s.sample(thrust(1.0), now).unwrap().transmit.is_some() {
                sent.push(now);
            }
        }
        // 1 s of held thrust at a 250 ms heartbeat
        assert_eq!(sent.len(), 3);
        let mut last = 0.0;
        for t in sent {
            assert!(t - last >= 250.0);
            assert!(t - last < 250.0 + step);
            last = t;
        }
    }

    #[test]
    fn test_sequences_strictly_increase() {
        let mut s = sampler();
        let mut prev = 0;
        for i in 0..50 {
            let seq = s.sample(thrust((i % 3) as f32 - 1.0), i as f64).unwrap().command.sequence;
            assert!(seq > prev);
            prev = seq;
        }
    }

    #[test]
    fn test_buffer_drops_old_commands() {
        let mut s = sampler();
        for i in 0..100 {
            s.sample(ControlState::default(), i as f64 * 50.0);
        }
        let now = 99.0 * 50.0;
        assert!(s.buffered().all(|c| now - c.client_timestamp <= 2000.0));
        assert_eq!(s.buffered().count(), 41);
        assert_eq!(s.since(97).count(), 3);
    }

    #[test]
    fn test_axes_are_clamped() {
        let cmd = InputCommand::new(
            1,
            0.0,
            ControlState {
                thrust: 4.0,
                turn: f32::NAN,
                ..Default::default()
            },
        );
        assert_eq!(cmd.thrust, 1.0);
        assert_eq!(cmd.turn, 0.0);
    }

    #[test]
    fn test_stop_and_reset() {
        let mut s = sampler();
        s.sample(thrust(1.0), 0.0);
        s.stop();
        assert!(!s.is_running());
        assert!(s.sample(thrust(1.0), 10.0).is_none());
        assert!(s.latest().is_none());

        s.reset();
        let out = s.sample(thrust(1.0), 20.0).unwrap();
        assert_eq!(out.command.sequence, 1);
        assert_eq!(out.transmit, Some(TransmitReason::First));
    }

    #[test]
    fn test_wire_record() {
        let cmd = InputCommand::new(
            9,
            1234.6,
            ControlState {
                turn: -0.5,
                primary_fire: true,
                ..Default::default()
            },
        );
        let wire = cmd.to_wire();
        assert_eq!(wire.sequence, 9);
        assert_eq!(wire.timestamp, 1235);
        assert_eq!(wire.turn, -0.5);
        assert!(wire.primary_fire);
    }
}
