//! Client session
//!
//! Owns the sampler, predictor, reconciliation engine and remote
//! interpolator for one connection, and speaks the wire protocol on their
//! behalf. Everything runs on the caller's thread: the host feeds it
//! frames, control state and time, and reads back outbound frames and a
//! render view.

use crate::diagnostics::DriftHistory;
use crate::input::{ControlState, InputSampler};
use crate::interpolation::{RemoteInterpolator, RenderedEntity};
use crate::latency::RttEstimator;
use crate::protocol::debug::DebugBodyType;
use crate::protocol::{
    ClientMessage, DebugRenderData, GameSnapshot, ServerMessage, decode_debug_render,
    decode_snapshot,
};
use crate::reconcile::{CorrectionReport, ReconciliationEngine};
use crate::settings::Settings;
use crate::sim::{LocalPredictor, PredictedState};

/// What a handled server message changed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined {
        room_code: String,
        player_id: String,
        entity_id: u64,
    },
    Snapshot {
        sequence: u32,
        /// Present when the snapshot listed the local ship
        correction: Option<CorrectionReport>,
        remotes_updated: usize,
    },
    RoundTrip {
        rtt_ms: f64,
    },
    DebugDump {
        sequence: u32,
    },
    RoomCreated {
        room_code: String,
    },
    PeerJoined {
        player_id: String,
        player_name: String,
    },
    PeerLeft {
        player_id: String,
    },
    ServerError {
        message: String,
    },
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    /// `None` until the local ship has been bootstrapped
    pub local: Option<PredictedState>,
    pub remotes: Vec<RenderedEntity>,
}

pub struct ClientSession {
    settings: Settings,
    connected: bool,
    local_entity: Option<u64>,
    sampler: InputSampler,
    predictor: Option<LocalPredictor>,
    engine: ReconciliationEngine,
    interpolator: RemoteInterpolator,
    history: DriftHistory,
    rtt: RttEstimator,
    last_snapshot_sequence: Option<u32>,
    debug_render: Option<DebugRenderData>,
    dropped_messages: u64,
}

impl ClientSession {
    /// Create a disconnected session
    pub fn new(settings: Settings) -> Self {
        let mut sampler = InputSampler::new(settings.input);
        sampler.stop();
        Self {
            connected: false,
            local_entity: None,
            sampler,
            predictor: None,
            engine: ReconciliationEngine::new(settings.reconcile, settings.physics),
            interpolator: RemoteInterpolator::new(settings.interpolation),
            history: DriftHistory::new(settings.reconcile.history_len),
            rtt: RttEstimator::new(),
            last_snapshot_sequence: None,
            debug_render: None,
            dropped_messages: 0,
            settings,
        }
    }

    /// The transport is up; start sampling for a fresh session
    ///
    /// Anything left over from a previous connection is dropped first, so
    /// the next local snapshot bootstraps and remote sequences start over.
    pub fn connect(&mut self) {
        if self.connected {
            log::info!("reconnecting, discarding previous session state");
        }
        self.clear_session_state();
        log::info!("session connected ({} link profile)", self.settings.profile.as_str());
        self.connected = true;
        self.sampler.reset();
        self.history.clear();
        self.rtt.reset();
        self.last_snapshot_sequence = None;
    }

    /// The transport is gone; drop per-connection state and halt sampling
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        log::info!(
            "session disconnected after {} snapshots ({} dropped messages)",
            self.last_snapshot_sequence.unwrap_or(0),
            self.dropped_messages
        );
        self.connected = false;
        self.sampler.stop();
        self.clear_session_state();
    }

    fn clear_session_state(&mut self) {
        self.interpolator.clear();
        self.engine.reset();
        self.predictor = None;
        self.local_entity = None;
        self.debug_render = None;
    }

    pub fn join(&self, room_code: &str, player_name: &str) -> ClientMessage {
        ClientMessage::Join {
            room_code: room_code.to_string(),
            player_name: player_name.to_string(),
        }
    }

    /// Decode and handle one text frame; bad frames are logged and dropped
    pub fn handle_frame(&mut self, frame: &str, now_ms: f64) -> Option<SessionEvent> {
        match ServerMessage::decode(frame) {
            Ok(message) => self.handle_message(message, now_ms),
            Err(err) => {
                self.drop_message(format_args!("undecodable frame: {err}"));
                None
            }
        }
    }

    pub fn handle_message(&mut self, message: ServerMessage, now_ms: f64) -> Option<SessionEvent> {
        if !self.connected {
            log::debug!("ignoring server message while disconnected");
            return None;
        }

        match message {
            ServerMessage::RoomJoined {
                room_code,
                player_id,
                entity_id,
            } => {
                log::info!("joined room {room_code} as {player_id}, ship {entity_id}");
                self.local_entity = Some(entity_id);
                self.interpolator.remove(entity_id);
                Some(SessionEvent::Joined {
                    room_code,
                    player_id,
                    entity_id,
                })
            }
            ServerMessage::Snapshot { sequence, data, .. } => match decode_snapshot(&data) {
                Ok(snapshot) => Some(self.apply_snapshot(&snapshot, now_ms)),
                Err(err) => {
                    self.drop_message(format_args!("snapshot {sequence}: {err}"));
                    None
                }
            },
            ServerMessage::Pong { timestamp } => self
                .rtt
                .on_pong(timestamp as f64, now_ms)
                .map(|rtt_ms| SessionEvent::RoundTrip { rtt_ms }),
            ServerMessage::DebugRender { sequence, data, .. } => match decode_debug_render(&data) {
                Ok(dump) => {
                    self.check_debug_damping(&dump);
                    self.debug_render = Some(dump);
                    Some(SessionEvent::DebugDump { sequence })
                }
                Err(err) => {
                    self.drop_message(format_args!("debug dump {sequence}: {err}"));
                    None
                }
            },
            ServerMessage::RoomCreated { room_code } => {
                Some(SessionEvent::RoomCreated { room_code })
            }
            ServerMessage::PlayerJoined {
                player_id,
                player_name,
            } => {
                log::info!("{player_name} joined");
                Some(SessionEvent::PeerJoined {
                    player_id,
                    player_name,
                })
            }
            ServerMessage::PlayerLeft { player_id } => {
                log::info!("{player_id} left");
                Some(SessionEvent::PeerLeft { player_id })
            }
            ServerMessage::Error { message } => {
                log::warn!("server error: {message}");
                Some(SessionEvent::ServerError { message })
            }
        }
    }

    /// Reconcile the local ship, then feed everything else to the interpolator
    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot, now_ms: f64) -> SessionEvent {
        match self.last_snapshot_sequence {
            Some(last) if snapshot.sequence <= last => {
                log::debug!(
                    "snapshot {} arrived after {}, applying in arrival order",
                    snapshot.sequence,
                    last
                );
            }
            _ => self.last_snapshot_sequence = Some(snapshot.sequence),
        }

        let mut correction = None;
        if let Some(local) = self.local_entity.and_then(|id| snapshot.entity(id)) {
            match local.check_finite(snapshot.sequence) {
                Ok(()) => {
                    let report = self.engine.reconcile(&mut self.predictor, local, now_ms);
                    self.history.record(report);
                    correction = Some(report);
                }
                Err(err) => self.drop_message(format_args!("{err}")),
            }
        }

        let remotes_updated = self.interpolator.ingest(snapshot, self.local_entity, now_ms);

        SessionEvent::Snapshot {
            sequence: snapshot.sequence,
            correction,
            remotes_updated,
        }
    }

    /// Sample controls at the input rate
    ///
    /// The command always drives the prediction; the returned frame, if
    /// any, is what should go on the wire.
    pub fn sample_input(&mut self, controls: ControlState, now_ms: f64) -> Option<ClientMessage> {
        let sample = self.sampler.sample(controls, now_ms)?;
        if let Some(predictor) = self.predictor.as_mut() {
            predictor.apply_input(&sample.command);
        }

        let reason = sample.transmit?;
        match ClientMessage::input(&sample.command.to_wire()) {
            Ok(message) => {
                log::trace!("sending input {} ({reason:?})", sample.command.sequence);
                Some(message)
            }
            Err(err) => {
                log::warn!("failed to encode input {}: {err}", sample.command.sequence);
                None
            }
        }
    }

    /// Step the local prediction by `dt_s` seconds of wall clock
    pub fn update(&mut self, dt_s: f32) -> u32 {
        self.predictor
            .as_mut()
            .map_or(0, |predictor| predictor.advance(dt_s))
    }

    pub fn frame(&self, now_ms: f64) -> FrameView {
        FrameView {
            local: self.predicted().copied(),
            remotes: self.interpolator.frame(now_ms),
        }
    }

    pub fn ping(&self, now_ms: f64) -> Option<ClientMessage> {
        self.connected.then(|| ClientMessage::Ping {
            timestamp: now_ms.max(0.0) as u64,
        })
    }

    pub fn request_debug_render(&self, now_ms: f64) -> Option<ClientMessage> {
        self.connected.then(|| ClientMessage::RequestDebugRender {
            timestamp: now_ms.max(0.0) as u64,
        })
    }

    fn drop_message(&mut self, reason: std::fmt::Arguments<'_>) {
        self.dropped_messages += 1;
        log::warn!("dropped server message: {reason}");
    }

    /// A dump reporting different damping than ours means prediction will drift
    fn check_debug_damping(&self, dump: &DebugRenderData) {
        let physics = &self.settings.physics;
        let mismatched = dump
            .rigid_bodies
            .iter()
            .filter(|b| b.body_type == DebugBodyType::Dynamic)
            .filter(|b| {
                b.linear_damping != physics.linear_damping
                    || b.angular_damping != physics.angular_damping
            })
            .count();
        if mismatched > 0 {
            log::warn!(
                "{mismatched} server bodies use damping other than ({}, {})",
                physics.linear_damping,
                physics.angular_damping
            );
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn local_entity(&self) -> Option<u64> {
        self.local_entity
    }

    pub fn predicted(&self) -> Option<&PredictedState> {
        self.predictor.as_ref().map(LocalPredictor::state)
    }

    pub fn predictor(&self) -> Option<&LocalPredictor> {
        self.predictor.as_ref()
    }

    pub fn sampler(&self) -> &InputSampler {
        &self.sampler
    }

    pub fn interpolator(&self) -> &RemoteInterpolator {
        &self.interpolator
    }

    pub fn history(&self) -> &DriftHistory {
        &self.history
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    pub fn debug_render(&self) -> Option<&DebugRenderData> {
        self.debug_render.as_ref()
    }

    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    pub fn last_snapshot_sequence(&self) -> Option<u32> {
        self.last_snapshot_sequence
    }
}
