//! ship-sync entry point
//!
//! Native: headless demo. A stand-in server steps ships with the shared
//! integrator, a seeded lossy link carries the frames both ways, and a
//! `ClientSession` predicts, reconciles and interpolates on the other end.
//! Web: installs the console logger and panic hook for the host page.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    ship_sync::platform::init_logging(log::LevelFilter::Info);
    log::info!("ship-sync ready");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    ship_sync::platform::init_logging(log::LevelFilter::Info);

    let settings_path = std::env::args().nth(1);
    if let Err(err) = demo::run(settings_path.as_deref()) {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::collections::BTreeMap;

    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use ship_sync::input::ControlState;
    use ship_sync::platform;
    use ship_sync::protocol::debug::{DebugBodyType, DebugCollider, DebugRigidBody, DebugShape};
    use ship_sync::protocol::{
        ClientMessage, DebugRenderData, EntityKind, EntitySnapshot, GameSnapshot, PlayerInfo,
        ServerMessage, ShipConfig,
    };
    use ship_sync::session::SessionEvent;
    use ship_sync::settings::PhysicsTuning;
    use ship_sync::sim::{BodyState, Forces, clamp_to_arena, integrate};
    use ship_sync::{ClientSession, ProtocolError, Settings, SettingsError};

    const RUN_MS: f64 = 20_000.0;
    const FRAME_MS: f64 = 1000.0 / 60.0;
    const LOCAL_SHIP: u64 = 1;
    /// Server-side shove applied to the local ship, far enough to force a snap
    const KNOCKBACK_AT_MS: f64 = 6_000.0;
    const KNOCKBACK: Vec2 = Vec2::new(90.0, 40.0);

    #[derive(Debug, thiserror::Error)]
    pub enum DemoError {
        #[error(transparent)]
        Settings(#[from] SettingsError),
        #[error(transparent)]
        Protocol(#[from] ProtocolError),
    }

    /// One-way link with latency, jitter and loss
    struct LossyLink {
        rng: Pcg32,
        latency_ms: f64,
        jitter_ms: f64,
        loss: f64,
        in_flight: Vec<(f64, String)>,
        sent: u64,
        lost: u64,
    }

    impl LossyLink {
        fn new(seed: u64, latency_ms: f64, jitter_ms: f64, loss: f64) -> Self {
            Self {
                rng: Pcg32::seed_from_u64(seed),
                latency_ms,
                jitter_ms,
                loss,
                in_flight: Vec::new(),
                sent: 0,
                lost: 0,
            }
        }

        fn send(&mut self, frame: String, now_ms: f64) {
            self.sent += 1;
            if self.rng.random::<f64>() < self.loss {
                self.lost += 1;
                return;
            }
            let jitter = self.rng.random_range(-self.jitter_ms..=self.jitter_ms);
            let deliver_at = now_ms + (self.latency_ms + jitter).max(0.0);
            self.in_flight.push((deliver_at, frame));
        }

        /// Frames due by `now_ms`, in delivery order
        fn deliver(&mut self, now_ms: f64) -> Vec<String> {
            let (mut due, pending): (Vec<_>, Vec<_>) = self
                .in_flight
                .drain(..)
                .partition(|(at, _)| *at <= now_ms);
            self.in_flight = pending;
            due.sort_by(|a, b| a.0.total_cmp(&b.0));
            due.into_iter().map(|(_, frame)| frame).collect()
        }
    }

    struct ServerShip {
        body: BodyState,
        config: ShipConfig,
        controls: ControlState,
        kind: EntityKind,
    }

    /// Minimal authoritative side: same integrator, same tuning
    struct StandInServer {
        physics: PhysicsTuning,
        ships: BTreeMap<u64, ServerShip>,
        tick: u64,
    }

    impl StandInServer {
        fn new(physics: PhysicsTuning) -> Self {
            let config = ShipConfig {
                mass: 4.0,
                ..Default::default()
            };
            let player = |id: &str, name: &str| {
                EntityKind::Player(PlayerInfo {
                    id: id.to_string(),
                    name: name.to_string(),
                    score: 0,
                    kills: 0,
                    deaths: 0,
                    credits: 0,
                })
            };

            let mut ships = BTreeMap::new();
            for (id, position, kind) in [
                (LOCAL_SHIP, Vec2::new(-200.0, 0.0), player("p1", "demo")),
                (2, Vec2::new(200.0, 100.0), player("p2", "orbit")),
                (3, Vec2::new(0.0, -250.0), EntityKind::Enemy),
            ] {
                ships.insert(
                    id,
                    ServerShip {
                        body: BodyState::at(position, 0.0),
                        config,
                        controls: ControlState::default(),
                        kind,
                    },
                );
            }

            Self {
                physics,
                ships,
                tick: 0,
            }
        }

        /// Handle one client frame and return the replies
        fn handle(&mut self, frame: &str) -> Result<Vec<ServerMessage>, ProtocolError> {
            let message = ClientMessage::decode(frame)?;
            let replies = match &message {
                ClientMessage::Join { room_code, .. } => vec![ServerMessage::RoomJoined {
                    room_code: room_code.clone(),
                    player_id: "p1".to_string(),
                    entity_id: LOCAL_SHIP,
                }],
                ClientMessage::Input { .. } => {
                    if let Some(input) = message.input_data() {
                        let input = input?;
                        if let Some(ship) = self.ships.get_mut(&LOCAL_SHIP) {
                            ship.controls = ControlState {
                                thrust: input.thrust,
                                turn: input.turn,
                                primary_fire: input.primary_fire,
                                secondary_fire: input.secondary_fire,
                            };
                        }
                    }
                    Vec::new()
                }
                ClientMessage::Ping { timestamp } => vec![ServerMessage::Pong {
                    timestamp: *timestamp,
                }],
                ClientMessage::RequestDebugRender { timestamp } => {
                    vec![ServerMessage::debug_render(&self.debug_dump(), *timestamp)?]
                }
                ClientMessage::Leave => Vec::new(),
            };
            Ok(replies)
        }

        fn step(&mut self, elapsed_ms: f64) {
            let dt = self.physics.timestep();
            let t = elapsed_ms as f32 / 1000.0;
            for (id, ship) in self.ships.iter_mut() {
                if *id == 2 {
                    ship.controls = ControlState {
                        thrust: 0.6,
                        turn: 0.35,
                        ..Default::default()
                    };
                } else if *id == 3 {
                    ship.controls = ControlState {
                        thrust: 0.8,
                        turn: (t * 0.5).sin(),
                        ..Default::default()
                    };
                }
                let forces = Forces::from_controls(
                    ship.controls.thrust,
                    ship.controls.turn,
                    ship.body.rotation,
                    &ship.config,
                    &self.physics,
                );
                ship.body = integrate(&ship.body, &ship.config, &forces, &self.physics, dt);
            }
            self.tick += 1;
        }

        fn knock(&mut self, id: u64, offset: Vec2) {
            if let Some(ship) = self.ships.get_mut(&id) {
                let moved = BodyState {
                    position: ship.body.position + offset,
                    ..ship.body
                };
                ship.body = clamp_to_arena(
                    &moved,
                    &self.physics.arena,
                    self.physics.boundary_velocity_factor,
                )
                .0;
            }
        }

        fn snapshot(&self, timestamp: u64) -> GameSnapshot {
            GameSnapshot {
                sequence: self.tick as u32,
                tick: self.tick,
                timestamp,
                entities: self
                    .ships
                    .iter()
                    .map(|(id, ship)| EntitySnapshot {
                        entity_id: *id,
                        kind: ship.kind.clone(),
                        transform: ship.body.transform(),
                        velocity: ship.body.velocity(),
                        ship_config: Some(ship.config),
                    })
                    .collect(),
            }
        }

        fn debug_dump(&self) -> DebugRenderData {
            let mut dump = DebugRenderData {
                sequence: self.tick as u32,
                ..Default::default()
            };
            for (id, ship) in &self.ships {
                let handle = *id as u32;
                dump.rigid_bodies.push(DebugRigidBody {
                    handle,
                    position: ship.body.position,
                    rotation: ship.body.rotation,
                    body_type: DebugBodyType::Dynamic,
                    mass: ship.config.mass,
                    linear_damping: self.physics.linear_damping,
                    angular_damping: self.physics.angular_damping,
                });
                dump.colliders.push(DebugCollider {
                    handle,
                    parent_body: handle,
                    shape: DebugShape::Ball {
                        radius: ship.config.size,
                    },
                    position: Vec2::ZERO,
                    rotation: 0.0,
                });
            }
            dump
        }

        fn local_body(&self) -> Option<BodyState> {
            self.ships.get(&LOCAL_SHIP).map(|s| s.body)
        }
    }

    /// Scripted pilot: thrust, bank, coast, then weave
    fn pilot(now_ms: f64) -> ControlState {
        let t = now_ms / 1000.0;
        let (thrust, turn) = match t {
            t if t < 2.0 => (1.0, 0.0),
            t if t < 3.0 => (0.5, 1.0),
            t if t < 5.0 => (0.0, 0.0),
            t if t < 9.0 => (1.0, -0.4),
            t if t < 12.0 => (0.0, 0.0),
            t => (0.7, ((t * 1.3).sin() as f32).signum()),
        };
        ControlState {
            thrust,
            turn,
            primary_fire: (t as u32) % 4 == 0,
            secondary_fire: false,
        }
    }

    pub fn run(settings_path: Option<&str>) -> Result<(), DemoError> {
        let started = platform::now_ms();
        let settings = match settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        log::info!(
            "ship-sync demo: {:.0} Hz sim, {:.0} ms render delay, {} profile",
            settings.physics.tick_rate,
            settings.interpolation.render_delay_ms,
            settings.profile.as_str()
        );

        let mut server = StandInServer::new(settings.physics);
        let mut session = ClientSession::new(settings.clone());
        let mut uplink = LossyLink::new(7, 45.0, 15.0, 0.03);
        let mut downlink = LossyLink::new(11, 45.0, 15.0, 0.03);

        let tick_ms = 1000.0 / settings.physics.tick_rate as f64;
        let sample_ms = settings.input.sample_interval_ms();
        let mut next_tick = tick_ms;
        let mut next_sample = 0.0;
        let mut next_ping = 0.0;
        let mut knocked = false;
        let mut debug_requested = false;
        let mut worst_error = 0.0_f32;
        let mut steps = 0u64;
        let mut frames = 0u64;

        session.connect();
        uplink.send(session.join("DEMO", "demo").encode()?, 0.0);

        let mut now = 0.0;
        while now < RUN_MS {
            while next_tick <= now {
                if !knocked && next_tick >= KNOCKBACK_AT_MS {
                    log::info!("server knocks local ship by {KNOCKBACK}");
                    server.knock(LOCAL_SHIP, KNOCKBACK);
                    knocked = true;
                }
                server.step(next_tick);
                let frame = ServerMessage::snapshot(&server.snapshot(next_tick as u64))?.encode()?;
                downlink.send(frame, next_tick);
                next_tick += tick_ms;
            }

            for frame in downlink.deliver(now) {
                match session.handle_frame(&frame, now) {
                    Some(SessionEvent::Snapshot {
                        correction: Some(report),
                        sequence,
                        ..
                    }) if !report.is_noop() => {
                        log::debug!(
                            "snapshot {sequence}: {} correction, {:.2} units off",
                            report.tier.as_str(),
                            report.errors.position
                        );
                    }
                    Some(SessionEvent::Joined { entity_id, .. }) => {
                        log::info!("controlling ship {entity_id}");
                    }
                    Some(SessionEvent::RoundTrip { rtt_ms }) => {
                        log::debug!("rtt {rtt_ms:.1} ms");
                    }
                    Some(SessionEvent::DebugDump { sequence }) => {
                        let bodies = session.debug_render().map_or(0, |d| d.rigid_bodies.len());
                        log::info!("debug dump {sequence}: {bodies} bodies");
                    }
                    _ => {}
                }
            }

            while next_sample <= now {
                if let Some(message) = session.sample_input(pilot(next_sample), next_sample) {
                    uplink.send(message.encode()?, next_sample);
                }
                next_sample += sample_ms;
            }

            if now >= next_ping {
                if let Some(ping) = session.ping(now) {
                    uplink.send(ping.encode()?, now);
                }
                next_ping += 1000.0;
            }
            if !debug_requested && now >= 10_000.0 {
                if let Some(request) = session.request_debug_render(now) {
                    uplink.send(request.encode()?, now);
                }
                debug_requested = true;
            }

            for frame in uplink.deliver(now) {
                match server.handle(&frame) {
                    Ok(replies) => {
                        for reply in replies {
                            downlink.send(reply.encode()?, now);
                        }
                    }
                    Err(err) => log::warn!("server dropped frame: {err}"),
                }
            }

            steps += session.update((FRAME_MS / 1000.0) as f32) as u64;
            let view = session.frame(now);
            if let (Some(local), Some(truth)) = (view.local, server.local_body()) {
                worst_error = worst_error.max(local.position.distance(truth.position));
            }

            frames += 1;
            now += FRAME_MS;
        }

        session.disconnect();

        let summary = session.history().summary();
        log::info!(
            "{frames} frames, {steps} prediction steps, {} snapshots",
            session.last_snapshot_sequence().unwrap_or(0)
        );
        log::info!(
            "corrections: {} retained, {} emergencies ({} held by cooldown), mean error {:.2}, max {:.2}",
            summary.samples,
            summary.emergencies,
            summary.cooldown_blocked,
            summary.mean_position_error,
            summary.max_position_error
        );
        log::info!(
            "worst live divergence {worst_error:.1} units, rtt {}",
            session
                .rtt()
                .smoothed_ms()
                .map_or("n/a".to_string(), |rtt| format!("{rtt:.1} ms"))
        );
        log::info!(
            "link: up {}/{} lost, down {}/{} lost, {} dropped by client",
            uplink.lost,
            uplink.sent,
            downlink.lost,
            downlink.sent,
            session.dropped_messages()
        );
        log::info!("simulated {:.0} s in {:.0} ms", RUN_MS / 1000.0, platform::now_ms() - started);
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_link_is_deterministic() {
            let mut a = LossyLink::new(3, 40.0, 10.0, 0.2);
            let mut b = LossyLink::new(3, 40.0, 10.0, 0.2);
            for i in 0..50 {
                a.send(i.to_string(), i as f64);
                b.send(i.to_string(), i as f64);
            }
            assert_eq!(a.deliver(1000.0), b.deliver(1000.0));
            assert_eq!(a.lost, b.lost);
        }

        #[test]
        fn test_link_delivers_nothing_early() {
            let mut link = LossyLink::new(1, 50.0, 0.0, 0.0);
            link.send("x".into(), 0.0);
            assert!(link.deliver(49.0).is_empty());
            assert_eq!(link.deliver(50.0), vec!["x".to_string()]);
        }

        #[test]
        fn test_demo_runs_clean() {
            assert!(run(None).is_ok());
        }
    }
}
