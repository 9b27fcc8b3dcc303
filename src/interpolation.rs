//! Remote entity interpolation
//!
//! Remote ships, projectiles and enemies are drawn slightly in the past,
//! blending between the two most recent snapshots of each entity. The
//! render delay buys enough slack that the next snapshot usually arrives
//! before the current blend window runs out.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use crate::protocol::{EntityKind, EntitySnapshot, GameSnapshot, Transform};
use crate::settings::InterpolationTuning;
use crate::{normalize_angle, shortest_angle_delta};

/// Blend window for one remote entity
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationState {
    pub from: Transform,
    pub to: Transform,
    pub kind: EntityKind,
    /// Render clock at which the blend starts (ms)
    pub window_start_ms: f64,
    pub duration_ms: f64,
    /// Snapshot sequence that produced `to`
    pub to_sequence: u32,
}

impl InterpolationState {
    /// Blend factor at `render_time_ms`, clamped to [0, 1]
    pub fn progress_at(&self, render_time_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((render_time_ms - self.window_start_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }

    fn blend(&self, t: f32, shortest_path: bool) -> Transform {
        if t >= 1.0 {
            return self.to;
        }
        let position = self.from.position.lerp(self.to.position, t);
        let rotation = if shortest_path {
            normalize_angle(
                self.from.rotation + shortest_angle_delta(self.from.rotation, self.to.rotation) * t,
            )
        } else {
            self.from.rotation + (self.to.rotation - self.from.rotation) * t
        };
        Transform { position, rotation }
    }
}

/// Pose of a remote entity for one render frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntity {
    pub entity_id: u64,
    pub kind: EntityKind,
    pub position: Vec2,
    pub rotation: f32,
    pub progress: f32,
}

#[derive(Debug, Clone)]
pub struct RemoteInterpolator {
    tuning: InterpolationTuning,
    /// Keyed by id so frames come out in a stable order
    entities: BTreeMap<u64, InterpolationState>,
    newest_sequence: Option<u32>,
}

impl RemoteInterpolator {
    pub fn new(tuning: InterpolationTuning) -> Self {
        Self {
            tuning,
            entities: BTreeMap::new(),
            newest_sequence: None,
        }
    }

    /// Feed one entity from a snapshot that arrived at `arrival_ms`
    ///
    /// Returns false when the snapshot is older than what is already held.
    pub fn push(&mut self, entity: &EntitySnapshot, sequence: u32, arrival_ms: f64) -> bool {
        let window_start_ms = arrival_ms - self.tuning.render_delay_ms;
        match self.entities.get_mut(&entity.entity_id) {
            Some(state) => {
                if sequence <= state.to_sequence {
                    return false;
                }
                state.from = state.to;
                state.to = entity.transform;
                state.kind = entity.kind.clone();
                state.window_start_ms = window_start_ms;
                state.duration_ms = self.tuning.snapshot_interval_ms();
                state.to_sequence = sequence;
            }
            None => {
                self.entities.insert(
                    entity.entity_id,
                    InterpolationState {
                        from: entity.transform,
                        to: entity.transform,
                        kind: entity.kind.clone(),
                        window_start_ms,
                        duration_ms: 0.0,
                        to_sequence: sequence,
                    },
                );
            }
        }
        true
    }

    /// Feed a whole snapshot, skipping `local` and dropping entities it no longer lists
    ///
    /// Stale snapshots still update entities they are newer for but never
    /// remove anything. Returns the number of entities updated.
    pub fn ingest(&mut self, snapshot: &GameSnapshot, local: Option<u64>, arrival_ms: f64) -> usize {
        let mut updated = 0;
        for entity in &snapshot.entities {
            if Some(entity.entity_id) == local {
                continue;
            }
            if !entity.is_finite() {
                log::warn!(
                    "dropping non-finite {} {} from snapshot {}",
                    entity.kind.label(),
                    entity.entity_id,
                    snapshot.sequence
                );
                continue;
            }
            if self.push(entity, snapshot.sequence, arrival_ms) {
                updated += 1;
            }
        }

        let is_newest = self
            .newest_sequence
            .is_none_or(|newest| snapshot.sequence > newest);
        if is_newest {
            self.newest_sequence = Some(snapshot.sequence);
            let live: BTreeSet<u64> = snapshot
                .entities
                .iter()
                .map(|e| e.entity_id)
                .filter(|id| Some(*id) != local)
                .collect();
            self.retain(&live);
        }

        updated
    }

    /// Drop every entity not in `live`; returns how many were removed
    pub fn retain(&mut self, live: &BTreeSet<u64>) -> usize {
        let before = self.entities.len();
        self.entities.retain(|id, _| live.contains(id));
        let removed = before - self.entities.len();
        if removed > 0 {
            log::debug!("removed {removed} remote entities");
        }
        removed
    }

    /// Pose of one entity at wall clock `now_ms`
    pub fn sample(&self, entity_id: u64, now_ms: f64) -> Option<RenderedEntity> {
        let render_time = now_ms - self.tuning.render_delay_ms;
        self.entities
            .get(&entity_id)
            .map(|state| self.render(entity_id, state, render_time))
    }

    /// Every remote entity at `now_ms`, ordered by id
    pub fn frame(&self, now_ms: f64) -> Vec<RenderedEntity> {
        let render_time = now_ms - self.tuning.render_delay_ms;
        self.entities
            .iter()
            .map(|(id, state)| self.render(*id, state, render_time))
            .collect()
    }

    fn render(&self, entity_id: u64, state: &InterpolationState, render_time: f64) -> RenderedEntity {
        let progress = state.progress_at(render_time);
        let pose = state.blend(progress, self.tuning.shortest_path_rotation);
        RenderedEntity {
            entity_id,
            kind: state.kind.clone(),
            position: pose.position,
            rotation: pose.rotation,
            progress,
        }
    }

    pub fn state(&self, entity_id: u64) -> Option<&InterpolationState> {
        self.entities.get(&entity_id)
    }

    pub fn remove(&mut self, entity_id: u64) -> Option<InterpolationState> {
        self.entities.remove(&entity_id)
    }

    /// Forget everything (disconnect)
    pub fn clear(&mut self) {
        self.entities.clear();
        self.newest_sequence = None;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
