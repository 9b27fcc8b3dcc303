//! Authoritative state records carried inside `Snapshot` frames

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Position and heading in the arena plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    /// Radians
    pub rotation: f32,
}

/// Linear and angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    /// Radians per second
    pub angular: f32,
}

/// Ship handling parameters, owned by the server
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipConfig {
    pub thrust_power: f32,
    /// Radians per second
    pub turn_rate: f32,
    pub max_speed: f32,
    pub mass: f32,
    /// Collision radius
    pub size: f32,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            thrust_power: 500.0,
            turn_rate: 3.0,
            max_speed: 200.0,
            mass: 1.0,
            size: 8.0,
        }
    }
}

impl ShipConfig {
    /// Moment of inertia of a solid disc of radius `size`
    pub fn angular_inertia(&self) -> f32 {
        0.5 * self.mass * self.size * self.size
    }

    pub fn is_usable(&self) -> bool {
        self.mass.is_finite()
            && self.mass > 0.0
            && self.size.is_finite()
            && self.size > 0.0
            && self.thrust_power.is_finite()
            && self.turn_rate.is_finite()
            && self.max_speed.is_finite()
    }
}

/// Public player record attached to player entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub credits: u32,
}

/// Projectile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileInfo {
    pub damage: f32,
    pub lifetime: f32,
    pub speed: f32,
    pub owner_id: String,
}

/// What an entity is. Encoded externally tagged: `{"Player": {..}}`, `"Enemy"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player(PlayerInfo),
    Projectile(ProjectileInfo),
    Enemy,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Player(_) => "player",
            EntityKind::Projectile(_) => "projectile",
            EntityKind::Enemy => "enemy",
        }
    }
}

/// One entity as seen by the server on a given tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: u64,
    #[serde(rename = "entity_type")]
    pub kind: EntityKind,
    pub transform: Transform,
    pub velocity: Velocity,
    /// Only sent for ships
    #[serde(rename = "ship", default)]
    pub ship_config: Option<ShipConfig>,
}

impl EntitySnapshot {
    /// True when every kinematic field is a real number
    pub fn is_finite(&self) -> bool {
        self.transform.position.is_finite()
            && self.transform.rotation.is_finite()
            && self.velocity.linear.is_finite()
            && self.velocity.angular.is_finite()
    }

    /// Reject NaN or infinite state before it reaches the predictor
    pub fn check_finite(&self, sequence: u32) -> Result<(), ProtocolError> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(ProtocolError::NonFinite {
                sequence,
                entity_id: self.entity_id,
            })
        }
    }
}

/// Full world snapshot for one server tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub sequence: u32,
    pub tick: u64,
    /// Server wall clock (ms since epoch)
    pub timestamp: u64,
    pub entities: Vec<EntitySnapshot>,
}

impl GameSnapshot {
    pub fn entity(&self, entity_id: u64) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }
}

/// Input record as the server parses it from `Input.data`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    pub sequence: u32,
    /// Client wall clock (ms)
    pub timestamp: u64,
    pub thrust: f32,
    pub turn: f32,
    pub primary_fire: bool,
    pub secondary_fire: bool,
}
