//! Physics debug dump returned for `RequestDebugRender`
//!
//! Visualization only. The session keeps the latest dump for an overlay
//! to read and never feeds it back into prediction.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DebugRenderData {
    pub sequence: u32,
    pub rigid_bodies: Vec<DebugRigidBody>,
    pub colliders: Vec<DebugCollider>,
    pub forces: Vec<DebugForce>,
    pub velocities: Vec<DebugVelocity>,
    pub joints: Vec<DebugJoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugRigidBody {
    pub handle: u32,
    pub position: Vec2,
    pub rotation: f32,
    pub body_type: DebugBodyType,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugCollider {
    pub handle: u32,
    pub parent_body: u32,
    pub shape: DebugShape,
    /// Offset relative to the parent body
    pub position: Vec2,
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugForce {
    pub body_handle: u32,
    pub force: Vec2,
    pub torque: f32,
    pub application_point: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugVelocity {
    pub body_handle: u32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugJoint {
    pub handle: u32,
    pub body1: u32,
    pub body2: u32,
    pub anchor1: Vec2,
    pub anchor2: Vec2,
    pub joint_type: DebugJointType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugBodyType {
    Dynamic,
    Kinematic,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DebugShape {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec2 },
    Triangle { vertices: [Vec2; 3] },
    Polygon { vertices: Vec<Vec2> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugJointType {
    Fixed,
    Revolute,
    Prismatic,
    Distance,
    Spring,
}
