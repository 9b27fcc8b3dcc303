//! Wire protocol shared with the authoritative server
//!
//! Only the data contract lives here; the socket itself belongs to the
//! host application.

pub mod debug;
pub mod messages;
pub mod snapshot;

pub use debug::DebugRenderData;
pub use messages::{ClientMessage, ServerMessage, decode_debug_render, decode_snapshot};
pub use snapshot::{
    EntityKind, EntitySnapshot, GameSnapshot, InputData, PlayerInfo, ProjectileInfo, ShipConfig,
    Transform, Velocity,
};

/// Largest frame or payload accepted (1 MiB)
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
