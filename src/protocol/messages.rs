//! Top-level frames exchanged over the websocket
//!
//! Frames are JSON text objects tagged by `"type"`. Bulky payloads
//! (inputs, snapshots, debug dumps) travel as JSON bytes inside `data`.

use serde::{Deserialize, Serialize};

use super::debug::DebugRenderData;
use super::snapshot::{GameSnapshot, InputData};
use super::MAX_FRAME_BYTES;
use crate::error::ProtocolError;

/// Client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    Join {
        room_code: String,
        player_name: String,
    },
    Input {
        sequence: u32,
        timestamp: u64,
        data: Vec<u8>,
    },
    Ping {
        timestamp: u64,
    },
    RequestDebugRender {
        timestamp: u64,
    },
    Leave,
}

/// Server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    RoomJoined {
        room_code: String,
        player_id: String,
        /// The receiver's own ship
        entity_id: u64,
    },
    RoomCreated {
        room_code: String,
    },
    PlayerJoined {
        player_id: String,
        player_name: String,
    },
    PlayerLeft {
        player_id: String,
    },
    Snapshot {
        sequence: u32,
        timestamp: u64,
        data: Vec<u8>,
    },
    Pong {
        timestamp: u64,
    },
    DebugRender {
        sequence: u32,
        timestamp: u64,
        data: Vec<u8>,
    },
    Error {
        message: String,
    },
}

impl ClientMessage {
    /// Wrap an input record the way the server expects it
    pub fn input(input: &InputData) -> Result<Self, ProtocolError> {
        let data = serde_json::to_vec(input).map_err(|source| ProtocolError::Encode {
            what: "input payload",
            source,
        })?;
        Ok(ClientMessage::Input {
            sequence: input.sequence,
            timestamp: input.timestamp,
            data,
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            what: "client frame",
            source,
        })
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        check_size(frame)?;
        serde_json::from_str(frame).map_err(|source| ProtocolError::Decode {
            what: "client frame",
            source,
        })
    }

    /// Unwrap the payload of an `Input` frame; `None` for other variants
    pub fn input_data(&self) -> Option<Result<InputData, ProtocolError>> {
        match self {
            ClientMessage::Input { data, .. } => Some(decode_payload(data, "input payload")),
            _ => None,
        }
    }
}

impl ServerMessage {
    /// Wrap a snapshot the way the server sends it
    pub fn snapshot(snapshot: &GameSnapshot) -> Result<Self, ProtocolError> {
        let data = serde_json::to_vec(snapshot).map_err(|source| ProtocolError::Encode {
            what: "snapshot payload",
            source,
        })?;
        Ok(ServerMessage::Snapshot {
            sequence: snapshot.sequence,
            timestamp: snapshot.timestamp,
            data,
        })
    }

    pub fn debug_render(dump: &DebugRenderData, timestamp: u64) -> Result<Self, ProtocolError> {
        let data = serde_json::to_vec(dump).map_err(|source| ProtocolError::Encode {
            what: "debug payload",
            source,
        })?;
        Ok(ServerMessage::DebugRender {
            sequence: dump.sequence,
            timestamp,
            data,
        })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            what: "server frame",
            source,
        })
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        check_size(frame)?;
        serde_json::from_str(frame).map_err(|source| ProtocolError::Decode {
            what: "server frame",
            source,
        })
    }
}

/// Decode the `data` of a `Snapshot` frame
pub fn decode_snapshot(data: &[u8]) -> Result<GameSnapshot, ProtocolError> {
    decode_payload(data, "snapshot payload")
}

/// Decode the `data` of a `DebugRender` frame
pub fn decode_debug_render(data: &[u8]) -> Result<DebugRenderData, ProtocolError> {
    decode_payload(data, "debug payload")
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    data: &[u8],
    what: &'static str,
) -> Result<T, ProtocolError> {
    if data.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::Oversize {
            size: data.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    serde_json::from_slice(data).map_err(|source| ProtocolError::Decode { what, source })
}

fn check_size(frame: &str) -> Result<(), ProtocolError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::Oversize {
            size: frame.len(),
            limit: MAX_FRAME_BYTES,
        });
    }
    Ok(())
}
