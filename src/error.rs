//! Error types
//!
//! Only the codec and the settings loader can fail. The prediction,
//! reconciliation and interpolation paths are total.

use thiserror::Error;

/// Failure to encode or decode a wire frame
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: usize, limit: usize },

    #[error("snapshot {sequence} carries non-finite state for entity {entity_id}")]
    NonFinite { sequence: u32, entity_id: u64 },
}

/// Failure to load, save or validate settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
