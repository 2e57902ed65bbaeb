//! Wire error types

use thiserror::Error;

use crate::protocol::RemoteError;

/// Errors raised while encoding, decoding or moving frames
#[derive(Debug, Error)]
pub enum WireError {
    /// No native dumper and no registered codec accepts the value
    #[error("cannot dump {value} of type {type_name}")]
    Unencodable { value: String, type_name: String },

    /// Malformed or truncated payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Custom tag referenced a codec index this registry does not have
    #[error("Unknown codec index {0} (codec registries out of sync?)")]
    UnknownCodec(u32),

    /// Codec exists at the index but has no decoder of its own
    #[error("Codec '{0}' has no wire form and cannot decode")]
    NoWireForm(&'static str),

    /// The peer registered its codecs in a different order
    #[error("Codec registry mismatch: local {local:?}, remote {remote:?}")]
    RegistryMismatch {
        local: Vec<String>,
        remote: Vec<String>,
    },

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// Frame exceeds the configured size limit
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed by the peer
    #[error("Connection closed")]
    ConnectionClosed,

    /// Timeout waiting for data
    #[error("Timeout waiting for data")]
    Timeout,

    /// The peer answered with an error
    #[error("Remote error: {0}")]
    Remote(RemoteError),
}

impl WireError {
    /// Build an `Unencodable` error naming the value and its runtime type
    pub fn unencodable(value: impl std::fmt::Debug, type_name: impl Into<String>) -> Self {
        let mut repr = format!("{:?}", value);
        if repr.len() > 120 {
            let cut = (0..=117).rev().find(|&i| repr.is_char_boundary(i)).unwrap_or(0);
            repr.truncate(cut);
            repr.push_str("...");
        }
        WireError::Unencodable {
            value: repr,
            type_name: type_name.into(),
        }
    }

    /// True when the channel is gone; callers shutting down treat this as success
    pub fn is_closed(&self) -> bool {
        matches!(self, WireError::ConnectionClosed)
    }

    /// True when the failure concerns a single value and the connection is still usable
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            WireError::Unencodable { .. } | WireError::NoWireForm(_) | WireError::Remote(_)
        )
    }

    /// Errors after which the connection must not be used any more
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WireError::ProtocolVersionMismatch { .. }
                | WireError::RegistryMismatch { .. }
                | WireError::UnknownCodec(_)
                | WireError::FrameTooLarge { .. }
                | WireError::InvalidMessage(_)
                | WireError::Decode(_)
                | WireError::IoError(_)
                | WireError::ConnectionClosed
        )
    }
}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => WireError::ConnectionClosed,
            _ => WireError::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            WireError::IoError(err.to_string())
        } else {
            WireError::InvalidMessage(err.to_string())
        }
    }
}
