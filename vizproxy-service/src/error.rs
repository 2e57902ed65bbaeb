//! Error types for the worker side

use std::time::Duration;
use thiserror::Error;
use vizproxy_wire::WireError;

use crate::server::ServerState;

/// Worker and service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Invalid server state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ServerState,
        actual: ServerState,
    },

    #[error("No connection within {0:?}")]
    AcceptTimeout(Duration),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Worker interrupted")]
    Interrupted,

    #[error("Host went away")]
    HostGone,
}

impl ServiceError {
    /// Conditions that end the worker through the orderly shutdown path
    pub fn is_shutdown(&self) -> bool {
        match self {
            ServiceError::Interrupted | ServiceError::HostGone | ServiceError::AcceptTimeout(_) => {
                true
            }
            ServiceError::Wire(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Errors that prevent the worker from ever serving
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::Bind { .. }
                | ServiceError::BackendUnavailable(_)
                | ServiceError::InvalidState { .. }
        )
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
