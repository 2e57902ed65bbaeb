//! Host errors

use std::time::Duration;
use thiserror::Error;
use vizproxy_wire::{RemoteError, WireError};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker reported that it cannot construct its backend
    #[error("Backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Worker exited before reporting readiness ({status})")]
    WorkerExited { status: String },

    #[error("Worker not ready after {0:?}")]
    StartTimeout(Duration),

    #[error("Host already started")]
    AlreadyStarted,

    #[error("Host not started")]
    NotStarted,

    #[error(transparent)]
    Wire(#[from] WireError),

    /// Error raised by the remote target, e.g. `AttributeError`
    #[error("{0}")]
    Remote(RemoteError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl HostError {
    /// Error class of a remote failure
    pub fn remote_kind(&self) -> Option<&str> {
        match self {
            HostError::Remote(e) => Some(&e.kind),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, HostError::Remote(_))
    }

    /// The worker never became usable
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            HostError::Spawn(_)
                | HostError::BackendUnavailable { .. }
                | HostError::WorkerExited { .. }
                | HostError::StartTimeout(_)
        )
    }

    /// The connection to the worker is gone
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, HostError::Wire(e) if e.is_closed())
    }

    /// A failure confined to one value or call; the connection stays usable
    pub fn is_recoverable(&self) -> bool {
        match self {
            HostError::Remote(_) | HostError::UnexpectedReply(_) => true,
            HostError::Wire(e) => e.is_value_error(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<RemoteError> for HostError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifiers() {
        let remote = HostError::from(RemoteError::new("AttributeError", "no attribute 'x'"));
        assert_eq!(remote.remote_kind(), Some("AttributeError"));
        assert!(remote.is_recoverable());
        assert_eq!(remote.to_string(), "AttributeError: no attribute 'x'");

        let closed = HostError::from(WireError::ConnectionClosed);
        assert!(closed.is_connection_lost());
        assert!(!closed.is_recoverable());

        let unencodable = HostError::from(WireError::unencodable("f", "File"));
        assert!(unencodable.is_recoverable());

        assert!(HostError::StartTimeout(Duration::from_secs(1)).is_startup_failure());
        assert!(!HostError::NotStarted.is_startup_failure());
    }
}
