//! Backend errors

use thiserror::Error;
use vizproxy_service::TargetError;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend cannot be constructed in this process
    #[error("backend '{backend}' is unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl BackendError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. })
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for BackendError {
    fn from(err: image::ImageError) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<BackendError> for TargetError {
    fn from(err: BackendError) -> Self {
        TargetError::runtime(err.to_string())
    }
}
