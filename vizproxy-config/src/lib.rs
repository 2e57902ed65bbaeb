//! Domain-driven configuration management for vizproxy
//!
//! This crate provides configuration split by functional domains (host,
//! service, logging), with validation, defaults, and environment variable
//! support.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    host::HostConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    service::ServiceConfig,
    VizProxyConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration_secs, serde_duration_secs_option};
