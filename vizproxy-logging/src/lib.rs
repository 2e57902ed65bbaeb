//! Logging setup for vizproxy
//!
//! Everything logs through `tracing`. This crate only decides where events
//! go: the host logs to stdout like any CLI, while workers log to stderr
//! because their stdout carries the readiness report.

pub mod init;

pub use init::{
    build_env_filter, init_logging_from_config, init_simple_tracing, init_worker_tracing,
};
pub use vizproxy_config::{LogFormat, LogLevel, LoggingConfig};
