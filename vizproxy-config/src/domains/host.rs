//! Host configuration: worker launch, readiness wait and shutdown

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::domains::logging::LogLevel;
use crate::domains::utils::{default_true, serde_duration_secs, serde_duration_secs_option};
use crate::error::ConfigResult;
use crate::validation::{
    validate_duration, validate_ip_address, validate_positive_finite, validate_required_string,
    Validatable,
};

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Backend the worker should wrap
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Worker executable; the current executable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,

    /// Extra arguments appended to the worker command line
    #[serde(default)]
    pub worker_args: Vec<String>,

    /// How often the readiness wait checks the worker
    #[serde(with = "serde_duration_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Give up on a worker that has not reported readiness by then
    #[serde(
        with = "serde_duration_secs_option",
        default = "default_start_timeout"
    )]
    pub start_timeout: Option<Duration>,

    /// Grace period after `stop` before the worker is killed
    #[serde(with = "serde_duration_secs", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,

    /// Address the host dials once the worker reported its port
    #[serde(default = "default_connect_host")]
    pub connect_host: String,

    /// Whether plain (non `exposed_`) names may be looked up remotely
    #[serde(default = "default_true")]
    pub allow_public_attrs: bool,

    /// Tick rate override in Hz forwarded to active workers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_rate: Option<f64>,

    /// Log level forwarded to the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            worker_program: None,
            worker_args: Vec::new(),
            poll_interval: default_poll_interval(),
            start_timeout: default_start_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            connect_host: default_connect_host(),
            allow_public_attrs: true,
            tick_rate: None,
            log_level: None,
        }
    }
}

impl HostConfig {
    /// Default configuration for the given backend
    pub fn for_backend(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }
}

impl Validatable for HostConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.backend, "backend", self.domain_name())?;
        validate_duration(self.poll_interval, "poll_interval", self.domain_name())?;
        validate_duration(self.shutdown_timeout, "shutdown_timeout", self.domain_name())?;
        if let Some(timeout) = self.start_timeout {
            validate_duration(timeout, "start_timeout", self.domain_name())?;
        }
        validate_ip_address(&self.connect_host, "connect_host", self.domain_name())?;
        if let Some(rate) = self.tick_rate {
            validate_positive_finite(rate, "tick_rate", self.domain_name())?;
        }
        if !self.allow_public_attrs {
            warn!("allow_public_attrs is disabled: only exposed_ names resolve remotely");
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "host"
    }
}

fn default_backend() -> String {
    "plot".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_start_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_connect_host() -> String {
    "127.0.0.1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.backend, "plot");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.start_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.allow_public_attrs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_config_validation() {
        let mut config = HostConfig::for_backend("  ");
        assert!(config.validate().is_err());

        config.backend = "scene".to_string();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_millis(50);
        config.tick_rate = Some(-3.0);
        assert!(config.validate().is_err());

        config.tick_rate = Some(60.0);
        config.allow_public_attrs = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fractional_seconds_in_yaml() {
        let config: HostConfig = serde_yaml::from_str(
            "backend: scene\npoll_interval: 0.25\nstart_timeout: null\nlog_level: debug\n",
        )
        .unwrap();
        assert_eq!(config.backend, "scene");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.start_timeout, None);
        assert_eq!(config.log_level, Some(LogLevel::Debug));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }
}
