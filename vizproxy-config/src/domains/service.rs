//! Proxy service configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domains::utils::serde_duration_secs_option;
use crate::error::ConfigResult;
use crate::validation::{
    validate_duration, validate_ip_address, validate_positive, validate_positive_finite,
    Validatable,
};

/// Worker-side service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the one-shot server binds (port is always ephemeral)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Tick rate in Hz; the backend's own rate when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_rate: Option<f64>,

    /// Upper bound on requests handled between two ticks
    #[serde(default = "default_max_requests_per_tick")]
    pub max_requests_per_tick: usize,

    /// How long the worker waits for its single connection
    #[serde(
        with = "serde_duration_secs_option",
        default = "default_accept_timeout"
    )]
    pub accept_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tick_rate: None,
            max_requests_per_tick: default_max_requests_per_tick(),
            accept_timeout: default_accept_timeout(),
        }
    }
}

impl Validatable for ServiceConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_ip_address(&self.bind_address, "bind_address", self.domain_name())?;
        if let Some(rate) = self.tick_rate {
            validate_positive_finite(rate, "tick_rate", self.domain_name())?;
        }
        validate_positive(
            self.max_requests_per_tick,
            "max_requests_per_tick",
            self.domain_name(),
        )?;
        if let Some(timeout) = self.accept_timeout {
            validate_duration(timeout, "accept_timeout", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "service"
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_max_requests_per_tick() -> usize {
    256
}

fn default_accept_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.tick_rate, None);
        assert_eq!(config.max_requests_per_tick, 256);
        assert_eq!(config.accept_timeout, Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_service_config_validation() {
        let mut config = ServiceConfig {
            max_requests_per_tick: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());

        config.max_requests_per_tick = 1;
        config.bind_address = "not-an-ip".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.domain(), Some("service"));

        config.bind_address = "0.0.0.0".to_string();
        config.tick_rate = Some(f64::NAN);
        assert!(config.validate().is_err());
    }
}
