//! Domain-specific configuration modules

pub mod host;
pub mod logging;
pub mod service;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main vizproxy configuration combining all domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VizProxyConfig {
    /// Host side: how the worker is launched, reached and stopped
    #[serde(default)]
    pub host: host::HostConfig,

    /// Worker side: how the proxy service listens and ticks
    #[serde(default)]
    pub service: service::ServiceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl VizProxyConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.host.validate()?;
        self.service.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = VizProxyConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(VizProxyConfig::default().validate_all().is_ok());
    }

    #[test]
    fn test_sample_parses_back() {
        let sample = VizProxyConfig::generate_sample();
        assert!(sample.contains("host:"));
        assert!(sample.contains("service:"));
        let parsed: VizProxyConfig = serde_yaml::from_str(&sample).unwrap();
        assert_eq!(parsed, VizProxyConfig::default());
    }
}
