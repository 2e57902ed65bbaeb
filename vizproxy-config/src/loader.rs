//! Configuration loading and environment variable handling

use crate::domains::host::HostConfig;
use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::service::ServiceConfig;
use crate::domains::utils::parse_duration_secs;
use crate::domains::VizProxyConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "VIZPROXY".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<VizProxyConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<VizProxyConfig> {
        let mut config: VizProxyConfig = if content.trim().is_empty() {
            VizProxyConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<VizProxyConfig> {
        let mut config = VizProxyConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<VizProxyConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut VizProxyConfig) -> ConfigResult<()> {
        self.apply_host_overrides(&mut config.host)?;
        self.apply_service_overrides(&mut config.service)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_host_overrides(&self, config: &mut HostConfig) -> ConfigResult<()> {
        if let Ok(backend) = self.get_env_var("BACKEND") {
            config.backend = backend;
        }

        if let Ok(program) = self.get_env_var("WORKER_PROGRAM") {
            config.worker_program = Some(PathBuf::from(program));
        }

        if let Some(interval) = self.duration_var("POLL_INTERVAL")? {
            config.poll_interval = interval;
        }

        if let Ok(timeout) = self.get_env_var("START_TIMEOUT") {
            // "none" disables the readiness deadline
            config.start_timeout = if timeout.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_duration_secs(&timeout).map_err(|e| {
                    ConfigError::EnvError(format!("Invalid START_TIMEOUT: {}", e))
                })?)
            };
        }

        if let Some(timeout) = self.duration_var("SHUTDOWN_TIMEOUT")? {
            config.shutdown_timeout = timeout;
        }

        if let Ok(allow) = self.get_env_var("ALLOW_PUBLIC_ATTRS") {
            config.allow_public_attrs = allow.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid ALLOW_PUBLIC_ATTRS: {}", e))
            })?;
        }

        if let Some(rate) = self.rate_var("TICK_RATE")? {
            config.tick_rate = Some(rate);
        }

        if let Ok(level) = self.get_env_var("WORKER_LOG_LEVEL") {
            config.log_level = Some(LogLevel::from_str(&level).map_err(|_| {
                ConfigError::EnvError(format!("Invalid WORKER_LOG_LEVEL: {}", level))
            })?);
        }

        Ok(())
    }

    fn apply_service_overrides(&self, config: &mut ServiceConfig) -> ConfigResult<()> {
        if let Ok(bind) = self.get_env_var("BIND_ADDRESS") {
            config.bind_address = bind;
        }

        if let Some(rate) = self.rate_var("TICK_RATE")? {
            config.tick_rate = Some(rate);
        }

        if let Ok(max) = self.get_env_var("MAX_REQUESTS_PER_TICK") {
            config.max_requests_per_tick = max.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid MAX_REQUESTS_PER_TICK: {}", e))
            })?;
        }

        if let Some(timeout) = self.duration_var("ACCEPT_TIMEOUT")? {
            config.accept_timeout = Some(timeout);
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn duration_var(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(value) => parse_duration_secs(&value)
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    fn rate_var(&self, name: &str) -> ConfigResult<Option<f64>> {
        match self.get_env_var(name) {
            Ok(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
