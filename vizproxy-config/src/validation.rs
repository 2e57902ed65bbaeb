//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};
use std::net::IpAddr;
use std::time::Duration;

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a rate or interval given as a float: finite and positive
pub fn validate_positive_finite(value: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be finite, got {}", field_name, value),
        });
    }
    validate_positive(value, field_name, domain)
}

/// Validate a non-zero duration
pub fn validate_duration(value: Duration, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_positive(value.as_secs_f64(), field_name, domain)
}

/// Validate an IP address literal
pub fn validate_ip_address(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    value
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|e| ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} '{}' is not an IP address: {}", field_name, value, e),
        })
}
