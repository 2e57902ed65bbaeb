//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

fn seconds_to_duration<E: serde::de::Error>(seconds: f64) -> Result<Duration, E> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| E::custom(format!("invalid duration {}s: {}", seconds, e)))
}

/// Serde helper module for Duration serialization as (fractional) seconds
pub mod serde_duration_secs {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        seconds_to_duration(seconds)
    }
}

/// Serde helper module for optional Duration serialization
pub mod serde_duration_secs_option {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds: Option<f64> = Option::deserialize(deserializer)?;
        seconds.map(seconds_to_duration).transpose()
    }
}

/// Parse a duration given in seconds, as found in environment variables
pub fn parse_duration_secs(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number of seconds: {}", value, e))?;
    seconds_to_duration::<serde::de::value::Error>(seconds).map_err(|e| e.to_string())
}

/// Default functions for serde
pub fn default_true() -> bool {
    true
}
