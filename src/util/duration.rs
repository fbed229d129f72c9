//! Serde helpers for human-readable durations (`"5m"`, `"10s"`, `"250ms"`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Parse a human-readable duration.
///
/// # Errors
///
/// Returns the parser message when the input is not a valid duration.
pub fn parse(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim()).map_err(|e| format!("invalid duration `{input}`: {e}"))
}

/// Serialize a duration as a humantime string.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

/// Deserialize a duration from a humantime string.
///
/// # Errors
///
/// Fails when the string cannot be parsed.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}
