//! Environment-variable helpers shared by every `from_env` constructor.

use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Value of `var`, treating an empty string as unset.
pub fn env_opt(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn env_or(var: &'static str, default: &str) -> String {
    env_opt(var).unwrap_or_else(|| default.to_string())
}

pub fn env_required(var: &'static str) -> Result<String, ConfigError> {
    env_opt(var).ok_or(ConfigError::Missing(var))
}

/// Parse `var`, falling back to `default` when unset.
pub fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(var) {
        Some(value) => parse_value(var, &value),
        None => Ok(default),
    }
}

/// Comma-separated list; blank entries are skipped.
pub fn env_list(var: &'static str, default: &str) -> Vec<String> {
    split_list(&env_or(var, default))
}

pub fn parse_value<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
