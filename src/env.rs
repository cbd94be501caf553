//! Environment variable names used to configure the backend logger from
//! services that do not carry a config file.
//!
//! These are purely helpers; the logger types themselves never read the
//! environment.

use crate::backend::{parse_level, BackendConfig, LevelParseError};

/// Minimum backend level, e.g. `info` or `warn`.
pub const ZSLOG_LEVEL_ENV: &str = "ZSLOG_LEVEL";

/// Name of the timestamp field.
pub const ZSLOG_TIMESTAMP_FIELD_ENV: &str = "ZSLOG_TIMESTAMP_FIELD";

/// Name of the level field.
pub const ZSLOG_LEVEL_FIELD_ENV: &str = "ZSLOG_LEVEL_FIELD";

/// Name of the message field.
pub const ZSLOG_MESSAGE_FIELD_ENV: &str = "ZSLOG_MESSAGE_FIELD";

/// Error returned when the environment holds an invalid setting.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid {var}: {source}")]
    InvalidLevel {
        var: &'static str,
        #[source]
        source: LevelParseError,
    },
}

impl BackendConfig {
    /// Build a config from `ZSLOG_*` variables, using defaults for the
    /// unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = BackendConfig::default();
        if let Some(level) = lookup(ZSLOG_LEVEL_ENV) {
            config.level = parse_level(&level).map_err(|source| ConfigError::InvalidLevel {
                var: ZSLOG_LEVEL_ENV,
                source,
            })?;
        }
        if let Some(name) = lookup(ZSLOG_TIMESTAMP_FIELD_ENV) {
            config.fields.timestamp = name;
        }
        if let Some(name) = lookup(ZSLOG_LEVEL_FIELD_ENV) {
            config.fields.level = name;
        }
        if let Some(name) = lookup(ZSLOG_MESSAGE_FIELD_ENV) {
            config.fields.message = name;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendLevel;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = BackendConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, BackendConfig::default());
    }

    #[test]
    fn test_reads_level_and_field_names() {
        let config = BackendConfig::from_lookup(lookup(&[
            (ZSLOG_LEVEL_ENV, "warn"),
            (ZSLOG_MESSAGE_FIELD_ENV, "msg"),
        ]))
        .unwrap();
        assert_eq!(config.level, BackendLevel::Warn);
        assert_eq!(config.fields.message, "msg");
        assert_eq!(config.fields.level, "level");
    }

    #[test]
    fn test_invalid_level_is_reported() {
        let err = BackendConfig::from_lookup(lookup(&[(ZSLOG_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(err.to_string().contains(ZSLOG_LEVEL_ENV));
    }
}
