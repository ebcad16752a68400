//! Session configuration
//!
//! Loaded from defaults, deserialized from any serde source, or read from
//! `OXYGEN_*` environment variables.

use std::env;

use serde::Deserialize;

use crate::error::{ModelError, ModelResult};

pub const DATABASE_URL_VAR: &str = "OXYGEN_DATABASE_URL";
pub const CREATE_IF_MISSING_VAR: &str = "OXYGEN_CREATE_IF_MISSING";
pub const FOREIGN_KEYS_VAR: &str = "OXYGEN_FOREIGN_KEYS";
pub const LOG_STATEMENTS_VAR: &str = "OXYGEN_LOG_STATEMENTS";

/// Connection and logging options for a `Session`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub database_url: String,
    pub create_if_missing: bool,
    pub foreign_keys: bool,
    /// Emit a debug event for every statement the session runs
    pub log_statements: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            create_if_missing: true,
            foreign_keys: true,
            log_statements: true,
        }
    }
}

impl SessionConfig {
    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a database file, created when missing
    pub fn file(path: impl AsRef<std::path::Path>) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(DATABASE_URL_VAR) {
            config.database_url = url;
        }
        if let Some(value) = lookup(CREATE_IF_MISSING_VAR) {
            config.create_if_missing = parse_flag(CREATE_IF_MISSING_VAR, &value)?;
        }
        if let Some(value) = lookup(FOREIGN_KEYS_VAR) {
            config.foreign_keys = parse_flag(FOREIGN_KEYS_VAR, &value)?;
        }
        if let Some(value) = lookup(LOG_STATEMENTS_VAR) {
            config.log_statements = parse_flag(LOG_STATEMENTS_VAR, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ModelResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(ModelError::Configuration("database_url is empty".to_string()));
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(ModelError::Configuration(format!(
                "database_url '{}' is not a sqlite url",
                self.database_url
            )));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> ModelResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ModelError::Configuration(format!(
            "{} expects a boolean, got '{}'",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "sqlite://app.db"),
            (FOREIGN_KEYS_VAR, "off"),
            (LOG_STATEMENTS_VAR, "0"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite://app.db");
        assert!(!config.foreign_keys);
        assert!(!config.log_statements);
        assert!(config.create_if_missing);
    }

    #[test]
    fn test_invalid_values() {
        let err = SessionConfig::from_lookup(lookup(&[(FOREIGN_KEYS_VAR, "maybe")])).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));

        let err = SessionConfig::from_lookup(lookup(&[(DATABASE_URL_VAR, "postgres://db")])).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"database_url": "sqlite://x.db"}"#).unwrap();
        assert_eq!(config.database_url, "sqlite://x.db");
        assert!(config.foreign_keys);
    }
}
