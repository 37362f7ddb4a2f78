//! Runtime configuration shared by the API server and the CLI.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::is_http_url;

pub const DEFAULT_DB_PATH: &str = "phonebook.db";
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:5050";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the contact store and the sync scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncServiceConfig {
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub sync_enabled: bool,
    pub sync_interval: Duration,
    pub directory_timeout: Duration,
    /// Base for quick-action links in notifications, without trailing slash
    pub app_base_url: String,
}

impl SyncServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path =
            PathBuf::from(value_or_default(&lookup, "PHONEBOOK_DB_PATH", DEFAULT_DB_PATH));
        let lock_path = optional_trimmed(&lookup, "PHONEBOOK_LOCK_PATH").map_or_else(
            || {
                let mut path = db_path.clone().into_os_string();
                path.push(".sync.lock");
                PathBuf::from(path)
            },
            PathBuf::from,
        );

        let sync_enabled =
            parse_bool(&value_or_default(&lookup, "PHONEBOOK_SYNC_ENABLED", "true")).ok_or_else(
                || ConfigError::Invalid("PHONEBOOK_SYNC_ENABLED must be true or false".to_string()),
            )?;

        let interval_minutes = value_or_default(&lookup, "PHONEBOOK_SYNC_INTERVAL_MINUTES", "1")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "PHONEBOOK_SYNC_INTERVAL_MINUTES must be an integer in [1, 1440]".to_string(),
                )
            })?;
        if !(1..=1_440).contains(&interval_minutes) {
            return Err(ConfigError::Invalid(
                "PHONEBOOK_SYNC_INTERVAL_MINUTES must be in [1, 1440]".to_string(),
            ));
        }

        let timeout_secs = value_or_default(&lookup, "PHONEBOOK_DIRECTORY_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "PHONEBOOK_DIRECTORY_TIMEOUT_SECS must be an integer in [1, 300]".to_string(),
                )
            })?;
        if !(1..=300).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "PHONEBOOK_DIRECTORY_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        let app_base_url =
            value_or_default(&lookup, "PHONEBOOK_APP_BASE_URL", DEFAULT_APP_BASE_URL)
                .trim_end_matches('/')
                .to_string();
        if !is_http_url(&app_base_url) {
            return Err(ConfigError::Invalid(
                "PHONEBOOK_APP_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            db_path,
            lock_path,
            sync_enabled,
            sync_interval: Duration::from_secs(interval_minutes * 60),
            directory_timeout: Duration::from_secs(timeout_secs),
            app_base_url,
        })
    }
}

pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
