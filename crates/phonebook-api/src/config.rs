use std::collections::HashMap;
use std::env;

use phonebook_core::config::{value_or_default, ConfigError, SyncServiceConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub sync: SyncServiceConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PHONEBOOK_API_BIND_ADDR", "127.0.0.1:5050");
        let sync = SyncServiceConfig::from_lookup(&lookup)?;
        Ok(Self { bind_addr, sync })
    }
}
