//! Connection configuration sourced from the process environment.
//!
//! Each value is read once at startup. Nothing is validated or defaulted
//! here: an absent variable becomes an empty string and surfaces later as a
//! connect or open failure reported by the queue manager.

use mq_runtime::{ChannelDefinition, ClientAuth, ConnectOptions, TlsConfig, DEFAULT_CIPHER_SPEC};
use serde::{Deserialize, Serialize};

/// Environment variables that make up a [`DrainConfig`]
pub const ENV_VARS: [&str; 5] = [
    "QUEUE_MANAGER",
    "QUEUE",
    "CHANNEL",
    "CONNECTION_URL",
    "KEY_PATH",
];

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// Connection parameters for one drain run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Target queue manager (`QUEUE_MANAGER`)
    pub queue_manager: String,
    /// Queue to drain (`QUEUE`)
    pub queue: String,
    /// Client channel name (`CHANNEL`)
    pub channel: String,
    /// Listener address of the queue manager (`CONNECTION_URL`)
    pub connection_url: String,
    /// TLS key repository path (`KEY_PATH`)
    pub key_path: String,
}

impl DrainConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars = ENV_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_vars(vars)
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: config::Map<String, String>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::default().source(Some(vars)))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Connect options for a client-binding TLS connection.
    ///
    /// The cipher spec is fixed and a client certificate is optional.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::client(
            ChannelDefinition::new(&self.channel, &self.connection_url)
                .with_cipher_spec(DEFAULT_CIPHER_SPEC)
                .with_client_auth(ClientAuth::Optional),
            TlsConfig::new(&self.key_path),
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
