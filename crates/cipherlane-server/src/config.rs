//! Server configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use cipherlane_core::{ControllerConfig, Principal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Oracle key used when none is configured; development only
pub const DEV_ORACLE_KEY: &[u8] = b"cipherlane-dev-oracle";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Hex-encoded key shared with the decryption oracle
    #[serde(default = "default_oracle_key")]
    pub oracle_key: String,
    /// Serve `/shadow/encrypt` and answer reveals with the in-process relay
    #[serde(default)]
    pub shadow_mode: bool,
    /// Relay poll interval in milliseconds
    #[serde(default = "default_relay_interval_ms")]
    pub relay_interval_ms: u64,
    pub controller: ControllerConfig,
}

fn default_bind() -> SocketAddr {
    ([127, 0, 0, 1], 3000).into()
}

fn default_oracle_key() -> String {
    hex::encode(DEV_ORACLE_KEY)
}

fn default_relay_interval_ms() -> u64 {
    250
}

impl ServerConfig {
    pub fn new(admin: Principal) -> Self {
        Self {
            bind: default_bind(),
            oracle_key: default_oracle_key(),
            shadow_mode: false,
            relay_interval_ms: default_relay_interval_ms(),
            controller: ControllerConfig::new(admin),
        }
    }

    /// Load from a JSON file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ServerError::InvalidRequest(format!("Invalid server config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        if self.oracle_key_bytes()?.is_empty() {
            return Err(ServerError::InvalidRequest("oracle_key must not be empty".into()));
        }
        if self.relay_interval_ms == 0 {
            return Err(ServerError::InvalidRequest("relay_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn oracle_key_bytes(&self) -> Result<Vec<u8>> {
        let key = self.oracle_key.strip_prefix("0x").unwrap_or(&self.oracle_key);
        hex::decode(key).map_err(|e| ServerError::InvalidRequest(format!("Invalid oracle_key hex: {}", e)))
    }

    pub fn relay_interval(&self) -> Duration {
        Duration::from_millis(self.relay_interval_ms)
    }
}
