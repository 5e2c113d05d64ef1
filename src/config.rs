//! Configuration for the device client connection engine
//!
//! The engine recognizes a small, fixed set of options: device identity and
//! the connection tuning knobs (auto-reconnect, backoff bounds, retry
//! ceiling, receive queue capacity). Everything else belongs to collaborators.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub device: DeviceSection,
    #[serde(default)]
    pub connection: ConnectionSection,
}

/// Device identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier registered with the hub
    pub device_id: String,
    /// Module identifier, for multi-endpoint (module) clients
    pub module_id: Option<String>,
}

/// Connection lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    /// Automatically reconnect after an unexpected connection loss
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// First retry delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Per-attempt retry delay cap in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Cumulative elapsed retry time after which the engine gives up,
    /// in milliseconds
    #[serde(default = "default_retry_ceiling_ms")]
    pub retry_ceiling_ms: u64,
    /// Bounded inbound queue capacity, per receive category
    #[serde(default = "default_receive_queue_capacity")]
    pub receive_queue_capacity: usize,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    60_000 // 1 minute per-attempt cap
}

fn default_retry_ceiling_ms() -> u64 {
    600_000 // give up after 10 minutes of cumulative retrying
}

fn default_receive_queue_capacity() -> usize {
    16
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_ceiling_ms: default_retry_ceiling_ms(),
            receive_queue_capacity: default_receive_queue_capacity(),
        }
    }
}

impl ConnectionSection {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn retry_ceiling(&self) -> Duration {
        Duration::from_millis(self.retry_ceiling_ms)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Build a configuration with default connection tuning
    pub fn new<S: Into<String>>(device_id: S) -> Self {
        Self {
            device: DeviceSection {
                device_id: device_id.into(),
                module_id: None,
            },
            connection: ConnectionSection::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.device_id)?;
        if let Some(module_id) = &self.device.module_id {
            validate_device_id(module_id)?;
        }

        let conn = &self.connection;
        if conn.initial_backoff_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "initial_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if conn.max_backoff_ms < conn.initial_backoff_ms {
            return Err(ConfigError::InvalidConfig(
                "max_backoff_ms must be >= initial_backoff_ms".to_string(),
            ));
        }
        if conn.retry_ceiling_ms < conn.max_backoff_ms {
            return Err(ConfigError::InvalidConfig(
                "retry_ceiling_ms must be >= max_backoff_ms".to_string(),
            ));
        }
        if conn.receive_queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "receive_queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    // Hub identity rules: nonempty, [a-zA-Z0-9._-] only
    if device_id.is_empty()
        || !device_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ConfigError::InvalidDeviceId(device_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("device-1");
        assert!(config.connection.auto_reconnect);
        assert_eq!(config.connection.initial_backoff_ms, 500);
        assert_eq!(config.connection.max_backoff_ms, 60_000);
        assert_eq!(config.connection.retry_ceiling_ms, 600_000);
        assert_eq!(config.connection.receive_queue_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [device]
            device_id = "thermostat-042"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.device_id, "thermostat-042");
        assert_eq!(config.device.module_id, None);
        assert!(config.connection.auto_reconnect);
    }

    #[test]
    fn test_parse_full_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [device]
            device_id = "edge-gw"
            module_id = "camera"

            [connection]
            auto_reconnect = false
            initial_backoff_ms = 100
            max_backoff_ms = 5000
            retry_ceiling_ms = 30000
            receive_queue_capacity = 4
            "#,
        )
        .unwrap();
        assert!(!config.connection.auto_reconnect);
        assert_eq!(config.connection.initial_backoff(), Duration::from_millis(100));
        assert_eq!(config.connection.max_backoff(), Duration::from_secs(5));
        assert_eq!(config.connection.retry_ceiling(), Duration::from_secs(30));
        assert_eq!(config.connection.receive_queue_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_device_id() {
        let mut config = ClientConfig::new("bad id!");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDeviceId(_))
        ));
        config.device.device_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_backoff_bounds() {
        let mut config = ClientConfig::new("device-1");
        config.connection.initial_backoff_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("device-1");
        config.connection.max_backoff_ms = 100;
        config.connection.initial_backoff_ms = 500;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("device-1");
        config.connection.retry_ceiling_ms = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut config = ClientConfig::new("device-1");
        config.connection.receive_queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
