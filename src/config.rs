//! Startup configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags. Every field has a default, so an empty or missing file
//! is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_CLIENT_ID, KEEP_ALIVE_SECS, MAX_SAMPLES,
};
use crate::error::{MonitorError, Result};
use crate::window::Topics;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub topics: Topics,
    pub window: WindowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            keep_alive_secs: KEEP_ALIVE_SECS,
        }
    }
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of samples kept on screen.
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_SAMPLES,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub light_topic: Option<String>,
    pub presence_topic: Option<String>,
    pub capacity: Option<usize>,
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "Config file not found at '{}'; using defaults.",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| MonitorError::Config(format!("TOML parse error: {e}")))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.broker.host = host;
        }
        if let Some(port) = overrides.port {
            self.broker.port = port;
        }
        if let Some(client_id) = overrides.client_id {
            self.broker.client_id = client_id;
        }
        if let Some(light) = overrides.light_topic {
            self.topics.light = light;
        }
        if let Some(presence) = overrides.presence_topic {
            self.topics.presence = presence;
        }
        if let Some(capacity) = overrides.capacity {
            self.window.capacity = capacity;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.host.trim().is_empty() {
            return Err(MonitorError::Config("broker host must not be empty".into()));
        }
        if self.broker.keep_alive_secs < 5 {
            return Err(MonitorError::Config("keep-alive must be at least 5 seconds".into()));
        }
        if self.window.capacity == 0 {
            return Err(MonitorError::Config("window capacity must be at least 1".into()));
        }
        if self.topics.light.is_empty() || self.topics.presence.is_empty() {
            return Err(MonitorError::Config("topic names must not be empty".into()));
        }
        if self.topics.light == self.topics.presence {
            return Err(MonitorError::Config(format!(
                "light and presence topics are both '{}'",
                self.topics.light
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{TOPIC_LIGHT, TOPIC_PRESENCE};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.broker.host, "broker.hivemq.com");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.topics.light, TOPIC_LIGHT);
        assert_eq!(config.topics.presence, TOPIC_PRESENCE);
        assert_eq!(config.window.capacity, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [broker]
            host = "localhost"

            [topics]
            presence = "/lab/pir"
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.topics.light, TOPIC_LIGHT);
        assert_eq!(config.topics.presence, "/lab/pir");
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = Config::from_toml("[broker]\nport = \"not a port\"").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("room-monitor-does-not-exist.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("room-monitor-config-test.toml");
        std::fs::write(&path, "[window]\ncapacity = 5\n").unwrap();
        let config = Config::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.window.capacity, 5);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::from_toml("[broker]\nhost = \"from-file\"\nport = 1884").unwrap();
        config.apply(Overrides {
            host: Some("from-cli".into()),
            capacity: Some(50),
            ..Default::default()
        });
        assert_eq!(config.broker.host, "from-cli");
        assert_eq!(config.broker.port, 1884);
        assert_eq!(config.window.capacity, 50);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.window.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.topics.presence = config.topics.light.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broker.host = " ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broker.keep_alive_secs = 1;
        assert!(config.validate().is_err());
    }
}
