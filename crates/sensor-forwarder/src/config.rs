// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Forwarder configuration.
//!
//! Loaded from TOML. Every field has a default, so a minimal file only
//! names the destinations to enable.

use crate::decoder::PayloadEncoding;
use crate::dispatcher::{DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Forwarder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Instance name (for identification).
    #[serde(default = "default_name")]
    pub name: String,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Payload encoding of the uplinks.
    #[serde(default)]
    pub encoding: PayloadEncoding,

    /// Task queue capacity per destination.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown keeps draining the queues (seconds).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Statistics reporting interval (seconds, 0 disables).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default = "LuftdatenConfig::disabled")]
    pub luftdaten: LuftdatenConfig,

    #[serde(default = "FeinStaubConfig::disabled")]
    pub feinstaub: FeinStaubConfig,

    #[serde(default = "OpenSenseConfig::disabled")]
    pub opensense: OpenSenseConfig,

    #[serde(default)]
    pub attributes: AttributesConfig,
}

fn default_name() -> String {
    "sensor-forwarder".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_secs()
}

fn default_stats_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            encoding: PayloadEncoding::Rudzl,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_secs: default_shutdown_timeout(),
            stats_interval_secs: default_stats_interval(),
            mqtt: MqttConfig::default(),
            luftdaten: LuftdatenConfig::default(),
            feinstaub: FeinStaubConfig::default(),
            opensense: OpenSenseConfig::default(),
            attributes: AttributesConfig::default(),
        }
    }
}

impl ForwarderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.encoding.is_supported() {
            return Err(ConfigError::Invalid(format!(
                "Unsupported payload encoding '{}'",
                self.encoding
            )));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }

        let destinations = [
            ("luftdaten", self.luftdaten.enabled, &self.luftdaten.url, self.luftdaten.timeout_secs),
            ("feinstaub", self.feinstaub.enabled, &self.feinstaub.url, self.feinstaub.timeout_secs),
            ("opensense", self.opensense.enabled, &self.opensense.url, self.opensense.timeout_secs),
        ];

        if !destinations.iter().any(|(_, enabled, _, _)| *enabled) {
            return Err(ConfigError::Invalid("No destination enabled".into()));
        }

        for (name, enabled, url, timeout) in destinations {
            if !enabled {
                continue;
            }
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("[{}] url is empty", name)));
            }
            if timeout == 0 {
                return Err(ConfigError::Invalid(format!(
                    "[{}] timeout_secs must be > 0",
                    name
                )));
            }
        }

        if self.opensense.enabled && self.opensense.attribute.trim().is_empty() {
            return Err(ConfigError::Invalid("[opensense] attribute is empty".into()));
        }

        if self.mqtt.enabled {
            if self.mqtt.host.trim().is_empty() {
                return Err(ConfigError::Invalid("[mqtt] host is empty".into()));
            }
            if self.mqtt.topic.trim().is_empty() {
                return Err(ConfigError::Invalid("[mqtt] topic is empty".into()));
            }
        }

        if self.attributes.file.is_some() && self.attributes.refresh_secs == 0 {
            return Err(ConfigError::Invalid(
                "[attributes] refresh_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Names of the enabled destinations.
    pub fn enabled_destinations(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.luftdaten.enabled {
            names.push("luftdaten");
        }
        if self.feinstaub.enabled {
            names.push("feinstaub");
        }
        if self.opensense.enabled {
            names.push("opensense");
        }
        names
    }
}

/// MQTT broker connection (TTN v2 application).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Application id (MQTT user name).
    #[serde(default)]
    pub app_id: String,

    /// Application access key (MQTT password).
    #[serde(default)]
    pub app_key: String,

    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_host() -> String {
    "eu.thethings.network".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "+/devices/+/up".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            app_id: String::new(),
            app_key: String::new(),
            topic: default_mqtt_topic(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Luftdaten push API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuftdatenConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_luftdaten_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// `X-Pin` header value.
    #[serde(default = "default_pin")]
    pub pin: u16,
}

fn default_luftdaten_url() -> String {
    "https://api.luftdaten.info".to_string()
}

fn default_pin() -> u16 {
    crate::adapter::luftdaten::DEFAULT_PIN
}

impl Default for LuftdatenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_luftdaten_url(),
            timeout_secs: default_timeout(),
            pin: default_pin(),
        }
    }
}

impl LuftdatenConfig {
    fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// FeinStaub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeinStaubConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_feinstaub_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_feinstaub_url() -> String {
    "https://api-rrd.madavi.de".to_string()
}

impl Default for FeinStaubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_feinstaub_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl FeinStaubConfig {
    fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// openSenseMap API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSenseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_opensense_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Device attribute holding the box id.
    #[serde(default = "default_opensense_attribute")]
    pub attribute: String,
}

fn default_opensense_url() -> String {
    "https://api.opensensemap.org".to_string()
}

fn default_opensense_attribute() -> String {
    crate::adapter::opensense::DEFAULT_ROUTING_ATTRIBUTE.to_string()
}

impl Default for OpenSenseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_opensense_url(),
            timeout_secs: default_timeout(),
            attribute: default_opensense_attribute(),
        }
    }
}

impl OpenSenseConfig {
    fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Device attribute file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributesConfig {
    /// TOML file with `[devices."<id>"]` tables.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Reload interval (seconds).
    #[serde(default = "default_refresh")]
    pub refresh_secs: u64,
}

fn default_refresh() -> u64 {
    300
}

impl Default for AttributesConfig {
    fn default() -> Self {
        Self {
            file: None,
            refresh_secs: default_refresh(),
        }
    }
}

impl AttributesConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ForwarderConfig::default();
        config.validate().expect("default config valid");
        assert_eq!(
            config.enabled_destinations(),
            vec!["luftdaten", "feinstaub", "opensense"]
        );
    }

    #[test]
    fn test_minimal_file() {
        let config = ForwarderConfig::from_toml_str(
            r#"
            [feinstaub]
            url = "http://localhost:8080"
            "#,
        )
        .expect("parse");

        assert_eq!(config.encoding, PayloadEncoding::Rudzl);
        assert_eq!(config.enabled_destinations(), vec!["feinstaub"]);
        assert_eq!(config.feinstaub.timeout(), Duration::from_secs(20));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(config.mqtt.topic, "+/devices/+/up");
    }

    #[test]
    fn test_no_destination() {
        let err = ForwarderConfig::from_toml_str("name = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unsupported_encoding_rejected() {
        let err = ForwarderConfig::from_toml_str(
            r#"
            encoding = "cayenne"
            [luftdaten]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cayenne"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ForwarderConfig::from_toml_str(
            r#"
            [opensense]
            timeout_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("opensense"));
    }

    #[test]
    fn test_toml_roundtrip_of_default() {
        let text = ForwarderConfig::default().to_toml_string().expect("serialize");
        let parsed = ForwarderConfig::from_toml_str(&text).expect("parse");
        assert_eq!(parsed.opensense.attribute, "opensense-id");
        assert_eq!(parsed.luftdaten.pin, 1);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("forwarder.toml");
        std::fs::write(
            &path,
            r#"
            encoding = "rudzl"
            queue_capacity = 8
            shutdown_timeout_secs = 3

            [mqtt]
            enabled = false

            [opensense]
            url = "http://127.0.0.1:1234"

            [attributes]
            file = "devices.toml"
            refresh_secs = 30
            "#,
        )
        .expect("write");

        let config = ForwarderConfig::from_file(&path).expect("load");
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
        assert!(!config.mqtt.enabled);
        assert_eq!(config.attributes.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.enabled_destinations(), vec!["opensense"]);
    }
}
