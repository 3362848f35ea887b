//! Configuration system for the sensor publisher
//!
//! Every field carries a default equal to the reference deployment, so an
//! empty file (or no file at all) reproduces the reference behaviour.

use crate::publisher::message::{QosLevel, SensorReading};
use crate::publisher::reconnect::ReconnectPolicy;
use crate::transport::mqtt::parse_broker_url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main publisher configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublisherConfig {
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub payload: SensorReading,
}

/// MQTT section - broker address, identity and TLS trust material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port (mqtts/ssl for TLS, mqtt/tcp for plain)
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Client identifier presented to the broker
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Ask the broker to discard previous session state
    #[serde(default = "default_true")]
    pub clean_session: bool,
    /// CA certificate chain used as trust root for the broker certificate
    #[serde(default = "default_ca_file")]
    pub ca_file: PathBuf,
    /// Broker certificate validation (must stay enabled)
    #[serde(default = "default_true")]
    pub verify_server_cert: bool,
    /// Upper bound for a single connect or reconnect attempt, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            client_id: default_client_id(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
            clean_session: true,
            ca_file: default_ca_file(),
            verify_server_cert: true,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Publish section - what gets published and how often
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishSection {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: QosLevel,
    #[serde(default)]
    pub retain: bool,
    /// Interval between publish attempts in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// How long to wait for the broker to confirm a delivery
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Linger time granted to the disconnect handshake
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            qos: default_qos(),
            retain: false,
            interval_secs: default_interval(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
        }
    }
}

/// Reconnect section - attempt budget and backoff pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before each attempt in milliseconds (attempt 1 uses the first entry)
    #[serde(default)]
    pub backoff_pattern_ms: Vec<u64>,
    /// Delay to use once the pattern is exhausted
    #[serde(default)]
    pub sustained_delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_pattern_ms: Vec::new(),
            sustained_delay_ms: 0,
        }
    }
}

impl ReconnectSection {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            backoff_pattern: self.backoff_pattern_ms.clone(),
            sustained_delay: self.sustained_delay_ms,
        }
    }
}

fn default_broker_url() -> String {
    "mqtts://host.docker.internal:8883".to_string()
}

fn default_client_id() -> String {
    "C-Publisher-Test".to_string()
}

fn default_keep_alive() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_ca_file() -> PathBuf {
    PathBuf::from("/work/docker/mosquitto-certs/ca.crt")
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_topic() -> String {
    "sensor/data".to_string()
}

fn default_qos() -> QosLevel {
    QosLevel::AtLeastOnce
}

fn default_interval() -> u64 {
    30
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

fn default_disconnect_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    1
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PublisherConfig {
    /// Load configuration from TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PublisherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as a TOML document that loads back unchanged
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check cross-field invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_topic(&self.publish.topic)?;
        validate_broker_url(&self.mqtt.broker_url)?;

        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "client_id must not be empty".to_string(),
            ));
        }
        if !(5..=u64::from(u16::MAX)).contains(&self.mqtt.keep_alive_secs) {
            return Err(ConfigError::InvalidConfig(format!(
                "keep_alive_secs must be between 5 and {}, got {}",
                u16::MAX,
                self.mqtt.keep_alive_secs
            )));
        }
        if !self.mqtt.verify_server_cert {
            return Err(ConfigError::InvalidConfig(
                "verify_server_cert = false is not supported; broker certificates are always validated against ca_file".to_string(),
            ));
        }
        if self.publish.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "interval_secs must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("connect_timeout_ms", self.mqtt.connect_timeout_ms),
            ("delivery_timeout_ms", self.publish.delivery_timeout_ms),
            ("disconnect_timeout_ms", self.publish.disconnect_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        self.reconnect
            .to_policy()
            .validate()
            .map_err(ConfigError::InvalidConfig)
    }
}

/// Topics used for publishing must be non-empty and free of wildcards
fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidTopic("topic must not be empty".to_string()));
    }
    if topic.contains(['#', '+']) {
        return Err(ConfigError::InvalidTopic(format!(
            "'{topic}' contains a wildcard, which is not allowed when publishing"
        )));
    }
    if topic.contains('\0') {
        return Err(ConfigError::InvalidTopic(format!(
            "'{}' contains a NUL character",
            topic.escape_debug()
        )));
    }
    Ok(())
}

/// Same parser the session dials with, so accepted schemes cannot diverge
fn validate_broker_url(broker_url: &str) -> Result<(), ConfigError> {
    parse_broker_url(broker_url)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_reference_defaults() {
        let config = PublisherConfig::from_toml_str("").unwrap();
        assert_eq!(config, PublisherConfig::default());
        assert_eq!(config.mqtt.broker_url, "mqtts://host.docker.internal:8883");
        assert_eq!(config.mqtt.client_id, "C-Publisher-Test");
        assert_eq!(config.mqtt.keep_alive_secs, 20);
        assert!(config.mqtt.clean_session);
        assert_eq!(config.publish.topic, "sensor/data");
        assert_eq!(config.publish.qos, QosLevel::AtLeastOnce);
        assert!(!config.publish.retain);
        assert_eq!(config.publish.interval_secs, 30);
        assert_eq!(config.publish.delivery_timeout_ms, 10_000);
        assert_eq!(config.reconnect.max_attempts, 1);
        assert!(config.reconnect.backoff_pattern_ms.is_empty());
    }

    #[test]
    fn test_full_document() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
client_id = "bench-01"
username_env = "MQTT_USERNAME"
password_env = "MQTT_PASSWORD"
keep_alive_secs = 60
clean_session = false
ca_file = "/etc/ssl/ca.pem"

[publish]
topic = "plant/line1/temp"
qos = 2
retain = true
interval_secs = 5
delivery_timeout_ms = 2500

[reconnect]
max_attempts = 4
backoff_pattern_ms = [100, 200, 400]
sustained_delay_ms = 800

[payload]
device_id = "line1-sensor"
temperature = 19.25
status = "DEGRADED"
"#;

        let config = PublisherConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.mqtt.client_id, "bench-01");
        assert!(!config.mqtt.clean_session);
        assert_eq!(config.mqtt.ca_file, PathBuf::from("/etc/ssl/ca.pem"));
        assert_eq!(config.publish.qos, QosLevel::ExactlyOnce);
        assert!(config.publish.retain);
        assert_eq!(config.publish.interval_secs, 5);
        assert_eq!(config.reconnect.backoff_pattern_ms, vec![100, 200, 400]);
        assert_eq!(config.payload.device_id, "line1-sensor");

        let policy = config.reconnect.to_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.sustained_delay, 800);
    }

    #[test]
    fn test_invalid_qos_rejected_at_parse() {
        let result = PublisherConfig::from_toml_str("[publish]\nqos = 3\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_wildcard_topic_rejected() {
        assert!(validate_topic("sensor/+/data").is_err());
        assert!(validate_topic("sensor/#").is_err());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("sensor/data").is_ok());
    }

    #[test]
    fn test_broker_url_schemes() {
        assert!(validate_broker_url("ssl://host.docker.internal:8883").is_ok());
        assert!(validate_broker_url("mqtts://broker:8883").is_ok());
        assert!(validate_broker_url("tcp://broker:1883").is_ok());
        assert!(validate_broker_url("http://broker:80").is_err());
        assert!(validate_broker_url("not a url").is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = PublisherConfig::from_toml_str("[publish]\ninterval_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_short_keep_alive_rejected() {
        let result = PublisherConfig::from_toml_str("[mqtt]\nkeep_alive_secs = 2\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_keep_alive_must_fit_the_connect_packet() {
        let result = PublisherConfig::from_toml_str("[mqtt]\nkeep_alive_secs = 70000\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));

        let config = PublisherConfig::from_toml_str("[mqtt]\nkeep_alive_secs = 65535\n").unwrap();
        assert_eq!(config.mqtt.keep_alive_secs, 65535);
    }

    #[test]
    fn test_broker_url_validation_agrees_with_session_parser() {
        for url in [
            "mqtts://broker:8883",
            "ssl://broker",
            "mqtt://broker:1883",
            "tcp://broker",
            "ws://broker:80",
            "https://broker",
            "mqtt://",
            "broker:1883",
        ] {
            assert_eq!(
                validate_broker_url(url).is_ok(),
                parse_broker_url(url).is_ok(),
                "validation and parsing disagree on {url}"
            );
        }
    }

    #[test]
    fn test_disabling_certificate_verification_rejected() {
        let result = PublisherConfig::from_toml_str("[mqtt]\nverify_server_cert = false\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("verify_server_cert"));
    }

    #[test]
    fn test_zero_reconnect_attempts_rejected() {
        let result = PublisherConfig::from_toml_str("[reconnect]\nmax_attempts = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }
}
