//! Pure connection configuration for the MQTT session
//!
//! Builds `rumqttc` options from the `[mqtt]` configuration section. Options
//! are rebuilt for every connection attempt so credential and trust store
//! changes are picked up on reconnect.

use crate::config::MqttSection;
use crate::error::SessionError;
use crate::publisher::message::QosLevel;
use rumqttc::{MqttOptions, QoS, TlsConfiguration, Transport};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while building connection options
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Failed to read CA file {}: {source}", path.display())]
    TrustStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<MqttError> for SessionError {
    fn from(error: MqttError) -> Self {
        match error {
            MqttError::InvalidBrokerUrl(_) => SessionError::Configuration(error.to_string()),
            MqttError::TrustStore { .. } => SessionError::Tls(error.to_string()),
        }
    }
}

/// Broker address parsed from the configured URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse `mqtts://`, `ssl://`, `mqtt://` or `tcp://` broker URLs
pub fn parse_broker_url(broker_url: &str) -> Result<BrokerEndpoint, MqttError> {
    let url = Url::parse(broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

    let tls = match url.scheme() {
        "mqtts" | "ssl" => true,
        "mqtt" | "tcp" => false,
        _ => return Err(MqttError::InvalidBrokerUrl(broker_url.to_string())),
    };

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(broker_url.to_string()))?
        .to_string();
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok(BrokerEndpoint { host, port, tls })
}

pub fn to_qos(level: QosLevel) -> QoS {
    match level {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Configure MQTT options from config
pub fn configure_mqtt_options(config: &MqttSection) -> Result<MqttOptions, MqttError> {
    let endpoint = parse_broker_url(&config.broker_url)?;
    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), endpoint.host, endpoint.port);

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_session(config.clean_session);

    // The CA chain is the only trust root; the broker certificate is always verified
    if endpoint.tls {
        let ca = std::fs::read(&config.ca_file).map_err(|source| MqttError::TrustStore {
            path: config.ca_file.clone(),
            source,
        })?;
        mqtt_options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: None,
        }));
    }

    // Credentials are optional and resolved from the environment at connect time
    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(username, password);
        }
    }

    Ok(mqtt_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn plain_config() -> MqttSection {
        MqttSection {
            broker_url: "mqtt://localhost:1883".to_string(),
            ..MqttSection::default()
        }
    }

    #[test]
    fn test_parse_tls_schemes_default_to_8883() {
        let endpoint = parse_broker_url("ssl://host.docker.internal").unwrap();
        assert_eq!(endpoint.host, "host.docker.internal");
        assert_eq!(endpoint.port, 8883);
        assert!(endpoint.tls);

        let endpoint = parse_broker_url("mqtts://broker:9883").unwrap();
        assert_eq!(endpoint.port, 9883);
        assert!(endpoint.tls);
    }

    #[test]
    fn test_parse_plain_schemes_default_to_1883() {
        let endpoint = parse_broker_url("tcp://localhost").unwrap();
        assert_eq!(endpoint.port, 1883);
        assert!(!endpoint.tls);
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(matches!(
            parse_broker_url("ws://localhost:9001"),
            Err(MqttError::InvalidBrokerUrl(_))
        ));
        assert!(parse_broker_url("invalid-url").is_err());
    }

    #[test]
    fn test_configure_plain_options() {
        let options = configure_mqtt_options(&plain_config()).unwrap();
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.client_id(), "C-Publisher-Test");
        assert_eq!(options.keep_alive(), Duration::from_secs(20));
        assert!(options.clean_session());
    }

    #[test]
    fn test_configure_tls_reads_ca_file() {
        let mut ca = NamedTempFile::new().unwrap();
        writeln!(ca, "-----BEGIN CERTIFICATE-----").unwrap();

        let config = MqttSection {
            broker_url: "ssl://broker.local:8883".to_string(),
            ca_file: ca.path().to_path_buf(),
            ..MqttSection::default()
        };

        let options = configure_mqtt_options(&config).unwrap();
        assert!(matches!(options.transport(), Transport::Tls(_)));
    }

    #[test]
    fn test_missing_ca_file_is_tls_error() {
        let config = MqttSection {
            broker_url: "mqtts://broker.local".to_string(),
            ca_file: PathBuf::from("/nonexistent/sensor-publisher/ca.crt"),
            ..MqttSection::default()
        };

        let error = configure_mqtt_options(&config).unwrap_err();
        assert!(matches!(error, MqttError::TrustStore { .. }));
        assert!(matches!(SessionError::from(error), SessionError::Tls(_)));
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(to_qos(QosLevel::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(to_qos(QosLevel::AtLeastOnce), QoS::AtLeastOnce);
        assert_eq!(to_qos(QosLevel::ExactlyOnce), QoS::ExactlyOnce);
    }
}
