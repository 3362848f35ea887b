//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading: defaults, overrides,
//! and rejection of values the publisher cannot run with.

use sensor_publisher::config::{ConfigError, PublisherConfig};
use sensor_publisher::publisher::{ControllerSettings, QosLevel};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtts://broker.example.com:8883"
client_id = "greenhouse-7"
keep_alive_secs = 45
ca_file = "/etc/ssl/broker-ca.pem"

[publish]
topic = "greenhouse/7/climate"
qos = 2
retain = true
interval_secs = 5

[payload]
device_id = "greenhouse-7"
temperature = 19.25
status = "DEGRADED"
"#,
    );

    let config = PublisherConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.broker_url, "mqtts://broker.example.com:8883");
    assert_eq!(config.mqtt.client_id, "greenhouse-7");
    assert_eq!(config.mqtt.keep_alive_secs, 45);
    assert_eq!(config.mqtt.ca_file, PathBuf::from("/etc/ssl/broker-ca.pem"));
    assert_eq!(config.publish.topic, "greenhouse/7/climate");
    assert_eq!(config.publish.qos, QosLevel::ExactlyOnce);
    assert!(config.publish.retain);
    assert_eq!(config.publish.interval_secs, 5);
    assert_eq!(config.payload.device_id, "greenhouse-7");
    assert_eq!(config.payload.temperature, 19.25);
    assert_eq!(config.payload.status, "DEGRADED");
}

#[test]
fn test_missing_sections_fall_back_to_reference_values() {
    let temp_file = write_config(
        r#"
[publish]
interval_secs = 10
"#,
    );

    let config = PublisherConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.publish.interval_secs, 10);
    assert_eq!(config.publish.topic, "sensor/data");
    assert_eq!(config.publish.qos, QosLevel::AtLeastOnce);
    assert_eq!(config.mqtt, PublisherConfig::default().mqtt);
    assert_eq!(config.reconnect.max_attempts, 1);
    assert_eq!(config.payload.device_id, "C-Client-01");
}

#[test]
fn test_reference_defaults() {
    let config = PublisherConfig::default();

    assert_eq!(config.mqtt.broker_url, "mqtts://host.docker.internal:8883");
    assert_eq!(config.mqtt.client_id, "C-Publisher-Test");
    assert_eq!(config.mqtt.keep_alive_secs, 20);
    assert!(config.mqtt.clean_session);
    assert_eq!(
        config.mqtt.ca_file,
        Path::new("/work/docker/mosquitto-certs/ca.crt")
    );
    assert_eq!(config.publish.interval_secs, 30);
    assert_eq!(config.publish.delivery_timeout_ms, 10_000);
    assert_eq!(config.publish.disconnect_timeout_ms, 10_000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_settings_follow_configured_timings() {
    let temp_file = write_config(
        r#"
[publish]
interval_secs = 2
delivery_timeout_ms = 1500
disconnect_timeout_ms = 250

[reconnect]
max_attempts = 4
backoff_pattern_ms = [100, 200]
sustained_delay_ms = 800
"#,
    );

    let config = PublisherConfig::load_from_file(temp_file.path()).unwrap();
    let settings = ControllerSettings::from_config(&config).unwrap();

    assert_eq!(settings.schedule.interval(), Duration::from_secs(2));
    assert_eq!(settings.delivery_timeout, Duration::from_millis(1500));
    assert_eq!(settings.disconnect_timeout, Duration::from_millis(250));
    assert_eq!(settings.reconnect.max_attempts, 4);
    assert_eq!(settings.reconnect.calculate_max_total_time(), 100 + 200 + 800 + 800);
}

#[test]
fn test_missing_file_is_a_read_error() {
    let result = PublisherConfig::load_from_file(Path::new("/nonexistent/publisher.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_rejected() {
    let temp_file = write_config("[publish\ntopic = ");
    let result = PublisherConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_qos_is_rejected() {
    let result = PublisherConfig::from_toml_str("[publish]\nqos = 3\n");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_wildcard_topic_is_rejected() {
    for topic in ["sensor/#", "sensor/+/data", ""] {
        let document = format!("[publish]\ntopic = \"{topic}\"\n");
        let result = PublisherConfig::from_toml_str(&document);
        assert!(
            matches!(result, Err(ConfigError::InvalidTopic(_))),
            "topic {topic:?} should be rejected"
        );
    }
}

#[test]
fn test_unsupported_broker_scheme_is_rejected() {
    let result = PublisherConfig::from_toml_str("[mqtt]\nbroker_url = \"http://broker:8883\"\n");
    assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));

    let result = PublisherConfig::from_toml_str("[mqtt]\nbroker_url = \"not a url\"\n");
    assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));
}

#[test]
fn test_disabling_certificate_verification_is_rejected() {
    let result = PublisherConfig::from_toml_str("[mqtt]\nverify_server_cert = false\n");
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_zero_values_are_rejected() {
    for document in [
        "[publish]\ninterval_secs = 0\n",
        "[publish]\ndelivery_timeout_ms = 0\n",
        "[mqtt]\nconnect_timeout_ms = 0\n",
        "[reconnect]\nmax_attempts = 0\n",
        "[mqtt]\nkeep_alive_secs = 2\n",
    ] {
        let result = PublisherConfig::from_toml_str(document);
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "{document:?} should be rejected"
        );
    }
}

#[test]
fn test_rendered_config_is_a_loadable_file() {
    let mut config = PublisherConfig::default();
    config.publish.topic = "greenhouse/7/climate".to_string();
    config.reconnect.backoff_pattern_ms = vec![100, 200];

    let rendered = config.to_toml_string().unwrap();
    assert!(rendered.trim_start().starts_with("[mqtt]"));

    // Redirected output must load back as the same configuration
    let temp_file = write_config(&rendered);
    let reloaded = PublisherConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_example_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("publisher.example.toml");
    let config = PublisherConfig::load_from_file(&path).unwrap();
    assert_eq!(config, PublisherConfig::default());
}
