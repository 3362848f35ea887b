//! Message and payload types published by the controller

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// MQTT delivery guarantee, configured as the numeric level 0, 1 or 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(format!("QoS must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> Self {
        match qos {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// Telemetry record serialised into the message payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorReading {
    pub device_id: String,
    pub temperature: f64,
    pub status: String,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            device_id: "C-Client-01".to_string(),
            temperature: 24.5,
            status: "OK".to_string(),
        }
    }
}

impl SensorReading {
    /// Serialise to the JSON wire payload
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A fully specified publish request. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    topic: String,
    payload: Vec<u8>,
    qos: QosLevel,
    retained: bool,
}

impl Message {
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        qos: QosLevel,
        retained: bool,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retained,
        }
    }

    /// Build the message for a sensor reading
    pub fn from_reading(
        topic: impl Into<String>,
        reading: &SensorReading,
        qos: QosLevel,
        retained: bool,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, reading.to_payload()?, qos, retained))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload rendered for log output
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn qos(&self) -> QosLevel {
        self.qos
    }

    pub fn retained(&self) -> bool {
        self.retained
    }
}
