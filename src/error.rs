//! Error taxonomy for the publish controller and its broker session
//!
//! Session errors carry numeric codes in the classic MQTT client convention
//! so log output stays comparable with other clients: `-1` generic failure,
//! `-3` disconnected, and the broker's CONNACK return code for refusals.

use crate::publisher::state::ControllerState;
use std::time::Duration;
use thiserror::Error;

/// Generic failure
pub const CODE_FAILURE: i32 = -1;
/// The connection to the broker was lost
pub const CODE_DISCONNECTED: i32 = -3;

/// Errors reported by a [`crate::transport::BrokerSession`]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Connection refused by broker (return code {code})")]
    Refused { code: i32 },
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Client request rejected: {0}")]
    Request(String),
    #[error("Invalid session configuration: {0}")]
    Configuration(String),
}

impl SessionError {
    /// Numeric code for log output and error variants
    pub fn code(&self) -> i32 {
        match self {
            SessionError::Refused { code } => *code,
            SessionError::ConnectionLost(_) => CODE_DISCONNECTED,
            _ => CODE_FAILURE,
        }
    }
}

/// Initial connection failed; the publish loop is never entered
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to connect, return code {code}")]
    ConnectFailed {
        code: i32,
        #[source]
        source: SessionError,
    },
}

impl From<SessionError> for StartupError {
    fn from(source: SessionError) -> Self {
        StartupError::ConnectFailed {
            code: source.code(),
            source,
        }
    }
}

/// Outcome of a single failed publish cycle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PublishError {
    /// Link to the broker is gone; triggers a reconnect
    #[error("Delivery failed, connection lost: {reason}")]
    DeliveryLost { reason: String },
    #[error("Delivery not confirmed within {timeout:?}")]
    DeliveryTimeout { timeout: Duration },
    #[error("Delivery failed, return code {code}: {message}")]
    DeliveryOther { code: i32, message: String },
}

impl PublishError {
    /// Code reported for this failure
    pub fn code(&self) -> i32 {
        match self {
            PublishError::DeliveryLost { .. } => CODE_DISCONNECTED,
            PublishError::DeliveryTimeout { .. } => CODE_FAILURE,
            PublishError::DeliveryOther { code, .. } => *code,
        }
    }
}

impl From<SessionError> for PublishError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::ConnectionLost(reason) => PublishError::DeliveryLost { reason },
            SessionError::Timeout(timeout) => PublishError::DeliveryTimeout { timeout },
            other => PublishError::DeliveryOther {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconnectError {
    #[error("Reconnect failed after {attempts} attempt(s), last return code {code}")]
    Failed { code: i32, attempts: u32 },
    /// Shutdown was requested while reconnecting
    #[error("Reconnect interrupted by shutdown request")]
    Interrupted,
}

/// Errors that end the publish loop
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("Reconnect exhausted: {0}")]
    ReconnectExhausted(#[source] ReconnectError),
    #[error("Publish loop requires a connected session, current state: {state:?}")]
    NotConnected { state: ControllerState },
}

/// Anything that makes a controller run end unsuccessfully
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl ControllerError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ControllerError::Startup(_) => 1,
            ControllerError::Fatal(_) => 2,
        }
    }
}
