//! Sensor Publisher
//!
//! A resilient MQTT telemetry publisher: connects to a broker over TLS,
//! publishes a sensor reading on a fixed interval, reconnects when the link
//! is lost, and shuts down cleanly on SIGINT / SIGTERM.
//!
//! # Overview
//!
//! - [`publisher::PublishController`] drives the lifecycle
//! - [`transport::BrokerSession`] is the seam to the MQTT client library,
//!   implemented by [`transport::mqtt::MqttSession`] on top of `rumqttc`
//! - [`config::PublisherConfig`] loads the TOML configuration
//!
//! # Quick Start
//!
//! ```rust
//! use sensor_publisher::publisher::{
//!     ControllerSettings, Message, PublishController, QosLevel, SensorReading, ShutdownSignal,
//! };
//! use sensor_publisher::testing::MockSession;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let shutdown = ShutdownSignal::new();
//! let session = MockSession::new().trigger_shutdown_on_idle(1, shutdown.clone());
//! let message = Message::from_reading(
//!     "sensor/data",
//!     &SensorReading::default(),
//!     QosLevel::AtLeastOnce,
//!     false,
//! )
//! .unwrap();
//!
//! let mut controller =
//!     PublishController::new(session, message, ControllerSettings::default(), shutdown);
//! controller.run().await.unwrap();
//! assert_eq!(controller.stats().delivered, 1);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod publisher;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, PublisherConfig};
pub use error::{ControllerError, FatalError, PublishError, ReconnectError, SessionError, StartupError};
pub use publisher::{PublishController, ShutdownSignal};
pub use transport::mqtt::MqttSession;
