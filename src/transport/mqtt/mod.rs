//! MQTT broker session built on `rumqttc`
//!
//! # Architecture
//!
//! - [`connection`] - Pure option building (URL, TLS trust store, credentials)
//! - [`delivery`] - Pure event routing and delivery token bookkeeping
//! - [`session`] - Impure I/O driving the client and event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use sensor_publisher::config::MqttSection;
//! use sensor_publisher::transport::{mqtt::MqttSession, BrokerSession};
//!
//! # tokio_test_block_on(async {
//! let mut session = MqttSession::new(MqttSection::default());
//! session.connect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod connection;
pub mod delivery;
pub mod session;

pub use connection::{configure_mqtt_options, parse_broker_url, BrokerEndpoint, MqttError};
pub use delivery::{route_event, DeliveryTracker, EventRoute};
pub use session::MqttSession;
