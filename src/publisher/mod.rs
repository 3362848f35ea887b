//! Publish loop controller and its domain types
//!
//! - [`controller`] - Lifecycle driver: connect, publish / wait, reconnect, shutdown
//! - [`message`] - Immutable publish request and the sensor payload
//! - [`reconnect`] - Attempt budget and backoff schedule
//! - [`schedule`] - Interval between publishes
//! - [`shutdown`] - Process-wide shutdown flag and signal listener
//! - [`state`] - Pure lifecycle state machine

pub mod controller;
pub mod message;
pub mod reconnect;
pub mod schedule;
pub mod shutdown;
pub mod state;

pub use controller::{ControllerSettings, PublishController, PublishStats};
pub use message::{Message, QosLevel, SensorReading};
pub use reconnect::{ReconnectPolicy, ReconnectionDecision};
pub use schedule::Schedule;
pub use shutdown::{spawn_signal_listener, ShutdownSignal};
pub use state::{ControllerState, LifecycleEvent, StateMachine, Termination};
