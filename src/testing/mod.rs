//! Testing utilities and mock implementations
//!
//! Provides a scripted broker session for exercising the publish
//! controller without a live MQTT broker.

pub mod mocks;

pub use mocks::*;
