//! Test helpers and utilities for integration tests

use sensor_publisher::publisher::{
    ControllerSettings, Message, PublishController, QosLevel, ReconnectPolicy, Schedule,
    SensorReading, ShutdownSignal,
};
use sensor_publisher::testing::MockSession;
use std::time::Duration;

/// The reference sensor reading published on `sensor/data`
#[allow(dead_code)]
pub fn reference_message() -> Message {
    Message::from_reading(
        "sensor/data",
        &SensorReading::default(),
        QosLevel::AtLeastOnce,
        false,
    )
    .unwrap()
}

/// Settings with short timings so tests never sleep for real
#[allow(dead_code)]
pub fn fast_settings() -> ControllerSettings {
    ControllerSettings {
        schedule: Schedule::new(Duration::from_millis(30)).unwrap(),
        delivery_timeout: Duration::from_millis(100),
        disconnect_timeout: Duration::from_millis(100),
        reconnect: ReconnectPolicy::single_attempt(),
    }
}

/// Controller over a clone of `session`, so the test keeps access to the call log
#[allow(dead_code)]
pub fn controller_for(
    session: &MockSession,
    settings: ControllerSettings,
    shutdown: &ShutdownSignal,
) -> PublishController<MockSession> {
    PublishController::new(
        session.clone(),
        reference_message(),
        settings,
        shutdown.clone(),
    )
}
