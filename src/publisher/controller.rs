//! Resilient publish loop controller
//!
//! Owns the broker session and drives connect, publish / wait cycling,
//! reconnect on a lost link, and shutdown. Everything runs on the caller's
//! task; the only outside input is the [`ShutdownSignal`].

use super::message::Message;
use super::reconnect::{ReconnectPolicy, ReconnectionDecision};
use super::schedule::Schedule;
use super::shutdown::ShutdownSignal;
use super::state::{ControllerState, LifecycleEvent, StateMachine};
use crate::config::{ConfigError, PublisherConfig};
use crate::error::{
    ControllerError, FatalError, PublishError, ReconnectError, StartupError, CODE_FAILURE,
};
use crate::transport::{BrokerSession, DeliveryToken};
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// Timing and retry settings for the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub schedule: Schedule,
    pub delivery_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            schedule: Schedule::default(),
            delivery_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &PublisherConfig) -> Result<Self, ConfigError> {
        let schedule = Schedule::new(Duration::from_secs(config.publish.interval_secs))
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        let reconnect = config.reconnect.to_policy();
        reconnect.validate().map_err(ConfigError::InvalidConfig)?;

        Ok(Self {
            schedule,
            delivery_timeout: Duration::from_millis(config.publish.delivery_timeout_ms),
            disconnect_timeout: Duration::from_millis(config.publish.disconnect_timeout_ms),
            reconnect,
        })
    }
}

/// Counters reported when the controller shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
    pub reconnects: u64,
}

pub struct PublishController<S: BrokerSession> {
    session: S,
    message: Message,
    settings: ControllerSettings,
    shutdown: ShutdownSignal,
    state: ControllerState,
    stats: PublishStats,
    released: bool,
}

impl<S: BrokerSession> PublishController<S> {
    pub fn new(
        session: S,
        message: Message,
        settings: ControllerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            session,
            message,
            settings,
            shutdown,
            state: ControllerState::Idle,
            stats: PublishStats::default(),
            released: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Apply a lifecycle event; refused transitions leave the state untouched
    fn apply(&mut self, event: LifecycleEvent) -> bool {
        match StateMachine::next_state(&self.state, event) {
            Some(next) => {
                StateMachine::log_transition(&self.state, &next);
                self.state = next;
                true
            }
            None => {
                debug!("Ignoring {:?} in state {:?}", event, self.state);
                false
            }
        }
    }

    /// Start, loop until shutdown or a fatal error, then release the session.
    /// The session is released on every path, including startup failure.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        let span = crate::lifecycle_span!(component = "publisher", topic = %self.message.topic());
        let result: Result<(), ControllerError> = async {
            self.start().await?;
            self.run_loop().await?;
            Ok(())
        }
        .instrument(span.clone())
        .await;

        self.shutdown().instrument(span).await;
        result
    }

    /// Establish the initial connection
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.state != ControllerState::Idle {
            warn!("start() called in state {:?}, ignoring", self.state);
            return Ok(());
        }

        match self.session.connect().await {
            Ok(()) => {
                self.apply(LifecycleEvent::Started);
                Ok(())
            }
            Err(e) => {
                error!(code = e.code(), "Failed to connect to broker: {}", e);
                self.apply(LifecycleEvent::StartFailed);
                Err(StartupError::from(e))
            }
        }
    }

    /// Publish / wait cycling until shutdown is requested or reconnecting fails
    pub async fn run_loop(&mut self) -> Result<(), FatalError> {
        if self.state != ControllerState::Connected {
            return Err(FatalError::NotConnected { state: self.state });
        }

        info!(
            topic = %self.message.topic(),
            interval_secs = self.settings.schedule.interval().as_secs(),
            "Publishing on schedule until interrupted"
        );

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            self.publish_cycle().await?;

            if self.shutdown.is_triggered() {
                break;
            }

            self.wait_for_next_cycle().await;
        }

        info!("Shutdown requested, leaving publish loop");
        self.apply(LifecycleEvent::ShutdownObserved);
        Ok(())
    }

    /// One publish attempt plus its failure handling
    async fn publish_cycle(&mut self) -> Result<(), FatalError> {
        match self.publish_once().await {
            Ok(token) => {
                self.stats.delivered += 1;
                info!(token = %token, "Message with delivery token {} delivered", token);
            }
            Err(PublishError::DeliveryLost { reason }) => {
                self.stats.failed += 1;
                warn!(
                    code = crate::error::CODE_DISCONNECTED,
                    "Failed to send message, connection lost: {}", reason
                );
                self.apply(LifecycleEvent::ConnectionLost);

                match self.reconnect().await {
                    Ok(()) | Err(ReconnectError::Interrupted) => {}
                    Err(e) => {
                        error!("Reconnect failed, terminating: {}", e);
                        return Err(FatalError::ReconnectExhausted(e));
                    }
                }
            }
            Err(other) => {
                // Static payload: the next cycle publishes the same message again
                self.stats.failed += 1;
                warn!(code = other.code(), "Failed to send message: {}", other);
            }
        }
        Ok(())
    }

    async fn publish_once(&mut self) -> Result<DeliveryToken, PublishError> {
        let token = self.session.publish(&self.message).await?;
        self.stats.published += 1;
        info!(
            topic = %self.message.topic(),
            payload = %self.message.payload_lossy(),
            token = %token,
            "Published message"
        );

        self.session
            .await_delivery(token, self.settings.delivery_timeout)
            .await?;
        Ok(token)
    }

    /// Reconnect according to the policy. With the default policy this is a
    /// single immediate attempt.
    pub async fn reconnect(&mut self) -> Result<(), ReconnectError> {
        let mut attempts = 0u32;
        let mut last_code = CODE_FAILURE;
        info!(
            max_attempts = self.settings.reconnect.max_attempts,
            max_backoff_ms = self.settings.reconnect.calculate_max_total_time(),
            "Reconnecting to broker"
        );

        loop {
            let decision = self
                .settings
                .reconnect
                .decide(attempts, self.shutdown.is_triggered());

            match decision {
                ReconnectionDecision::Proceed { attempt, delay } => {
                    attempts = attempt;
                    self.apply(LifecycleEvent::ReconnectAttempt(attempt));

                    if !delay.is_zero() {
                        debug!(
                            attempt,
                            delay_ms = (delay.as_millis() as u64),
                            "Backing off before reconnect"
                        );
                        if !self.interruptible_sleep(delay).await {
                            continue;
                        }
                    }

                    info!(
                        attempt,
                        max_attempts = self.settings.reconnect.max_attempts,
                        "Attempting to reconnect to broker"
                    );
                    match self.session.reconnect().await {
                        Ok(()) => {
                            self.stats.reconnects += 1;
                            self.apply(LifecycleEvent::Reconnected);
                            return Ok(());
                        }
                        Err(e) => {
                            last_code = e.code();
                            warn!(attempt, code = last_code, "Reconnect attempt failed: {}", e);
                        }
                    }
                }
                ReconnectionDecision::AbortShutdownRequested => {
                    info!("Shutdown requested, abandoning reconnect");
                    self.apply(LifecycleEvent::ShutdownObserved);
                    return Err(ReconnectError::Interrupted);
                }
                ReconnectionDecision::AbortMaxAttemptsExceeded => {
                    self.apply(LifecycleEvent::ReconnectFailed);
                    return Err(ReconnectError::Failed {
                        code: last_code,
                        attempts,
                    });
                }
            }
        }
    }

    /// Sleep unless shutdown is requested first.
    /// Returns true if the sleep completed.
    async fn interruptible_sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.wait() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Inter-publish wait; the session keeps the link serviced meanwhile
    async fn wait_for_next_cycle(&mut self) {
        let interval = self.settings.schedule.interval();
        info!("Waiting {:?} until next publish", interval);

        tokio::select! {
            _ = self.session.idle(interval) => {}
            _ = self.shutdown.wait() => {
                debug!("Wait cut short by shutdown request");
            }
        }
    }

    /// Disconnect and release the session. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.released {
            debug!("Shutdown already completed");
            return;
        }
        self.released = true;
        if !self.state.is_terminated() {
            self.apply(LifecycleEvent::ShutdownObserved);
        }

        info!("Disconnecting from broker");
        if let Err(e) = self.session.disconnect(self.settings.disconnect_timeout).await {
            warn!("Disconnect did not complete cleanly: {}", e);
        }

        info!(
            published = self.stats.published,
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            reconnects = self.stats.reconnects,
            "Publisher stopped"
        );
    }
}
