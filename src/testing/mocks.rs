//! Mock broker session for testing
//!
//! Results are scripted per operation and consumed in order; once a script
//! runs dry the operation succeeds. Every call is recorded so tests can
//! assert on the exact sequence the controller produced.

use crate::error::SessionError;
use crate::publisher::message::Message;
use crate::publisher::shutdown::ShutdownSignal;
use crate::transport::{BrokerSession, DeliveryToken};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A call made against the mock session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Connect,
    Reconnect,
    Publish(DeliveryToken),
    /// Publish refused by a scripted error; no token was issued
    PublishRejected,
    AwaitDelivery(DeliveryToken),
    Idle(Duration),
    Disconnect,
}

#[derive(Debug, Default)]
struct MockState {
    connect_results: VecDeque<Result<(), SessionError>>,
    reconnect_results: VecDeque<Result<(), SessionError>>,
    publish_results: VecDeque<Result<(), SessionError>>,
    delivery_results: VecDeque<Result<(), SessionError>>,
    disconnect_result: Option<SessionError>,
    calls: Vec<SessionCall>,
    published: Vec<Message>,
    next_token: u64,
    idle_count: usize,
    delivery_count: usize,
    shutdown_on_idle: Option<(usize, ShutdownSignal)>,
    shutdown_on_delivery: Option<(usize, ShutdownSignal)>,
    idle_blocks: bool,
}

/// Scripted [`BrokerSession`]; clones share the same script and call log
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_connect_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.state().connect_results.extend(results);
        self
    }

    pub fn with_reconnect_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.state().reconnect_results.extend(results);
        self
    }

    pub fn with_publish_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.state().publish_results.extend(results);
        self
    }

    pub fn with_delivery_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.state().delivery_results.extend(results);
        self
    }

    pub fn with_disconnect_failure(self, error: SessionError) -> Self {
        self.state().disconnect_result = Some(error);
        self
    }

    /// Make `idle` sleep for the full duration instead of returning at once
    pub fn with_blocking_idle(self) -> Self {
        self.state().idle_blocks = true;
        self
    }

    /// Trigger `signal` during the `nth` idle call (1-based)
    pub fn trigger_shutdown_on_idle(self, nth: usize, signal: ShutdownSignal) -> Self {
        self.state().shutdown_on_idle = Some((nth, signal));
        self
    }

    /// Trigger `signal` during the `nth` delivery wait (1-based)
    pub fn trigger_shutdown_on_delivery(self, nth: usize, signal: ShutdownSignal) -> Self {
        self.state().shutdown_on_delivery = Some((nth, signal));
        self
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.state().calls.clone()
    }

    pub fn published_messages(&self) -> Vec<Message> {
        self.state().published.clone()
    }

    pub fn count(&self, matches: impl Fn(&SessionCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn connect_calls(&self) -> usize {
        self.count(|call| *call == SessionCall::Connect)
    }

    pub fn reconnect_calls(&self) -> usize {
        self.count(|call| *call == SessionCall::Reconnect)
    }

    /// Publishes accepted by the session (rejections are not counted)
    pub fn publish_calls(&self) -> usize {
        self.count(|call| matches!(call, SessionCall::Publish(_)))
    }

    pub fn idle_calls(&self) -> usize {
        self.count(|call| matches!(call, SessionCall::Idle(_)))
    }

    pub fn disconnect_calls(&self) -> usize {
        self.count(|call| *call == SessionCall::Disconnect)
    }
}

#[async_trait]
impl BrokerSession for MockSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::Connect);
        state.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn reconnect(&mut self) -> Result<(), SessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::Reconnect);
        state.reconnect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn publish(&mut self, message: &Message) -> Result<DeliveryToken, SessionError> {
        let mut state = self.state();
        if let Some(Err(error)) = state.publish_results.pop_front() {
            state.calls.push(SessionCall::PublishRejected);
            return Err(error);
        }

        state.next_token += 1;
        let token = DeliveryToken(state.next_token);
        state.calls.push(SessionCall::Publish(token));
        state.published.push(message.clone());
        Ok(token)
    }

    async fn await_delivery(
        &mut self,
        token: DeliveryToken,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::AwaitDelivery(token));
        state.delivery_count += 1;

        if let Some((nth, signal)) = &state.shutdown_on_delivery {
            if *nth == state.delivery_count {
                signal.trigger();
            }
        }

        state.delivery_results.pop_front().unwrap_or(Ok(()))
    }

    async fn idle(&mut self, duration: Duration) {
        let blocks = {
            let mut state = self.state();
            state.calls.push(SessionCall::Idle(duration));
            state.idle_count += 1;

            if let Some((nth, signal)) = &state.shutdown_on_idle {
                if *nth == state.idle_count {
                    signal.trigger();
                }
            }
            state.idle_blocks
        };

        if blocks {
            tokio::time::sleep(duration).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    async fn disconnect(&mut self, _timeout: Duration) -> Result<(), SessionError> {
        let mut state = self.state();
        state.calls.push(SessionCall::Disconnect);
        match state.disconnect_result.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
