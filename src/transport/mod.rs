//! Transport layer between the publish controller and the broker
//!
//! The controller talks to the broker only through [`BrokerSession`], which
//! keeps the control flow testable without a live broker.

use crate::error::SessionError;
use crate::publisher::message::Message;
use std::time::Duration;

pub mod mqtt;

/// Correlation handle for a publish, used to await its confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryToken(pub u64);

impl std::fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker session abstraction
///
/// Implementations own the network link. `disconnect` also releases every
/// resource the session holds; a later `reconnect` builds a fresh link.
#[async_trait::async_trait]
pub trait BrokerSession: Send {
    /// Establish the initial connection
    async fn connect(&mut self) -> Result<(), SessionError>;

    /// Replace a lost link with a new connection (single attempt)
    async fn reconnect(&mut self) -> Result<(), SessionError>;

    /// Queue a message for publishing
    async fn publish(&mut self, message: &Message) -> Result<DeliveryToken, SessionError>;

    /// Wait until the broker confirms delivery of `token`.
    ///
    /// A lost link must be reported as [`SessionError::ConnectionLost`] and
    /// an expired wait as [`SessionError::Timeout`].
    async fn await_delivery(
        &mut self,
        token: DeliveryToken,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Keep the link serviced (keep-alive, late acknowledgements) for `duration`
    async fn idle(&mut self, duration: Duration);

    /// Disconnect, allowing `timeout` for the handshake, and release the link
    async fn disconnect(&mut self, timeout: Duration) -> Result<(), SessionError>;
}
