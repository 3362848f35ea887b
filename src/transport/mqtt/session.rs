//! Impure I/O for the MQTT broker session
//!
//! Drives a `rumqttc` client and event loop from the caller's control flow.
//! Nothing is spawned: the event loop only makes progress while the
//! controller awaits a delivery, idles between publishes, or disconnects.

use super::connection::{configure_mqtt_options, to_qos};
use super::delivery::{route_event, DeliveryTracker, EventRoute};
use crate::config::MqttSection;
use crate::error::SessionError;
use crate::publisher::message::Message;
use crate::transport::{BrokerSession, DeliveryToken};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, EventLoop};
use std::time::Duration;
use tracing::{debug, info, trace, warn, Instrument};

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 10;

/// One live connection: client handle, event loop and its delivery bookkeeping
struct Link {
    client: AsyncClient,
    event_loop: EventLoop,
    tracker: DeliveryTracker,
    /// Set once the event loop reported an error; the link is then unusable
    lost: Option<String>,
}

impl Link {
    fn handle_event(&mut self, event: &rumqttc::Event) -> EventRoute {
        let route = route_event(event);
        trace!(target: "mqtt_transport", "MQTT event: {:?}", route);
        self.tracker.apply(&route);
        route
    }

    fn mark_lost(&mut self, error: ConnectionError) -> SessionError {
        let reason = error.to_string();
        self.lost = Some(reason.clone());
        SessionError::ConnectionLost(reason)
    }

    async fn drive_until_confirmed(&mut self, token: DeliveryToken) -> Result<(), SessionError> {
        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    self.handle_event(&event);
                    if self.tracker.take_confirmed(token) {
                        return Ok(());
                    }
                }
                Err(e) => return Err(self.mark_lost(e)),
            }
        }
    }

    async fn drive_until_disconnect_sent(&mut self) -> Result<(), SessionError> {
        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    if self.handle_event(&event) == EventRoute::DisconnectSent {
                        return Ok(());
                    }
                }
                Err(e) => return Err(SessionError::Network(e.to_string())),
            }
        }
    }
}

/// Map event loop errors raised while connecting
fn map_connect_error(error: ConnectionError) -> SessionError {
    match error {
        ConnectionError::ConnectionRefused(code) => SessionError::Refused {
            code: super::delivery::connect_code(&code),
        },
        ConnectionError::Tls(e) => SessionError::Tls(e.to_string()),
        other => SessionError::Network(other.to_string()),
    }
}

/// Poll a fresh event loop until the broker answers the CONNECT
async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), SessionError> {
    loop {
        let event = event_loop.poll().await.map_err(map_connect_error)?;
        match route_event(&event) {
            EventRoute::ConnectionAcknowledged { code: 0 } => return Ok(()),
            EventRoute::ConnectionAcknowledged { code } => {
                return Err(SessionError::Refused { code });
            }
            _ => continue,
        }
    }
}

/// Create a new connection and wait for its ConnAck.
/// Used for initial connection and reconnection attempts.
async fn open_link(config: &MqttSection) -> Result<Link, SessionError> {
    let mqtt_options = configure_mqtt_options(config)?;
    let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

    let timeout = Duration::from_millis(config.connect_timeout_ms);
    tokio::time::timeout(timeout, wait_for_connack(&mut event_loop))
        .await
        .map_err(|_| SessionError::Timeout(timeout))??;

    Ok(Link {
        client,
        event_loop,
        tracker: DeliveryTracker::new(),
        lost: None,
    })
}

/// `rumqttc`-backed broker session
pub struct MqttSession {
    config: MqttSection,
    link: Option<Link>,
}

impl MqttSession {
    pub fn new(config: MqttSection) -> Self {
        Self { config, link: None }
    }

    /// True while a link exists and has not reported an error
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.lost.is_none())
    }

    fn live_link(&mut self) -> Result<&mut Link, SessionError> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| SessionError::ConnectionLost("not connected".to_string()))?;
        match &link.lost {
            Some(reason) => Err(SessionError::ConnectionLost(reason.clone())),
            None => Ok(link),
        }
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self) -> Result<(), SessionError> {
        info!(
            broker = %self.config.broker_url,
            client_id = %self.config.client_id,
            "Connecting to MQTT broker"
        );
        let span = crate::mqtt_span!(op = "connect", broker = %self.config.broker_url);
        self.link = Some(open_link(&self.config).instrument(span).await?);
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), SessionError> {
        // Drop the old client and event loop before dialing again
        self.link = None;
        debug!(broker = %self.config.broker_url, "Opening new connection for reconnect");
        let span = crate::mqtt_span!(op = "reconnect", broker = %self.config.broker_url);
        self.link = Some(open_link(&self.config).instrument(span).await?);
        Ok(())
    }

    async fn publish(&mut self, message: &Message) -> Result<DeliveryToken, SessionError> {
        let link = self.live_link()?;
        link.client
            .try_publish(
                message.topic(),
                to_qos(message.qos()),
                message.retained(),
                message.payload().to_vec(),
            )
            .map_err(|e| SessionError::Request(e.to_string()))?;
        Ok(link.tracker.register(message.qos()))
    }

    async fn await_delivery(
        &mut self,
        token: DeliveryToken,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| SessionError::ConnectionLost("not connected".to_string()))?;

        link.tracker.discard_before(token);
        if link.tracker.take_confirmed(token) {
            return Ok(());
        }
        if let Some(reason) = &link.lost {
            return Err(SessionError::ConnectionLost(reason.clone()));
        }

        match tokio::time::timeout(timeout, link.drive_until_confirmed(token)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    async fn idle(&mut self, duration: Duration) {
        let Ok(link) = self.live_link() else {
            tokio::time::sleep(duration).await;
            return;
        };

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return,
                polled = link.event_loop.poll() => match polled {
                    Ok(event) => {
                        link.handle_event(&event);
                    }
                    Err(e) => {
                        let error = link.mark_lost(e);
                        warn!("MQTT link failed while idle: {}", error);
                        (&mut deadline).await;
                        return;
                    }
                }
            }
        }
    }

    async fn disconnect(&mut self, timeout: Duration) -> Result<(), SessionError> {
        // Taking the link means it is dropped (and the socket closed) on every path below
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };

        if link.tracker.pending() > 0 {
            debug!(
                pending = link.tracker.pending(),
                "Disconnecting with unconfirmed publishes"
            );
        }

        if let Some(reason) = &link.lost {
            debug!("Link already lost ({}), releasing without DISCONNECT", reason);
            return Ok(());
        }

        link.client
            .try_disconnect()
            .map_err(|e| SessionError::Request(e.to_string()))?;

        match tokio::time::timeout(timeout, link.drive_until_disconnect_sent()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }
}
