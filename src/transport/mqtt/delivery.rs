//! Pure event routing and delivery tracking for the MQTT session
//!
//! rumqttc confirms publishes by packet identifier, not by request. The
//! tracker maps each queued publish to a [`DeliveryToken`] in request order
//! and marks tokens confirmed as the matching acknowledgements arrive:
//! QoS 0 on send, QoS 1 on PUBACK, QoS 2 on PUBCOMP.

use crate::publisher::message::QosLevel;
use crate::transport::DeliveryToken;
use rumqttc::{ConnectReturnCode, Event, Outgoing, Packet};
use std::collections::{HashMap, HashSet, VecDeque};

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// CONNACK received; `code` is the broker return code (0 = accepted)
    ConnectionAcknowledged { code: i32 },
    /// A queued publish went out on the wire with this packet id
    PublishSent { pkid: u16 },
    /// Final acknowledgement for a QoS 1 or QoS 2 publish
    DeliveryConfirmed { pkid: u16 },
    /// Our DISCONNECT was written
    DisconnectSent,
    /// Anything else (pings, intermediate QoS 2 packets, ...)
    Infrastructure,
}

/// Route MQTT event to the appropriate handling (pure routing decision)
pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(Packet::ConnAck(connack)) => EventRoute::ConnectionAcknowledged {
            code: connect_code(&connack.code),
        },
        Event::Incoming(Packet::PubAck(puback)) => EventRoute::DeliveryConfirmed { pkid: puback.pkid },
        Event::Incoming(Packet::PubComp(pubcomp)) => {
            EventRoute::DeliveryConfirmed { pkid: pubcomp.pkid }
        }
        Event::Outgoing(Outgoing::Publish(pkid)) => EventRoute::PublishSent { pkid: *pkid },
        Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
        _ => EventRoute::Infrastructure,
    }
}

/// Numeric CONNACK return code as defined by MQTT 3.1.1
pub fn connect_code(code: &ConnectReturnCode) -> i32 {
    match code {
        ConnectReturnCode::Success => 0,
        ConnectReturnCode::RefusedProtocolVersion => 1,
        ConnectReturnCode::BadClientId => 2,
        ConnectReturnCode::ServiceUnavailable => 3,
        ConnectReturnCode::BadUserNamePassword => 4,
        ConnectReturnCode::NotAuthorized => 5,
    }
}

/// Correlates delivery tokens with packet identifiers
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    next_token: u64,
    unsent: VecDeque<(DeliveryToken, QosLevel)>,
    in_flight: HashMap<u16, DeliveryToken>,
    confirmed: HashSet<DeliveryToken>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a publish that was just queued
    pub fn register(&mut self, qos: QosLevel) -> DeliveryToken {
        self.next_token += 1;
        let token = DeliveryToken(self.next_token);
        self.unsent.push_back((token, qos));
        token
    }

    pub fn apply(&mut self, route: &EventRoute) {
        match route {
            EventRoute::PublishSent { pkid } => self.on_publish_sent(*pkid),
            EventRoute::DeliveryConfirmed { pkid } => self.on_delivery_confirmed(*pkid),
            _ => {}
        }
    }

    fn on_publish_sent(&mut self, pkid: u16) {
        let Some((token, qos)) = self.unsent.pop_front() else {
            return;
        };
        match qos {
            QosLevel::AtMostOnce => {
                self.confirmed.insert(token);
            }
            QosLevel::AtLeastOnce | QosLevel::ExactlyOnce => {
                self.in_flight.insert(pkid, token);
            }
        }
    }

    fn on_delivery_confirmed(&mut self, pkid: u16) {
        if let Some(token) = self.in_flight.remove(&pkid) {
            self.confirmed.insert(token);
        }
    }

    /// Consume the confirmation for `token`, if it has arrived
    pub fn take_confirmed(&mut self, token: DeliveryToken) -> bool {
        self.confirmed.remove(&token)
    }

    /// Forget confirmations for tokens older than `token`; nobody awaits them any more
    pub fn discard_before(&mut self, token: DeliveryToken) {
        self.confirmed.retain(|confirmed| *confirmed >= token);
    }

    /// Publishes queued or in flight without a confirmation yet
    pub fn pending(&self) -> usize {
        self.unsent.len() + self.in_flight.len()
    }
}
