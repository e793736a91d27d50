//! WebSocket message envelope and tagged payloads
//!
//! Every message crosses the wire as
//! `{ "type": <tag>, "data": <payload>, "timestamp": <ISO-8601> }`
//! with the timestamp set at send time; subscribers use it for age
//! computation. Outbound tags are `connection`, `orderbook_update`,
//! `heartbeat` and `incident_alert`; clients send `subscribe`.
//! Dispatch is over a closed sum type with an explicit branch for
//! unrecognized tags, which are ignored without state change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WireError;
use crate::health::HealthSample;
use crate::incident::Incident;
use crate::scenario::ScenarioName;
use crate::snapshot::Snapshot;

pub const TAG_CONNECTION: &str = "connection";
pub const TAG_ORDERBOOK_UPDATE: &str = "orderbook_update";
pub const TAG_HEARTBEAT: &str = "heartbeat";
pub const TAG_INCIDENT_ALERT: &str = "incident_alert";
pub const TAG_SUBSCRIBE: &str = "subscribe";

/// Greeting sent to a subscriber immediately after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAck {
    /// Human-readable greeting.
    pub message: String,
    /// Scenario active at connect time.
    pub scenario: ScenarioName,
}

/// An orderbook update as published: the snapshot plus processing
/// metadata attached by the broadcast engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookUpdate {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Wall time the engine spent on this entry, including the
    /// artificial delay.
    pub processing_time_ms: f64,
    /// Queue depth observed right after this entry was dequeued.
    pub queue_position: usize,
}

/// Subscription request sent client → server after the channel opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub client_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Closed set of messages the server publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    ConnectionAck(ConnectionAck),
    OrderbookUpdate(OrderbookUpdate),
    Heartbeat(HealthSample),
    IncidentAlert(Incident),
}

impl WireMessage {
    /// Wire tag for this message kind.
    pub fn tag(&self) -> &'static str {
        match self {
            WireMessage::ConnectionAck(_) => TAG_CONNECTION,
            WireMessage::OrderbookUpdate(_) => TAG_ORDERBOOK_UPDATE,
            WireMessage::Heartbeat(_) => TAG_HEARTBEAT,
            WireMessage::IncidentAlert(_) => TAG_INCIDENT_ALERT,
        }
    }

    /// Serialize into the wire envelope, stamping `sent_at` as the
    /// envelope timestamp.
    pub fn encode(&self, sent_at: DateTime<Utc>) -> serde_json::Result<String> {
        let data = match self {
            WireMessage::ConnectionAck(ack) => serde_json::to_value(ack)?,
            WireMessage::OrderbookUpdate(update) => serde_json::to_value(update)?,
            WireMessage::Heartbeat(sample) => serde_json::to_value(sample)?,
            WireMessage::IncidentAlert(incident) => serde_json::to_value(incident)?,
        };
        serde_json::to_string(&Envelope {
            tag: self.tag().to_string(),
            data,
            timestamp: sent_at,
        })
    }
}

/// The raw envelope shape shared by every message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Parse a raw frame into an envelope. Malformed JSON or a
    /// missing field is a `WireError::Malformed`.
    pub fn parse(raw: &str) -> Result<Self, WireError> {
        serde_json::from_str(raw).map_err(|e| WireError::Malformed(e.to_string()))
    }

    /// Classify the envelope by tag and decode its payload.
    ///
    /// Unknown tags are not an error: they classify as
    /// `Classified::Unrecognized` so callers can ignore them.
    pub fn classify(&self) -> Result<Classified, WireError> {
        let payload_err = |e: serde_json::Error| WireError::Payload {
            tag: self.tag.clone(),
            detail: e.to_string(),
        };

        match self.tag.as_str() {
            TAG_CONNECTION => {
                let ack = serde_json::from_value(self.data.clone()).map_err(payload_err)?;
                Ok(Classified::ConnectionAck(ack))
            }
            TAG_ORDERBOOK_UPDATE => {
                let update = serde_json::from_value(self.data.clone()).map_err(payload_err)?;
                Ok(Classified::OrderbookUpdate(update))
            }
            TAG_HEARTBEAT => {
                let sample = serde_json::from_value(self.data.clone()).map_err(payload_err)?;
                Ok(Classified::Heartbeat(sample))
            }
            TAG_INCIDENT_ALERT => {
                let incident = serde_json::from_value(self.data.clone()).map_err(payload_err)?;
                Ok(Classified::IncidentAlert(incident))
            }
            TAG_SUBSCRIBE => {
                let request = serde_json::from_value(self.data.clone()).map_err(payload_err)?;
                Ok(Classified::Subscribe(request))
            }
            other => Ok(Classified::Unrecognized {
                tag: other.to_string(),
            }),
        }
    }
}

/// Encode a subscribe request in the envelope shape.
pub fn encode_subscribe(request: &SubscribeRequest, sent_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        tag: TAG_SUBSCRIBE.to_string(),
        data: serde_json::to_value(request)?,
        timestamp: sent_at,
    })
}

/// A decoded inbound message, dispatched by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    ConnectionAck(ConnectionAck),
    OrderbookUpdate(OrderbookUpdate),
    Heartbeat(HealthSample),
    IncidentAlert(Incident),
    Subscribe(SubscribeRequest),
    /// Tag outside the known set; ignored by both sides.
    Unrecognized { tag: String },
}
