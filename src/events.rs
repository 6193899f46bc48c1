// file: src/events.rs
// description: event-type tags, the wire envelope codec and the typed payload union

use crate::{
    error::SecwatchError,
    types::{
        AttackCompleted, AttackFailed, AttackProgress, AttackStarted, ConnectionClosed,
        ConnectionEstablished, MessageReceived, Notification, ScanCompleted, ScanFailed,
        ScanProgress, ScanStarted, VulnerabilityDiscovered,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enumerated tags for every event crossing the connection boundary.
///
/// Handlers register against these rather than raw strings, so a handler's
/// payload type is checked at compile time via [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ConnectionEstablished,
    ConnectionClosed,
    ScanStarted,
    ScanProgress,
    ScanCompleted,
    ScanFailed,
    AttackStarted,
    AttackProgress,
    AttackCompleted,
    AttackFailed,
    VulnerabilityDiscovered,
    Notification,
    MessageReceived,
}

impl EventType {
    pub fn as_tag(&self) -> &'static str {
        match self {
            EventType::ConnectionEstablished => "connection.established",
            EventType::ConnectionClosed => "connection.closed",
            EventType::ScanStarted => "scan.started",
            EventType::ScanProgress => "scan.progress",
            EventType::ScanCompleted => "scan.completed",
            EventType::ScanFailed => "scan.failed",
            EventType::AttackStarted => "attack.started",
            EventType::AttackProgress => "attack.progress",
            EventType::AttackCompleted => "attack.completed",
            EventType::AttackFailed => "attack.failed",
            EventType::VulnerabilityDiscovered => "vulnerability.discovered",
            EventType::Notification => "notification",
            EventType::MessageReceived => "message.received",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let ty = match tag {
            "connection.established" => EventType::ConnectionEstablished,
            "connection.closed" => EventType::ConnectionClosed,
            "scan.started" => EventType::ScanStarted,
            "scan.progress" => EventType::ScanProgress,
            "scan.completed" => EventType::ScanCompleted,
            "scan.failed" => EventType::ScanFailed,
            "attack.started" => EventType::AttackStarted,
            "attack.progress" => EventType::AttackProgress,
            "attack.completed" => EventType::AttackCompleted,
            "attack.failed" => EventType::AttackFailed,
            "vulnerability.discovered" => EventType::VulnerabilityDiscovered,
            "notification" => EventType::Notification,
            "message.received" => EventType::MessageReceived,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Tagged union of every payload shape, validated at the decode boundary so
/// handlers never receive an untyped JSON blob.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    ConnectionEstablished(ConnectionEstablished),
    ConnectionClosed(ConnectionClosed),
    ScanStarted(ScanStarted),
    ScanProgress(ScanProgress),
    ScanCompleted(ScanCompleted),
    ScanFailed(ScanFailed),
    AttackStarted(AttackStarted),
    AttackProgress(AttackProgress),
    AttackCompleted(AttackCompleted),
    AttackFailed(AttackFailed),
    VulnerabilityDiscovered(VulnerabilityDiscovered),
    Notification(Notification),
    MessageReceived(MessageReceived),
}

impl EventData {
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::ConnectionEstablished(_) => EventType::ConnectionEstablished,
            EventData::ConnectionClosed(_) => EventType::ConnectionClosed,
            EventData::ScanStarted(_) => EventType::ScanStarted,
            EventData::ScanProgress(_) => EventType::ScanProgress,
            EventData::ScanCompleted(_) => EventType::ScanCompleted,
            EventData::ScanFailed(_) => EventType::ScanFailed,
            EventData::AttackStarted(_) => EventType::AttackStarted,
            EventData::AttackProgress(_) => EventType::AttackProgress,
            EventData::AttackCompleted(_) => EventType::AttackCompleted,
            EventData::AttackFailed(_) => EventType::AttackFailed,
            EventData::VulnerabilityDiscovered(_) => EventType::VulnerabilityDiscovered,
            EventData::Notification(_) => EventType::Notification,
            EventData::MessageReceived(_) => EventType::MessageReceived,
        }
    }

    fn from_parts(ty: EventType, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let data = match ty {
            EventType::ConnectionEstablished => {
                EventData::ConnectionEstablished(serde_json::from_value(value)?)
            }
            EventType::ConnectionClosed => {
                EventData::ConnectionClosed(serde_json::from_value(value)?)
            }
            EventType::ScanStarted => EventData::ScanStarted(serde_json::from_value(value)?),
            EventType::ScanProgress => EventData::ScanProgress(serde_json::from_value(value)?),
            EventType::ScanCompleted => EventData::ScanCompleted(serde_json::from_value(value)?),
            EventType::ScanFailed => EventData::ScanFailed(serde_json::from_value(value)?),
            EventType::AttackStarted => EventData::AttackStarted(serde_json::from_value(value)?),
            EventType::AttackProgress => EventData::AttackProgress(serde_json::from_value(value)?),
            EventType::AttackCompleted => {
                EventData::AttackCompleted(serde_json::from_value(value)?)
            }
            EventType::AttackFailed => EventData::AttackFailed(serde_json::from_value(value)?),
            EventType::VulnerabilityDiscovered => {
                EventData::VulnerabilityDiscovered(serde_json::from_value(value)?)
            }
            EventType::Notification => EventData::Notification(serde_json::from_value(value)?),
            EventType::MessageReceived => {
                EventData::MessageReceived(serde_json::from_value(value)?)
            }
        };
        Ok(data)
    }

    fn payload_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            EventData::ConnectionEstablished(p) => serde_json::to_value(p),
            EventData::ConnectionClosed(p) => serde_json::to_value(p),
            EventData::ScanStarted(p) => serde_json::to_value(p),
            EventData::ScanProgress(p) => serde_json::to_value(p),
            EventData::ScanCompleted(p) => serde_json::to_value(p),
            EventData::ScanFailed(p) => serde_json::to_value(p),
            EventData::AttackStarted(p) => serde_json::to_value(p),
            EventData::AttackProgress(p) => serde_json::to_value(p),
            EventData::AttackCompleted(p) => serde_json::to_value(p),
            EventData::AttackFailed(p) => serde_json::to_value(p),
            EventData::VulnerabilityDiscovered(p) => serde_json::to_value(p),
            EventData::Notification(p) => serde_json::to_value(p),
            EventData::MessageReceived(p) => serde_json::to_value(p),
        }
    }
}

/// The uniform `{type, data, timestamp}` wrapper for every event.
///
/// Inbound frames decode into this; locally synthesized events (connection
/// transitions) use [`Envelope::local`].
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Envelope for an event synthesized on this side of the connection.
    pub fn local(data: EventData) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.data.event_type()
    }

    /// Parse an inbound text frame. The payload shape is validated here, at
    /// the dispatch boundary; an unknown tag or mismatched payload is an
    /// [`SecwatchError::InvalidEnvelope`].
    pub fn decode(raw: &str) -> Result<Self, SecwatchError> {
        let wire: WireEnvelope = serde_json::from_str(raw)?;
        let ty = EventType::from_tag(&wire.kind)
            .ok_or_else(|| SecwatchError::InvalidEnvelope(format!("unknown tag {:?}", wire.kind)))?;
        let data = EventData::from_parts(ty, wire.data).map_err(|e| {
            SecwatchError::InvalidEnvelope(format!("bad payload for {}: {}", ty, e))
        })?;
        Ok(Self {
            data,
            timestamp: wire.timestamp,
        })
    }

    /// Serialize to the wire shape for outbound transmission.
    pub fn encode(&self) -> Result<String, SecwatchError> {
        let wire = WireEnvelope {
            kind: self.event_type().as_tag().to_string(),
            data: self.data.payload_value()?,
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_string(&wire)?)
    }
}

/// Maps a payload type to its event tag, enabling typed handler registration
/// on the dispatcher.
pub trait EventKind: Sized + Send + Sync + 'static {
    const EVENT_TYPE: EventType;

    fn extract(data: &EventData) -> Option<&Self>;
}

macro_rules! event_kind {
    ($payload:ty => $variant:ident) => {
        impl EventKind for $payload {
            const EVENT_TYPE: EventType = EventType::$variant;

            fn extract(data: &EventData) -> Option<&Self> {
                match data {
                    EventData::$variant(p) => Some(p),
                    _ => None,
                }
            }
        }
    };
}

event_kind!(ConnectionEstablished => ConnectionEstablished);
event_kind!(ConnectionClosed => ConnectionClosed);
event_kind!(ScanStarted => ScanStarted);
event_kind!(ScanProgress => ScanProgress);
event_kind!(ScanCompleted => ScanCompleted);
event_kind!(ScanFailed => ScanFailed);
event_kind!(AttackStarted => AttackStarted);
event_kind!(AttackProgress => AttackProgress);
event_kind!(AttackCompleted => AttackCompleted);
event_kind!(AttackFailed => AttackFailed);
event_kind!(VulnerabilityDiscovered => VulnerabilityDiscovered);
event_kind!(Notification => Notification);
event_kind!(MessageReceived => MessageReceived);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;

    #[test]
    fn decodes_scan_progress_frame() {
        let raw = r#"{"type":"scan.progress","data":{"scan_id":"s1","progress":42,"status":"running"},"timestamp":"2025-08-25T12:00:00Z"}"#;
        let envelope = Envelope::decode(raw).expect("valid frame");
        assert_eq!(envelope.event_type(), EventType::ScanProgress);
        match &envelope.data {
            EventData::ScanProgress(p) => {
                assert_eq!(p.scan_id, "s1");
                assert_eq!(p.progress, 42);
                assert_eq!(p.status, Some(RunStatus::Running));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let raw = r#"{"type":"scan.exploded","data":{},"timestamp":"2025-08-25T12:00:00Z"}"#;
        let err = Envelope::decode(raw).unwrap_err();
        assert!(matches!(err, SecwatchError::InvalidEnvelope(_)));
    }

    #[test]
    fn rejects_payload_shape_mismatch() {
        // scan.progress requires a scan_id
        let raw = r#"{"type":"scan.progress","data":{"progress":10},"timestamp":"2025-08-25T12:00:00Z"}"#;
        let err = Envelope::decode(raw).unwrap_err();
        assert!(matches!(err, SecwatchError::InvalidEnvelope(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Envelope::decode("not json at all").is_err());
    }

    #[test]
    fn encodes_wire_shape() {
        let envelope = Envelope::local(EventData::ScanProgress(ScanProgress {
            scan_id: "s1".to_string(),
            progress: 60,
            status: None,
        }));
        let json = envelope.encode().expect("encodable");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["type"], "scan.progress");
        assert_eq!(value["data"]["scan_id"], "s1");
        assert_eq!(value["data"]["progress"], 60);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn round_trips_notification() {
        let envelope = Envelope::local(EventData::Notification(Notification {
            id: "n1".to_string(),
            kind: crate::types::NotificationKind::Warning,
            title: "Port open".to_string(),
            message: "22/tcp reachable from WAN".to_string(),
            timestamp: Utc::now(),
            read: false,
        }));
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded.data, envelope.data);
    }
}
