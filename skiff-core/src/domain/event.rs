//! Build event types
//!
//! The server streams build progress as a sequence of JSON envelopes:
//!
//! ```json
//! {"event": "log", "data": {"origin": {"name": "stdout"}, "payload": "hello\n"}}
//! {"event": "status", "data": {"status": "succeeded", "time": 1700000000}}
//! ```
//!
//! Event kinds this client does not know about decode to [`BuildEvent::Unknown`]
//! so newer servers do not break older clients.

use serde::{Deserialize, Serialize};

use crate::domain::build::BuildStatus;

/// Wire envelope around every event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A decoded build event
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Log(LogEvent),
    Status(StatusEvent),
    Error(ErrorEvent),
    Finish(FinishEvent),
    Unknown(String),
}

/// A chunk of build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default)]
    pub origin: Option<Origin>,
    pub payload: String,
}

/// Where a log chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub origin_type: String,
}

/// A build status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: BuildStatus,
    #[serde(default)]
    pub time: i64,
}

/// An error reported by the build engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// The build's command exited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishEvent {
    pub exit_status: i32,
    #[serde(default)]
    pub time: i64,
}

impl BuildEvent {
    /// Decodes an event from its JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let envelope: EventEnvelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    /// Decodes an event from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let envelope: EventEnvelope = serde_json::from_slice(bytes)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: EventEnvelope) -> serde_json::Result<Self> {
        let event = match envelope.event.as_str() {
            "log" => BuildEvent::Log(serde_json::from_value(envelope.data)?),
            "status" => BuildEvent::Status(serde_json::from_value(envelope.data)?),
            "error" => BuildEvent::Error(serde_json::from_value(envelope.data)?),
            "finish" => BuildEvent::Finish(serde_json::from_value(envelope.data)?),
            _ => BuildEvent::Unknown(envelope.event),
        };
        Ok(event)
    }

    /// Encodes the event into its wire envelope
    pub fn to_envelope(&self) -> serde_json::Result<EventEnvelope> {
        let (event, data) = match self {
            BuildEvent::Log(e) => ("log", serde_json::to_value(e)?),
            BuildEvent::Status(e) => ("status", serde_json::to_value(e)?),
            BuildEvent::Error(e) => ("error", serde_json::to_value(e)?),
            BuildEvent::Finish(e) => ("finish", serde_json::to_value(e)?),
            BuildEvent::Unknown(kind) => (kind.as_str(), serde_json::Value::Null),
        };
        Ok(EventEnvelope {
            event: event.to_string(),
            data,
        })
    }

    /// The status carried by this event, if it ends the build
    pub fn terminal_status(&self) -> Option<BuildStatus> {
        match self {
            BuildEvent::Status(e) if e.status.is_terminal() => Some(e.status),
            _ => None,
        }
    }
}
