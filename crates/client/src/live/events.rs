//! Live channel event types and serialization
//!
//! Frames on the wire are JSON text `{"event": <name>, "data": <payload>}`.
//! Outbound frames are typed with serde; inbound frames are decoded by name
//! so that unknown events and payload-less events never fail the whole frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use supportchat_shared::{Id, IdRef, Message, MessageEdit};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Post-connect authorization handshake
    Authorize { token: String },
}

impl ClientEvent {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Authorized,
    Message(Message),
    EditMessage(MessageEdit),
    DeleteMessage(IdRef),
    TicketClosed(IdRef),
    Error { message: String },
    /// Any event name this client does not handle
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let frame: Frame = serde_json::from_str(text)?;
        let event = match frame.event.as_str() {
            "authorized" => ServerEvent::Authorized,
            "message" => ServerEvent::Message(serde_json::from_value(frame.data)?),
            "edit_message" => ServerEvent::EditMessage(serde_json::from_value(frame.data)?),
            "delete_message" => ServerEvent::DeleteMessage(serde_json::from_value(frame.data)?),
            "ticket_closed" => ServerEvent::TicketClosed(serde_json::from_value(frame.data)?),
            "error" => ServerEvent::Error {
                message: serde_json::from_value::<ErrorPayload>(frame.data)
                    .ok()
                    .and_then(|payload| payload.message)
                    .unwrap_or_else(|| "Live channel error".to_string()),
            },
            _ => ServerEvent::Unknown(frame.event),
        };
        Ok(event)
    }

    pub fn name(&self) -> &str {
        match self {
            ServerEvent::Authorized => "authorized",
            ServerEvent::Message(_) => "message",
            ServerEvent::EditMessage(_) => "edit_message",
            ServerEvent::DeleteMessage(_) => "delete_message",
            ServerEvent::TicketClosed(_) => "ticket_closed",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown(name) => name,
        }
    }
}

// =============================================================================
// Client Feed
// =============================================================================

/// The single ordered event feed consumed by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Transport established (new epoch, not yet trusted)
    Connected,
    /// Server acknowledged `authorize`; content events follow
    Authorized,
    /// Transport lost
    Disconnected,
    Created(Message),
    Edited(MessageEdit),
    Deleted { id: Id },
    TicketClosed { id: Id },
    /// Server `error` frame, surfaced but not state-changing
    ServerError { message: String },
}

impl LiveEvent {
    /// Content events are only delivered once the epoch is authorized
    pub fn requires_authorization(&self) -> bool {
        matches!(
            self,
            LiveEvent::Created(_)
                | LiveEvent::Edited(_)
                | LiveEvent::Deleted { .. }
                | LiveEvent::TicketClosed { .. }
        )
    }
}
