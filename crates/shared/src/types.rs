//! Common types used across SupportChat

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::SharedError;

// =============================================================================
// ID Wrapper
// =============================================================================

/// Opaque identifier for tickets, users and messages.
///
/// The backend emits snowflake integers, other producers emit strings. Both
/// forms deserialize into the same value and compare as text, so `7` and `"7"`
/// are the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    /// Build an id from text, rejecting empty values and path separators
    pub fn parse(raw: impl Into<String>) -> Result<Self, SharedError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(SharedError::InvalidId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Extract the channel id from a page path such as `/tickets/42`.
    ///
    /// The channel is the last path segment; query strings are ignored.
    pub fn from_path(path: &str) -> Result<Self, SharedError> {
        let without_query = path.split(['?', '#']).next().unwrap_or_default();
        let segment = without_query.rsplit('/').next().unwrap_or_default();
        if segment.is_empty() {
            return Err(SharedError::MissingChannel(path.to_string()));
        }
        Self::parse(segment)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Unsigned(n) => Ok(Self(n.to_string())),
            RawId::Signed(n) => Ok(Self(n.to_string())),
            RawId::Text(s) => Id::parse(s).map_err(de::Error::custom),
        }
    }
}

// =============================================================================
// Tickets
// =============================================================================

/// Ticket lifecycle status as sent by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    #[default]
    #[serde(alias = "OPEN", alias = "open", alias = "active")]
    Active,
    #[serde(alias = "closed")]
    Closed,
    #[serde(alias = "deleted")]
    Deleted,
}

impl TicketStatus {
    pub fn is_open(self) -> bool {
        matches!(self, TicketStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Id,
    /// Owner of the ticket; messages authored by this user render as "mine"
    pub user_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    #[serde(alias = "sender_id")]
    pub author_id: Id,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<Id>,
    /// Unix timestamp assigned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Message {
    pub fn new(id: Id, author_id: Id, content: impl Into<String>) -> Self {
        Self {
            id,
            author_id,
            content: content.into(),
            ticket_id: None,
            created_at: None,
        }
    }
}

/// Payload of an `edit_message` push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEdit {
    pub id: Id,
    pub content: String,
}

/// Payload carrying only an id (`delete_message`, `ticket_closed`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: Id,
}

/// Message list response: a bare array or the `{ "messages": [...] }` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageListResponse {
    Bare(Vec<Message>),
    Envelope { messages: Vec<Message> },
}

impl MessageListResponse {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            MessageListResponse::Bare(messages) => messages,
            MessageListResponse::Envelope { messages } => messages,
        }
    }
}

/// Ticket list response: a bare array or the `{ "tickets": [...] }` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TicketListResponse {
    Bare(Vec<Ticket>),
    Envelope { tickets: Vec<Ticket> },
}

impl TicketListResponse {
    pub fn into_tickets(self) -> Vec<Ticket> {
        match self {
            TicketListResponse::Bare(tickets) => tickets,
            TicketListResponse::Envelope { tickets } => tickets,
        }
    }
}

// =============================================================================
// Request / Response Bodies
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTicketRequest {
    pub topic: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Extract the human-readable message from an error body.
///
/// Accepts the flat `{ "message": ... }` shape and the nested
/// `{ "error": { "message": ... } }` envelope. Empty strings count as absent.
pub fn server_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            body.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .filter(|m| !m.trim().is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_accepts_numbers_and_strings() {
        let from_number: Id = serde_json::from_value(json!(1234567890123u64)).unwrap();
        let from_string: Id = serde_json::from_value(json!("1234567890123")).unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(serde_json::to_value(&from_number).unwrap(), json!("1234567890123"));
    }

    #[test]
    fn test_id_rejects_empty_string() {
        assert!(serde_json::from_value::<Id>(json!("")).is_err());
        assert_eq!(Id::parse("  "), Err(SharedError::InvalidId("  ".to_string())));
    }

    #[test]
    fn test_channel_from_path() {
        assert_eq!(Id::from_path("/tickets/42").unwrap().as_str(), "42");
        assert_eq!(Id::from_path("/tickets/42?tab=chat").unwrap().as_str(), "42");
        assert!(matches!(
            Id::from_path("/tickets/"),
            Err(SharedError::MissingChannel(_))
        ));
    }

    #[test]
    fn test_message_accepts_sender_id_alias() {
        let message: Message = serde_json::from_value(json!({
            "id": 1,
            "ticket_id": 5,
            "sender_id": 7,
            "content": "hi",
            "attachments": [],
            "created_at": 1700000000,
            "updated_at": 1700000000
        }))
        .unwrap();
        assert_eq!(message.author_id, Id::from(7));
        assert_eq!(message.ticket_id, Some(Id::from(5)));
        assert_eq!(message.created_at, Some(1_700_000_000));
    }

    #[test]
    fn test_ticket_status_variants() {
        let ticket: Ticket =
            serde_json::from_value(json!({"id": 1, "user_id": 7, "status": "CLOSED"})).unwrap();
        assert_eq!(ticket.status, TicketStatus::Closed);
        assert!(!ticket.status.is_open());

        let ticket: Ticket = serde_json::from_value(json!({"id": 1, "user_id": 7})).unwrap();
        assert!(ticket.status.is_open());

        let ticket: Ticket =
            serde_json::from_value(json!({"id": 1, "user_id": 7, "status": "open"})).unwrap();
        assert_eq!(ticket.status, TicketStatus::Active);
    }

    #[test]
    fn test_message_list_envelope() {
        let bare: MessageListResponse =
            serde_json::from_value(json!([{"id": 1, "author_id": 2, "content": "a"}])).unwrap();
        assert_eq!(bare.into_messages().len(), 1);

        let wrapped: MessageListResponse = serde_json::from_value(json!({
            "messages": [{"id": 1, "author_id": 2, "content": "a"}, {"id": 2, "author_id": 2, "content": "b"}]
        }))
        .unwrap();
        assert_eq!(wrapped.into_messages().len(), 2);
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            server_message(&json!({"message": "Ticket not found"})),
            Some("Ticket not found".to_string())
        );
        assert_eq!(
            server_message(&json!({"error": {"code": "NOT_FOUND", "message": "Resource not found"}})),
            Some("Resource not found".to_string())
        );
        assert_eq!(server_message(&json!({"message": ""})), None);
        assert_eq!(server_message(&json!({"detail": "x"})), None);
    }
}
