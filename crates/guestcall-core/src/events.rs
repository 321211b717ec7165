//! Wire model for inbound event stream frames.
//!
//! A single stream may multiplex events for unrelated conversations, so
//! every payload carries the conversation it belongs to. All fields are
//! optional on the wire except where the backend always sends them.

use serde::Deserialize;

/// Raw member payload as it appears in events and in the member
/// profile resource.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    pub state: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    // Some deployments capitalize this field.
    #[serde(rename = "correlationId", alias = "CorrelationId", default)]
    pub correlation_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation: Option<Conversation>,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub member: Option<MemberRecord>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One decoded frame from the event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub topic_name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub event_body: EventBody,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Frame classification derived from `metadata.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Message,
    MemberChange,
    Other,
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        match self.metadata.as_ref().map(|m| m.kind.as_str()) {
            Some("message") => EventKind::Message,
            Some("member-change") => EventKind::MemberChange,
            _ => EventKind::Other,
        }
    }
}
