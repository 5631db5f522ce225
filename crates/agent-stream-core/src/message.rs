//! Inbound agent messages.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved workstream id of the primary conversation.
pub const MAIN_WORKSTREAM: &str = "main";

/// Agent message type.
///
/// Decoded case-insensitively from the wire `type` field. Values this
/// client does not know decode as [`MessageType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum MessageType {
    System,
    Thought,
    Plan,
    Update,
    Complete,
    Warning,
    Error,
    Answer,
    Question,
    RequestInput,
    Idle,
    Terminated,
    StreamingChunk,
    BatchProgress,
    Unknown,
}

impl MessageType {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Thought => "thought",
            Self::Plan => "plan",
            Self::Update => "update",
            Self::Complete => "complete",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Answer => "answer",
            Self::Question => "question",
            Self::RequestInput => "request_input",
            Self::Idle => "idle",
            Self::Terminated => "terminated",
            Self::StreamingChunk => "streaming_chunk",
            Self::BatchProgress => "batch_progress",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire value, ignoring ASCII case.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        const KNOWN: [MessageType; 14] = [
            MessageType::System,
            MessageType::Thought,
            MessageType::Plan,
            MessageType::Update,
            MessageType::Complete,
            MessageType::Warning,
            MessageType::Error,
            MessageType::Answer,
            MessageType::Question,
            MessageType::RequestInput,
            MessageType::Idle,
            MessageType::Terminated,
            MessageType::StreamingChunk,
            MessageType::BatchProgress,
        ];

        KNOWN
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .unwrap_or(Self::Unknown)
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An event emitted by a running agent workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Emission time (Unix epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    /// Workstream the message belongs to. Absent means the main workstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workstream_id: Option<String>,

    /// Run that emitted the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_run_id: Option<String>,

    /// Human-readable text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    /// Any other fields sent by the server.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentMessage {
    /// Create a message of the given type with no other fields set.
    #[must_use]
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            timestamp: None,
            workstream_id: None,
            workflow_run_id: None,
            message: None,
            details: None,
            extra: Map::new(),
        }
    }

    /// Set the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the workstream id.
    #[must_use]
    pub fn with_workstream(mut self, workstream_id: impl Into<String>) -> Self {
        self.workstream_id = Some(workstream_id.into());
        self
    }

    /// Whether the message belongs to the primary workstream.
    #[must_use]
    pub fn is_main_workstream(&self) -> bool {
        self.workstream_id
            .as_deref()
            .is_none_or(|id| id == MAIN_WORKSTREAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_is_case_insensitive() {
        assert_eq!(MessageType::from_wire("COMPLETE"), MessageType::Complete);
        assert_eq!(MessageType::from_wire("complete"), MessageType::Complete);
        assert_eq!(
            MessageType::from_wire("Request_Input"),
            MessageType::RequestInput
        );
        assert_eq!(MessageType::from_wire("bogus"), MessageType::Unknown);
    }

    #[test]
    fn test_parse_wire_message() {
        let json = r#"{
            "type": "update",
            "timestamp": 1700000000123,
            "workstream_id": "sub1",
            "workflow_run_id": "run-1",
            "message": "working",
            "details": {"step": 2},
            "thread": "t-9"
        }"#;

        let msg: AgentMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageType::Update);
        assert_eq!(msg.timestamp, Some(1_700_000_000_123));
        assert_eq!(msg.workstream_id.as_deref(), Some("sub1"));
        assert_eq!(msg.workflow_run_id.as_deref(), Some("run-1"));
        assert_eq!(msg.details, Some(serde_json::json!({"step": 2})));
        assert_eq!(msg.extra.get("thread"), Some(&Value::from("t-9")));
        assert!(!msg.is_main_workstream());
    }

    #[test]
    fn test_minimal_message() {
        let msg: AgentMessage = serde_json::from_str(r#"{"type":"TERMINATED"}"#).unwrap();
        assert_eq!(msg.kind, MessageType::Terminated);
        assert_eq!(msg.timestamp, None);
        assert!(msg.is_main_workstream());

        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"terminated"}"#);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(serde_json::from_str::<AgentMessage>(r#"{"timestamp":5}"#).is_err());
    }

    #[test]
    fn test_main_workstream_name() {
        let msg = AgentMessage::new(MessageType::Complete).with_workstream(MAIN_WORKSTREAM);
        assert!(msg.is_main_workstream());
    }
}
