//! Wire protocol for agent run streams.

use agent_stream_core::AgentMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TransportKind;

/// Message from client to server (WebSocket only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Deliver a signal to the running workflow.
    Signal {
        signal_name: String,
        data: Value,
        request_id: String,
    },
    /// Keep-alive ping.
    Ping,
}

impl ClientMessage {
    /// Create a signal message.
    #[must_use]
    pub fn signal(name: impl Into<String>, data: Value, request_id: impl Into<String>) -> Self {
        Self::Signal {
            signal_name: name.into(),
            data,
            request_id: request_id.into(),
        }
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    /// Returns error if the signal payload cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Control frame sent by the WebSocket server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum ControlFrame {
    Pong,
    Ack {
        #[serde(default)]
        request_id: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Agent event.
    Agent(AgentMessage),
    /// Heartbeat acknowledgment.
    Pong,
    /// Signal acknowledgment.
    Ack { request_id: Option<String> },
    /// Server-side error report. Does not close the stream by itself.
    Error { message: String },
}

/// Whether a frame payload is a heartbeat or comment.
#[must_use]
pub fn is_heartbeat(payload: &str) -> bool {
    let trimmed = payload.trim();
    trimmed.is_empty() || trimmed.starts_with(':')
}

/// Decode one frame payload.
///
/// Returns `Ok(None)` for heartbeats. SSE frames always carry agent
/// messages. WebSocket frames carrying `workflow_run_id` are agent
/// messages; otherwise `pong`, `ack` and `error` frames are control frames
/// and anything else is decoded as an agent message.
///
/// # Errors
/// Returns error if the payload is not a valid frame.
pub fn decode_frame(
    kind: TransportKind,
    payload: &str,
) -> Result<Option<InboundFrame>, serde_json::Error> {
    if is_heartbeat(payload) {
        return Ok(None);
    }

    match kind {
        TransportKind::Sse => serde_json::from_str(payload).map(|m| Some(InboundFrame::Agent(m))),
        TransportKind::WebSocket => {
            let mut value: Value = serde_json::from_str(payload)?;
            let control = if value.get("workflow_run_id").is_none() {
                control_type(&value)
            } else {
                None
            };
            if let Some(control) = control {
                value["type"] = Value::from(control);
                let frame = match serde_json::from_value(value)? {
                    ControlFrame::Pong => InboundFrame::Pong,
                    ControlFrame::Ack { request_id } => InboundFrame::Ack { request_id },
                    ControlFrame::Error { message } => InboundFrame::Error {
                        message: message.unwrap_or_default(),
                    },
                };
                return Ok(Some(frame));
            }
            serde_json::from_value(value).map(|m| Some(InboundFrame::Agent(m)))
        }
    }
}

/// Canonical control type of a frame, matched ignoring ASCII case like
/// agent message types.
fn control_type(value: &Value) -> Option<&'static str> {
    let kind = value.get("type").and_then(Value::as_str)?;
    ["pong", "ack", "error"]
        .into_iter()
        .find(|control| control.eq_ignore_ascii_case(kind))
}
