//! Transport layer for agent run streams.
//!
//! Provides:
//! - Endpoint URL construction (resume cursor + access token)
//! - Wire protocol (frame decoding, outbound client messages)
//! - `Connector`/`Connection` traits the session drives
//! - SSE transport (feature: sse)
//! - WebSocket transport (feature: websocket)

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod protocol;

#[cfg(feature = "sse")]
pub mod sse;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use connection::{Connection, Connector};
pub use endpoint::{TransportKind, endpoint_url};
pub use error::TransportError;
pub use protocol::{ClientMessage, InboundFrame, decode_frame, is_heartbeat};

#[cfg(feature = "sse")]
pub use sse::SseConnector;

#[cfg(feature = "websocket")]
pub use websocket::WsConnector;
