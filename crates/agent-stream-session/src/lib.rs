//! Reconnecting stream sessions for agent workflow runs.
//!
//! Provides:
//! - `StreamClient` - Open SSE or WebSocket streams for a run
//! - `StreamSession` state machine (reconnect, resume, terminal detection)
//! - `SignalChannel` - Send signals over an open WebSocket stream
//! - `CompletionHandle` / `Cleanup` - Await or cancel a stream

mod classify;
pub mod client;
pub mod completion;
pub mod error;
mod session;
pub mod signal;

#[cfg(test)]
mod testing;

pub use client::{Cleanup, StreamClient, StreamHandle, WsStreamHandle, on_message};
pub use completion::{CompletionHandle, ExitSignal, StreamOutcome, StreamResult};
pub use error::StreamError;
pub use session::OnMessage;
pub use signal::SignalChannel;
