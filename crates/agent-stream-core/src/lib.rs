//! Core types for following agent workflow runs.
//!
//! This crate provides the transport-independent building blocks:
//! - `RunHandle` - Identifies the workflow run being followed
//! - `AgentMessage` - Typed inbound agent event
//! - `WatermarkTracker` - Resume cursor that survives reconnects
//! - `BackoffPolicy` - Reconnect delay computation
//! - `CredentialProvider` - Injected bearer token source
//! - `StreamConfig` - Client configuration

pub mod backoff;
pub mod config;
pub mod credentials;
pub mod message;
pub mod run;
pub mod watermark;

pub use backoff::BackoffPolicy;
pub use config::{ConfigError, StreamConfig};
pub use credentials::{CredentialProvider, StaticCredentials, bearer_token};
pub use message::{AgentMessage, MAIN_WORKSTREAM, MessageType};
pub use run::RunHandle;
pub use watermark::WatermarkTracker;
