//! Transport errors.

/// Error raised by a connection attempt or a live connection.
///
/// Apart from `InvalidEndpoint`, every variant drives the session's
/// reconnect loop rather than failing the stream outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Server responded with status {0}")]
    HttpStatus(u16),
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
