//! Stream errors surfaced to callers.

use agent_stream_transport::TransportError;

/// Error that fails a stream.
///
/// Transient transport failures and malformed frames never reach the
/// caller; only these outcomes settle a completion handle with an error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("No credential available to open the stream")]
    Unauthenticated,
    #[error("Stream failed after {attempts} reconnection attempts: {source}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("Invalid stream endpoint: {0}")]
    Endpoint(TransportError),
    #[error("Stream ended before the connection opened")]
    ClosedBeforeOpen,
    #[error("Stream task ended without a result")]
    Abandoned,
}
