//! Connection traits.
//!
//! The session drives exactly one [`Connection`] at a time. Keeping the
//! physical transport behind these traits lets tests script connection
//! lifecycles without a server.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::{TransportError, TransportKind};

/// Opens physical connections of one transport kind.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport variant this connector speaks.
    fn kind(&self) -> TransportKind;

    /// Establish a connection to a fully built endpoint URL.
    ///
    /// Returning `Ok` means the connection is open.
    async fn open(&self, url: Url) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open physical connection.
#[async_trait]
pub trait Connection: Send {
    /// Next raw frame payload.
    ///
    /// Returns `None` once the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Sender for outbound text frames, for bidirectional transports.
    fn outbound(&self) -> Option<mpsc::UnboundedSender<String>> {
        None
    }

    /// Close the connection and release its background resources.
    ///
    /// Calling this more than once has no further effect.
    fn close(&mut self);
}
