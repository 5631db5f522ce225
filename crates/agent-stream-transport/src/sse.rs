//! Server-Sent Events transport.

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{StreamExt, stream::BoxStream};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use url::Url;

use crate::{Connection, Connector, TransportError, TransportKind};

type EventStream =
    BoxStream<'static, Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>>;

/// Opens read-only SSE connections.
#[derive(Debug, Clone, Default)]
pub struct SseConnector {
    http: reqwest::Client,
}

impl SseConnector {
    /// Create a connector with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector sharing an existing HTTP client.
    #[must_use]
    pub const fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Connector for SseConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn open(&self, url: Url) -> Result<Box<dyn Connection>, TransportError> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            // The URL carries the access token; keep it out of errors and logs.
            .map_err(|e| TransportError::ConnectionFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let events = response.bytes_stream().eventsource().boxed();
        Ok(Box::new(SseConnection {
            events: Some(events),
        }))
    }
}

/// A single open SSE response body.
struct SseConnection {
    events: Option<EventStream>,
}

#[async_trait]
impl Connection for SseConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        let events = self.events.as_mut()?;
        match events.next().await {
            Some(Ok(event)) => Some(Ok(event.data)),
            Some(Err(e)) => {
                self.events = None;
                Some(Err(TransportError::ReceiveFailed(e.to_string())))
            }
            None => {
                self.events = None;
                None
            }
        }
    }

    fn close(&mut self) {
        if self.events.take().is_some() {
            tracing::trace!("SSE connection closed");
        }
    }
}
