//! Caller-facing entry points.

use std::{future::IntoFuture, sync::Arc};

use agent_stream_core::{AgentMessage, CredentialProvider, RunHandle, StreamConfig};
use agent_stream_transport::{Connector, SseConnector, WsConnector};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    StreamError,
    completion::{CompletionHandle, ExitSignal, StreamResult, completion},
    session::{OnMessage, SessionInit, StreamSession},
    signal::{OutboundSlot, SignalChannel},
};

/// Box a closure as a message callback.
pub fn on_message<F>(callback: F) -> Option<OnMessage>
where
    F: FnMut(AgentMessage, &mut ExitSignal) + Send + 'static,
{
    Some(Box::new(callback))
}

/// Cancels a running stream. Cloneable and idempotent.
///
/// Dropping it does not cancel the stream.
#[derive(Debug, Clone)]
pub struct Cleanup {
    token: CancellationToken,
}

impl Cleanup {
    /// Stop the stream: no further reconnects, the live connection is
    /// closed and the completion handle settles as cancelled if it has not
    /// settled already.
    pub fn cleanup(&self) {
        self.token.cancel();
    }

    /// Whether `cleanup` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle to an SSE stream. Awaiting it waits for completion.
#[derive(Debug)]
pub struct StreamHandle {
    /// Resolves once when the stream ends.
    pub completion: CompletionHandle,
    /// Cancels the stream.
    pub cleanup: Cleanup,
}

impl IntoFuture for StreamHandle {
    type Output = StreamResult;
    type IntoFuture = CompletionHandle;

    fn into_future(self) -> Self::IntoFuture {
        self.completion
    }
}

/// Handle to an open WebSocket stream.
#[derive(Debug)]
pub struct WsStreamHandle {
    /// Cancels the stream.
    pub cleanup: Cleanup,
    /// Sends signals over whichever connection is currently open.
    pub signals: SignalChannel,
    /// Resolves once when the stream ends.
    pub completion: CompletionHandle,
}

impl WsStreamHandle {
    /// Shorthand for [`SignalChannel::send_signal`].
    pub fn send_signal(&self, name: &str, data: Value) -> bool {
        self.signals.send_signal(name, data)
    }
}

/// Opens resilient message streams for workflow runs.
pub struct StreamClient {
    config: StreamConfig,
    credentials: Arc<dyn CredentialProvider>,
    sse: Arc<dyn Connector>,
    websocket: Arc<dyn Connector>,
}

impl StreamClient {
    /// Client using the production SSE and WebSocket transports.
    pub fn new(config: StreamConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let websocket = WsConnector::new(config.ws_ping_interval());
        Self::with_connectors(
            config,
            credentials,
            Arc::new(SseConnector::new()),
            Arc::new(websocket),
        )
    }

    /// Client with caller-supplied transports.
    pub fn with_connectors(
        config: StreamConfig,
        credentials: Arc<dyn CredentialProvider>,
        sse: Arc<dyn Connector>,
        websocket: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            credentials,
            sse,
            websocket,
        }
    }

    /// Configuration every stream from this client uses.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream a run's messages over SSE.
    ///
    /// Returns immediately; the connection is opened in the background.
    /// `since` resumes after a known timestamp (`None` streams from the
    /// start). Must be called within a Tokio runtime.
    pub fn stream_messages(
        &self,
        run: RunHandle,
        on_message: Option<OnMessage>,
        since: Option<u64>,
    ) -> StreamHandle {
        let (completion, cleanup, _) =
            self.spawn(Arc::clone(&self.sse), run, on_message, since, None);
        StreamHandle {
            completion,
            cleanup,
        }
    }

    /// Stream a run's messages over a WebSocket that can also carry
    /// signals.
    ///
    /// Resolves once the first connection is open. If the session closes
    /// before that (no credential, retries exhausted, cancelled) the error
    /// it closed with is returned instead. Dropping the returned future
    /// before it resolves cancels the session.
    pub async fn stream_messages_ws(
        &self,
        run: RunHandle,
        on_message: Option<OnMessage>,
        since: Option<u64>,
    ) -> Result<WsStreamHandle, StreamError> {
        let (opened_tx, opened_rx) = oneshot::channel();
        let signals_run = run.clone();
        let (completion, cleanup, outbound) = self.spawn(
            Arc::clone(&self.websocket),
            run,
            on_message,
            since,
            Some(opened_tx),
        );

        // Until the caller holds a handle, nothing else can cancel the session.
        let abandon = cleanup.token.clone().drop_guard();

        if opened_rx.await.is_err() {
            return match completion.await {
                Err(e) => Err(e),
                Ok(_) => Err(StreamError::ClosedBeforeOpen),
            };
        }

        drop(abandon.disarm());
        Ok(WsStreamHandle {
            cleanup,
            signals: SignalChannel::new(signals_run, outbound),
            completion,
        })
    }

    fn spawn(
        &self,
        connector: Arc<dyn Connector>,
        run: RunHandle,
        on_message: Option<OnMessage>,
        since: Option<u64>,
        opened: Option<oneshot::Sender<()>>,
    ) -> (CompletionHandle, Cleanup, OutboundSlot) {
        let (completer, completion) = completion();
        let cancel = CancellationToken::new();
        let outbound = OutboundSlot::default();

        let session = StreamSession::new(SessionInit {
            run,
            base_url: self.config.base_url.clone(),
            connector,
            credentials: Arc::clone(&self.credentials),
            backoff: self.config.backoff,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            since: since.unwrap_or(0),
            on_message,
            completer,
            outbound: outbound.clone(),
            opened,
            cancel: cancel.clone(),
        });
        tokio::spawn(session.run());

        (completion, Cleanup { token: cancel }, outbound)
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
