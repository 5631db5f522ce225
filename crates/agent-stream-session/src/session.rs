//! Stream session state machine.
//!
//! A session follows one run across any number of physical connections:
//!
//! ```text
//! Connecting ──open──► Open ──drop──► Connecting (after backoff)
//!      │                 │
//!      └──────┬──────────┘
//!             ▼
//!          Closed   (terminal message, early exit, cancel, auth failure,
//!                    reconnect budget exhausted)
//! ```
//!
//! The session runs as a single task that owns all of its state, so no
//! two callbacks ever race. At most one connection is live at a time: the
//! previous one is closed before the next is opened.

use std::{ops::ControlFlow, sync::Arc};

use agent_stream_core::{
    AgentMessage, BackoffPolicy, CredentialProvider, RunHandle, WatermarkTracker, bearer_token,
};
use agent_stream_transport::{
    Connection, Connector, InboundFrame, TransportError, TransportKind, decode_frame,
    endpoint_url,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    StreamError,
    classify::{Verdict, classify},
    completion::{Completer, ExitSignal, StreamOutcome, StreamResult},
    signal::OutboundSlot,
};

/// Callback invoked with every agent message, in transport order.
///
/// Across a reconnect the server may replay messages at or after the
/// resume cursor, so handling must tolerate duplicates.
pub type OnMessage = Box<dyn FnMut(AgentMessage, &mut ExitSignal) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Default)]
struct ReconnectState {
    attempts: u32,
    is_closed: bool,
}

/// Everything a session needs, assembled by the client.
pub(crate) struct SessionInit {
    pub(crate) run: RunHandle,
    pub(crate) base_url: Url,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) since: u64,
    pub(crate) on_message: Option<OnMessage>,
    pub(crate) completer: Completer,
    pub(crate) outbound: OutboundSlot,
    pub(crate) opened: Option<oneshot::Sender<()>>,
    pub(crate) cancel: CancellationToken,
}

enum OpenError {
    /// Not retried.
    Fatal(StreamError),
    Transport(TransportError),
}

enum PumpEnd {
    Finished(Option<Value>),
    Cancelled,
    Dropped(TransportError),
}

pub(crate) struct StreamSession {
    id: Uuid,
    run: RunHandle,
    base_url: Url,
    kind: TransportKind,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    backoff: BackoffPolicy,
    max_reconnect_attempts: u32,
    watermark: WatermarkTracker,
    reconnect: ReconnectState,
    state: SessionState,
    generation: u64,
    on_message: Option<OnMessage>,
    completer: Completer,
    outbound: OutboundSlot,
    opened: Option<oneshot::Sender<()>>,
    cancel: CancellationToken,
}

impl StreamSession {
    pub(crate) fn new(init: SessionInit) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: init.connector.kind(),
            run: init.run,
            base_url: init.base_url,
            connector: init.connector,
            credentials: init.credentials,
            backoff: init.backoff,
            max_reconnect_attempts: init.max_reconnect_attempts,
            watermark: WatermarkTracker::new(init.since),
            reconnect: ReconnectState::default(),
            state: SessionState::Connecting,
            generation: 0,
            on_message: init.on_message,
            completer: init.completer,
            outbound: init.outbound,
            opened: init.opened,
            cancel: init.cancel,
        }
    }

    /// Drive the session until it closes.
    pub(crate) async fn run(mut self) {
        let span = info_span!(
            "stream_session",
            session = %self.id,
            run = %self.run,
            transport = ?self.kind,
        );
        async move {
            self.drive().await;
            debug_assert!(self.completer.is_settled());
        }
        .instrument(span)
        .await;
    }

    async fn drive(&mut self) {
        let cancel = self.cancel.clone();

        while !self.reconnect.is_closed {
            self.transition(SessionState::Connecting);

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                opened = self.open() => Some(opened),
            };

            let mut connection = match opened {
                None => {
                    self.close(Ok(StreamOutcome::Cancelled));
                    return;
                }
                Some(Ok(connection)) => connection,
                Some(Err(OpenError::Fatal(e))) => {
                    self.close(Err(e));
                    return;
                }
                Some(Err(OpenError::Transport(e))) => {
                    self.retry(e).await;
                    continue;
                }
            };

            self.on_open(connection.as_ref());
            let end = self.pump(connection.as_mut()).await;
            self.teardown(connection);

            match end {
                PumpEnd::Finished(payload) => self.close(Ok(StreamOutcome::Completed(payload))),
                PumpEnd::Cancelled => self.close(Ok(StreamOutcome::Cancelled)),
                PumpEnd::Dropped(e) => self.retry(e).await,
            }
        }
    }

    async fn open(&mut self) -> Result<Box<dyn Connection>, OpenError> {
        let authorization = self.credentials.authorization().await;
        let Some(token) = authorization.as_deref().and_then(bearer_token) else {
            warn!("No credential available, not connecting");
            return Err(OpenError::Fatal(StreamError::Unauthenticated));
        };

        let since = self.watermark.current();
        let url = endpoint_url(self.kind, &self.base_url, &self.run, since, token)
            .map_err(|e| OpenError::Fatal(StreamError::Endpoint(e)))?;

        self.generation += 1;
        debug!(
            generation = self.generation,
            since,
            attempt = self.reconnect.attempts,
            path = url.path(),
            "Opening connection"
        );

        self.connector.open(url).await.map_err(OpenError::Transport)
    }

    fn on_open(&mut self, connection: &dyn Connection) {
        self.transition(SessionState::Open);
        self.reconnect.attempts = 0;

        if let Some(tx) = connection.outbound() {
            self.outbound.install(self.generation, tx);
        }
        if let Some(opened) = self.opened.take() {
            let _ = opened.send(());
        }

        info!(generation = self.generation, "Stream connected");
    }

    async fn pump(&mut self, connection: &mut dyn Connection) -> PumpEnd {
        let cancel = self.cancel.clone();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return PumpEnd::Cancelled,
                next = connection.recv() => next,
            };

            match next {
                Some(Ok(payload)) => {
                    if let ControlFlow::Break(payload) = self.handle_frame(&payload) {
                        return PumpEnd::Finished(payload);
                    }
                }
                Some(Err(e)) => return PumpEnd::Dropped(e),
                None => return PumpEnd::Dropped(TransportError::ConnectionClosed),
            }
        }
    }

    /// Process one frame. Breaks with the completion payload when the stream
    /// is over.
    fn handle_frame(&mut self, payload: &str) -> ControlFlow<Option<Value>> {
        let frame = match decode_frame(self.kind, payload) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("Heartbeat");
                return ControlFlow::Continue(());
            }
            Err(e) => {
                warn!(error = %e, len = payload.len(), "Dropping malformed frame");
                return ControlFlow::Continue(());
            }
        };

        let message = match frame {
            InboundFrame::Agent(message) => message,
            InboundFrame::Pong => {
                trace!("Pong");
                return ControlFlow::Continue(());
            }
            InboundFrame::Ack { request_id } => {
                debug!(?request_id, "Signal acknowledged");
                return ControlFlow::Continue(());
            }
            InboundFrame::Error { message } => {
                warn!(%message, "Server reported an error");
                return ControlFlow::Continue(());
            }
        };

        self.watermark.observe(&message);
        let verdict = classify(&message);

        let mut exit = ExitSignal::default();
        if let Some(on_message) = self.on_message.as_mut() {
            on_message(message, &mut exit);
        }

        if let Some(payload) = exit.take() {
            debug!("Early exit requested by message callback");
            return ControlFlow::Break(payload);
        }

        match verdict {
            Verdict::Finished => ControlFlow::Break(None),
            Verdict::WorkstreamComplete(workstream) => {
                info!(%workstream, "Workstream completed, run continues");
                ControlFlow::Continue(())
            }
            Verdict::Continue => ControlFlow::Continue(()),
        }
    }

    fn teardown(&mut self, mut connection: Box<dyn Connection>) {
        self.outbound.clear(self.generation);
        connection.close();
        trace!(generation = self.generation, "Connection torn down");
    }

    /// Wait out the backoff before the next attempt, or close if the
    /// budget is spent or the caller cancels meanwhile.
    async fn retry(&mut self, error: TransportError) {
        if self.reconnect.is_closed {
            return;
        }

        if self.reconnect.attempts >= self.max_reconnect_attempts {
            let attempts = self.reconnect.attempts;
            self.close(Err(StreamError::ReconnectExhausted {
                attempts,
                source: error,
            }));
            return;
        }

        let delay = self.backoff.delay(self.reconnect.attempts);
        self.reconnect.attempts += 1;
        self.transition(SessionState::Connecting);
        warn!(
            attempt = self.reconnect.attempts,
            max_attempts = self.max_reconnect_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            since = self.watermark.current(),
            %error,
            "Connection lost, reconnecting"
        );

        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => self.close(Ok(StreamOutcome::Cancelled)),
            () = tokio::time::sleep(delay) => {}
        }
    }

    /// Enter the terminal state and settle the completion handle once.
    fn close(&mut self, result: StreamResult) {
        if self.reconnect.is_closed {
            return;
        }
        self.reconnect.is_closed = true;
        self.transition(SessionState::Closed);

        match &result {
            Ok(StreamOutcome::Completed(payload)) => {
                info!(with_payload = payload.is_some(), "Stream completed");
            }
            Ok(StreamOutcome::Cancelled) => info!("Stream cancelled"),
            Err(e) => error!(error = %e, "Stream failed"),
        }

        self.completer.settle(result);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "Session state");
            self.state = next;
        }
    }
}
