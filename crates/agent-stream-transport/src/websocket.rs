//! WebSocket transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{ClientMessage, Connection, Connector, TransportError, TransportKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake once the writer shuts down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens bidirectional WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    ping_interval: Option<Duration>,
}

impl WsConnector {
    /// Create a connector.
    ///
    /// When `ping_interval` is set, each connection sends a `ping` client
    /// message at that period until it is closed.
    #[must_use]
    pub const fn new(ping_interval: Option<Duration>) -> Self {
        Self { ping_interval }
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn open(&self, url: Url) -> Result<Box<dyn Connection>, TransportError> {
        let (socket, _response) = connect_async(url.as_str()).await.map_err(|e| match e {
            tungstenite::Error::Http(response) => {
                TransportError::HttpStatus(response.status().as_u16())
            }
            other => TransportError::ConnectionFailed(other.to_string()),
        })?;

        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        tokio::spawn(write_loop(
            sink,
            outbound_rx,
            self.ping_interval,
            shutdown.clone(),
        ));

        Ok(Box::new(WsConnection {
            stream: Some(stream),
            outbound: Some(outbound_tx),
            shutdown,
        }))
    }
}

/// Forward outbound frames and keep-alive pings until shut down.
async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    ping_interval: Option<Duration>,
    shutdown: CancellationToken,
) {
    let mut keepalive = match (ping_interval, ClientMessage::Ping.to_json()) {
        (Some(period), Ok(frame)) => {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some((interval, frame))
        }
        _ => None,
    };

    loop {
        let text = tokio::select! {
            () = shutdown.cancelled() => break,
            next = outbound.recv() => match next {
                Some(text) => text,
                None => break,
            },
            frame = next_ping(&mut keepalive) => frame,
        };

        if let Err(e) = sink.send(Message::Text(text.into())).await {
            tracing::debug!("WebSocket send failed: {e}");
            break;
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!("WebSocket close failed: {e}"),
        Err(_) => tracing::debug!("WebSocket close timed out, dropping socket"),
    }
}

async fn next_ping(keepalive: &mut Option<(Interval, String)>) -> String {
    match keepalive {
        Some((interval, frame)) => {
            interval.tick().await;
            frame.clone()
        }
        None => std::future::pending().await,
    }
}

/// A single open WebSocket.
struct WsConnection {
    stream: Option<SplitStream<WsStream>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    shutdown: CancellationToken,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        let stream = self.stream.as_mut()?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!("Dropping non UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "WebSocket closed by server");
                    self.stream = None;
                    return None;
                }
                // Protocol-level ping/pong is answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.stream = None;
                    return Some(Err(TransportError::ReceiveFailed(e.to_string())));
                }
                None => {
                    self.stream = None;
                    return None;
                }
            }
        }
    }

    fn outbound(&self) -> Option<mpsc::UnboundedSender<String>> {
        self.outbound.clone()
    }

    fn close(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.outbound = None;
        self.stream = None;
        tracing::trace!("WebSocket connection closed");
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}
