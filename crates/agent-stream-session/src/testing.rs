//! Scripted transport for exercising sessions without a server.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use agent_stream_transport::{Connection, Connector, TransportError, TransportKind};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

/// Outcome of one `open` call.
pub(crate) enum Attempt {
    Fail(TransportError),
    Open(Vec<Step>),
}

/// What an open connection yields next. Once the steps run out the
/// connection stays silent until closed.
pub(crate) enum Step {
    Frame(String),
    Error(TransportError),
    End,
}

pub(crate) fn frame(value: &Value) -> Step {
    Step::Frame(value.to_string())
}

#[derive(Default)]
struct Record {
    urls: Vec<Url>,
    closes: usize,
    outbound: Vec<mpsc::UnboundedReceiver<String>>,
}

pub(crate) struct MockConnector {
    kind: TransportKind,
    script: Mutex<VecDeque<Attempt>>,
    record: Arc<Mutex<Record>>,
}

impl MockConnector {
    pub(crate) fn new(kind: TransportKind, script: Vec<Attempt>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script.into()),
            record: Arc::default(),
        })
    }

    pub(crate) fn urls(&self) -> Vec<Url> {
        self.record.lock().unwrap().urls.clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.record.lock().unwrap().urls.len()
    }

    /// Total `close` calls across all connections.
    pub(crate) fn closes(&self) -> usize {
        self.record.lock().unwrap().closes
    }

    /// Receivers for frames written to each WebSocket connection, in open
    /// order.
    pub(crate) fn take_outbound(&self) -> Vec<mpsc::UnboundedReceiver<String>> {
        std::mem::take(&mut self.record.lock().unwrap().outbound)
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn open(&self, url: Url) -> Result<Box<dyn Connection>, TransportError> {
        self.record.lock().unwrap().urls.push(url);
        let attempt = self.script.lock().unwrap().pop_front();

        match attempt {
            None => Err(TransportError::ConnectionFailed("script exhausted".into())),
            Some(Attempt::Fail(e)) => Err(e),
            Some(Attempt::Open(steps)) => {
                let outbound = (self.kind == TransportKind::WebSocket).then(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.record.lock().unwrap().outbound.push(rx);
                    tx
                });
                Ok(Box::new(MockConnection {
                    steps: steps.into(),
                    outbound,
                    record: Arc::clone(&self.record),
                }))
            }
        }
    }
}

struct MockConnection {
    steps: VecDeque<Step>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    record: Arc<Mutex<Record>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Some(Ok(frame)),
            Some(Step::Error(e)) => Some(Err(e)),
            Some(Step::End) => None,
            None => std::future::pending().await,
        }
    }

    fn outbound(&self) -> Option<mpsc::UnboundedSender<String>> {
        self.outbound.clone()
    }

    // Counts every call so tests can assert close-once.
    fn close(&mut self) {
        self.outbound = None;
        self.record.lock().unwrap().closes += 1;
    }
}
