//! Single-settlement completion handle.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::StreamError;

/// Result a completion handle settles with.
pub type StreamResult = Result<StreamOutcome, StreamError>;

/// How a stream ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The run finished, or the message callback requested an early exit.
    ///
    /// Carries the payload passed to [`ExitSignal::exit_with`], if any.
    Completed(Option<Value>),
    /// The caller cancelled the stream.
    Cancelled,
}

impl StreamOutcome {
    /// Early-exit payload, if the stream completed with one.
    #[must_use]
    pub fn into_payload(self) -> Option<Value> {
        match self {
            Self::Completed(payload) => payload,
            Self::Cancelled => None,
        }
    }
}

/// Settling side of a completion handle. Only the first settlement counts.
#[derive(Debug)]
pub(crate) struct Completer {
    tx: Option<oneshot::Sender<StreamResult>>,
}

impl Completer {
    /// Settle the handle. Returns `false` if it was already settled.
    pub(crate) fn settle(&mut self, result: StreamResult) -> bool {
        let Some(tx) = self.tx.take() else {
            return false;
        };
        // The receiver may be gone; settling still counts.
        let _ = tx.send(result);
        true
    }

    pub(crate) const fn is_settled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Future resolving once when the stream ends.
#[derive(Debug)]
#[must_use = "the stream outcome is only observable through this handle"]
pub struct CompletionHandle {
    rx: oneshot::Receiver<StreamResult>,
}

impl Future for CompletionHandle {
    type Output = StreamResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(StreamError::Abandoned)))
    }
}

/// Create a connected completer/handle pair.
pub(crate) fn completion() -> (Completer, CompletionHandle) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx: Some(tx) }, CompletionHandle { rx })
}

/// Lets a message callback end the stream early.
///
/// The first request wins; later calls are ignored.
#[derive(Debug, Default)]
pub struct ExitSignal {
    requested: Option<Option<Value>>,
}

impl ExitSignal {
    /// End the stream without a payload.
    pub fn exit(&mut self) {
        self.request(None);
    }

    /// End the stream and settle it with `payload`.
    pub fn exit_with(&mut self, payload: Value) {
        self.request(Some(payload));
    }

    /// Whether an exit was requested.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        self.requested.is_some()
    }

    fn request(&mut self, payload: Option<Value>) {
        if self.requested.is_none() {
            self.requested = Some(payload);
        }
    }

    pub(crate) fn take(&mut self) -> Option<Option<Value>> {
        self.requested.take()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[tokio::test]
    async fn test_first_settlement_wins() {
        let (mut completer, handle) = completion();
        assert!(!completer.is_settled());
        assert!(completer.settle(Ok(StreamOutcome::Completed(Some(json!(1))))));
        assert!(!completer.settle(Err(StreamError::Unauthenticated)));
        assert!(completer.is_settled());

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.into_payload(), Some(json!(1)));
    }

    #[test]
    fn test_pending_until_settled() {
        let (mut completer, handle) = completion();
        let mut handle = task::spawn(handle);
        assert_pending!(handle.poll());

        completer.settle(Ok(StreamOutcome::Cancelled));
        assert!(handle.is_woken());
        let outcome = match handle.poll() {
            Poll::Ready(result) => result.unwrap(),
            Poll::Pending => panic!("handle should be ready"),
        };
        assert_eq!(outcome, StreamOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_completer_is_abandoned() {
        let (completer, handle) = completion();
        drop(completer);
        assert!(matches!(handle.await, Err(StreamError::Abandoned)));
    }

    #[test]
    fn test_settle_without_receiver() {
        let (mut completer, handle) = completion();
        drop(handle);
        assert!(completer.settle(Ok(StreamOutcome::Completed(None))));
    }

    #[test]
    fn test_exit_signal_first_request_wins() {
        let mut exit = ExitSignal::default();
        assert!(!exit.is_requested());
        exit.exit_with(json!("first"));
        exit.exit();
        assert!(exit.is_requested());
        assert_eq!(exit.take(), Some(Some(json!("first"))));
        assert_eq!(exit.take(), None);
    }

    #[test]
    fn test_ready_value() {
        let (mut completer, handle) = completion();
        completer.settle(Ok(StreamOutcome::Completed(None)));
        let mut handle = task::spawn(async move { handle.await.unwrap() });
        assert_ready_eq!(handle.poll(), StreamOutcome::Completed(None));
    }
}
