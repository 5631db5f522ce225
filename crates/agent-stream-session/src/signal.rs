//! Signal side channel for WebSocket streams.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use agent_stream_core::RunHandle;
use agent_stream_transport::ClientMessage;
use serde_json::Value;
use tokio::sync::mpsc;

struct Outbound {
    generation: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Writer of the currently open connection, if any.
///
/// Installed by the session when a connection opens and cleared on
/// teardown. A clear only succeeds for the generation that installed the
/// writer, so a stale teardown cannot remove a newer connection's writer.
#[derive(Clone, Default)]
pub(crate) struct OutboundSlot {
    inner: Arc<Mutex<Option<Outbound>>>,
}

impl OutboundSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Outbound>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn install(&self, generation: u64, tx: mpsc::UnboundedSender<String>) {
        *self.lock() = Some(Outbound { generation, tx });
    }

    pub(crate) fn clear(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|o| o.generation == generation) {
            *slot = None;
        }
    }

    fn send(&self, frame: String) -> bool {
        let slot = self.lock();
        slot.as_ref().is_some_and(|o| o.tx.send(frame).is_ok())
    }

    fn is_open(&self) -> bool {
        self.lock().as_ref().is_some_and(|o| !o.tx.is_closed())
    }
}

/// Sends signals to the running workflow over the open WebSocket.
///
/// Cheap to clone. Signals follow the session across reconnects; while no
/// connection is open they are dropped with a warning.
#[derive(Clone)]
pub struct SignalChannel {
    run: RunHandle,
    outbound: OutboundSlot,
    next_request: Arc<AtomicU64>,
}

impl SignalChannel {
    pub(crate) fn new(run: RunHandle, outbound: OutboundSlot) -> Self {
        Self {
            run,
            outbound,
            next_request: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Whether a connection is currently open to carry signals.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.outbound.is_open()
    }

    /// Send `name` with `data` to the workflow.
    ///
    /// Returns `false`, after logging a warning, if no connection is open
    /// or the message could not be queued.
    pub fn send_signal(&self, name: &str, data: Value) -> bool {
        let request_id = self.request_id();
        let frame = match ClientMessage::signal(name, data, request_id.as_str()).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(run = %self.run, signal = name, "Failed to encode signal: {e}");
                return false;
            }
        };

        if self.outbound.send(frame) {
            tracing::debug!(run = %self.run, signal = name, request_id = %request_id, "Signal sent");
            true
        } else {
            tracing::warn!(run = %self.run, signal = name, "Cannot send signal: stream not open");
            false
        }
    }

    /// `<epoch-ms>-<sequence>`, unique per channel.
    fn request_id(&self) -> String {
        let sequence = self.next_request.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        format!("{millis}-{sequence}")
    }
}

impl std::fmt::Debug for SignalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalChannel")
            .field("run", &self.run)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn channel() -> (SignalChannel, OutboundSlot) {
        let slot = OutboundSlot::default();
        let channel = SignalChannel::new(RunHandle::new("wf", "run"), slot.clone());
        (channel, slot)
    }

    #[test]
    fn test_send_when_open() {
        let (channel, slot) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.install(1, tx);
        assert!(channel.is_open());

        assert!(channel.send_signal("approve", json!({"ok": true})));
        assert!(channel.send_signal("approve", json!({"ok": false})));

        let first: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let second: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["type"], "signal");
        assert_eq!(first["signalName"], "approve");
        assert_eq!(first["data"], json!({"ok": true}));
        assert_ne!(first["requestId"], second["requestId"]);
        assert!(first["requestId"].as_str().unwrap().ends_with("-1"));
    }

    #[test]
    fn test_noop_when_not_open() {
        let (channel, _slot) = channel();
        assert!(!channel.is_open());
        assert!(!channel.send_signal("approve", Value::Null));
    }

    #[test]
    fn test_noop_when_writer_gone() {
        let (channel, slot) = channel();
        let (tx, rx) = mpsc::unbounded_channel();
        slot.install(1, tx);
        drop(rx);
        assert!(!channel.is_open());
        assert!(!channel.send_signal("approve", Value::Null));
    }

    #[test]
    fn test_stale_clear_keeps_newer_writer() {
        let (channel, slot) = channel();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        slot.install(1, old_tx);
        slot.install(2, new_tx);

        slot.clear(1);
        assert!(channel.send_signal("still-open", Value::Null));
        assert!(new_rx.try_recv().is_ok());

        slot.clear(2);
        assert!(!channel.send_signal("closed", Value::Null));
    }
}
