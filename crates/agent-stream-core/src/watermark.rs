//! Resume cursor for reconnecting streams.

use crate::AgentMessage;

/// Tracks the highest message timestamp seen in a logical stream.
///
/// The value survives reconnects and seeds the `since` parameter of every
/// new connection. It never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatermarkTracker {
    current: u64,
}

impl WatermarkTracker {
    /// Start tracking from `since` (0 for the beginning of the run).
    #[must_use]
    pub const fn new(since: u64) -> Self {
        Self { current: since }
    }

    /// Record a received message.
    pub fn observe(&mut self, message: &AgentMessage) {
        if let Some(timestamp) = message.timestamp {
            self.current = self.current.max(timestamp);
        }
    }

    /// Current resume cursor.
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageType;

    fn at(timestamp: u64) -> AgentMessage {
        AgentMessage::new(MessageType::Update).with_timestamp(timestamp)
    }

    #[test]
    fn test_starts_at_since() {
        assert_eq!(WatermarkTracker::default().current(), 0);
        assert_eq!(WatermarkTracker::new(42).current(), 42);
    }

    #[test]
    fn test_tracks_max_regardless_of_order() {
        let mut tracker = WatermarkTracker::new(0);
        for timestamp in [30, 10, 50, 20, 50, 40] {
            tracker.observe(&at(timestamp));
        }
        assert_eq!(tracker.current(), 50);
    }

    #[test]
    fn test_never_regresses_below_since() {
        let mut tracker = WatermarkTracker::new(1_000);
        tracker.observe(&at(999));
        assert_eq!(tracker.current(), 1_000);
    }

    #[test]
    fn test_ignores_messages_without_timestamp() {
        let mut tracker = WatermarkTracker::new(7);
        tracker.observe(&AgentMessage::new(MessageType::Update));
        assert_eq!(tracker.current(), 7);
    }
}
