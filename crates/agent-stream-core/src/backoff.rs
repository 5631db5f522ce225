//! Reconnect delay computation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay (milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default delay cap before jitter (milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter as a fraction of the exponential delay.
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// Exponential backoff with additive jitter.
///
/// `delay(n) = min(base * 2^n, max) + uniform[0, jitter_ratio * that)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry (milliseconds).
    pub base_delay_ms: u64,
    /// Cap on the exponential part (milliseconds).
    pub max_delay_ms: u64,
    /// Upper bound of the jitter as a fraction of the exponential part.
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with the default jitter ratio.
    #[must_use]
    pub const fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// Delay before retry number `attempt` (zero-based), with random jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::random::<f64>())
    }

    /// Delay before retry number `attempt` for a given jitter sample.
    ///
    /// `unit` is clamped to `[0, 1]`; 0 yields the bare exponential delay.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        let exponential = self.exponential_ms(attempt);
        let ratio = if self.jitter_ratio.is_finite() {
            self.jitter_ratio.max(0.0)
        } else {
            0.0
        };
        let unit = if unit.is_nan() { 0.0 } else { unit.clamp(0.0, 1.0) };
        let jitter = (exponential as f64 * ratio * unit) as u64;
        Duration::from_millis(exponential.saturating_add(jitter))
    }

    /// Capped exponential part of the delay, without jitter.
    #[must_use]
    pub fn exponential_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.exponential_ms(0), 1_000);
        assert_eq!(policy.exponential_ms(1), 2_000);
        assert_eq!(policy.exponential_ms(4), 16_000);
        assert_eq!(policy.exponential_ms(5), 30_000);
        assert_eq!(policy.exponential_ms(200), 30_000);
    }

    #[test]
    fn test_delay_bounds() {
        let policy = BackoffPolicy::default();
        for attempt in 0..40 {
            let exponential = policy.exponential_ms(attempt);
            for _ in 0..20 {
                let delay = policy.delay(attempt).as_millis() as u64;
                assert!(delay >= exponential, "attempt {attempt}: {delay} < {exponential}");
                assert!(delay <= 33_000, "attempt {attempt}: {delay} above cap");
                if attempt < 5 {
                    assert!(delay >= 1_000 * (1 << attempt));
                }
            }
        }
    }

    #[test]
    fn test_non_decreasing_for_fixed_jitter() {
        let policy = BackoffPolicy::default();
        for unit in [0.0, 0.5, 1.0] {
            let delays: Vec<_> = (0..12)
                .map(|attempt| policy.delay_with_jitter(attempt, unit))
                .collect();
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{delays:?}");
        }
    }

    #[test]
    fn test_jitter_is_additive_up_to_ten_percent() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_with_jitter(2, 0.0), Duration::from_millis(4_000));
        assert_eq!(policy.delay_with_jitter(2, 1.0), Duration::from_millis(4_400));
        assert_eq!(policy.delay_with_jitter(9, 1.0), Duration::from_millis(33_000));
        assert_eq!(policy.delay_with_jitter(2, 7.0), Duration::from_millis(4_400));
        assert_eq!(policy.delay_with_jitter(2, f64::NAN), Duration::from_millis(4_000));
    }

    #[test]
    fn test_huge_base_saturates() {
        let policy = BackoffPolicy::new(u64::MAX, u64::MAX);
        assert_eq!(policy.exponential_ms(3), u64::MAX);
        assert_eq!(policy.delay_with_jitter(3, 1.0), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: BackoffPolicy = serde_json::from_str(r#"{"max_delay_ms": 5000}"#).unwrap();
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
        assert_eq!(policy.max_delay_ms, 5_000);
    }
}
