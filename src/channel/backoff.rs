use std::time::Duration;

/// Default delay before the first reconnect attempt
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Exponential reconnect backoff
///
/// `delay(n) = base * 2^n`. Without a cap the delay keeps doubling until the
/// millisecond arithmetic saturates at `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
    max_delay_ms: Option<u64>,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: Option<u64>) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Clamp every delay to `max_delay_ms`
    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Delay to wait before reconnecting after `attempt` previous failures
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(0);
        let ms = if factor == 0 {
            // 2^attempt no longer fits in 64 bits
            if self.base_delay_ms == 0 { 0 } else { u64::MAX }
        } else {
            self.base_delay_ms.saturating_mul(factor)
        };

        let ms = match self.max_delay_ms {
            Some(max) => ms.min(max),
            None => ms,
        };

        Duration::from_millis(ms)
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> Option<u64> {
        self.max_delay_ms
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY_MS, None)
    }
}
