use std::time::Duration;

/// Bounded retry policy with linearly increasing delays.
///
/// Formula: delay(attempt) = attempt * base, for attempt in 1..=max_attempts.
///
/// The policy says nothing about how the delay is spent: a caller may sleep
/// for it, or use it as the wait window for a pending response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    base: Duration,
    max_attempts: u32,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl LinearBackoff {
    /// Create a new LinearBackoff.
    ///
    /// # Arguments
    /// * `base` - Delay of the first attempt; attempt `n` waits `n * base`
    /// * `max_attempts` - Number of attempts before giving up. Zero is clamped to 1.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay for a 1-based attempt index.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// The 1-based attempt indices this policy allows.
    pub fn attempts(&self) -> impl Iterator<Item = u32> {
        1..=self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Sum of all delays, i.e. the worst-case time spent before giving up.
    pub fn total_budget(&self) -> Duration {
        self.attempts().map(|a| self.delay_for(a)).sum()
    }
}
