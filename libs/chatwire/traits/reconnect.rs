use std::time::Duration;

/// Retry bookkeeping owned by the connection manager
///
/// `current_delay` is the delay the next scheduled retry will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    /// Retries scheduled since the last successful open
    pub attempts: u32,
    /// Delay for the next retry
    pub current_delay: Duration,
}

/// Trait for defining reconnection backoff policies
///
/// Policies are pure: they never hold the counter themselves, the
/// connection manager threads it through `next` and `reset`.
pub trait BackoffPolicy: Send + Sync {
    /// Counter value after a successful open (or an explicit connect)
    fn reset(&self) -> RetryCounter;

    /// Delay for the retry about to be scheduled, and the grown counter
    ///
    /// `attempts` increases by exactly one per call.
    fn next(&self, counter: RetryCounter) -> (Duration, RetryCounter);

    /// Check if another retry may be scheduled
    ///
    /// # Returns
    /// * `true` - Schedule a retry
    /// * `false` - Retry budget exhausted
    fn can_retry(&self, counter: &RetryCounter) -> bool;
}

/// Exponential backoff reconnection policy
///
/// Delays grow geometrically:
/// `min(max_delay, base_delay * multiplier^attempts)`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff policy
    ///
    /// # Arguments
    /// * `base_delay` - Delay before the first retry
    /// * `max_delay` - Upper bound for any delay
    /// * `multiplier` - Growth factor applied per attempt, raised to 1.0 if lower or NaN
    /// * `max_attempts` - Retries allowed before giving up
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            // f64::max returns 1.0 for NaN
            multiplier: multiplier.max(1.0),
            max_attempts,
        }
    }

    /// Delay used for the retry following `attempts` earlier retries
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        // f64::min ignores NaN and clamps infinity
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn reset(&self) -> RetryCounter {
        RetryCounter {
            attempts: 0,
            current_delay: self.delay_for(0),
        }
    }

    fn next(&self, counter: RetryCounter) -> (Duration, RetryCounter) {
        let delay = self.delay_for(counter.attempts);
        let attempts = counter.attempts.saturating_add(1);
        let grown = RetryCounter {
            attempts,
            current_delay: self.delay_for(attempts),
        };
        (delay, grown)
    }

    fn can_retry(&self, counter: &RetryCounter) -> bool {
        counter.attempts < self.max_attempts
    }
}

/// Fixed delay reconnection policy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: u32,
}

impl FixedDelay {
    /// Create a new fixed delay policy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Retries allowed before giving up
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self { delay, max_attempts }
    }
}

impl BackoffPolicy for FixedDelay {
    fn reset(&self) -> RetryCounter {
        RetryCounter {
            attempts: 0,
            current_delay: self.delay,
        }
    }

    fn next(&self, counter: RetryCounter) -> (Duration, RetryCounter) {
        let grown = RetryCounter {
            attempts: counter.attempts.saturating_add(1),
            current_delay: self.delay,
        };
        (self.delay, grown)
    }

    fn can_retry(&self, counter: &RetryCounter) -> bool {
        counter.attempts < self.max_attempts
    }
}

/// Never reconnect policy
///
/// The client will not attempt to reconnect after disconnection
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl BackoffPolicy for NeverReconnect {
    fn reset(&self) -> RetryCounter {
        RetryCounter {
            attempts: 0,
            current_delay: Duration::ZERO,
        }
    }

    fn next(&self, counter: RetryCounter) -> (Duration, RetryCounter) {
        let grown = RetryCounter {
            attempts: counter.attempts.saturating_add(1),
            current_delay: Duration::ZERO,
        };
        (Duration::ZERO, grown)
    }

    fn can_retry(&self, _counter: &RetryCounter) -> bool {
        false
    }
}
