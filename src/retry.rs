//! Retry decision logic for connection establishment
//!
//! A [`BackoffPolicy`] computes the next delay for a given attempt number;
//! the [`RetryController`] owns the attempt counter and elapsed-time ceiling
//! and turns a failure into a [`RetryDecision`]. The controller never does
//! I/O; the connection manager owns the actual timers.

use crate::error::{classify, ClientError, ErrorClass};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-attempt delay calculator
pub trait BackoffPolicy: Send + Sync {
    /// Delay before the given attempt. `attempt` starts at 1.
    fn next_delay(&mut self, attempt: u32) -> Duration;
}

/// Exponential backoff with randomized jitter and a per-attempt cap.
///
/// The base delay doubles each attempt starting from `initial`, jitter of up
/// to half the base is added to de-synchronize retry storms across a fleet,
/// and the result never exceeds `max`.
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    rng: SmallRng,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seeded variant for deterministic tests
    pub fn with_seed(initial: Duration, max: Duration, seed: u64) -> Self {
        Self {
            initial,
            max,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let base = self
            .initial
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max);
        let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
        let jitter = Duration::from_millis(self.rng.gen_range(0..jitter_ceiling));
        (base + jitter).min(self.max)
    }
}

/// Fixed-interval backoff, the legacy retry mode.
///
/// Same trait seam as [`ExponentialBackoff`]; every attempt waits the same
/// configured interval.
pub struct FixedIntervalBackoff {
    interval: Duration,
}

impl FixedIntervalBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl BackoffPolicy for FixedIntervalBackoff {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// Outcome of a retry consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after the given delay
    Retry(Duration),
    /// Stop retrying; surface the underlying error
    GiveUp,
}

/// Owns the retry attempt state for one connection manager.
///
/// `count` and `first_failure` reset exactly once per successful connect,
/// via [`RetryController::reset`]. A connection loss mid-session continues
/// the existing backoff series rather than starting a fresh one.
pub struct RetryController {
    policy: Box<dyn BackoffPolicy>,
    ceiling: Duration,
    count: u32,
    first_failure: Option<Instant>,
    last_delay: Option<Duration>,
}

impl RetryController {
    pub fn new(policy: Box<dyn BackoffPolicy>, ceiling: Duration) -> Self {
        Self {
            policy,
            ceiling,
            count: 0,
            first_failure: None,
            last_delay: None,
        }
    }

    /// Decide whether to retry after `error`, tracking elapsed time from the
    /// first failure of the current series.
    pub fn should_retry(&mut self, error: &ClientError) -> RetryDecision {
        let elapsed = self
            .first_failure
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        self.decide(error, elapsed)
    }

    /// Decision with an explicit elapsed duration. Extracted so tests can
    /// exercise the ceiling without clock control.
    pub fn decide(&mut self, error: &ClientError, elapsed: Duration) -> RetryDecision {
        if classify(error) == ErrorClass::Fatal {
            debug!(%error, "fatal error, not retrying");
            return RetryDecision::GiveUp;
        }

        if self.first_failure.is_none() {
            self.first_failure = Some(Instant::now());
        }

        let delay = self.policy.next_delay(self.count + 1);
        if elapsed + delay > self.ceiling {
            debug!(
                ?elapsed,
                ?delay,
                ceiling = ?self.ceiling,
                "retry ceiling exceeded, giving up"
            );
            return RetryDecision::GiveUp;
        }

        self.count += 1;
        self.last_delay = Some(delay);
        debug!(attempt = self.count, ?delay, "scheduling retry");
        RetryDecision::Retry(delay)
    }

    /// Clear the attempt series. Called exactly once per successful
    /// (re)connection, by the connection manager.
    pub fn reset(&mut self) {
        self.count = 0;
        self.first_failure = None;
        self.last_delay = None;
    }

    pub fn attempt_count(&self) -> u32 {
        self.count
    }

    pub fn last_delay(&self) -> Option<Duration> {
        self.last_delay
    }
}
