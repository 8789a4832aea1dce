//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Upper bound of the random jitter, as a fraction of the capped delay.
pub const JITTER_RATIO: f64 = 0.2;

/// Attempt budget and delay curve for a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub factor: f64,
}

/// Invalid retry policy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyError {
    #[error("max_retries must be at least 1")]
    NoAttempts,

    #[error("initial delay {initial:?} exceeds max delay {max:?}")]
    DelayOrder { initial: Duration, max: Duration },

    #[error("backoff factor must be greater than 1, got {0}")]
    Factor(f64),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, factor: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            factor,
        }
    }

    /// Check the policy invariants.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_retries == 0 {
            return Err(PolicyError::NoAttempts);
        }
        if self.initial_delay > self.max_delay {
            return Err(PolicyError::DelayOrder {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        if self.factor.is_nan() || self.factor <= 1.0 {
            return Err(PolicyError::Factor(self.factor));
        }
        Ok(())
    }

    /// Un-jittered delay before the retry following zero-based `attempt_index`.
    ///
    /// `min(initial_delay * factor^attempt_index, max_delay)`
    pub fn base_delay(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Capped delay plus uniform jitter in `[0, JITTER_RATIO * delay]`.
    pub fn delay_with_jitter<R: Rng + ?Sized>(&self, attempt_index: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt_index);
        let jitter = base.mul_f64(rng.gen_range(0.0..=JITTER_RATIO));
        base + jitter
    }

    /// Jittered delay using the thread-local RNG.
    pub fn delay(&self, attempt_index: u32) -> Duration {
        self.delay_with_jitter(attempt_index, &mut rand::thread_rng())
    }
}
