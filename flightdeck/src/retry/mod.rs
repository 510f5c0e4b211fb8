//! Retry policies with configurable backoff and jitter.
//!
//! A [`RetryPolicy`] governs re-invocation of one step after it returns a
//! retryable failure. It is consulted only for retryable failures; fatal
//! failures never retry. When the policy gives up, the executor escalates the
//! last result to fatal.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Jitter strategy to prevent synchronized retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(base, prev * 3))
    Decorrelated,
}

/// Governs how often and how quickly a step is re-invoked.
///
/// `max_count` is the total number of invocations, including the first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Invoke once; any retryable failure becomes fatal.
    #[default]
    None,
    /// Sleep a constant interval between attempts.
    Fixed {
        /// Delay between attempts.
        interval: Duration,
        /// Total attempts allowed.
        max_count: u32,
    },
    /// Double the delay after every attempt until a time budget runs out.
    Exponential {
        /// Delay after the first failure.
        initial: Duration,
        /// Cap on a single delay.
        max_interval: Duration,
        /// Give up once this much time has passed since the first attempt.
        max_operation_time: Duration,
        /// Jitter applied to every delay.
        jitter: JitterStrategy,
    },
    /// Sleep `increment` times a random factor in `1..=pool_size`.
    ///
    /// Scaling by the worker-pool size keeps flights contending for the same
    /// lock from retrying in lockstep when the pool is saturated.
    RandomBackoff {
        /// Base unit of delay.
        increment: Duration,
        /// Upper bound of the random multiplier.
        pool_size: u32,
        /// Total attempts allowed.
        max_count: u32,
    },
}

impl RetryPolicy {
    /// Creates a fixed-interval policy.
    #[must_use]
    pub fn fixed(interval: Duration, max_count: u32) -> Self {
        Self::Fixed {
            interval,
            max_count,
        }
    }

    /// Creates an exponential policy with full jitter.
    #[must_use]
    pub fn exponential(
        initial: Duration,
        max_interval: Duration,
        max_operation_time: Duration,
    ) -> Self {
        Self::Exponential {
            initial,
            max_interval,
            max_operation_time,
            jitter: JitterStrategy::Full,
        }
    }

    /// Creates a pool-scaled random backoff policy.
    #[must_use]
    pub fn random_backoff(increment: Duration, pool_size: u32, max_count: u32) -> Self {
        Self::RandomBackoff {
            increment,
            pool_size,
            max_count,
        }
    }

    /// Sets the jitter strategy of an exponential policy; other shapes are unchanged.
    #[must_use]
    pub fn with_jitter(self, strategy: JitterStrategy) -> Self {
        match self {
            Self::Exponential {
                initial,
                max_interval,
                max_operation_time,
                ..
            } => Self::Exponential {
                initial,
                max_interval,
                max_operation_time,
                jitter: strategy,
            },
            other => other,
        }
    }

    /// Sets the random multiplier bound of a random-backoff policy to the
    /// worker-pool size; other shapes are unchanged.
    #[must_use]
    pub fn scaled_to_pool(self, pool_size: u32) -> Self {
        match self {
            Self::RandomBackoff {
                increment,
                max_count,
                ..
            } => Self::RandomBackoff {
                increment,
                pool_size: pool_size.max(1),
                max_count,
            },
            other => other,
        }
    }

    /// Returns the attempt budget, if the policy is count-bounded.
    #[must_use]
    pub fn max_count(&self) -> Option<u32> {
        match self {
            Self::None => Some(1),
            Self::Fixed { max_count, .. } | Self::RandomBackoff { max_count, .. } => {
                Some(*max_count)
            }
            Self::Exponential { .. } => None,
        }
    }
}

/// State tracking for retries of one step invocation sequence.
#[derive(Debug)]
pub struct RetryState {
    /// Number of invocations made so far.
    pub attempt: u32,
    started_at: Instant,
    previous_delay: Option<Duration>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            attempt: 0,
            started_at: Instant::now(),
            previous_delay: None,
        }
    }
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an invocation is about to happen.
    pub fn record_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Returns the time elapsed since the state was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Calculates the delay before the next attempt under an exponential policy.
    fn exponential_delay(
        &mut self,
        initial: Duration,
        max_interval: Duration,
        jitter: JitterStrategy,
    ) -> Duration {
        let base = millis(initial);
        let max = millis(max_interval);
        let exponent = self.attempt.saturating_sub(1).min(63);
        let delay = base.saturating_mul(2u64.saturating_pow(exponent)).min(max);

        let jittered = match jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = self.previous_delay.map_or(base, millis);
                let upper = prev.saturating_mul(3).min(max);
                if upper <= base {
                    base
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                }
            }
        };

        let delay = Duration::from_millis(jittered);
        self.previous_delay = Some(delay);
        delay
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// The budget is exhausted, give up.
    GiveUp,
    /// The policy does not retry at all.
    NotRetryable,
}

/// Decides whether to re-invoke a step that just returned a retryable failure.
///
/// `state.attempt` must already count the failed invocation.
#[must_use]
pub fn should_retry(state: &mut RetryState, policy: &RetryPolicy) -> RetryDecision {
    match *policy {
        RetryPolicy::None => RetryDecision::NotRetryable,
        RetryPolicy::Fixed {
            interval,
            max_count,
        } => {
            if state.attempt >= max_count {
                RetryDecision::GiveUp
            } else {
                RetryDecision::Retry(interval)
            }
        }
        RetryPolicy::RandomBackoff {
            increment,
            pool_size,
            max_count,
        } => {
            if state.attempt >= max_count {
                return RetryDecision::GiveUp;
            }
            let factor = rand::thread_rng().gen_range(1..=pool_size.max(1));
            RetryDecision::Retry(increment.saturating_mul(factor))
        }
        RetryPolicy::Exponential {
            initial,
            max_interval,
            max_operation_time,
            jitter,
        } => {
            if state.elapsed() >= max_operation_time {
                return RetryDecision::GiveUp;
            }
            RetryDecision::Retry(state.exponential_delay(initial, max_interval, jitter))
        }
    }
}
