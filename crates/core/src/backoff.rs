//! Bounded exponential backoff.
//!
//! The operation under retry reports one of three explicit outcomes per
//! attempt ([`Step`]): a terminal value, a request to try again later, or a
//! terminal failure. Only `Retry` consumes the attempt budget; the other two
//! short-circuit.

use std::{fmt::Display, future::Future, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::RetryConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jitter {
    #[default]
    None,

    /// Wait a uniformly random duration in `[0, delay]`
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrySchedule {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
    pub max_delay: Option<Duration>,
    pub jitter: Jitter,

    /// Wait `initial_delay` before the very first attempt too
    pub delay_first_attempt: bool,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            multiplier: 2,
            max_attempts: 6,
            max_delay: None,
            jitter: Jitter::None,
            delay_first_attempt: true,
        }
    }
}

impl From<&RetryConfig> for RetrySchedule {
    fn from(value: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(value.initial_delay_ms),
            multiplier: value.multiplier,
            max_attempts: value.max_attempts,
            max_delay: value.max_delay_ms.map(Duration::from_millis),
            jitter: value.jitter,
            delay_first_attempt: value.delay_first_attempt,
        }
    }
}

impl RetrySchedule {
    /// The n-th wait (zero-based) before jitter: `initial * multiplier^n`,
    /// capped at `max_delay`.
    pub fn delay(&self, n: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(n);
        let delay = self.initial_delay.saturating_mul(factor);

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// How long to wait before the given zero-based attempt, if at all.
    fn wait_before(&self, attempt: u32) -> Option<Duration> {
        let n = match (attempt, self.delay_first_attempt) {
            (0, false) => return None,
            (n, true) => n,
            (n, false) => n - 1,
        };

        let delay = self.delay(n);

        let delay = match self.jitter {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = delay.as_millis().min(u64::MAX as u128) as u64;
                Duration::from_millis(rand::rng().random_range(0..=millis))
            }
        };

        Some(delay)
    }

    /// Sum of all waits when every attempt asks to retry, without jitter.
    pub fn total_wait(&self) -> Duration {
        let plain = Self {
            jitter: Jitter::None,
            ..self.clone()
        };

        (0..self.max_attempts.max(1))
            .filter_map(|attempt| plain.wait_before(attempt))
            .sum()
    }
}

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Step<T, R, E> {
    /// Terminal value
    Ready(T),

    /// Try again after the next wait, if the budget allows
    Retry(R),

    /// Terminal failure
    Abort(E),
}

#[derive(Debug, Error)]
pub enum BackoffError<R, E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: R },

    #[error("aborted: {0}")]
    Aborted(E),
}

/// Runs `op` until it yields a terminal step or the schedule runs out.
///
/// `op` receives the one-based attempt number. At least one attempt is
/// always made, even with a zero `max_attempts`.
pub async fn retry<T, R, E, F, Fut>(
    schedule: &RetrySchedule,
    mut op: F,
) -> Result<T, BackoffError<R, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Step<T, R, E>>,
    R: Display,
{
    let max_attempts = schedule.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if let Some(wait) = schedule.wait_before(attempt) {
            tokio::time::sleep(wait).await;
        }

        attempt += 1;

        match op(attempt).await {
            Step::Ready(value) => return Ok(value),
            Step::Abort(err) => return Err(BackoffError::Aborted(err)),
            Step::Retry(reason) if attempt >= max_attempts => {
                return Err(BackoffError::Exhausted {
                    attempts: attempt,
                    last: reason,
                });
            }
            Step::Retry(reason) => {
                debug!(attempt, max_attempts, %reason, "attempt needs retry");
            }
        }
    }
}
