//! Retry policy and eligibility predicates.
//!
//! Whether a failed attempt is retried is decided in two steps:
//!
//! 1. The failure must be retryable at all ([`Error::is_retryable`]):
//!    validation errors, 4xx other than 429, serialization, configuration
//!    and cancellation never are.
//! 2. If the caller installed a [`RetryPredicate`], it must agree.
//!
//! The [`RetryPolicy`] then says how long to wait, or that the budget is spent.

use crate::{Error, FetcherErrorKind};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Exponential backoff over a fixed retry budget.
///
/// The wait before retry `n` (after attempt `n` failed) is
/// `base_delay * 2^(n-1)`, optionally capped and jittered.
///
/// # Examples
///
/// ```
/// use fetchwise::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     retries: 3,
///     base_delay: Duration::from_millis(100),
///     max_delay: None,
///     jitter: false,
/// };
///
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
/// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(400)));
/// assert_eq!(policy.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub retries: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Option<Duration>,
    /// Randomize each wait to 50-100% of its computed value.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Returns the wait after failed attempt `attempt` (1-indexed), or `None`
    /// if no retries remain.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if attempt == 0 || attempt > self.retries as usize {
            return None;
        }

        let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
        let multiplier = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        let mut delay = self.base_delay.saturating_mul(multiplier);
        if let Some(max) = self.max_delay {
            delay = delay.min(max);
        }

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            Some(delay.mul_f64(factor))
        } else {
            Some(delay)
        }
    }

    /// Maximum number of attempts this policy allows.
    pub fn max_attempts(&self) -> usize {
        self.retries as usize + 1
    }
}

/// Narrows which retryable failures are actually retried.
///
/// Only consulted for errors where [`Error::is_retryable`] is already `true`.
///
/// # Examples
///
/// ```
/// use fetchwise::{Error, RetryPredicate};
///
/// struct FirstTwoAttempts;
///
/// impl RetryPredicate for FirstTwoAttempts {
///     fn should_retry(&self, _error: &Error, attempt: usize) -> bool {
///         attempt < 2
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` to allow another attempt after `attempt` failed with `error`.
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retry only 5xx responses.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.status().is_some_and(|status| status.is_server_error())
    }
}

/// Retry only timeouts.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.kind() == Some(FetcherErrorKind::Timeout)
    }
}

/// Retry only 429 responses.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRateLimit;

impl RetryPredicate for RetryOnRateLimit {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.status().is_some_and(|status| status.as_u16() == 429)
    }
}

/// Retries if any inner predicate agrees.
///
/// # Examples
///
/// ```
/// use fetchwise::retry::{AnyOf, RetryOn5xx, RetryOnTimeout};
///
/// let predicate = AnyOf::new(vec![Box::new(RetryOn5xx), Box::new(RetryOnTimeout)]);
/// ```
pub struct AnyOf {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AnyOf {
    /// Combines `predicates` with OR logic.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AnyOf {
    fn should_retry(&self, error: &Error, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(error, attempt))
    }
}

/// The scheduler's eligibility check for one failed attempt.
pub(crate) fn is_eligible(
    error: &Error,
    attempt: usize,
    predicate: Option<&Arc<dyn RetryPredicate>>,
) -> bool {
    error.is_retryable()
        && predicate.map_or(true, |predicate| predicate.should_retry(error, attempt))
}
