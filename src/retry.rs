//! Retry logic for rate limits and transient failures
//!
//! Every external call in the pipeline (message lookups, downloads, uploads,
//! group sends) goes through [`with_retry`]. Failures are classified three ways:
//!
//! - **Rate limited**: the platform asked us to wait. We sleep for the requested
//!   time plus a small padding and try again *without* spending an attempt.
//! - **Transient**: timeouts and I/O hiccups. One attempt is spent, we sleep a
//!   fixed delay and try again.
//! - **Fatal**: everything else. Returned to the caller immediately.
//!
//! Attempts and sleeps are raced against a [`CancellationToken`], so a cancelled
//! transfer stops at its next suspension point.
//!
//! # Example
//!
//! ```no_run
//! use media_relay::retry::{RetryPolicy, with_retry};
//! use media_relay::Error;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! let cancel = CancellationToken::new();
//! let value = with_retry(&RetryPolicy::default(), &cancel, || async {
//!     Ok::<_, Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a failure should be treated by [`with_retry`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    /// Wait the given time, then retry without spending an attempt
    RateLimited(Duration),
    /// Spend an attempt and retry after the policy delay
    Transient,
    /// Give up immediately
    Fatal,
}

/// Trait for errors that can be classified for retrying
pub trait Classify {
    /// Decide how the retry loop should react to this failure
    fn classify(&self) -> RetryClass;
}

impl Classify for Error {
    fn classify(&self) -> RetryClass {
        match self {
            Error::RateLimited { wait } => RetryClass::RateLimited(*wait),
            Error::Timeout(_) | Error::Transport(_) | Error::Io(_) => RetryClass::Transient,
            Error::Config { .. }
            | Error::PeerInvalid(_)
            | Error::Forbidden(_)
            | Error::InvalidLink(_)
            | Error::InvalidRange { .. }
            | Error::ChatMismatch
            | Error::NotFound(_)
            | Error::Transfer(_)
            | Error::ExternalTool(_)
            | Error::Serialization(_)
            | Error::Cancelled
            | Error::ShuttingDown
            | Error::Other(_) => RetryClass::Fatal,
        }
    }
}

/// Reasons the retry loop stopped an attempt on its own
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// The cancellation token fired
    Cancelled,
    /// The attempt exceeded the policy's call timeout
    TimedOut(Duration),
}

impl From<Interrupt> for Error {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => Error::Cancelled,
            Interrupt::TimedOut(limit) => Error::Timeout(limit),
        }
    }
}

/// Retry policy for one call site
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep after a transient failure
    pub delay: Duration,
    /// Added to every rate-limit wait
    pub rate_limit_padding: Duration,
    /// Ceiling for a single attempt (None = unbounded)
    pub call_timeout: Option<Duration>,
    /// Randomize transient delays between `delay` and `2 * delay`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            rate_limit_padding: Duration::from_secs(1),
            call_timeout: None,
            jitter: false,
        }
    }
}

/// Notification emitted by the retry loop before it sleeps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryNotice {
    /// The platform rate-limited us; sleeping `wait` plus padding
    RateLimited {
        /// Requested wait
        wait: Duration,
    },
    /// A transient failure spent an attempt
    Retrying {
        /// The attempt that just failed (1-based)
        attempt: u32,
        /// Total attempts allowed
        max_attempts: u32,
        /// Sleep before the next attempt
        delay: Duration,
    },
}

/// Execute an async operation under a retry policy
///
/// Returns the first success, the first fatal failure, or the last transient
/// failure once `max_attempts` attempts have been spent. Rate-limit waits are
/// unbounded in number: they are throttling compliance, not failures.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + From<Interrupt> + std::fmt::Display,
{
    with_retry_observed(policy, cancel, |_| {}, operation).await
}

/// [`with_retry`] with a callback invoked before every retry sleep
pub async fn with_retry_observed<F, Fut, T, E, O>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut observer: O,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + From<Interrupt> + std::fmt::Display,
    O: FnMut(RetryNotice),
{
    let mut attempt: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(E::from(Interrupt::Cancelled));
        }

        let error = match run_attempt(policy.call_timeout, cancel, operation()).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        match error.classify() {
            RetryClass::RateLimited(wait) => {
                tracing::warn!(
                    wait_secs = wait.as_secs(),
                    attempt,
                    "Rate limited, sleeping before retry"
                );
                observer(RetryNotice::RateLimited { wait });
                sleep_cancellable(wait + policy.rate_limit_padding, cancel)
                    .await
                    .map_err(E::from)?;
            }
            RetryClass::Transient if attempt < policy.max_attempts => {
                let delay = if policy.jitter {
                    add_jitter(policy.delay)
                } else {
                    policy.delay
                };

                tracing::warn!(
                    error = %error,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                observer(RetryNotice::Retrying {
                    attempt,
                    max_attempts: policy.max_attempts,
                    delay,
                });
                sleep_cancellable(delay, cancel).await.map_err(E::from)?;
                attempt += 1;
            }
            RetryClass::Transient => {
                tracing::error!(
                    error = %error,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(error);
            }
            RetryClass::Fatal => {
                tracing::debug!(error = %error, "Operation failed with non-retryable error");
                return Err(error);
            }
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first
pub async fn sleep_cancellable(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

async fn run_attempt<Fut, T, E>(
    call_timeout: Option<Duration>,
    cancel: &CancellationToken,
    attempt: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<Interrupt>,
{
    let bounded = async {
        match call_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(E::from(Interrupt::TimedOut(limit))),
            },
            None => attempt.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(E::from(Interrupt::Cancelled)),
        result = bounded => result,
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
