//! Fixed-interval polling with an attempt budget.
//!
//! The loop is independent of what is being polled: callers supply a probe
//! closure and a predicate that decides when the probed value is final. The
//! sleep between probes goes through a [`Sleeper`], so tests can drive the
//! loop without real delays.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Default delay between two probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of probes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Interval and budget of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each probe.
    pub interval: Duration,
    /// Maximum number of probes.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time spent sleeping, `None` if it overflows.
    #[must_use]
    pub fn budget(&self) -> Option<Duration> {
        self.interval.checked_mul(self.max_attempts)
    }
}

/// Source of delays between probes.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a poll loop ended without a probe error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted `value` after `attempts` probes.
    Ready { value: T, attempts: u32 },
    /// The budget ran out; `last` is the final probed value.
    Exhausted { last: T, attempts: u32 },
    /// The token was cancelled after `attempts` probes.
    Cancelled { attempts: u32 },
}

/// Probe until `is_done` accepts a value or the budget is spent.
///
/// `initial` is checked first and costs no probe. Each attempt sleeps for
/// `policy.interval` and then calls `probe` with the 1-based attempt number.
/// Cancellation is observed while sleeping and while probing. A probe error
/// ends the loop immediately.
pub async fn poll_until<T, E, F, Fut, P>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    initial: T,
    mut probe: F,
    is_done: P,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    if cancel.is_cancelled() {
        return Ok(PollOutcome::Cancelled { attempts: 0 });
    }
    if is_done(&initial) {
        return Ok(PollOutcome::Ready {
            value: initial,
            attempts: 0,
        });
    }

    let mut last = initial;
    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(PollOutcome::Cancelled { attempts: attempt - 1 });
            }
            () = sleeper.sleep(policy.interval) => {}
        }

        let value = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(PollOutcome::Cancelled { attempts: attempt - 1 });
            }
            result = probe(attempt) => result?,
        };

        if is_done(&value) {
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }
        last = value;
    }

    Ok(PollOutcome::Exhausted {
        last,
        attempts: policy.max_attempts,
    })
}
