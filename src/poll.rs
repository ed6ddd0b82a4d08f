use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{AdminError, Result};

/// How long to wait for a change to become visible, by default
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// How long to sleep between two checks, by default
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Total time budget. No check starts once this much time has elapsed
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollSettings {
    /// The most checks a wait can perform before it times out
    pub fn max_checks(&self) -> u128 {
        if self.interval.is_zero() {
            return u128::MAX;
        }
        self.timeout.as_nanos().div_ceil(self.interval.as_nanos())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The check returned true
    Reached,
    TimedOut,
}

/// Repeatedly runs `check` until it returns `true` or the time budget runs out. The first check
/// runs immediately and a successful check returns without sleeping. A check that errors counts as
/// a `false` round and is only logged.
///
/// The budget is a hard limit: a check still running at the deadline is dropped and the wait
/// times out.
///
/// Cancelling `cancel` aborts the wait (including a check in progress) with
/// [`AdminError::Interrupted`].
pub async fn wait_until<F, Fut>(
    settings: &PollSettings,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<PollResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let start = Instant::now();
    let deadline = start + settings.timeout;
    let mut attempt: u32 = 0;
    while start.elapsed() < settings.timeout {
        attempt += 1;
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AdminError::Interrupted),
            res = check() => res,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(attempt, "Check still running when the time budget ran out");
                break;
            }
        };
        match res {
            Ok(true) => {
                trace!(attempt, elapsed = ?start.elapsed(), "Target state reached");
                return Ok(PollResult::Reached);
            }
            Ok(false) => trace!(attempt, "Target state not reached yet"),
            Err(err) => warn!(attempt, err = %format!("{err:#}"), "Check failed, will retry"),
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AdminError::Interrupted),
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }
    Ok(PollResult::TimedOut)
}
