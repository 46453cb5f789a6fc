//! Bounded polling: retry an async check until it succeeds or a time/try
//! budget runs out. This is the only synchronization primitive the audit
//! pipeline uses; both the readiness wait and the single-flight gate are
//! built on it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Target spacing between the start of consecutive checks. A check that
    /// takes longer than this is followed immediately by the next one.
    pub interval: Duration,
    /// Wall-clock budget, checked before each attempt. An attempt started
    /// just under the deadline runs to completion and may still succeed.
    pub timeout: Duration,
    /// Attempt cap, checked after each attempt.
    pub max_tries: Option<u32>,
    /// On give-up, return `Ok(None)` instead of an error.
    pub fail_silently: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(60),
            max_tries: None,
            fail_silently: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("poll timed out after {0:?}")]
    TimedOut(Duration),
    #[error("poll gave up after {0} tries")]
    MaxTries(u32),
    #[error(transparent)]
    Check(E),
}

/// How a check in [`wait_until_ready`] signals failure: `NotReady` keeps the
/// loop going, `Fatal` aborts it immediately.
#[derive(Debug)]
pub enum CheckFailure<E> {
    NotReady,
    Fatal(E),
}

/// Retry `check` until it returns `Some`. `Ok(None)` means "not yet";
/// any `Err` aborts the loop immediately.
pub async fn wait_for_truthy<T, E, F, Fut>(
    opts: &PollOptions,
    mut check: F,
) -> Result<Option<T>, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    poll_loop(opts, move || {
        let fut = check();
        async move {
            match fut.await {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(CheckFailure::NotReady),
                Err(err) => Err(CheckFailure::Fatal(err)),
            }
        }
    })
    .await
}

/// Retry `check` until it completes without signaling [`CheckFailure::NotReady`].
pub async fn wait_until_ready<T, E, F, Fut>(
    opts: &PollOptions,
    check: F,
) -> Result<Option<T>, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CheckFailure<E>>>,
{
    poll_loop(opts, check).await
}

async fn poll_loop<T, E, F, Fut>(opts: &PollOptions, mut check: F) -> Result<Option<T>, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CheckFailure<E>>>,
{
    let started = Instant::now();
    let mut tries: u32 = 0;

    loop {
        let elapsed_before = started.elapsed();
        if elapsed_before > opts.timeout {
            return give_up(opts, PollError::TimedOut(opts.timeout));
        }

        let attempt = check().await;
        tries += 1;
        match attempt {
            Ok(value) => return Ok(Some(value)),
            Err(CheckFailure::Fatal(err)) => return Err(PollError::Check(err)),
            Err(CheckFailure::NotReady) => {
                trace!(tries, elapsed_ms = started.elapsed().as_millis() as u64, "check not ready");
            }
        }

        if let Some(max) = opts.max_tries {
            if tries >= max {
                return give_up(opts, PollError::MaxTries(tries));
            }
        }

        let call_duration = started.elapsed().saturating_sub(elapsed_before);
        let pause = opts.interval.saturating_sub(call_duration);
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }
}

fn give_up<T, E>(opts: &PollOptions, err: PollError<E>) -> Result<Option<T>, PollError<E>> {
    if opts.fail_silently {
        Ok(None)
    } else {
        Err(err)
    }
}
