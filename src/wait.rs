//! Condition polling with a deadline.
//!
//! [`wait_for`] repeatedly evaluates an asynchronous probe until it
//! produces a value or the timeout elapses. Probes may fail with a
//! transient error (element not yet present, dialog not yet open); such
//! failures are treated as "not yet satisfied" up to the deadline, after
//! which the last one is reported inside the [`Error::WaitTimeout`].
//!
//! Polling sleeps between attempts via [`tokio::time::sleep`], so a wait
//! suspends the calling task instead of busy-waiting.
//!
//! # Example
//!
//! ```ignore
//! let handles = wait_for("two windows", Duration::from_secs(10), DEFAULT_POLL_INTERVAL, || async {
//!     let handles = browser.window_handles().await?;
//!     Ok((handles.len() == 2).then_some(handles))
//! })
//! .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default interval between probe attempts (500 ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Waiting
// ============================================================================

/// Polls `probe` until it yields a value or `timeout` elapses.
///
/// The probe contract:
///
/// - `Ok(Some(value))` — condition satisfied, `value` is returned.
/// - `Ok(None)` — not yet satisfied, poll again after `interval`.
/// - `Err(e)` where `e` is transient or [`Error::NoDialog`] — swallowed
///   and remembered as the last observation, poll again.
/// - any other `Err` — propagated immediately without further polling.
///
/// # Errors
///
/// [`Error::WaitTimeout`] carrying the elapsed duration and the last
/// swallowed error once the deadline passes. The probe always runs at
/// least once, so a zero timeout still observes the condition.
pub async fn wait_for<T, F, Fut>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    wait_for_with(operation, timeout, interval, default_swallow, probe).await
}

/// Like [`wait_for`], with an explicit classification of which probe
/// errors count as "not yet satisfied".
///
/// The proxy retry loop routes the backend's own transient
/// classification through here, so backends can declare their own
/// retryable conditions.
pub async fn wait_for_with<T, F, Fut, S>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    swallow: S,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    S: Fn(&Error) -> bool,
{
    debug!(operation, timeout_ms = timeout.as_millis() as u64, "Waiting for condition");

    let start = Instant::now();
    let mut last: Option<Error> = None;
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        match probe().await {
            Ok(Some(value)) => {
                debug!(operation, polls, "Condition satisfied");
                return Ok(value);
            }
            Ok(None) => {
                trace!(operation, polls, "Condition not yet satisfied");
                last = None;
            }
            Err(e) if swallow(&e) => {
                trace!(operation, polls, error = %e, "Swallowing transient probe failure");
                last = Some(e);
            }
            Err(e) => return Err(e),
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(Error::wait_timeout(
                operation,
                elapsed.as_millis() as u64,
                last,
            ));
        }
        sleep(interval).await;
    }
}

/// Polls a boolean predicate until it returns `true` or `timeout` elapses.
pub async fn wait_until<F, Fut>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    mut pred: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_for(operation, timeout, interval, || {
        let fut = pred();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

/// Default swallow classification: transient interaction errors and the
/// no-dialog probe state.
fn default_swallow(err: &Error) -> bool {
    err.is_transient() || err.is_no_dialog()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_succeeds_after_n_polls() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = Arc::clone(&polls);

        let value = wait_for("counter reaches 3", Duration::from_secs(5), FAST, || {
            let polls = Arc::clone(&polls_clone);
            async move {
                let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n >= 3).then_some(n))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_with_elapsed() {
        let start = std::time::Instant::now();
        let result: Result<()> =
            wait_for("never", Duration::from_millis(30), FAST, || async { Ok(None) }).await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        // not instant, not unbounded
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transient_errors_swallowed_until_deadline() {
        let result: Result<()> = wait_for("always transient", Duration::from_millis(25), FAST, || async {
            Err(Error::element_not_found("css:#gone"))
        })
        .await;

        match result.unwrap_err() {
            Error::WaitTimeout { last: Some(inner), .. } => assert!(inner.is_transient()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_propagates_immediately() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = Arc::clone(&polls);

        let result: Result<()> = wait_for("fatal", Duration::from_secs(5), FAST, || {
            let polls = Arc::clone(&polls_clone);
            async move {
                polls.fetch_add(1, Ordering::SeqCst);
                Err(Error::driver("session gone"))
            }
        })
        .await;

        assert!(matches!(result.unwrap_err(), Error::Driver { .. }));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_dialog_is_swallowed() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = Arc::clone(&polls);

        let value = wait_for("dialog", Duration::from_secs(5), FAST, || {
            let polls = Arc::clone(&polls_clone);
            async move {
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::NoDialog)
                } else {
                    Ok(Some("dialog-1"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "dialog-1");
    }

    #[tokio::test]
    async fn test_wait_until() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = Arc::clone(&polls);

        wait_until("flag", Duration::from_secs(5), FAST, || {
            let polls = Arc::clone(&polls_clone);
            async move { Ok(polls.fetch_add(1, Ordering::SeqCst) >= 1) }
        })
        .await
        .unwrap();

        assert!(polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_timeout_still_probes_once() {
        let value = wait_for("immediate", Duration::ZERO, FAST, || async { Ok(Some(42)) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }
}
