//! Admission control for blocking acquires
//!
//! When a pool runs with `wait = true` and a non-zero `max_active`, every
//! acquire first takes one token from a semaphore holding `max_active`
//! tokens. The token travels with the checked-out handle and goes back to the
//! semaphore when the handle is released or discarded.
//!
//! Only this wait observes the caller's [`WaitContext`]. Once a token is held
//! the rest of the acquire runs to completion.

use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation for one acquire
///
/// The default context never expires and cannot be canceled.
#[derive(Debug, Clone, Default)]
pub struct WaitContext {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl WaitContext {
    /// Context without deadline or cancellation
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Give up waiting `timeout` from now; a timeout past the clock's range
    /// never fires
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self.timeout = Some(timeout);
        self
    }

    /// Give up waiting at `deadline`
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.timeout = Some(deadline.saturating_duration_since(Instant::now()));
        self.deadline = Some(deadline);
        self
    }

    /// Give up waiting once `token` is canceled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, if it is
    ///
    /// Cancellation is reported before an elapsed deadline.
    pub(crate) fn done(&self) -> Option<WaitAbort> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(WaitAbort::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(WaitAbort::TimedOut(self.timeout.unwrap_or_default()))
            }
            _ => None,
        }
    }

    async fn canceled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// Reasons a token wait ends without a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitAbort {
    Canceled,
    TimedOut(Duration),
    Closed,
}

/// Take one admission token, honouring `ctx`
///
/// Returns how long the caller was blocked when no token was free on entry,
/// `None` when a token was taken without waiting.
///
/// Cancellation wins every tie: an already-done context never takes a token,
/// the select polls the context branches first, and a token that was granted
/// in the same wake-up as the context fired is handed back before the error
/// is returned. The token is detached from its permit only after all checks
/// pass, so no path leaks one.
pub(crate) async fn take_token(
    semaphore: &Semaphore,
    ctx: &WaitContext,
) -> Result<Option<Duration>, WaitAbort> {
    if let Some(abort) = ctx.done() {
        return Err(abort);
    }

    let start = (semaphore.available_permits() == 0).then(Instant::now);

    let permit = tokio::select! {
        biased;
        () = ctx.canceled() => return Err(WaitAbort::Canceled),
        () = ctx.expired() => {
            return Err(WaitAbort::TimedOut(ctx.timeout.unwrap_or_default()));
        }
        permit = semaphore.acquire() => permit.map_err(|_| WaitAbort::Closed)?,
    };

    if let Some(abort) = ctx.done() {
        drop(permit);
        return Err(abort);
    }

    permit.forget();
    Ok(start.map(|s| s.elapsed()))
}
