//! Per-session deadline timer.
//!
//! One tokio task per session sleeps until the deadline and then runs the
//! completion callback, unless the session cancels it first. Dropping the
//! clock cancels it.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Deadline timer for one session.
#[derive(Debug)]
pub struct SessionClock {
    cancel: CancellationToken,
}

impl SessionClock {
    /// Spawns the timer task.
    ///
    /// `on_deadline` runs at most once, on the timer task, when `deadline`
    /// passes before `cancel` is called.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(deadline: Instant, on_deadline: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("session clock cancelled");
                }
                () = tokio::time::sleep_until(deadline) => {
                    debug!("session clock fired");
                    on_deadline();
                }
            }
        });
        Self { cancel }
    }

    /// Spawns a timer that fires `limit` from now.
    pub fn after<F>(limit: Duration, on_deadline: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::start(Instant::now() + limit, on_deadline)
    }

    /// Stops the timer; a no-op once it has fired.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
