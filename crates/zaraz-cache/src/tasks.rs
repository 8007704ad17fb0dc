//! Work that runs after the response has been sent.
//!
//! Tasks are tracked, not detached: the server waits for them on shutdown
//! (up to a deadline) and cancels whatever is still running after that.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Tracked background tasks sharing one cancellation token.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` in the background until it completes or the runner is
    /// cancelled.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(task = name, "background task cancelled");
                }
                () = task => {}
            }
        });
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Waits until every task spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Waits up to `timeout` for running tasks, then cancels the rest.
    ///
    /// Returns `true` if every task finished on its own.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            tracing::debug!(pending, "background tasks drained");
            return true;
        }

        tracing::warn!(
            remaining = self.tracker.len(),
            timeout_ms = timeout.as_millis() as u64,
            "background tasks did not finish in time, cancelling"
        );
        self.cancel.cancel();
        self.tracker.wait().await;
        false
    }
}
