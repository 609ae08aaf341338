//! Deadlines and cancellation for the `*_ctx` executor variants.
//!
//! A [`Context`] is raced against the driver call. When the deadline passes or
//! the [`CancelHandle`] fires, the in-flight driver future is dropped and the
//! call returns [`SqlError::Timeout`] or [`SqlError::Cancelled`]. Nothing is
//! retried.
//!
//! Dropping the future does not stop the statement on the server. The
//! executor takes the connection it ran on out of service instead; see
//! [`crate::executor`].

use crate::error::{SqlError, SqlResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Caller-supplied deadline and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Fires the cancellation signal of the [`Context`] it was created with.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Cancel every operation running under the paired context (and its clones).
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl Context {
    /// No deadline, no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Expire at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    /// A cancellable context and the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        Self::background().cancellable()
    }

    /// Set (or tighten) the deadline to `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline_at(Instant::now() + timeout)
    }

    /// Set (or tighten) the deadline. An earlier existing deadline wins.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Attach a fresh cancellation signal.
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle(tx))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `future` under this context.
    ///
    /// `default_timeout` applies only when the context carries no deadline.
    pub(crate) async fn run<T, F>(&self, default_timeout: Option<Duration>, future: F) -> SqlResult<T>
    where
        F: Future<Output = SqlResult<T>>,
    {
        if self.is_cancelled() {
            return Err(SqlError::Cancelled);
        }

        let now = Instant::now();
        let deadline = self
            .deadline
            .or_else(|| default_timeout.map(|timeout| now + timeout));
        let budget = deadline.map(|d| d.saturating_duration_since(now));
        let mut cancel = self.cancel.clone();

        tokio::pin!(future);
        tokio::select! {
            result = &mut future => result,
            _ = sleep_until(deadline) => Err(SqlError::Timeout(budget.unwrap_or_default())),
            _ = cancelled(&mut cancel) => Err(SqlError::Cancelled),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_gone {
        // handle dropped without cancelling: never fires
        std::future::pending::<()>().await;
    }
}
