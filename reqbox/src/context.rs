//! Deadlines and cancellation for a single logical request.
//!
//! A [`Context`] is attached to a request with
//! [`Request::context`](crate::Request::context). The engine checks it
//! before the first attempt and races it against every exchange, body
//! read and backoff sleep, so a caller-side timeout unblocks the request
//! promptly instead of waiting out the retry budget.
//!
//! ```
//! use std::time::Duration;
//! use reqbox::Context;
//!
//! let (ctx, handle) = Context::background()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_cancel();
//! assert!(ctx.err().is_none());
//!
//! handle.cancel();
//! assert!(ctx.err().is_some());
//! ```

use std::{future::pending, sync::Arc, time::Duration};

use futures::future::select_all;
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};

/// Why a context fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// A [`CancelHandle`] was triggered.
    #[error("request cancelled")]
    Cancelled,
}

/// Deadline and cancellation carrier.
///
/// Cheap to clone; clones observe the same cancel handles.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Vec<watch::Receiver<bool>>,
}

impl Context {
    /// A context that never fires.
    pub fn background() -> Self {
        Self::default()
    }

    /// Adds a deadline `timeout` from now.
    ///
    /// A timeout too large to represent leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Adds a deadline. The earliest deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derives a context that also fires when the returned handle is used.
    ///
    /// Cancel handles of the parent keep working on the child.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancel.push(receiver);
        (
            self,
            CancelHandle {
                sender: Arc::new(sender),
            },
        )
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports whether the context has already fired.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.iter().any(|receiver| *receiver.borrow()) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes once the context fires. Pending forever on a background context.
    pub async fn done(&self) -> ContextError {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending().await,
            }
        };

        let cancelled = async {
            if self.cancel.is_empty() {
                return pending().await;
            }
            let waits = self
                .cancel
                .iter()
                .cloned()
                .map(|receiver| Box::pin(wait_cancelled(receiver)));
            select_all(waits).await;
        };

        tokio::select! {
            biased;
            () = cancelled => ContextError::Cancelled,
            () = deadline => ContextError::DeadlineExceeded,
        }
    }
}

async fn wait_cancelled(mut receiver: watch::Receiver<bool>) {
    loop {
        if *receiver.borrow_and_update() {
            return;
        }
        // A dropped handle can no longer cancel.
        if receiver.changed().await.is_err() {
            return pending().await;
        }
    }
}

/// Cancels every clone of the context it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Fires the context. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}
