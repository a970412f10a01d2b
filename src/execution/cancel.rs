//! Cancellation signal for an in-flight run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Clonable cancellation signal.
///
/// Cancelling transitions the active run to `Aborted` at the next check
/// point; a stage body blocked on a subprocess is woken through
/// [`CancelToken::cancelled`] and the dropped command future kills the
/// child. Cancellation is sticky - once cancelled, always cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after arming the waiter; a cancel between the first
            // check and `notified()` would otherwise be missed.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
