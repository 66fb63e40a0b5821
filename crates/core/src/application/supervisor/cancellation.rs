// Cancellation token + coordinator between the wait task and the drain tasks

use std::fmt::Display;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::StreamKind;

/// Trigger-once cancellation signal shared by the supervision tasks
///
/// Any holder may cancel; every holder observes it. Cancelling twice is a no-op.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    completed: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation
    ///
    /// Returns true if this call was the one that triggered it.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait for cancellation (returns immediately if already cancelled)
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Record that the guarded task finished on its own
    pub(crate) fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// True once the guarded task finished; a later cancel has nothing to stop
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-side handle that interrupts a pending `join`
///
/// Firing it while `join` waits kills the process and makes `join` return
/// `SupervisorError::Interrupted`. The handle stays fired afterwards.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    token: CancelToken,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the handle fires (returns immediately if it already has)
    pub async fn interrupted(&self) {
        self.token.cancelled().await
    }
}

/// Cancels the wait task when dropped, unless disarmed first
///
/// Held across `join` so that abandoning the join future still kills and
/// reaps the process.
pub(crate) struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    pub(crate) fn new(token: CancelToken) -> Self {
        Self { token: Some(token) }
    }

    pub(crate) fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if !token.is_completed() && token.cancel() {
                warn!("Join abandoned before completion, killing process");
            }
        }
    }
}

/// Decide whether a read failure on `stream` is collateral damage of a kill
///
/// Once the wait task has been cancelled the process is being destroyed and
/// broken pipes are expected; those errors are logged and dropped so they
/// cannot mask the real cause. Returns the error if it must be propagated.
pub(crate) fn filter_read_error(
    stream: StreamKind,
    err: io::Error,
    wait_cancel: &CancelToken,
) -> Option<io::Error> {
    if wait_cancel.is_cancelled() {
        debug!(stream = %stream, error = %err, "Ignoring read error on killed process");
        None
    } else {
        Some(err)
    }
}

/// Cancel the wait task because a drain task failed
///
/// Triggers the kill-and-reap path of the wait task. Logged only by the
/// first caller that actually cancels.
pub(crate) fn escalate_drain_failure(
    stream: StreamKind,
    failure: &impl Display,
    wait_cancel: &CancelToken,
) {
    if !wait_cancel.cancel() {
        return;
    }

    if wait_cancel.is_completed() {
        // Process already exited; nothing left to kill
        debug!(
            stream = %stream,
            error = %failure,
            "Output handling failed after process exit"
        );
    } else {
        warn!(
            stream = %stream,
            error = %failure,
            "Killing process due to output handling error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_token_triggers_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());

        // Already cancelled: returns right away
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancelled() should resolve");
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::task::yield_now().await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_filter_read_error() {
        let token = CancelToken::new();
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(filter_read_error(StreamKind::Stdout, err, &token).is_some());

        token.cancel();
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(filter_read_error(StreamKind::Stderr, err, &token).is_none());
    }

    #[test]
    fn test_escalate_cancels_wait_task() {
        let token = CancelToken::new();
        escalate_drain_failure(StreamKind::Stdout, &"hook failed", &token);
        assert!(token.is_cancelled());

        // Second escalation is harmless
        escalate_drain_failure(StreamKind::Stderr, &"hook failed", &token);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_escalate_after_completion_still_records_cancel() {
        let token = CancelToken::new();
        token.mark_completed();

        escalate_drain_failure(StreamKind::Stdout, &"hook failed", &token);
        assert!(token.is_cancelled());
        assert!(token.is_completed());
    }

    #[test]
    fn test_cancel_on_drop_cancels_unless_disarmed() {
        let token = CancelToken::new();
        drop(CancelOnDrop::new(token.clone()));
        assert!(token.is_cancelled());

        let token = CancelToken::new();
        CancelOnDrop::new(token.clone()).disarm();
        assert!(!token.is_cancelled());

        // Completed task: nothing to cancel
        let token = CancelToken::new();
        token.mark_completed();
        drop(CancelOnDrop::new(token.clone()));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupted_resolves_after_interrupt() {
        let handle = InterruptHandle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.interrupt();
        });

        tokio::time::timeout(Duration::from_secs(1), handle.interrupted())
            .await
            .expect("interrupted() should resolve");
    }

    #[test]
    fn test_interrupt_handle() {
        let handle = InterruptHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_interrupted());
        clone.interrupt();
        assert!(handle.is_interrupted());
    }
}
