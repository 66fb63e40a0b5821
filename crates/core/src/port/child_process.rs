// Child Process Port
// Abstraction over a spawned OS process: wait for exit, deliver signals

use async_trait::async_trait;
use std::io;

/// A running child process owned by exactly one session
///
/// Implementations:
/// - SystemChild (infra-system): wraps `tokio::process::Child`
/// - MockChild (below): scripted exits for deterministic tests
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if known
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit and reap it
    ///
    /// Must be cancel-safe: dropping the future leaves the process untouched
    /// and a later call resumes waiting.
    ///
    /// # Returns
    /// The exit code; a death by signal `n` is reported as `128 + n`.
    ///
    /// # Errors
    /// `io::ErrorKind::Interrupted` is transient and callers retry it.
    async fn wait(&mut self) -> io::Result<i32>;

    /// Ask the process to exit (SIGTERM on unix)
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcibly kill the process (SIGKILL on unix)
    fn kill(&mut self) -> io::Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::application::supervisor::constants::SIGNAL_EXIT_BASE;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    const SIGTERM: i32 = 15;
    const SIGKILL: i32 = 9;

    /// How a mock process ends when nobody signals it
    #[derive(Debug, Clone, Copy)]
    pub enum MockExit {
        /// Exit with `code` after `delay`
        After(Duration, i32),
        /// Run until signalled
        Never,
    }

    /// Counters shared with the test after the child moved into a session
    #[derive(Debug, Default)]
    pub struct MockChildStats {
        pub terminate_calls: AtomicUsize,
        pub kill_calls: AtomicUsize,
        pub wait_calls: AtomicUsize,
        pub reaped: AtomicBool,
    }

    impl MockChildStats {
        pub fn terminate_calls(&self) -> usize {
            self.terminate_calls.load(Ordering::SeqCst)
        }
        pub fn kill_calls(&self) -> usize {
            self.kill_calls.load(Ordering::SeqCst)
        }
        pub fn wait_calls(&self) -> usize {
            self.wait_calls.load(Ordering::SeqCst)
        }
        pub fn is_reaped(&self) -> bool {
            self.reaped.load(Ordering::SeqCst)
        }
    }

    /// Mock child process for testing
    pub struct MockChild {
        pid: u32,
        exit: MockExit,
        ignore_terminate: bool,
        spurious_interrupts: usize,
        signalled: watch::Sender<Option<i32>>,
        stats: Arc<MockChildStats>,
    }

    impl MockChild {
        pub fn new(pid: u32, exit: MockExit) -> Self {
            let (signalled, _) = watch::channel(None);
            Self {
                pid,
                exit,
                ignore_terminate: false,
                spurious_interrupts: 0,
                signalled,
                stats: Arc::new(MockChildStats::default()),
            }
        }

        pub fn exiting(code: i32) -> Self {
            Self::new(4242, MockExit::After(Duration::ZERO, code))
        }

        pub fn running_forever() -> Self {
            Self::new(4242, MockExit::Never)
        }

        /// Keep running after SIGTERM (only SIGKILL ends it)
        pub fn ignoring_terminate(mut self) -> Self {
            self.ignore_terminate = true;
            self
        }

        /// After being signalled, fail `count` waits with `Interrupted` before reporting
        pub fn with_spurious_interrupts(mut self, count: usize) -> Self {
            self.spurious_interrupts = count;
            self
        }

        pub fn stats(&self) -> Arc<MockChildStats> {
            Arc::clone(&self.stats)
        }

        fn signal(&self, signo: i32) {
            if !self.stats.is_reaped() {
                self.signalled.send_replace(Some(SIGNAL_EXIT_BASE + signo));
            }
        }

        async fn natural_exit(&self) -> i32 {
            match self.exit {
                MockExit::After(delay, code) => {
                    tokio::time::sleep(delay).await;
                    code
                }
                MockExit::Never => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl ChildProcess for MockChild {
        fn id(&self) -> Option<u32> {
            if self.stats.is_reaped() {
                None
            } else {
                Some(self.pid)
            }
        }

        async fn wait(&mut self) -> io::Result<i32> {
            self.stats.wait_calls.fetch_add(1, Ordering::SeqCst);

            if self.signalled.borrow().is_some() && self.spurious_interrupts > 0 {
                self.spurious_interrupts -= 1;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "wait interrupted"));
            }

            let mut signalled = self.signalled.subscribe();
            let code = tokio::select! {
                biased;
                Ok(code) = signalled.wait_for(Option::is_some) => (*code).unwrap_or(SIGNAL_EXIT_BASE + SIGKILL),
                code = self.natural_exit() => code,
            };

            self.stats.reaped.store(true, Ordering::SeqCst);
            Ok(code)
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.stats.terminate_calls.fetch_add(1, Ordering::SeqCst);
            if !self.ignore_terminate {
                self.signal(SIGTERM);
            }
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            self.stats.kill_calls.fetch_add(1, Ordering::SeqCst);
            self.signal(SIGKILL);
            Ok(())
        }
    }
}
