// Join resolver: reconcile the three task outcomes into one result

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cancellation::{CancelOnDrop, CancelToken, InterruptHandle};
use super::panic_guard::join_failure;
use crate::domain::{DrainReport, ExitOutcome, StreamKind, TaskFailure};
use crate::error::{Result, SupervisorError};

pub(crate) type WaitHandle<E> = JoinHandle<std::result::Result<ExitOutcome, TaskFailure<E>>>;

/// Background tasks of one running session
pub(crate) struct SessionTasks<E> {
    pub wait: WaitHandle<E>,
    pub stdout: JoinHandle<DrainReport<E>>,
    pub stderr: JoinHandle<DrainReport<E>>,
    /// Cancels the wait task, which kills and reaps the process
    pub wait_cancel: CancelToken,
}

/// Final state of a joined session
pub(crate) struct Joined<E> {
    pub result: Result<i32, E>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

enum WaitPhase<E> {
    Completed(std::result::Result<ExitOutcome, TaskFailure<E>>),
    TimedOut,
    Interrupted,
}

/// Run the join algorithm
///
/// 1. Wait for the exit outcome, bounded by `timeout` unless it is zero.
/// 2. Timeout or caller interrupt: cancel the wait task (kill + reap) and
///    fail with Timeout / Interrupted.
/// 3. Otherwise collect both drain outcomes too, so a drain failure that
///    caused the cancellation is what the caller sees.
/// 4. Always: wait for all three tasks to finish before returning.
///
/// Dropping the returned future before it completes cancels the wait task,
/// so the process is still killed and reaped.
pub(crate) async fn resolve<E>(
    tasks: SessionTasks<E>,
    timeout: Duration,
    interrupt: &InterruptHandle,
) -> Joined<E> {
    let SessionTasks {
        mut wait,
        stdout,
        stderr,
        wait_cancel,
    } = tasks;
    let abandon_guard = CancelOnDrop::new(wait_cancel.clone());

    let (exit, early_error) = match await_exit(&mut wait, timeout, interrupt).await {
        WaitPhase::Completed(exit) => (Some(exit), None),
        WaitPhase::TimedOut => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Process timed out, killing it"
            );
            wait_cancel.cancel();
            (None, Some(SupervisorError::Timeout(timeout)))
        }
        WaitPhase::Interrupted => {
            warn!("Interrupted while waiting for process, killing it");
            wait_cancel.cancel();
            (None, Some(SupervisorError::Interrupted))
        }
    };

    // Completion barrier: hook side effects are visible once join returns
    let exit = match exit {
        Some(exit) => exit,
        None => wait.await.unwrap_or_else(|err| Err(join_failure(err))),
    };
    let stdout = collect_drain(StreamKind::Stdout, stdout).await;
    let stderr = collect_drain(StreamKind::Stderr, stderr).await;
    abandon_guard.disarm();

    let result = match early_error {
        Some(err) => Err(err),
        None => settle(exit, stdout.result, stderr.result),
    };

    Joined {
        result,
        stdout: stdout.lines,
        stderr: stderr.lines,
    }
}

async fn await_exit<E>(
    wait: &mut WaitHandle<E>,
    timeout: Duration,
    interrupt: &InterruptHandle,
) -> WaitPhase<E> {
    let bounded = async {
        let joined = if timeout.is_zero() {
            Ok(wait.await)
        } else {
            tokio::time::timeout(timeout, wait).await
        };

        match joined {
            Ok(exit) => WaitPhase::Completed(exit.unwrap_or_else(|err| Err(join_failure(err)))),
            Err(_elapsed) => WaitPhase::TimedOut,
        }
    };

    tokio::select! {
        biased;
        () = interrupt.interrupted() => WaitPhase::Interrupted,
        phase = bounded => phase,
    }
}

async fn collect_drain<E>(stream: StreamKind, handle: JoinHandle<DrainReport<E>>) -> DrainReport<E> {
    let report = handle.await.unwrap_or_else(|err| DrainReport {
        stream,
        lines: Vec::new(),
        result: Err(join_failure(err)),
    });

    debug!(
        stream = %report.stream,
        lines = report.lines.len(),
        failed = report.result.is_err(),
        "Drain task collected"
    );
    report
}

/// Pick the final result: the first failure in task order (wait, stdout,
/// stderr) wins; with no failure the exit code is returned.
///
/// A cancelled wait task with no failure anywhere means something outside
/// the session stopped the process, reported as Interrupted.
pub(crate) fn settle<E>(
    exit: std::result::Result<ExitOutcome, TaskFailure<E>>,
    stdout: std::result::Result<(), TaskFailure<E>>,
    stderr: std::result::Result<(), TaskFailure<E>>,
) -> Result<i32, E> {
    let outcome = exit?;
    stdout?;
    stderr?;

    match outcome {
        ExitOutcome::Exited(code) => Ok(code),
        ExitOutcome::Cancelled => {
            warn!("Process was cancelled without a reported cause");
            Err(SupervisorError::Interrupted)
        }
    }
}
