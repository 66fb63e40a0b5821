// Process wait task: exit observation, kill-and-reap on cancellation

use std::io;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use super::cancellation::CancelToken;
use super::panic_guard::guard_hook;
use crate::config::KillMode;
use crate::domain::{ExitOutcome, TaskFailure};
use crate::port::{ChildProcess, ProcessHooks};

/// Wait for the process to exit
///
/// Normal exit runs `handle_exit_code` and yields `ExitOutcome::Exited`.
/// Cancellation destroys the process and then keeps waiting until the OS
/// reports it gone; that reap loop is not itself cancellable. The exit hook
/// is skipped on this path and the outcome is `ExitOutcome::Cancelled`.
pub(crate) async fn wait_for_exit<H: ProcessHooks>(
    mut child: Box<dyn ChildProcess>,
    hooks: Arc<H>,
    wait_cancel: CancelToken,
    kill_mode: KillMode,
) -> Result<ExitOutcome, TaskFailure<H::Error>> {
    loop {
        tokio::select! {
            biased;

            () = wait_cancel.cancelled() => {
                destroy_and_reap(child.as_mut(), kill_mode).await;
                wait_cancel.mark_completed();
                return Ok(ExitOutcome::Cancelled);
            }

            status = child.wait() => match status {
                Ok(code) => {
                    debug!(exit_code = code, "Process exited");
                    wait_cancel.mark_completed();
                    guard_hook(|| hooks.handle_exit_code(code))?;
                    return Ok(ExitOutcome::Exited(code));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    trace!("Wait interrupted, retrying");
                }
                Err(err) => {
                    error!(error = %err, "Waiting for process failed, killing it");
                    if let Err(kill_err) = child.kill() {
                        debug!(error = %kill_err, "Kill after failed wait also failed");
                    }
                    wait_cancel.mark_completed();
                    return Err(TaskFailure::Io(err));
                }
            }
        }
    }
}

/// Destroy the process according to `kill_mode`, then reap it
async fn destroy_and_reap<C>(child: &mut C, kill_mode: KillMode)
where
    C: ChildProcess + ?Sized,
{
    match kill_mode {
        KillMode::Kill => send_kill(child),
        KillMode::Terminate { grace } => {
            if let Err(err) = child.terminate() {
                debug!(error = %err, "SIGTERM failed");
            }

            match tokio::time::timeout(grace, reap(&mut *child)).await {
                Ok(code) => {
                    debug!(exit_code = ?code, "Process terminated and reaped");
                    return;
                }
                Err(_) => {
                    warn!(
                        grace_ms = grace.as_millis() as u64,
                        "Process did not exit after SIGTERM, sending SIGKILL"
                    );
                    send_kill(child);
                }
            }
        }
    }

    let code = reap(child).await;
    debug!(exit_code = ?code, "Process killed and reaped");
}

fn send_kill<C>(child: &mut C)
where
    C: ChildProcess + ?Sized,
{
    if let Err(err) = child.kill() {
        // Usually the process already exited on its own
        debug!(error = %err, "SIGKILL failed");
    }
}

/// Wait until the OS reports the exit, retrying interrupted waits
///
/// Returns None only if waiting fails for a reason other than interruption.
async fn reap<C>(child: &mut C) -> Option<i32>
where
    C: ChildProcess + ?Sized,
{
    loop {
        match child.wait().await {
            Ok(code) => return Some(code),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                trace!("Reap interrupted, waiting again");
            }
            Err(err) => {
                error!(error = %err, "Failed to reap process");
                return None;
            }
        }
    }
}
