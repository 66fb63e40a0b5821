// Panic isolation for hook calls
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::task::JoinError;
use tracing::error;

use crate::domain::TaskFailure;

/// Run a hook with panic isolation
///
/// A hook error becomes `TaskFailure::Hook`; a panic becomes
/// `TaskFailure::Panicked` so the drain/wait task can still report it
/// (and cancel the process) instead of unwinding silently.
pub(crate) fn guard_hook<T, E, F>(hook: F) -> Result<T, TaskFailure<E>>
where
    F: FnOnce() -> Result<T, E>,
{
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result.map_err(TaskFailure::Hook),
        Err(payload) => {
            let panic_msg = panic_message(payload.as_ref());
            error!(panic_msg = %panic_msg, "Process hook panicked");
            Err(TaskFailure::Panicked(panic_msg))
        }
    }
}

/// Translate a task that died without reporting into a failure
pub(crate) fn join_failure<E>(err: JoinError) -> TaskFailure<E> {
    if err.is_panic() {
        let payload = err.into_panic();
        TaskFailure::Panicked(panic_message(payload.as_ref()))
    } else {
        TaskFailure::Panicked("supervision task was cancelled".to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_hook_passes_results_through() {
        let ok: Result<i32, TaskFailure<std::io::Error>> = guard_hook(|| Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err: Result<(), TaskFailure<std::fmt::Error>> = guard_hook(|| Err(std::fmt::Error));
        assert!(matches!(err, Err(TaskFailure::Hook(_))));
    }

    #[test]
    fn test_guard_hook_catches_panic() {
        let result: Result<(), TaskFailure<std::fmt::Error>> =
            guard_hook(|| panic!("hook exploded"));
        match result {
            Err(TaskFailure::Panicked(msg)) => assert_eq!(msg, "hook exploded"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_failure_extracts_message() {
        let handle: tokio::task::JoinHandle<()> =
            tokio::spawn(async { panic!("task blew up {}", 42) });
        let err = handle.await.unwrap_err();
        let failure: TaskFailure<std::fmt::Error> = join_failure(err);
        assert!(matches!(failure, TaskFailure::Panicked(ref msg) if msg == "task blew up 42"));
    }
}
