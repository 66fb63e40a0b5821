// Task outcomes for one supervised process

use std::fmt;
use std::io;
use thiserror::Error;

/// Terminal state of the process-wait task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Process exited on its own; the OS-reported exit code
    Exited(i32),
    /// Process was destroyed on request and then reaped.
    /// The exit code observed while reaping carries no meaning.
    Cancelled,
}

impl ExitOutcome {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited(code) => Some(*code),
            ExitOutcome::Cancelled => None,
        }
    }
}

/// Which output stream a drain task reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Failure of one background task (wait or drain)
///
/// `E` is the error type declared by the session's hooks.
#[derive(Error, Debug)]
pub enum TaskFailure<E> {
    /// Reading a stream or waiting on the process failed
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// A hook returned its declared error
    #[error("hook failed: {0}")]
    Hook(#[source] E),

    /// A hook panicked (or the task died without reporting)
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Everything a drain task hands back when it finishes
#[derive(Debug)]
pub struct DrainReport<E> {
    pub stream: StreamKind,
    /// Lines recorded by the hook, in stream order
    pub lines: Vec<String>,
    pub result: Result<(), TaskFailure<E>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_code() {
        assert_eq!(ExitOutcome::Exited(3).code(), Some(3));
        assert_eq!(ExitOutcome::Cancelled.code(), None);
    }

    #[test]
    fn test_stream_kind_display() {
        assert_eq!(StreamKind::Stdout.to_string(), "stdout");
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_task_failure_display() {
        let failure: TaskFailure<io::Error> = TaskFailure::Panicked("boom".to_string());
        assert_eq!(failure.to_string(), "task panicked: boom");

        let failure: TaskFailure<io::Error> =
            TaskFailure::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert!(failure.to_string().contains("pipe closed"));
    }
}
