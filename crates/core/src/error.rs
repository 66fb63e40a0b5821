// Central Error Type for a supervised process

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{DomainError, TaskFailure};

/// Error returned by session operations
///
/// `E` is the error type declared by the session's hooks
/// (`ProcessHooks::Error`). A hook failure reaches the caller as
/// `SupervisorError::Hook` carrying the exact value the hook returned.
#[derive(Error, Debug)]
pub enum SupervisorError<E> {
    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    #[error("Invalid spawn request: {0}")]
    InvalidRequest(#[from] DomainError),

    #[error("Hook failed: {0}")]
    Hook(#[source] E),

    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    #[error("Process timeout after {0:?}")]
    Timeout(Duration),

    #[error("Interrupted while waiting for process")]
    Interrupted,

    /// A hook failed in a way its declared contract does not allow (panic)
    #[error("Unexpected failure in supervision task: {0}")]
    Unexpected(String),

    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
}

impl<E> SupervisorError<E> {
    /// The hook error, if this failure came from a hook
    pub fn into_hook_error(self) -> Option<E> {
        match self {
            SupervisorError::Hook(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SupervisorError::Timeout(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, SupervisorError::Interrupted)
    }
}

impl<E> From<TaskFailure<E>> for SupervisorError<E> {
    fn from(failure: TaskFailure<E>) -> Self {
        match failure {
            TaskFailure::Io(err) => SupervisorError::Io(err),
            TaskFailure::Hook(err) => SupervisorError::Hook(err),
            TaskFailure::Panicked(msg) => SupervisorError::Unexpected(msg),
        }
    }
}

/// Result type alias using SupervisorError
pub type Result<T, E> = std::result::Result<T, SupervisorError<E>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    struct LineRejected(String);

    impl fmt::Display for LineRejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "rejected line {:?}", self.0)
        }
    }

    impl std::error::Error for LineRejected {}

    #[test]
    fn test_task_failure_mapping() {
        let err: SupervisorError<LineRejected> =
            TaskFailure::Hook(LineRejected("bad".to_string())).into();
        assert_eq!(
            err.into_hook_error(),
            Some(LineRejected("bad".to_string()))
        );

        let err: SupervisorError<LineRejected> =
            TaskFailure::Io(io::Error::new(io::ErrorKind::Other, "read failed")).into();
        assert!(matches!(err, SupervisorError::Io(_)));

        let err: SupervisorError<LineRejected> = TaskFailure::Panicked("oops".to_string()).into();
        assert!(matches!(err, SupervisorError::Unexpected(ref msg) if msg == "oops"));
    }

    #[test]
    fn test_display_and_predicates() {
        let err: SupervisorError<LineRejected> = SupervisorError::Timeout(Duration::from_millis(250));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("250ms"));

        let err: SupervisorError<LineRejected> = SupervisorError::Interrupted;
        assert!(err.is_interrupted());
        assert!(!err.is_timeout());

        let err: SupervisorError<LineRejected> = SupervisorError::Hook(LineRejected("x".into()));
        assert_eq!(err.to_string(), "Hook failed: rejected line \"x\"");
    }
}
