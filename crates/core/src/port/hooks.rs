// Process Hooks Port
// User callbacks invoked by the supervision tasks (per line, per exit)

use std::convert::Infallible;
use tracing::{trace, warn};

/// Callbacks for one supervised process
///
/// Every method has a default; override the ones you need. Hooks always run
/// on a background supervision task, never on the caller of `join`, and the
/// two stream hooks run concurrently with each other.
///
/// Returning `Err` from any hook ends the session: the process is killed and
/// reaped, and `join` returns `SupervisorError::Hook` with that exact error.
///
/// # Example
/// ```text
/// struct FailOnPanicLine;
///
/// impl ProcessHooks for FailOnPanicLine {
///     type Error = PanicLineSeen;
///
///     fn handle_output(&self, line: String, lines: &mut Vec<String>) -> Result<(), Self::Error> {
///         if line.contains("panicked at") {
///             return Err(PanicLineSeen(line));
///         }
///         record_output(line, lines);
///         Ok(())
///     }
/// }
/// ```
pub trait ProcessHooks: Send + Sync + 'static {
    /// Failure type the hooks may return
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called for every stdout line, in order
    fn handle_output(&self, line: String, lines: &mut Vec<String>) -> Result<(), Self::Error> {
        record_output(line, lines);
        Ok(())
    }

    /// Called for every stderr line, in order
    fn handle_error_output(
        &self,
        line: String,
        lines: &mut Vec<String>,
    ) -> Result<(), Self::Error> {
        record_error_output(line, lines);
        Ok(())
    }

    /// Called once after the process exited on its own.
    /// Not called when the process was killed by the supervisor.
    fn handle_exit_code(&self, code: i32) -> Result<(), Self::Error> {
        log_exit_code(code);
        Ok(())
    }
}

/// Default stdout behavior: record the line, trace it
pub fn record_output(line: String, lines: &mut Vec<String>) {
    trace!(line = %line, "stdout");
    lines.push(line);
}

/// Default stderr behavior: record the line, warn about it
pub fn record_error_output(line: String, lines: &mut Vec<String>) {
    warn!(line = %line, "stderr");
    lines.push(line);
}

/// Default exit behavior: warn on non-zero codes
pub fn log_exit_code(code: i32) {
    if code != 0 {
        warn!(exit_code = code, "Process exited with non-zero code");
    }
}

/// Hooks that only use the defaults and never fail
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ProcessHooks for DefaultHooks {
    type Error = Infallible;
}
