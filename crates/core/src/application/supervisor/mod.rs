// Supervisor - one external process from spawn to join

pub mod cancellation;
pub mod constants;
mod drain;
mod join;
mod panic_guard;
mod stdin;
mod wait;

pub use cancellation::{CancelToken, InterruptHandle};

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, info_span, Instrument};

use crate::config::KillMode;
use crate::domain::StreamKind;
use crate::error::{Result, SupervisorError};
use crate::port::{ChildProcess, ProcessHooks};
use join::SessionTasks;
use stdin::StdinWriter;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A freshly spawned process and its pipes
pub struct ProcessParts {
    /// Display name used in logs (argv[0])
    pub name: String,
    pub child: Box<dyn ChildProcess>,
    /// None if stdin was not piped
    pub stdin: Option<BoxedWriter>,
    pub stdout: BoxedReader,
    pub stderr: BoxedReader,
}

/// One supervised external process
///
/// Starting a session launches three background tasks: one waits for the
/// process to exit, two drain stdout and stderr through the hooks. The caller
/// may write to stdin, then calls `join` exactly once; `join` reconciles the
/// tasks into an exit code or a single error and guarantees the process has
/// been reaped before it returns.
///
/// Dropping a session that was never joined kills the process.
///
/// # Example
/// ```text
/// let mut session = launcher.spawn(DefaultHooks, SpawnRequest::new(["cat"]))?;
/// session.println("hello").await?;
/// session.send_eof().await?;
/// let code = session.join_timeout(Duration::from_secs(5)).await?;
/// assert_eq!(session.output()?, ["hello"]);
/// ```
pub struct Session<H: ProcessHooks> {
    name: String,
    pid: Option<u32>,
    hooks: Arc<H>,
    stdin: StdinWriter,
    tasks: Option<SessionTasks<H::Error>>,
    interrupt: InterruptHandle,
    output: Vec<String>,
    error_output: Vec<String>,
    finished: bool,
}

impl<H: ProcessHooks> Session<H> {
    /// Start supervising an already spawned process
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(parts: ProcessParts, hooks: H, kill_mode: KillMode) -> Self {
        let ProcessParts {
            name,
            child,
            stdin,
            stdout,
            stderr,
        } = parts;

        let pid = child.id();
        let hooks = Arc::new(hooks);
        let wait_cancel = CancelToken::new();
        let span = info_span!("process", name = %name, pid = pid.unwrap_or_default());

        let wait = tokio::spawn(
            wait::wait_for_exit(child, Arc::clone(&hooks), wait_cancel.clone(), kill_mode)
                .instrument(span.clone()),
        );
        let stdout = tokio::spawn(
            drain::drain_stream(
                StreamKind::Stdout,
                stdout,
                Arc::clone(&hooks),
                wait_cancel.clone(),
            )
            .instrument(span.clone()),
        );
        let stderr = tokio::spawn(
            drain::drain_stream(
                StreamKind::Stderr,
                stderr,
                Arc::clone(&hooks),
                wait_cancel.clone(),
            )
            .instrument(span),
        );

        Self {
            name,
            pid,
            hooks,
            stdin: StdinWriter::new(stdin),
            tasks: Some(SessionTasks {
                wait,
                stdout,
                stderr,
                wait_cancel,
            }),
            interrupt: InterruptHandle::new(),
            output: Vec::new(),
            error_output: Vec::new(),
            finished: false,
        }
    }

    /// Display name of the process (argv[0])
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Handle that makes a pending `join` return Interrupted (and kills the process)
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// True once `join` has completed (successfully or not)
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Write text to the process stdin
    ///
    /// # Errors
    /// - SupervisorError::InvalidState after the session finished or stdin was closed
    /// - SupervisorError::Io if the pipe is broken
    pub async fn print(&mut self, text: &str) -> Result<(), H::Error> {
        self.ensure_running()?;
        self.stdin.write(text).await
    }

    /// Write text plus a newline to the process stdin
    pub async fn println(&mut self, text: &str) -> Result<(), H::Error> {
        self.ensure_running()?;
        self.stdin.write(&format!("{text}\n")).await
    }

    /// Close stdin so the process reads EOF
    pub async fn send_eof(&mut self) -> Result<(), H::Error> {
        self.ensure_running()?;
        self.stdin.close().await.map_err(SupervisorError::Io)
    }

    /// Wait for the process without a time limit
    pub async fn join(&mut self) -> Result<i32, H::Error> {
        self.join_timeout(Duration::ZERO).await
    }

    /// Wait for the process, killing it if `timeout` elapses (zero = no limit)
    ///
    /// # Returns
    /// The process exit code.
    ///
    /// # Errors
    /// - SupervisorError::Timeout if the process outlived `timeout` (it has been killed)
    /// - SupervisorError::Interrupted if the interrupt handle fired (process killed)
    /// - SupervisorError::Hook with the exact error a hook returned (process killed)
    /// - SupervisorError::Io if reading an output stream failed
    /// - SupervisorError::Unexpected if a hook panicked
    /// - SupervisorError::InvalidState if `join` was already called
    ///
    /// Dropping the returned future before it completes still kills and reaps
    /// the process; the session cannot be joined again afterwards.
    pub async fn join_timeout(&mut self, timeout: Duration) -> Result<i32, H::Error> {
        let tasks = self
            .tasks
            .take()
            .ok_or(SupervisorError::InvalidState("already finished"))?;

        let joined = join::resolve(tasks, timeout, &self.interrupt).await;

        // The process is gone at this point; nothing useful to do on failure
        if let Err(err) = self.stdin.close().await {
            debug!(name = %self.name, error = %err, "Ignoring error while closing stdin");
        }

        self.output = joined.stdout;
        self.error_output = joined.stderr;
        self.finished = true;

        match &joined.result {
            Ok(code) => info!(name = %self.name, pid = ?self.pid, exit_code = code, "Process finished"),
            Err(err) => info!(name = %self.name, pid = ?self.pid, error = %err, "Process failed"),
        }

        joined.result
    }

    /// Lines the process wrote to stdout (as recorded by the hooks)
    ///
    /// # Errors
    /// SupervisorError::InvalidState until the session has finished
    pub fn output(&self) -> Result<&[String], H::Error> {
        self.ensure_finished()?;
        Ok(&self.output)
    }

    /// Lines the process wrote to stderr (as recorded by the hooks)
    pub fn error_output(&self) -> Result<&[String], H::Error> {
        self.ensure_finished()?;
        Ok(&self.error_output)
    }

    fn ensure_running(&self) -> Result<(), H::Error> {
        if self.finished || self.tasks.is_none() {
            return Err(SupervisorError::InvalidState("already finished"));
        }
        Ok(())
    }

    fn ensure_finished(&self) -> Result<(), H::Error> {
        if !self.finished {
            return Err(SupervisorError::InvalidState("not finished"));
        }
        Ok(())
    }
}

impl<H: ProcessHooks> Drop for Session<H> {
    fn drop(&mut self) {
        if let Some(tasks) = &self.tasks {
            if tasks.wait_cancel.cancel() {
                debug!(name = %self.name, pid = ?self.pid, "Session dropped before join, killing process");
            }
        }
    }
}
