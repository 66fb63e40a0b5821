// Process launcher: SpawnRequest -> running Session
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

use procwarden_core::application::{BoxedWriter, ProcessParts};
use procwarden_core::config::SupervisorConfig;
use procwarden_core::domain::SpawnRequest;
use procwarden_core::error::{Result, SupervisorError};
use procwarden_core::port::ProcessHooks;
use procwarden_core::Session;

use crate::system_child::SystemChild;

/// Spawns OS processes and hands them to a supervision session
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    config: SupervisorConfig,
}

/// A session that has been joined, plus what `join` returned
pub struct FinishedSession<H: ProcessHooks> {
    pub session: Session<H>,
    pub result: Result<i32, H::Error>,
}

impl ProcessLauncher {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn the requested process and start supervising it
    ///
    /// All three standard streams are piped. Environment overrides are applied
    /// on top of the inherited environment (`None` removes a variable).
    ///
    /// # Arguments
    /// * `hooks` - Callbacks for output lines and the exit code
    /// * `request` - Command line, environment overrides and working directory
    ///
    /// # Errors
    /// - SupervisorError::InvalidRequest if the request does not validate
    /// - SupervisorError::Spawn if the OS refused to start the process
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<H: ProcessHooks>(
        &self,
        hooks: H,
        request: SpawnRequest,
    ) -> Result<Session<H>, H::Error> {
        request.validate()?;

        let mut command = build_command(&request);
        let mut child = command.spawn().map_err(|e| {
            error!(command = ?request.command, error = %e, "Failed to spawn process");
            SupervisorError::Spawn(e)
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let name = request.display_name().to_string();
        let pid = child.id();

        info!(
            name = %name,
            pid = ?pid,
            args = ?request.args(),
            working_dir = ?request.working_dir,
            "Process spawned"
        );

        let parts = ProcessParts {
            name,
            child: Box::new(SystemChild::new(child)),
            stdin: stdin.map(|s| -> BoxedWriter { Box::new(s) }),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        };

        Ok(Session::start(parts, hooks, self.config.kill_mode))
    }

    /// Spawn, close stdin, and join with the configured default timeout
    pub async fn run<H: ProcessHooks>(
        &self,
        hooks: H,
        request: SpawnRequest,
    ) -> Result<FinishedSession<H>, H::Error> {
        let mut session = self.spawn(hooks, request)?;
        session.send_eof().await?;
        let result = session.join_timeout(self.config.default_timeout).await;
        Ok(FinishedSession { session, result })
    }
}

fn build_command(request: &SpawnRequest) -> Command {
    // validate() guarantees a program name
    let mut command = Command::new(request.program().unwrap_or_default());
    command.args(request.args());

    for (key, value) in &request.env {
        match value {
            Some(value) => command.env(key, value),
            None => command.env_remove(key),
        };
    }

    if let Some(dir) = &request.working_dir {
        command.current_dir(dir);
    }

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    command
}

fn missing_pipe<E>(stream: &str) -> SupervisorError<E> {
    SupervisorError::Spawn(io::Error::other(format!("{stream} was not captured")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use procwarden_core::domain::DomainError;
    use procwarden_core::port::DefaultHooks;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_echo() {
        let launcher = ProcessLauncher::default();
        let mut session = launcher
            .spawn(DefaultHooks, SpawnRequest::new(["echo", "hello"]))
            .unwrap();

        assert_eq!(session.name(), "echo");
        assert!(session.pid().is_some());
        assert_eq!(session.join().await.unwrap(), 0);
        assert_eq!(session.output().unwrap(), ["hello"]);
        assert!(session.error_output().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let launcher = ProcessLauncher::default();
        let result = launcher.spawn(DefaultHooks, SpawnRequest::new(Vec::<String>::new()));

        assert!(matches!(
            result,
            Err(SupervisorError::InvalidRequest(DomainError::InvalidCommand(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let launcher = ProcessLauncher::default();
        let result = launcher.spawn(
            DefaultHooks,
            SpawnRequest::new(["/definitely/not/a/real/program"]),
        );

        match result {
            Err(SupervisorError::Spawn(err)) => assert_eq!(err.kind(), io::ErrorKind::NotFound),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[tokio::test]
    async fn test_run_applies_default_timeout() {
        let launcher = ProcessLauncher::new(
            SupervisorConfig::default().with_timeout(Duration::from_millis(100)),
        );

        let finished = launcher
            .run(DefaultHooks, SpawnRequest::new(["sleep", "10"]))
            .await
            .unwrap();

        assert!(finished.result.unwrap_err().is_timeout());
        assert!(finished.session.is_finished());
    }

    #[tokio::test]
    async fn test_run_closes_stdin() {
        let launcher = ProcessLauncher::default();

        // cat only exits once it sees EOF
        let finished = launcher
            .run(DefaultHooks, SpawnRequest::new(["cat"]))
            .await
            .unwrap();

        assert_eq!(finished.result.unwrap(), 0);
        assert!(finished.session.output().unwrap().is_empty());
    }
}
