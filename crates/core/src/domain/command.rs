// Spawn request: what to run and in which environment

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};

/// Description of a child process to launch
///
/// `env` holds overrides on top of the inherited environment:
/// `Some(value)` sets a variable, `None` removes it from the child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    pub command: Vec<String>,
    pub env: BTreeMap<String, Option<String>>,
    pub working_dir: Option<PathBuf>,
}

impl SpawnRequest {
    /// Create a request from a full argv (program first)
    ///
    /// # Example
    /// ```text
    /// let request = SpawnRequest::new(["sh", "-c", "echo $GREETING"])
    ///     .env("GREETING", "hello")
    ///     .env_remove("HOME")
    ///     .working_dir("/tmp");
    /// ```
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), Some(value.into()));
        self
    }

    /// Remove an inherited environment variable from the child
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env.insert(key.into(), None);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program to execute (argv[0])
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Arguments after argv[0]
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    /// Name used in logs for this process (argv[0])
    pub fn display_name(&self) -> &str {
        self.program().unwrap_or("<empty>")
    }

    /// Reject requests the OS could never spawn
    pub fn validate(&self) -> Result<()> {
        match self.program() {
            None => Err(DomainError::InvalidCommand("command is empty".to_string())),
            Some(program) if program.is_empty() => Err(DomainError::InvalidCommand(
                "program name is empty".to_string(),
            )),
            Some(_) => {
                if let Some(key) = self
                    .env
                    .keys()
                    .find(|k| k.is_empty() || k.contains('=') || k.contains('\0'))
                {
                    return Err(DomainError::InvalidEnvironment(key.clone()));
                }
                Ok(())
            }
        }
    }
}
