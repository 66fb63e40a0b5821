// Supervisor configuration (defaults + PROCWARDEN_* environment overrides)

use std::time::Duration;
use thiserror::Error;

use crate::application::supervisor::constants::{
    DEFAULT_TERMINATE_GRACE, ENV_KILL_GRACE_MS, ENV_TIMEOUT_MS,
};

/// How a process is destroyed when its session is cancelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KillMode {
    /// SIGKILL right away
    #[default]
    Kill,
    /// SIGTERM first, SIGKILL once `grace` has passed without an exit
    Terminate { grace: Duration },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} (expected milliseconds)")]
    InvalidMillis { key: &'static str, value: String },
}

/// Supervisor Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Timeout applied by `ProcessLauncher::run`; zero means wait forever
    pub default_timeout: Duration,
    pub kill_mode: KillMode,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::ZERO,
            kill_mode: KillMode::Kill,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from the process environment
    ///
    /// # Environment Variables
    ///
    /// - `PROCWARDEN_TIMEOUT_MS`: default join timeout (0 = unbounded)
    /// - `PROCWARDEN_KILL_GRACE_MS`: enables SIGTERM-then-SIGKILL with this grace period
    ///
    /// # Errors
    /// - ConfigError::InvalidMillis if a variable is set but not a number
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(timeout) = parse_millis(&lookup, ENV_TIMEOUT_MS)? {
            config.default_timeout = timeout;
        }

        if let Some(grace) = parse_millis(&lookup, ENV_KILL_GRACE_MS)? {
            config.kill_mode = KillMode::Terminate { grace };
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_kill_mode(mut self, kill_mode: KillMode) -> Self {
        self.kill_mode = kill_mode;
        self
    }

    /// SIGTERM-then-SIGKILL with the default grace period
    pub fn graceful(self) -> Self {
        self.with_kill_mode(KillMode::Terminate {
            grace: DEFAULT_TERMINATE_GRACE,
        })
    }
}

fn parse_millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| ConfigError::InvalidMillis { key, value: raw })
}
