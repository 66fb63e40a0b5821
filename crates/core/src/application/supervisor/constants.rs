// Supervisor constants (no magic values)
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL when graceful termination is enabled (5s)
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Exit codes of signal deaths are reported as SIGNAL_EXIT_BASE + signal number
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Environment variable holding the default join timeout in milliseconds
pub const ENV_TIMEOUT_MS: &str = "PROCWARDEN_TIMEOUT_MS";

/// Environment variable holding the SIGTERM grace period in milliseconds
pub const ENV_KILL_GRACE_MS: &str = "PROCWARDEN_KILL_GRACE_MS";
