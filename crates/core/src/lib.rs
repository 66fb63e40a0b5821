// Procwarden Core - Domain, Ports & Process Supervision
// NO OS adapters here; processes are reached through the ChildProcess port

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{CancelToken, InterruptHandle, ProcessParts, Session};
pub use config::{ConfigError, KillMode, SupervisorConfig};
pub use domain::{SpawnRequest, StreamKind};
pub use error::{Result, SupervisorError};
pub use port::{ChildProcess, DefaultHooks, ProcessHooks};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
