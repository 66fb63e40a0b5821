// Procwarden Infrastructure - System Adapters
// Implements: ChildProcess (tokio::process), ProcessLauncher, liveness probe

pub mod launcher;
pub mod liveness;
pub mod system_child;

pub use launcher::{FinishedSession, ProcessLauncher};
pub use liveness::is_alive;
pub use system_child::SystemChild;
