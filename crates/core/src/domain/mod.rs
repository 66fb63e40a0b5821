// Domain Layer - Pure data describing a supervised process

pub mod command;
pub mod error;
pub mod outcome;

// Re-exports
pub use command::SpawnRequest;
pub use error::DomainError;
pub use outcome::{DrainReport, ExitOutcome, StreamKind, TaskFailure};
