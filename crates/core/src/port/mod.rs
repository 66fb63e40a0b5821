// Port Layer - Interfaces for external dependencies

pub mod child_process;
pub mod hooks;

// Re-exports
pub use child_process::ChildProcess;
pub use hooks::{DefaultHooks, ProcessHooks};
