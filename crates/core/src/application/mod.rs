// Application Layer - Process Supervision

pub mod supervisor;

// Re-exports
pub use supervisor::{BoxedReader, BoxedWriter, CancelToken, InterruptHandle, ProcessParts, Session};
