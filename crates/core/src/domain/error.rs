// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid environment variable name: {0:?}")]
    InvalidEnvironment(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
