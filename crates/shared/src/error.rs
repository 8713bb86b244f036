//! Error types for SupportChat domain values

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("No channel segment in path: {0}")]
    MissingChannel(String),
}
