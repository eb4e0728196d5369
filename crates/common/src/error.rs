//! Error types shared by the queue, storage and remote crates
//!
//! Unknown queues and unknown receipt handles are not errors: operations
//! return `None` or do nothing for them.

use std::time::Duration;
use thiserror::Error;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid visibility timeout: {0:?} (must be greater than zero)")]
    InvalidVisibilityTimeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Remote queue error: {0}")]
    Remote(String),
}
