//! Common error types for the translation bridge

use thiserror::Error;

/// Common result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the bridge crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (job, job item or mapping)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vendor refused a creation request (bad parameters or credentials)
    #[error("Remote rejected: {0}")]
    RemoteRejected(String),

    /// Vendor 401 that persisted after the single automatic retry
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network or connection failure during a vendor call (retryable)
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// Malformed translated content (not retryable)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Webhook event for a non-final workflow stage
    #[error("Workflow level {got} is not the last workflow level {want}")]
    StaleWorkflowLevel { got: i64, want: i64 },

    /// Vendor reported a status string outside the known vendor table
    #[error("Unknown vendor status: {0}")]
    UnknownStatus(String),

    /// An active mapping already exists for the same local job item
    #[error("Duplicate mapping: {0}")]
    DuplicateMapping(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
