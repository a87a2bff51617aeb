//! Error types for tenant-walker
//!
//! This module defines the error hierarchy that covers:
//! - Directory API query errors (one object, never fatal to the crawl)
//! - Output stream errors (always fatal)
//! - Configuration and CLI errors
//! - Worker task errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A failed query is isolated to the object it was issued for
//! - Preserve error chains for debugging

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the tenant-walker library
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Directory API errors
    #[error("Directory query error: {0}")]
    Query(#[from] QueryError),

    /// Output stream errors
    #[error("Output error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Failure of a single directory API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Object does not exist in the tenant
    #[error("Object not found: '{id}'")]
    NotFound { id: String },

    /// Caller is not allowed to read the object
    #[error("Permission denied: '{id}'")]
    PermissionDenied { id: String },

    /// Service kept throttling after all retries
    #[error("Throttled by the directory service, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    /// Service returned an OData error body
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl QueryError {
    /// Check if the crawl can continue past this error
    ///
    /// Every query error is isolated to its own object, so this is only
    /// false for conditions that will fail every subsequent call too.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, QueryError::Api { code, .. } if code == "InvalidAuthenticationToken")
    }

    /// Check if this error came from service throttling
    pub fn is_throttling(&self) -> bool {
        matches!(self, QueryError::Throttled { .. })
    }
}

/// Output stream errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// Failed to create an output file
    #[error("Failed to open output '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    /// Failed to append a record
    #[error("Failed to write to '{stream}' stream: {reason}")]
    Write { stream: &'static str, reason: String },

    /// Failed to flush buffered records
    #[error("Failed to flush '{stream}' stream: {reason}")]
    Flush { stream: &'static str, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid page size
    #[error("Invalid page size {size}: must be between 1 and {max}")]
    InvalidPageSize { size: u32, max: u32 },

    /// Missing tenant
    #[error("A tenant id is required")]
    MissingTenant,

    /// Tenant cannot be used as an output file prefix
    #[error("Invalid tenant '{tenant}': must not contain path separators")]
    InvalidTenant { tenant: String },

    /// Request timeout of zero
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,

    /// Invalid retry count
    #[error("Invalid retry count {count}: must be at most {max}")]
    InvalidRetries { count: u32, max: u32 },

    /// No seed accounts supplied
    #[error("No seed accounts supplied")]
    NoSeeds,

    /// Seed file could not be read
    #[error("Cannot read seeds from '{path}': {reason}")]
    SeedsFile { path: PathBuf, reason: String },

    /// Output directory error
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidOutputDir { path: PathBuf, reason: String },

    /// Directory endpoint error
    #[error("Invalid directory endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Worker task errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker task {task} panicked: {message}")]
    Panicked { task: String, message: String },

    /// Worker was cancelled before completion
    #[error("Worker was cancelled")]
    Cancelled,
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for QueryError
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Represents the outcome of expanding a single directory object
#[derive(Debug)]
pub enum ExpansionOutcome {
    /// Membership query succeeded
    Expanded { id: String, discovered: usize },

    /// Another worker or an earlier wave already expanded this object
    Skipped { id: String },

    /// Query failed, an error record was written
    Failed { id: String, error: QueryError },
}

impl ExpansionOutcome {
    /// Returns true if this outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, ExpansionOutcome::Expanded { .. })
    }

    /// Returns the object id associated with this outcome
    pub fn id(&self) -> &str {
        match self {
            ExpansionOutcome::Expanded { id, .. } => id,
            ExpansionOutcome::Skipped { id } => id,
            ExpansionOutcome::Failed { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_recoverable() {
        let denied = QueryError::PermissionDenied { id: "u1".into() };
        assert!(denied.is_recoverable());

        let bad_token = QueryError::Api {
            code: "InvalidAuthenticationToken".into(),
            message: "expired".into(),
        };
        assert!(!bad_token.is_recoverable());
    }

    #[test]
    fn test_query_error_throttling() {
        assert!(QueryError::Throttled { retry_after_secs: 5 }.is_throttling());
        assert!(!QueryError::Transport("reset".into()).is_throttling());
    }

    #[test]
    fn test_error_conversion() {
        let query_err = QueryError::NotFound { id: "missing".into() };
        let walker_err: WalkerError = query_err.into();
        assert!(matches!(walker_err, WalkerError::Query(_)));
    }

    #[test]
    fn test_outcome_id() {
        let outcome = ExpansionOutcome::Failed {
            id: "g1".into(),
            error: QueryError::Transport("timeout".into()),
        };
        assert_eq!(outcome.id(), "g1");
        assert!(!outcome.is_success());
        assert!(ExpansionOutcome::Expanded { id: "u".into(), discovered: 2 }.is_success());
    }
}
