//! Error types
//!
//! Not-found conditions are never errors: read paths return `Ok(None)` or an
//! empty list. Everything here is either a rejected input or a failure the
//! caller may want to surface.

use thiserror::Error;

/// A record failed validation at construction time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field was absent from the source payload
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Required field was empty after trimming whitespace
    #[error("field must not be empty: {0}")]
    EmptyField(&'static str),

    /// Timestamp field did not parse
    #[error("invalid timestamp in {field}: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// Pull request number must be positive
    #[error("pull request number must be > 0, got {0}")]
    InvalidNumber(i64),
}

/// Errors from the remote Git hosting API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Failed to build the HTTP client
    #[error("failed to initialize API client: {0}")]
    Init(String),

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status not covered by a more specific variant
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Authentication rejected
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// API rate limit exhausted
    #[error("rate limited by {0}")]
    RateLimited(String),

    /// Repository or endpoint not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Repository has no commits yet
    #[error("repository is empty: {0}")]
    EmptyRepository(String),

    /// Repository name is not `owner/repo`
    #[error("invalid repository name: {0:?}")]
    InvalidRepoName(String),

    /// Every page up to the limit was full, so more data remains
    #[error("page limit of {0} reached before the last page")]
    PageLimit(u32),
}

/// Errors from a storage backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Remote operation exceeded its deadline
    #[error("{operation} timed out after {secs}s: {path}")]
    Timeout {
        operation: &'static str,
        path: String,
        secs: u64,
    },

    /// Stored data does not have the expected shape
    #[error("corrupt data in {location}: {reason}")]
    Corrupt { location: String, reason: String },
}

/// Errors from snapshot lifecycle operations
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Snapshot id is malformed or would escape its partition
    #[error("invalid snapshot id: {0:?}")]
    InvalidId(String),

    /// Quarter identifier is malformed
    #[error("invalid quarter: {0:?}")]
    InvalidQuarter(String),

    /// Storage failure while creating a snapshot
    #[error("error creating snapshot for {repo}: {source}")]
    Create {
        repo: String,
        #[source]
        source: StoreError,
    },

    /// Storage failure while reading or deleting a snapshot
    #[error("error accessing snapshot {snapshot_id}: {source}")]
    Access {
        snapshot_id: String,
        #[source]
        source: StoreError,
    },

    /// Storage failure while listing a partition
    #[error("error listing snapshots for {repo} in {quarter}: {source}")]
    List {
        repo: String,
        quarter: String,
        #[source]
        source: StoreError,
    },

    /// Every entity collection failed, nothing to snapshot
    #[error("collection failed for {repo}: {source}")]
    Collect {
        repo: String,
        #[source]
        source: ApiError,
    },
}

/// Errors while reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}
