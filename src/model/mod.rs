mod commit;
mod pull_request;
mod snapshot;

pub use commit::{Commit, CommitDraft};
pub use pull_request::{PullRequest, PullRequestDraft};
pub use snapshot::{DataKind, SnapshotData, SnapshotFile, SnapshotMetadata, SnapshotSummary};

use crate::error::ValidationError;

/// Trim a string field and reject it if nothing is left
fn non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Unwrap an optional draft field
fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}
