//! Snapshot store trait for persistence abstraction
//!
//! Decouples snapshot lifecycle logic from where the files or rows live.

use crate::error::StoreError;
use crate::model::{Commit, PullRequest, SnapshotFile, SnapshotMetadata};
use crate::snapshot::SnapshotKey;

/// Everything that goes into one snapshot write
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPackage<'a> {
    pub key: &'a SnapshotKey,
    pub metadata: &'a SnapshotMetadata,
    /// `None` or empty means no commits file is written
    pub commits: Option<&'a [Commit]>,
    /// `None` or empty means no pull requests file is written
    pub pull_requests: Option<&'a [PullRequest]>,
}

impl<'a> SnapshotPackage<'a> {
    /// Commits to persist, if there are any
    pub fn commits_to_write(&self) -> Option<&'a [Commit]> {
        self.commits.filter(|rows| !rows.is_empty())
    }

    /// Pull requests to persist, if there are any
    pub fn pull_requests_to_write(&self) -> Option<&'a [PullRequest]> {
        self.pull_requests.filter(|rows| !rows.is_empty())
    }
}

/// Persistence layer for snapshot packages
///
/// Not-found is `Ok(None)` / `Ok(false)`; errors are reserved for failures.
#[allow(async_fn_in_trait)]
pub trait SnapshotStore {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Create tables, directories or buckets as needed. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Persist data files first, then metadata
    ///
    /// Not atomic across files: a failure part way leaves the files already
    /// written, and readers treat such a package as missing metadata.
    async fn write_snapshot(&self, package: SnapshotPackage<'_>) -> Result<(), StoreError>;

    /// Raw metadata bytes, `None` when the snapshot has no metadata file
    async fn read_metadata_raw(&self, key: &SnapshotKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Parsed metadata; unreadable or malformed metadata counts as absent
    async fn read_metadata(&self, key: &SnapshotKey) -> Result<Option<SnapshotMetadata>, StoreError> {
        let Some(raw) = self.read_metadata_raw(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<SnapshotMetadata>(&raw) {
            Ok(metadata) => match metadata.validate() {
                Ok(()) => Ok(Some(metadata)),
                Err(e) => {
                    tracing::warn!(backend = self.name(), snapshot = %key, error = %e, "ignoring incomplete metadata");
                    Ok(None)
                }
            },
            Err(e) => {
                tracing::warn!(backend = self.name(), snapshot = %key, error = %e, "ignoring malformed metadata");
                Ok(None)
            }
        }
    }

    /// Commits of a snapshot, `None` when none were stored
    async fn read_commits(&self, key: &SnapshotKey) -> Result<Option<Vec<Commit>>, StoreError>;

    /// Pull requests of a snapshot, `None` when none were stored
    async fn read_pull_requests(
        &self,
        key: &SnapshotKey,
    ) -> Result<Option<Vec<PullRequest>>, StoreError>;

    /// Snapshot ids in a quarter whose name starts with `name_prefix`
    ///
    /// Returns an empty list when the quarter does not exist.
    async fn list_snapshot_ids(
        &self,
        quarter: &str,
        name_prefix: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Remove every file of a snapshot, returning whether anything existed
    async fn delete_snapshot(&self, key: &SnapshotKey) -> Result<bool, StoreError>;

    /// Human-readable location of one file (path, URL or table reference)
    fn file_location(&self, key: &SnapshotKey, file: SnapshotFile) -> String;
}
