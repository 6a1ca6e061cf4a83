//! Snapshot lifecycle over any storage backend

use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::model::{Commit, DataKind, PullRequest, SnapshotData, SnapshotFile, SnapshotMetadata, SnapshotSummary};
use crate::repository::{SnapshotPackage, SnapshotStore};
use crate::util::{format_rfc3339, format_snapshot_timestamp, now_local};

use super::cache::ListingCache;
use super::id::{
    SNAPSHOT_PREFIX, SnapshotKey, belongs_to_repo, make_snapshot_id, repo_prefix, timestamp_from_id,
    validate_quarter,
};

/// Creates, lists, loads and deletes snapshots through one store
pub struct SnapshotManager<S> {
    store: S,
    default_quarter: String,
    cache: ListingCache,
}

impl<S: SnapshotStore> SnapshotManager<S> {
    pub fn new(store: S, default_quarter: impl Into<String>) -> Self {
        Self {
            store,
            default_quarter: default_quarter.into(),
            cache: ListingCache::default(),
        }
    }

    /// Override the listing cache lifetime; zero disables it
    pub fn with_list_ttl(mut self, ttl: Duration) -> Self {
        self.cache = ListingCache::new(ttl);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_quarter(&self) -> &str {
        &self.default_quarter
    }

    /// Write a new snapshot stamped with the current local time
    pub async fn create_repository_snapshot(
        &self,
        repo_name: &str,
        commits: Option<&[Commit]>,
        pull_requests: Option<&[PullRequest]>,
        quarter: &str,
    ) -> Result<String, SnapshotError> {
        self.create_snapshot_at(repo_name, commits, pull_requests, quarter, now_local())
            .await
    }

    /// Write a new snapshot stamped with `at`
    ///
    /// Two snapshots of one repository stamped in the same second share an id.
    pub async fn create_snapshot_at(
        &self,
        repo_name: &str,
        commits: Option<&[Commit]>,
        pull_requests: Option<&[PullRequest]>,
        quarter: &str,
        at: OffsetDateTime,
    ) -> Result<String, SnapshotError> {
        let snapshot_id = make_snapshot_id(repo_name, at);
        let key = SnapshotKey::new(quarter, &snapshot_id)?;

        let metadata = SnapshotMetadata {
            timestamp: format_snapshot_timestamp(at),
            repository_name: repo_name.to_string(),
            commits_count: commits.map_or(0, |c| c.len() as u64),
            pull_requests_count: pull_requests.map_or(0, |p| p.len() as u64),
            snapshot_id: snapshot_id.clone(),
            created_at: format_rfc3339(at),
        };

        let package = SnapshotPackage {
            key: &key,
            metadata: &metadata,
            commits,
            pull_requests,
        };

        let created = self.store.write_snapshot(package).await;
        // Partial writes may exist even on failure
        self.cache.invalidate(repo_name, quarter);
        created.map_err(|source| SnapshotError::Create {
            repo: repo_name.to_string(),
            source,
        })?;

        info!(
            repo = repo_name,
            snapshot = %key,
            backend = self.store.name(),
            commits = metadata.commits_count,
            pull_requests = metadata.pull_requests_count,
            "snapshot created"
        );
        Ok(snapshot_id)
    }

    /// Snapshots of a repository in a quarter, newest first
    pub async fn list_repository_snapshots(
        &self,
        repo_name: &str,
        quarter: &str,
    ) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
        validate_quarter(quarter)?;
        if let Some(cached) = self.cache.get(repo_name, quarter) {
            debug!(repo = repo_name, quarter, "snapshot listing served from cache");
            return Ok(cached);
        }

        // A mixed-case repo may have lowercase-slug ids, which the exact prefix misses
        let prefix = repo_prefix(repo_name);
        let list_prefix = if prefix == prefix.to_lowercase() { prefix.as_str() } else { SNAPSHOT_PREFIX };

        let ids = self
            .store
            .list_snapshot_ids(quarter, list_prefix)
            .await
            .map_err(|source| SnapshotError::List {
                repo: repo_name.to_string(),
                quarter: quarter.to_string(),
                source,
            })?;

        let mut snapshots = Vec::new();
        for id in ids.iter().filter(|id| belongs_to_repo(id, repo_name)) {
            let Ok(key) = SnapshotKey::new(quarter, id) else {
                warn!(snapshot_id = %id, "skipping unaddressable snapshot id");
                continue;
            };

            let metadata = match self.store.read_metadata(&key).await {
                Ok(Some(m)) => m,
                Ok(None) => synthesized(repo_name, id),
                Err(e) => {
                    warn!(snapshot = %key, error = %e, "metadata unreadable, using placeholder");
                    synthesized(repo_name, id)
                }
            };

            // Slugs collide across case and separators; metadata decides ownership
            if metadata.repository_name != repo_name {
                debug!(
                    snapshot = %key,
                    owner = %metadata.repository_name,
                    "skipping snapshot of another repository with the same slug"
                );
                continue;
            }
            snapshots.push(metadata);
        }

        snapshots.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.snapshot_id.cmp(&a.snapshot_id))
        });

        self.cache.put(repo_name, quarter, snapshots.clone());
        Ok(snapshots)
    }

    /// Parsed metadata of one snapshot, `None` when missing or malformed
    pub async fn get_snapshot_metadata(
        &self,
        snapshot_id: &str,
        quarter: &str,
    ) -> Result<Option<SnapshotMetadata>, SnapshotError> {
        let key = SnapshotKey::new(quarter, snapshot_id)?;
        self.store
            .read_metadata(&key)
            .await
            .map_err(|source| access_error(snapshot_id, source))
    }

    /// Load one data set of a snapshot, `None` when it was never stored
    pub async fn load_snapshot_data(
        &self,
        snapshot_id: &str,
        kind: DataKind,
        quarter: &str,
    ) -> Result<Option<SnapshotData>, SnapshotError> {
        let data = match kind {
            DataKind::Commits => self
                .load_commits(snapshot_id, quarter)
                .await?
                .map(SnapshotData::Commits),
            DataKind::PullRequests => self
                .load_pull_requests(snapshot_id, quarter)
                .await?
                .map(SnapshotData::PullRequests),
        };
        Ok(data)
    }

    pub async fn load_commits(
        &self,
        snapshot_id: &str,
        quarter: &str,
    ) -> Result<Option<Vec<Commit>>, SnapshotError> {
        let key = SnapshotKey::new(quarter, snapshot_id)?;
        self.store
            .read_commits(&key)
            .await
            .map_err(|source| access_error(snapshot_id, source))
    }

    pub async fn load_pull_requests(
        &self,
        snapshot_id: &str,
        quarter: &str,
    ) -> Result<Option<Vec<PullRequest>>, SnapshotError> {
        let key = SnapshotKey::new(quarter, snapshot_id)?;
        self.store
            .read_pull_requests(&key)
            .await
            .map_err(|source| access_error(snapshot_id, source))
    }

    /// Remove a snapshot; `Ok(false)` when there was nothing to remove
    pub async fn delete_snapshot(&self, snapshot_id: &str, quarter: &str) -> Result<bool, SnapshotError> {
        let key = SnapshotKey::new(quarter, snapshot_id)?;
        let removed = self.store.delete_snapshot(&key).await;
        self.cache.invalidate_quarter(quarter);

        let removed = removed.map_err(|source| access_error(snapshot_id, source))?;
        if removed {
            info!(snapshot = %key, backend = self.store.name(), "snapshot deleted");
        } else {
            debug!(snapshot = %key, "nothing to delete");
        }
        Ok(removed)
    }

    /// Summary over the default quarter
    pub async fn export_snapshot_summary(&self, repo_name: &str) -> Result<SnapshotSummary, SnapshotError> {
        self.snapshot_summary(repo_name, &self.default_quarter).await
    }

    pub async fn snapshot_summary(
        &self,
        repo_name: &str,
        quarter: &str,
    ) -> Result<SnapshotSummary, SnapshotError> {
        let snapshots = self.list_repository_snapshots(repo_name, quarter).await?;
        Ok(SnapshotSummary::from_sorted(repo_name, snapshots))
    }

    /// Where one file of a snapshot lives in the backing store
    pub fn snapshot_location(
        &self,
        snapshot_id: &str,
        quarter: &str,
        file: SnapshotFile,
    ) -> Result<String, SnapshotError> {
        let key = SnapshotKey::new(quarter, snapshot_id)?;
        Ok(self.store.file_location(&key, file))
    }
}

fn access_error(snapshot_id: &str, source: crate::error::StoreError) -> SnapshotError {
    SnapshotError::Access {
        snapshot_id: snapshot_id.to_string(),
        source,
    }
}

/// Zero-count stand-in for a snapshot whose metadata is missing
fn synthesized(repo_name: &str, snapshot_id: &str) -> SnapshotMetadata {
    SnapshotMetadata {
        timestamp: timestamp_from_id(snapshot_id),
        repository_name: repo_name.to_string(),
        commits_count: 0,
        pull_requests_count: 0,
        snapshot_id: snapshot_id.to_string(),
        created_at: String::new(),
    }
}
