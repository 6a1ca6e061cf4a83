//! Local filesystem implementation of SnapshotStore
//!
//! Layout: `{base}/{quarter}/{snapshot_id}/{commits,pull_requests}.parquet`
//! plus `metadata.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{Commit, PullRequest, SnapshotFile};
use crate::snapshot::{SnapshotKey, validate_quarter};

use super::parquet::{decode_commits, decode_pull_requests, encode_commits, encode_pull_requests};
use super::store::{SnapshotPackage, SnapshotStore};

/// Snapshot packages as directories of Parquet files
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn snapshot_dir(&self, key: &SnapshotKey) -> PathBuf {
        self.base_path.join(key.quarter()).join(key.snapshot_id())
    }

    fn file_path(&self, key: &SnapshotKey, file: SnapshotFile) -> PathBuf {
        self.snapshot_dir(key).join(file.file_name())
    }

    /// Read a file, mapping "not found" to `None`
    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SnapshotStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    async fn write_snapshot(&self, package: SnapshotPackage<'_>) -> Result<(), StoreError> {
        let dir = self.snapshot_dir(package.key);
        fs::create_dir_all(&dir).await?;

        if let Some(commits) = package.commits_to_write() {
            let path = self.file_path(package.key, SnapshotFile::Commits);
            let bytes = encode_commits(commits)?;
            debug!(path = %path.display(), rows = commits.len(), "writing commits");
            fs::write(&path, &bytes).await?;
        }

        if let Some(prs) = package.pull_requests_to_write() {
            let path = self.file_path(package.key, SnapshotFile::PullRequests);
            let bytes = encode_pull_requests(prs)?;
            debug!(path = %path.display(), rows = prs.len(), "writing pull requests");
            fs::write(&path, &bytes).await?;
        }

        let json = serde_json::to_vec_pretty(package.metadata)?;
        fs::write(self.file_path(package.key, SnapshotFile::Metadata), json).await?;
        Ok(())
    }

    async fn read_metadata_raw(&self, key: &SnapshotKey) -> Result<Option<Vec<u8>>, StoreError> {
        Self::read_optional(&self.file_path(key, SnapshotFile::Metadata)).await
    }

    async fn read_commits(&self, key: &SnapshotKey) -> Result<Option<Vec<Commit>>, StoreError> {
        let path = self.file_path(key, SnapshotFile::Commits);
        match Self::read_optional(&path).await? {
            Some(bytes) => {
                let location = path.display().to_string();
                Ok(Some(decode_commits(Bytes::from(bytes), &location)?))
            }
            None => Ok(None),
        }
    }

    async fn read_pull_requests(
        &self,
        key: &SnapshotKey,
    ) -> Result<Option<Vec<PullRequest>>, StoreError> {
        let path = self.file_path(key, SnapshotFile::PullRequests);
        match Self::read_optional(&path).await? {
            Some(bytes) => {
                let location = path.display().to_string();
                Ok(Some(decode_pull_requests(Bytes::from(bytes), &location)?))
            }
            None => Ok(None),
        }
    }

    async fn list_snapshot_ids(
        &self,
        quarter: &str,
        name_prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        if validate_quarter(quarter).is_err() {
            return Ok(Vec::new());
        }

        let quarter_dir = self.base_path.join(quarter);
        let mut entries = match fs::read_dir(&quarter_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(name_prefix) {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn delete_snapshot(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let dir = self.snapshot_dir(key);
        if !fs::try_exists(&dir).await? {
            return Ok(false);
        }

        for file in SnapshotFile::ALL {
            let path = self.file_path(key, file);
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove snapshot file"),
            }
        }

        // Stray files left by other tools still go with the directory
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    fn file_location(&self, key: &SnapshotKey, file: SnapshotFile) -> String {
        self.file_path(key, file).display().to_string()
    }
}
