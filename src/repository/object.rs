//! Object storage implementation of SnapshotStore
//!
//! Same layout as the local store, addressed as object keys
//! `{quarter}/{snapshot_id}/{file}`. Every remote call is bounded by a timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, warn};

use crate::config::SupabaseConfig;
use crate::error::StoreError;
use crate::model::{Commit, PullRequest, SnapshotFile};
use crate::snapshot::{SNAPSHOT_PREFIX, SnapshotKey, validate_quarter};

use super::parquet::{decode_commits, decode_pull_requests, encode_commits, encode_pull_requests};
use super::store::{SnapshotPackage, SnapshotStore};

/// Default bound for a single object store call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot packages in a bucket
#[derive(Debug, Clone)]
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    /// Used only for human-readable locations
    base_url: String,
    timeout: Duration,
}

impl ObjectBackend {
    pub fn new(store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn object_path(key: &SnapshotKey, file: SnapshotFile) -> Path {
        Path::from(format!("{}/{}", key.prefix(), file.file_name()))
    }

    async fn bounded<T, F>(&self, operation: &'static str, path: &Path, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = object_store::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                operation,
                path: path.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn put(&self, path: &Path, payload: PutPayload) -> Result<(), StoreError> {
        self.bounded("put", path, self.store.put(path, payload)).await?;
        Ok(())
    }

    /// Fetch an object, mapping "not found" to `None`
    async fn get_optional(&self, path: &Path) -> Result<Option<bytes::Bytes>, StoreError> {
        let result = match self.bounded("get", path, self.store.get(path)).await {
            Ok(result) => result,
            Err(StoreError::ObjectStore(object_store::Error::NotFound { .. })) => return Ok(None),
            Err(e) => return Err(e),
        };
        let bytes = self.bounded("get", path, result.bytes()).await?;
        Ok(Some(bytes))
    }
}

impl SnapshotStore for ObjectBackend {
    fn name(&self) -> &'static str {
        "object"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        // Buckets are provisioned out of band; prefixes need no creation
        Ok(())
    }

    async fn write_snapshot(&self, package: SnapshotPackage<'_>) -> Result<(), StoreError> {
        if let Some(commits) = package.commits_to_write() {
            let path = Self::object_path(package.key, SnapshotFile::Commits);
            let bytes = encode_commits(commits)?;
            debug!(path = %path, rows = commits.len(), "uploading commits");
            self.put(&path, bytes.into()).await?;
        }

        if let Some(prs) = package.pull_requests_to_write() {
            let path = Self::object_path(package.key, SnapshotFile::PullRequests);
            let bytes = encode_pull_requests(prs)?;
            debug!(path = %path, rows = prs.len(), "uploading pull requests");
            self.put(&path, bytes.into()).await?;
        }

        let path = Self::object_path(package.key, SnapshotFile::Metadata);
        let json = serde_json::to_vec_pretty(package.metadata)?;
        self.put(&path, json.into()).await
    }

    async fn read_metadata_raw(&self, key: &SnapshotKey) -> Result<Option<Vec<u8>>, StoreError> {
        let path = Self::object_path(key, SnapshotFile::Metadata);
        Ok(self.get_optional(&path).await?.map(|b| b.to_vec()))
    }

    async fn read_commits(&self, key: &SnapshotKey) -> Result<Option<Vec<Commit>>, StoreError> {
        let path = Self::object_path(key, SnapshotFile::Commits);
        match self.get_optional(&path).await? {
            Some(bytes) => Ok(Some(decode_commits(bytes, path.as_ref())?)),
            None => Ok(None),
        }
    }

    async fn read_pull_requests(
        &self,
        key: &SnapshotKey,
    ) -> Result<Option<Vec<PullRequest>>, StoreError> {
        let path = Self::object_path(key, SnapshotFile::PullRequests);
        match self.get_optional(&path).await? {
            Some(bytes) => Ok(Some(decode_pull_requests(bytes, path.as_ref())?)),
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

        let prefix = Path::from(quarter);
        let listing = self
            .bounded("list", &prefix, self.store.list_with_delimiter(Some(&prefix)))
            .await?;

        let ids = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename())
            .filter(|name| name.starts_with(SNAPSHOT_PREFIX) && name.starts_with(name_prefix))
            .map(str::to_string)
            .collect();
        Ok(ids)
    }

    async fn delete_snapshot(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let prefix = Path::from(key.prefix());
        let listing = self
            .bounded("list", &prefix, self.store.list_with_delimiter(Some(&prefix)))
            .await?;
        if listing.objects.is_empty() {
            return Ok(false);
        }

        // Keep going past a failure so one stuck object does not strand the rest
        let mut first_error = None;
        for object in &listing.objects {
            match self.bounded("delete", &object.location, self.store.delete(&object.location)).await {
                Ok(()) => debug!(path = %object.location, "deleted"),
                Err(StoreError::ObjectStore(object_store::Error::NotFound { .. })) => {}
                Err(e) => {
                    warn!(path = %object.location, error = %e, "failed to delete snapshot object");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    fn file_location(&self, key: &SnapshotKey, file: SnapshotFile) -> String {
        format!("{}/{}", self.base_url, Self::object_path(key, file))
    }
}

/// Build an S3 client for Supabase Storage's S3-compatible endpoint
///
/// Without explicit S3 keys, session-token auth is used: the project ref as
/// access key id and the anon key as both secret and token.
pub fn build_supabase_store(config: &SupabaseConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let endpoint = config.s3_endpoint();
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_endpoint(&endpoint)
        .with_virtual_hosted_style_request(false);

    match (&config.access_key_id, &config.secret_access_key) {
        (Some(key), Some(secret)) => {
            builder = builder.with_access_key_id(key).with_secret_access_key(secret);
        }
        _ => {
            builder = builder
                .with_access_key_id(config.project_ref())
                .with_secret_access_key(&config.anon_key)
                .with_token(&config.anon_key);
        }
    }

    if endpoint.starts_with("http://") {
        builder = builder.with_allow_http(true);
    }

    Ok(Arc::new(builder.build()?))
}
