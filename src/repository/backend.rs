//! Runtime selection between storage backends

use crate::error::StoreError;
use crate::model::{Commit, PullRequest, SnapshotFile};
use crate::snapshot::SnapshotKey;

use super::database::Database;
use super::local::LocalStore;
use super::object::ObjectBackend;
use super::store::{SnapshotPackage, SnapshotStore};

/// One of the configured stores, chosen at startup
pub enum StoreBackend {
    Local(LocalStore),
    Table(Database),
    Object(ObjectBackend),
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Local($store) => $call,
            StoreBackend::Table($store) => $call,
            StoreBackend::Object($store) => $call,
        }
    };
}

impl StoreBackend {
    /// The table store, when that is the active backend
    pub fn as_database(&self) -> Option<&Database> {
        match self {
            Self::Table(db) => Some(db),
            _ => None,
        }
    }
}

impl From<LocalStore> for StoreBackend {
    fn from(store: LocalStore) -> Self {
        Self::Local(store)
    }
}

impl From<Database> for StoreBackend {
    fn from(db: Database) -> Self {
        Self::Table(db)
    }
}

impl From<ObjectBackend> for StoreBackend {
    fn from(store: ObjectBackend) -> Self {
        Self::Object(store)
    }
}

impl SnapshotStore for StoreBackend {
    fn name(&self) -> &'static str {
        delegate!(self, s => s.name())
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        delegate!(self, s => s.ensure_schema().await)
    }

    async fn write_snapshot(&self, package: SnapshotPackage<'_>) -> Result<(), StoreError> {
        delegate!(self, s => s.write_snapshot(package).await)
    }

    async fn read_metadata_raw(&self, key: &SnapshotKey) -> Result<Option<Vec<u8>>, StoreError> {
        delegate!(self, s => s.read_metadata_raw(key).await)
    }

    async fn read_commits(&self, key: &SnapshotKey) -> Result<Option<Vec<Commit>>, StoreError> {
        delegate!(self, s => s.read_commits(key).await)
    }

    async fn read_pull_requests(
        &self,
        key: &SnapshotKey,
    ) -> Result<Option<Vec<PullRequest>>, StoreError> {
        delegate!(self, s => s.read_pull_requests(key).await)
    }

    async fn list_snapshot_ids(
        &self,
        quarter: &str,
        name_prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        delegate!(self, s => s.list_snapshot_ids(quarter, name_prefix).await)
    }

    async fn delete_snapshot(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        delegate!(self, s => s.delete_snapshot(key).await)
    }

    fn file_location(&self, key: &SnapshotKey, file: SnapshotFile) -> String {
        delegate!(self, s => s.file_location(key, file))
    }
}
