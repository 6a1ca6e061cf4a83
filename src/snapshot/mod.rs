mod cache;
mod id;
mod manager;

pub use cache::{DEFAULT_LIST_TTL, ListingCache};
pub use id::{
    SNAPSHOT_PREFIX, SnapshotKey, belongs_to_repo, make_snapshot_id, repo_prefix, slugify,
    timestamp_from_id, validate_quarter,
};
pub use manager::SnapshotManager;
