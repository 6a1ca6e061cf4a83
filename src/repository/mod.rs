mod backend;
mod database;
mod local;
mod object;
pub mod parquet;
mod store;

pub use backend::StoreBackend;
pub use database::Database;
pub use local::LocalStore;
pub use object::{DEFAULT_TIMEOUT, ObjectBackend, build_supabase_store};
pub use store::{SnapshotPackage, SnapshotStore};

/// Table store layout version; a mismatch rebuilds the schema
pub const SCHEMA_VERSION: &str = "1";
