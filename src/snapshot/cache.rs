use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::model::SnapshotMetadata;

/// Default lifetime of a cached listing
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(60);

type CacheKey = (String, String);

/// Short-lived memo of snapshot listings keyed by `(repo, quarter)`
///
/// A zero TTL disables caching. Per process only; writers through other
/// processes are not seen until the entry expires.
#[derive(Debug)]
pub struct ListingCache {
    ttl: Duration,
    entries: Mutex<FxHashMap<CacheKey, (Instant, Vec<SnapshotMetadata>)>>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_TTL)
    }
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<CacheKey, (Instant, Vec<SnapshotMetadata>)>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, repo: &str, quarter: &str) -> Option<Vec<SnapshotMetadata>> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.lock();
        let key = (repo.to_string(), quarter.to_string());
        match entries.get(&key) {
            Some((stored, list)) if stored.elapsed() < self.ttl => Some(list.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, repo: &str, quarter: &str, list: Vec<SnapshotMetadata>) {
        if self.ttl.is_zero() {
            return;
        }
        self.lock()
            .insert((repo.to_string(), quarter.to_string()), (Instant::now(), list));
    }

    pub fn invalidate(&self, repo: &str, quarter: &str) {
        self.lock().remove(&(repo.to_string(), quarter.to_string()));
    }

    /// Drop every listing of a quarter
    pub fn invalidate_quarter(&self, quarter: &str) {
        self.lock().retain(|(_, q), _| q != quarter);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
