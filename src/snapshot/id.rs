//! Snapshot identifiers and partition keys

use std::fmt;

use time::OffsetDateTime;

use crate::error::SnapshotError;
use crate::util::{format_snapshot_timestamp, is_snapshot_timestamp};

pub const SNAPSHOT_PREFIX: &str = "snapshot_";

/// Repository full name with `/` and `-` replaced by `_`
pub fn slugify(repo_name: &str) -> String {
    repo_name.replace(['/', '-'], "_")
}

/// Name prefix shared by every snapshot of a repository
pub fn repo_prefix(repo_name: &str) -> String {
    format!("{}{}_", SNAPSHOT_PREFIX, slugify(repo_name))
}

/// Build `snapshot_{slug}_{YYYY-MM-DD_HH-MM-SS}`
pub fn make_snapshot_id(repo_name: &str, at: OffsetDateTime) -> String {
    format!("{}{}", repo_prefix(repo_name), format_snapshot_timestamp(at))
}

/// Best-effort timestamp recovered from the last two `_` segments of an id
pub fn timestamp_from_id(snapshot_id: &str) -> String {
    let parts: Vec<&str> = snapshot_id.split('_').collect();
    if parts.len() >= 3 {
        parts[parts.len() - 2..].join("_")
    } else {
        "unknown".to_string()
    }
}

/// Whether a snapshot id belongs to the given repository
///
/// The slug comparison also accepts the lowercased slug, and the remainder
/// must be a full timestamp so `org/app` does not claim `org/app-v2`.
pub fn belongs_to_repo(snapshot_id: &str, repo_name: &str) -> bool {
    let prefix = repo_prefix(repo_name);
    let lower = prefix.to_lowercase();
    [prefix.as_str(), lower.as_str()].iter().any(|p| {
        snapshot_id
            .strip_prefix(p)
            .is_some_and(is_snapshot_timestamp)
    })
}

fn is_safe_segment(s: &str) -> bool {
    !s.is_empty()
        && s.trim() == s
        && !s.contains(['/', '\\'])
        && !s.starts_with('.')
        && !s.contains("..")
}

/// Validated `(quarter, snapshot_id)` pair addressing one snapshot package
///
/// Both parts are single path segments, so a key can never point outside
/// its quarter partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    quarter: String,
    snapshot_id: String,
}

impl SnapshotKey {
    pub fn new(quarter: &str, snapshot_id: &str) -> Result<Self, SnapshotError> {
        validate_quarter(quarter)?;
        if !is_safe_segment(snapshot_id) || !snapshot_id.starts_with(SNAPSHOT_PREFIX) {
            return Err(SnapshotError::InvalidId(snapshot_id.to_string()));
        }
        Ok(Self {
            quarter: quarter.to_string(),
            snapshot_id: snapshot_id.to_string(),
        })
    }

    pub fn quarter(&self) -> &str {
        &self.quarter
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// `{quarter}/{snapshot_id}`
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.quarter, self.snapshot_id)
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.quarter, self.snapshot_id)
    }
}

/// Reject quarter identifiers that are not a single safe path segment
pub fn validate_quarter(quarter: &str) -> Result<(), SnapshotError> {
    if is_safe_segment(quarter) {
        Ok(())
    } else {
        Err(SnapshotError::InvalidQuarter(quarter.to_string()))
    }
}
