use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::{Commit, PullRequest};

/// Contents of a snapshot's `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub timestamp: String,
    pub repository_name: String,
    pub commits_count: u64,
    pub pull_requests_count: u64,
    pub snapshot_id: String,
    pub created_at: String,
}

impl SnapshotMetadata {
    /// Check that every string field is present
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("timestamp", &self.timestamp),
            ("repository_name", &self.repository_name),
            ("snapshot_id", &self.snapshot_id),
            ("created_at", &self.created_at),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(name));
            }
        }
        Ok(())
    }

    /// A snapshot with no commits and no pull requests
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commits_count == 0 && self.pull_requests_count == 0
    }
}

/// Aggregate over every snapshot of one repository in a quarter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub repository_name: String,
    pub total_snapshots: usize,
    pub latest_snapshot: Option<SnapshotMetadata>,
    pub total_commits: u64,
    pub total_pull_requests: u64,
    pub snapshots: Vec<SnapshotMetadata>,
}

impl SnapshotSummary {
    /// Build a summary from snapshots already sorted newest first
    pub fn from_sorted(repository_name: &str, snapshots: Vec<SnapshotMetadata>) -> Self {
        Self {
            repository_name: repository_name.to_string(),
            total_snapshots: snapshots.len(),
            latest_snapshot: snapshots.first().cloned(),
            total_commits: snapshots.iter().map(|s| s.commits_count).sum(),
            total_pull_requests: snapshots.iter().map(|s| s.pull_requests_count).sum(),
            snapshots,
        }
    }
}

/// Which data set of a snapshot to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Commits,
    PullRequests,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::PullRequests => "pull_requests",
        }
    }

    /// Parse `commits` or `pull_requests`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commits" => Some(Self::Commits),
            "pull_requests" => Some(Self::PullRequests),
            _ => None,
        }
    }

    pub fn file(self) -> SnapshotFile {
        match self {
            Self::Commits => SnapshotFile::Commits,
            Self::PullRequests => SnapshotFile::PullRequests,
        }
    }
}

/// A file inside a snapshot package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotFile {
    Commits,
    PullRequests,
    Metadata,
}

impl SnapshotFile {
    pub const ALL: [SnapshotFile; 3] = [Self::Commits, Self::PullRequests, Self::Metadata];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Commits => "commits.parquet",
            Self::PullRequests => "pull_requests.parquet",
            Self::Metadata => "metadata.json",
        }
    }
}

/// Tabular data loaded from a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotData {
    Commits(Vec<Commit>),
    PullRequests(Vec<PullRequest>),
}

impl SnapshotData {
    pub fn len(&self) -> usize {
        match self {
            Self::Commits(rows) => rows.len(),
            Self::PullRequests(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_commits(self) -> Option<Vec<Commit>> {
        match self {
            Self::Commits(rows) => Some(rows),
            Self::PullRequests(_) => None,
        }
    }

    pub fn into_pull_requests(self) -> Option<Vec<PullRequest>> {
        match self {
            Self::PullRequests(rows) => Some(rows),
            Self::Commits(_) => None,
        }
    }
}
