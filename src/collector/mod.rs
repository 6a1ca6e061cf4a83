//! Remote collection of commits and pull requests
//!
//! A [`Collector`] pages through a [`RemoteApi`] until it runs dry, validates
//! every record and hands the result to a [`SnapshotManager`]. Failures are
//! isolated per entity type and, in batch mode, per repository.

mod github;
mod gitlab;
mod progress;

pub use github::{DEFAULT_GITHUB_API, GitHubClient, GitHubConfig};
pub use gitlab::{GitLabClient, GitLabConfig, map_state};
pub use progress::{NoopProgress, Progress, RecordingProgress, SpinnerProgress, VerboseProgress};

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ApiError, SnapshotError, ValidationError};
use crate::model::{Commit, CommitDraft, PullRequest, PullRequestDraft};
use crate::repository::SnapshotStore;
use crate::snapshot::SnapshotManager;

/// Page size requested from every host
pub const PER_PAGE: usize = 100;

/// Default upper bound on pages per entity type
pub const MAX_PAGES: u32 = 1000;

/// `owner/repo` (GitLab namespaces may nest: `group/sub/repo`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoName {
    owner: String,
    name: String,
}

impl RepoName {
    pub fn parse(full_name: &str) -> Result<Self, ApiError> {
        let trimmed = full_name.trim();
        match trimmed.rsplit_once('/') {
            Some((owner, name))
                if !owner.is_empty()
                    && !name.is_empty()
                    && !owner.starts_with('/')
                    && !owner.ends_with('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ApiError::InvalidRepoName(full_name.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Validate an `owner/repo` name
pub fn parse_repo_name(full_name: &str) -> Result<RepoName, ApiError> {
    RepoName::parse(full_name)
}

/// Page-wise access to a Git hosting API
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// Short host name for logs
    fn host(&self) -> &'static str;

    /// One page of commits, 1-based; an empty page means no more data
    async fn commits_page(&self, repo: &RepoName, page: u32) -> Result<Vec<CommitDraft>, ApiError>;

    /// One page of pull requests in every state, 1-based
    async fn pull_requests_page(
        &self,
        repo: &RepoName,
        page: u32,
    ) -> Result<Vec<PullRequestDraft>, ApiError>;
}

/// Host chosen from configuration
pub enum HostClient {
    GitHub(GitHubClient),
    GitLab(GitLabClient),
}

impl RemoteApi for HostClient {
    fn host(&self) -> &'static str {
        match self {
            Self::GitHub(c) => c.host(),
            Self::GitLab(c) => c.host(),
        }
    }

    async fn commits_page(&self, repo: &RepoName, page: u32) -> Result<Vec<CommitDraft>, ApiError> {
        match self {
            Self::GitHub(c) => c.commits_page(repo, page).await,
            Self::GitLab(c) => c.commits_page(repo, page).await,
        }
    }

    async fn pull_requests_page(
        &self,
        repo: &RepoName,
        page: u32,
    ) -> Result<Vec<PullRequestDraft>, ApiError> {
        match self {
            Self::GitHub(c) => c.pull_requests_page(repo, page).await,
            Self::GitLab(c) => c.pull_requests_page(repo, page).await,
        }
    }
}

/// Outcome of collecting one repository
///
/// A failed entity type has `None` data and its error set; pages fetched
/// before the failure are discarded.
#[derive(Debug)]
pub struct Collection {
    pub repo: String,
    pub commits: Option<Vec<Commit>>,
    pub pull_requests: Option<Vec<PullRequest>>,
    pub commit_error: Option<ApiError>,
    pub pull_request_error: Option<ApiError>,
    pub skipped_commits: usize,
    pub skipped_pull_requests: usize,
}

impl Collection {
    /// Both entity types failed
    pub fn is_total_failure(&self) -> bool {
        self.commits.is_none() && self.pull_requests.is_none()
    }
}

/// Snapshot created for one repository in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSnapshot {
    pub repo: String,
    pub snapshot_id: String,
}

/// Repository that failed in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRepo {
    pub repo: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub created: Vec<CreatedSnapshot>,
    pub failed: Vec<FailedRepo>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

/// Collects from one host and snapshots through one store
pub struct Collector<A, S> {
    api: A,
    manager: SnapshotManager<S>,
    repo_names: Vec<String>,
    pause: Duration,
    max_pages: u32,
}

impl<A: RemoteApi, S: SnapshotStore> Collector<A, S> {
    pub fn new(api: A, manager: SnapshotManager<S>) -> Self {
        Self {
            api,
            manager,
            repo_names: Vec::new(),
            pause: Duration::ZERO,
            max_pages: MAX_PAGES,
        }
    }

    /// Repositories visited by [`Collector::collect_all`]
    pub fn with_repos(mut self, repo_names: Vec<String>) -> Self {
        self.repo_names = repo_names;
        self
    }

    /// Delay between repositories in batch mode
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Pages fetched per entity type before giving up on it
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn manager(&self) -> &SnapshotManager<S> {
        &self.manager
    }

    pub fn available_repos(&self) -> &[String] {
        &self.repo_names
    }

    /// Fetch every commit and pull request of a repository
    ///
    /// Only an invalid repository name is an error; API failures are recorded
    /// per entity type in the returned collection.
    pub async fn collect(&self, repo_name: &str, progress: &dyn Progress) -> Result<Collection, ApiError> {
        let repo = RepoName::parse(repo_name)?;
        let full_name = repo.to_string();

        progress.message(&format!("Collecting commits for {full_name}..."));
        let (commits, commit_error, skipped_commits) =
            match paginate(self.max_pages, |page| self.api.commits_page(&repo, page)).await {
                Ok(drafts) => {
                    let (rows, skipped) = validate_all(drafts, "commit", &full_name);
                    progress.message(&format!("Collected {} commits", rows.len()));
                    (Some(rows), None, skipped)
                }
                Err(ApiError::EmptyRepository(_)) => {
                    debug!(repo = %full_name, "repository has no commits");
                    progress.message("Collected 0 commits");
                    (Some(Vec::new()), None, 0)
                }
                Err(e) => {
                    warn!(repo = %full_name, host = self.api.host(), error = %e, "commit collection failed");
                    progress.message(&format!("Failed to collect commits: {e}"));
                    (None, Some(e), 0)
                }
            };

        progress.message(&format!("Collecting pull requests for {full_name}..."));
        let (pull_requests, pull_request_error, skipped_pull_requests) =
            match paginate(self.max_pages, |page| self.api.pull_requests_page(&repo, page)).await {
                Ok(drafts) => {
                    let (rows, skipped) = validate_all(drafts, "pull request", &full_name);
                    progress.message(&format!("Collected {} pull requests", rows.len()));
                    (Some(rows), None, skipped)
                }
                Err(e) => {
                    warn!(repo = %full_name, host = self.api.host(), error = %e, "pull request collection failed");
                    progress.message(&format!("Failed to collect pull requests: {e}"));
                    (None, Some(e), 0)
                }
            };

        Ok(Collection {
            repo: full_name,
            commits,
            pull_requests,
            commit_error,
            pull_request_error,
            skipped_commits,
            skipped_pull_requests,
        })
    }

    /// Collect a repository and write one snapshot of whatever was collected
    ///
    /// Fails when both entity types failed or the write fails. Nothing is
    /// written before collection completes.
    pub async fn collect_and_create_snapshot(
        &self,
        repo_name: &str,
        progress: &dyn Progress,
        quarter: &str,
    ) -> Result<String, SnapshotError> {
        progress.message(&format!("Starting data collection for {repo_name}..."));

        let collection = match self.collect(repo_name, progress).await {
            Ok(c) => c,
            Err(source) => {
                progress.message(&format!("Error collecting data for {repo_name}: {source}"));
                return Err(SnapshotError::Collect {
                    repo: repo_name.to_string(),
                    source,
                });
            }
        };

        if collection.is_total_failure() {
            let Collection { commit_error, pull_request_error, .. } = collection;
            // Both are set when both entity types failed
            let source = commit_error
                .or(pull_request_error)
                .unwrap_or_else(|| ApiError::NotFound(repo_name.to_string()));
            progress.message(&format!("Error collecting data for {repo_name}: {source}"));
            return Err(SnapshotError::Collect {
                repo: repo_name.to_string(),
                source,
            });
        }

        progress.message("Creating snapshot...");
        let created = self
            .manager
            .create_repository_snapshot(
                &collection.repo,
                collection.commits.as_deref(),
                collection.pull_requests.as_deref(),
                quarter,
            )
            .await;

        match created {
            Ok(snapshot_id) => {
                progress.message(&format!("Snapshot created successfully: {snapshot_id}"));
                Ok(snapshot_id)
            }
            Err(e) => {
                progress.message(&format!("Failed to create snapshot: {e}"));
                Err(e)
            }
        }
    }

    /// Snapshot every configured repository in order
    pub async fn collect_all(&self, progress: &dyn Progress, quarter: &str) -> BatchReport {
        let mut report = BatchReport::default();
        let total = self.repo_names.len();

        for (i, repo) in self.repo_names.iter().enumerate() {
            progress.message(&format!("[{}/{}] {}", i + 1, total, repo));
            match self.collect_and_create_snapshot(repo, progress, quarter).await {
                Ok(snapshot_id) => report.created.push(CreatedSnapshot {
                    repo: repo.clone(),
                    snapshot_id,
                }),
                Err(e) => {
                    warn!(repo = %repo, error = %e, "repository skipped");
                    report.failed.push(FailedRepo {
                        repo: repo.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if !self.pause.is_zero() && i + 1 < total {
                tokio::time::sleep(self.pause).await;
            }
        }

        info!(
            created = report.created.len(),
            failed = report.failed.len(),
            quarter,
            "batch collection finished"
        );
        report
    }
}

/// Fetch pages from 1 until an empty or short page
///
/// Running out of pages while they are still full is an error rather than a
/// truncated result.
async fn paginate<T, F, Fut>(max_pages: u32, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut rows = Vec::new();
    for page in 1..=max_pages {
        let batch = fetch(page).await?;
        let len = batch.len();
        debug!(page, rows = len, "page fetched");
        rows.extend(batch);
        if len < PER_PAGE {
            return Ok(rows);
        }
    }
    Err(ApiError::PageLimit(max_pages))
}

/// Convert drafts, skipping the ones that fail validation
fn validate_all<D, T>(drafts: Vec<D>, entity: &str, repo: &str) -> (Vec<T>, usize)
where
    T: TryFrom<D, Error = ValidationError>,
{
    let mut rows = Vec::with_capacity(drafts.len());
    let mut skipped = 0;
    for draft in drafts {
        match T::try_from(draft) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!(repo, entity, error = %e, "skipping invalid record");
            }
        }
    }
    (rows, skipped)
}
