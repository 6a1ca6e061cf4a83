// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gitsnap::collector::{PER_PAGE, RemoteApi, RepoName};
use gitsnap::error::ApiError;
use gitsnap::model::{Commit, CommitDraft, PullRequest, PullRequestDraft};
use gitsnap::repository::{Database, LocalStore, ObjectBackend, SnapshotStore, StoreBackend};
use object_store::memory::InMemory;
use tempfile::TempDir;

pub const QUARTER: &str = "2025-1B";
pub const REPO: &str = "org/app";

/// Create an in-memory test database with schema
pub async fn create_test_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}

/// Local store rooted in a fresh temp directory (keep the TempDir alive)
pub fn create_local_store() -> (TempDir, LocalStore) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::new(dir.path().join("data"));
    (dir, store)
}

/// Object backend over an in-memory bucket
pub fn create_object_store() -> ObjectBackend {
    ObjectBackend::new(Arc::new(InMemory::new()), "memory://snapshots")
}

/// One of each backend, schema ensured; the TempDir backs the local one
pub async fn all_backends() -> (TempDir, Vec<StoreBackend>) {
    let (dir, local) = create_local_store();
    let backends: Vec<StoreBackend> = vec![
        local.into(),
        create_test_db().await.into(),
        create_object_store().into(),
    ];
    for backend in &backends {
        backend.ensure_schema().await.unwrap();
    }
    (dir, backends)
}

pub fn commit(sha: &str, message: &str, author: &str, date: &str) -> Commit {
    Commit::new(sha, message, author, date, &format!("https://github.com/{REPO}/commit/{sha}")).unwrap()
}

pub fn pull_request(number: i64, state: &str, author: &str, created_at: &str) -> PullRequest {
    PullRequest::new(
        number,
        &format!("PR #{number}"),
        author,
        state,
        created_at,
        &format!("https://github.com/{REPO}/pull/{number}"),
    )
    .unwrap()
}

/// Three commits (two feat, one fix) spread over two days
pub fn sample_commits() -> Vec<Commit> {
    vec![
        commit("a1", "feat: add login", "Ana", "2025-02-10T14:00:00Z"),
        commit("b2", "fix: null check", "Bruno", "2025-02-10T18:30:00Z"),
        commit("c3", "Feat: dark mode", "Ana", "2025-02-11T09:15:00Z"),
    ]
}

/// One open pull request
pub fn sample_pull_requests() -> Vec<PullRequest> {
    vec![pull_request(42, "open", "bruno", "2025-02-11T10:00:00Z")]
}

pub fn commit_draft(sha: &str, message: &str, author: Option<&str>, date: &str) -> CommitDraft {
    CommitDraft {
        sha: Some(sha.to_string()),
        message: Some(message.to_string()),
        author: author.map(str::to_string),
        date: Some(date.to_string()),
        url: Some(format!("https://github.com/{REPO}/commit/{sha}")),
    }
}

pub fn pull_request_draft(number: i64, state: &str, created_at: &str) -> PullRequestDraft {
    PullRequestDraft {
        number: Some(number),
        title: Some(format!("PR #{number}")),
        author: Some("dev".to_string()),
        state: Some(state.to_string()),
        created_at: Some(created_at.to_string()),
        url: Some(format!("https://github.com/{REPO}/pull/{number}")),
    }
}

/// `n` valid commit drafts with distinct shas
pub fn commit_drafts(n: usize) -> Vec<CommitDraft> {
    (0..n)
        .map(|i| commit_draft(&format!("sha{i:05}"), "chore: bump", Some("Bot"), "2025-03-01T12:00:00Z"))
        .collect()
}

// =============================================================================
// Scripted RemoteApi
// =============================================================================

/// Failure a scripted feed raises
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    NotFound,
    Empty,
    RateLimited,
    Server,
}

impl Failure {
    fn to_error(self, repo: &RepoName) -> ApiError {
        match self {
            Failure::NotFound => ApiError::NotFound(repo.to_string()),
            Failure::Empty => ApiError::EmptyRepository(repo.to_string()),
            Failure::RateLimited => ApiError::RateLimited(repo.to_string()),
            Failure::Server => ApiError::Status { status: 502, url: "https://fake".into() },
        }
    }
}

/// Pages served for one entity type; `fail_at` raises on that 1-based page
#[derive(Debug, Clone)]
pub struct Feed<D> {
    pub pages: Vec<Vec<D>>,
    pub fail_at: Option<(u32, Failure)>,
}

impl<D: Clone> Feed<D> {
    pub fn pages(pages: Vec<Vec<D>>) -> Self {
        Self { pages, fail_at: None }
    }

    /// Full pages of `rows`, chunked by the page size
    pub fn rows(rows: Vec<D>) -> Self {
        Self::pages(rows.chunks(PER_PAGE).map(<[D]>::to_vec).collect())
    }

    pub fn failing(pages: Vec<Vec<D>>, page: u32, failure: Failure) -> Self {
        Self { pages, fail_at: Some((page, failure)) }
    }

    fn serve(&self, repo: &RepoName, page: u32) -> Result<Vec<D>, ApiError> {
        match self.fail_at {
            Some((at, failure)) if page >= at => return Err(failure.to_error(repo)),
            _ => {}
        }
        Ok(self.pages.get(page as usize - 1).cloned().unwrap_or_default())
    }
}

/// In-process stand-in for a hosting API, scripted per repository
#[derive(Default)]
pub struct FakeApi {
    repos: HashMap<String, (Feed<CommitDraft>, Feed<PullRequestDraft>)>,
    calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(
        mut self,
        repo: &str,
        commits: Feed<CommitDraft>,
        pull_requests: Feed<PullRequestDraft>,
    ) -> Self {
        self.repos.insert(repo.to_string(), (commits, pull_requests));
        self
    }

    /// Page requests served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RemoteApi for FakeApi {
    fn host(&self) -> &'static str {
        "fake"
    }

    async fn commits_page(&self, repo: &RepoName, page: u32) -> Result<Vec<CommitDraft>, ApiError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.repos.get(&repo.to_string()) {
            Some((commits, _)) => commits.serve(repo, page),
            None => Err(ApiError::NotFound(repo.to_string())),
        }
    }

    async fn pull_requests_page(
        &self,
        repo: &RepoName,
        page: u32,
    ) -> Result<Vec<PullRequestDraft>, ApiError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.repos.get(&repo.to_string()) {
            Some((_, prs)) => prs.serve(repo, page),
            None => Err(ApiError::NotFound(repo.to_string())),
        }
    }
}
