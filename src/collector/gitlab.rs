//! GitLab REST client for commits and merge requests

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;
use crate::model::{CommitDraft, PullRequestDraft};

use super::github::status_error;
use super::{PER_PAGE, RemoteApi, RepoName};

/// GitLab client configuration
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// Instance base URL, e.g. `https://gitlab.com`
    pub url: String,
    /// Personal access token
    pub token: String,
}

pub struct GitLabClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitLabClient {
    pub fn new(config: GitLabConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gitsnap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Init(format!("GitLab HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token,
            client,
        })
    }

    /// `/api/v4/projects/{namespace%2Fproject}`
    fn project_url(&self, repo: &RepoName) -> String {
        format!(
            "{}/api/v4/projects/{}",
            self.base_url,
            repo.to_string().replace('/', "%2F")
        )
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, entity: &str) -> Result<Vec<T>, ApiError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(status_error(status, None, entity, url))
    }
}

/// GitLab merge request states collapse to `open`/`closed`
pub fn map_state(state: &str) -> &'static str {
    if state.eq_ignore_ascii_case("opened") {
        "open"
    } else {
        "closed"
    }
}

impl RemoteApi for GitLabClient {
    fn host(&self) -> &'static str {
        "gitlab"
    }

    async fn commits_page(&self, repo: &RepoName, page: u32) -> Result<Vec<CommitDraft>, ApiError> {
        let url = format!(
            "{}/repository/commits?all=true&per_page={}&page={}",
            self.project_url(repo), PER_PAGE, page
        );
        let rows: Vec<GitLabCommit> = self.get_page(&url, &repo.to_string()).await?;
        Ok(rows.into_iter().map(CommitDraft::from).collect())
    }

    async fn pull_requests_page(
        &self,
        repo: &RepoName,
        page: u32,
    ) -> Result<Vec<PullRequestDraft>, ApiError> {
        let url = format!(
            "{}/merge_requests?state=all&per_page={}&page={}",
            self.project_url(repo), PER_PAGE, page
        );
        let rows: Vec<GitLabMergeRequest> = self.get_page(&url, &repo.to_string()).await?;
        Ok(rows.into_iter().map(PullRequestDraft::from).collect())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    id: Option<String>,
    message: Option<String>,
    author_name: Option<String>,
    committed_date: Option<String>,
    created_at: Option<String>,
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: Option<i64>,
    title: Option<String>,
    state: Option<String>,
    created_at: Option<String>,
    web_url: Option<String>,
    author: Option<GitLabUser>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: Option<String>,
}

impl From<GitLabCommit> for CommitDraft {
    fn from(c: GitLabCommit) -> Self {
        CommitDraft {
            sha: c.id,
            message: c.message,
            author: c.author_name,
            date: c.committed_date.or(c.created_at),
            url: c.web_url,
        }
    }
}

impl From<GitLabMergeRequest> for PullRequestDraft {
    fn from(mr: GitLabMergeRequest) -> Self {
        PullRequestDraft {
            number: mr.iid,
            title: mr.title,
            author: mr.author.and_then(|a| a.username),
            state: mr.state.as_deref().map(|s| map_state(s).to_string()),
            created_at: mr.created_at,
            url: mr.web_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Commit, PullRequest};

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_state("opened"), "open");
        assert_eq!(map_state("merged"), "closed");
        assert_eq!(map_state("closed"), "closed");
        assert_eq!(map_state("locked"), "closed");
    }

    #[test]
    fn test_commit_mapping() {
        let json = r#"{
            "id": "ed899a2f4b50b4370feeea94676502b42383c746",
            "short_id": "ed899a2f",
            "title": "fix: sanitize input",
            "message": "fix: sanitize input\n",
            "author_name": "Caio",
            "committed_date": "2025-02-12T09:00:00.000+02:00",
            "created_at": "2025-02-12T08:00:00.000+02:00",
            "web_url": "https://gitlab.com/org/app/-/commit/ed899a2f"
        }"#;
        let row: GitLabCommit = serde_json::from_str(json).unwrap();
        let commit = Commit::try_from(CommitDraft::from(row)).unwrap();
        assert_eq!(commit.message(), "fix: sanitize input");
        assert_eq!(commit.date().hour(), 9);
    }

    #[test]
    fn test_merge_request_mapping() {
        let json = r#"{
            "iid": 7, "title": "Add search", "state": "merged",
            "created_at": "2025-02-13T10:00:00Z",
            "web_url": "https://gitlab.com/org/app/-/merge_requests/7",
            "author": {"username": "dani"}
        }"#;
        let row: GitLabMergeRequest = serde_json::from_str(json).unwrap();
        let pr = PullRequest::try_from(PullRequestDraft::from(row)).unwrap();
        assert_eq!(pr.number(), 7);
        assert_eq!(pr.state(), "closed");
        assert_eq!(pr.author(), "dani");
    }

    #[test]
    fn test_project_url_encodes_namespace() {
        let client = GitLabClient::new(GitLabConfig {
            url: "https://gitlab.com/".into(),
            token: "t".into(),
        })
        .unwrap();
        let repo = RepoName::parse("group/sub/app").unwrap();
        assert_eq!(
            client.project_url(&repo),
            "https://gitlab.com/api/v4/projects/group%2Fsub%2Fapp"
        );
    }
}
