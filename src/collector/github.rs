//! GitHub REST client for commits and pull requests

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;
use crate::model::{CommitDraft, PullRequestDraft};

use super::{PER_PAGE, RemoteApi, RepoName};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API token (optional, increases rate limits)
    pub token: Option<String>,
    /// API base URL
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_GITHUB_API.to_string(),
        }
    }
}

pub struct GitHubClient {
    token: Option<String>,
    api_url: String,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS or proxy misconfiguration)
    pub fn new(config: GitHubConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gitsnap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Init(format!("GitHub HTTP client: {e}")))?;

        Ok(Self {
            token: config.token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a request with optional auth
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, entity: &str) -> Result<Vec<T>, ApiError> {
        debug!(url, "GET");
        let response = self.build_request(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Err(status_error(status, remaining.as_deref(), entity, url))
    }
}

/// Map a non-success status to an error
pub(crate) fn status_error(
    status: StatusCode,
    ratelimit_remaining: Option<&str>,
    entity: &str,
    url: &str,
) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(entity.to_string()),
        StatusCode::CONFLICT => ApiError::EmptyRepository(entity.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(entity.to_string()),
        StatusCode::FORBIDDEN if ratelimit_remaining == Some("0") => {
            ApiError::RateLimited(entity.to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::AuthFailed("invalid or missing token".into())
        }
        _ => ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

impl RemoteApi for GitHubClient {
    fn host(&self) -> &'static str {
        "github"
    }

    async fn commits_page(&self, repo: &RepoName, page: u32) -> Result<Vec<CommitDraft>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/commits?per_page={}&page={}",
            self.api_url, repo.owner(), repo.name(), PER_PAGE, page
        );
        let rows: Vec<GitHubCommit> = self.get_page(&url, &repo.to_string()).await?;
        Ok(rows.into_iter().map(CommitDraft::from).collect())
    }

    async fn pull_requests_page(
        &self,
        repo: &RepoName,
        page: u32,
    ) -> Result<Vec<PullRequestDraft>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/pulls?state=all&per_page={}&page={}",
            self.api_url, repo.owner(), repo.name(), PER_PAGE, page
        );
        let rows: Vec<GitHubPull> = self.get_page(&url, &repo.to_string()).await?;
        Ok(rows.into_iter().map(PullRequestDraft::from).collect())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: Option<String>,
    html_url: Option<String>,
    commit: Option<GitHubCommitDetail>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    message: Option<String>,
    author: Option<GitHubSignature>,
}

#[derive(Debug, Deserialize)]
struct GitHubSignature {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    number: Option<i64>,
    title: Option<String>,
    state: Option<String>,
    created_at: Option<String>,
    html_url: Option<String>,
    user: Option<GitHubUser>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: Option<String>,
}

impl From<GitHubCommit> for CommitDraft {
    fn from(c: GitHubCommit) -> Self {
        let (message, author) = match c.commit {
            Some(detail) => (detail.message, detail.author),
            None => (None, None),
        };
        let (author, date) = match author {
            Some(sig) => (sig.name, sig.date),
            None => (None, None),
        };
        CommitDraft {
            sha: c.sha,
            message,
            author,
            date,
            url: c.html_url,
        }
    }
}

impl From<GitHubPull> for PullRequestDraft {
    fn from(p: GitHubPull) -> Self {
        PullRequestDraft {
            number: p.number,
            title: p.title,
            author: p.user.and_then(|u| u.login),
            state: p.state,
            created_at: p.created_at,
            url: p.html_url,
        }
    }
}
