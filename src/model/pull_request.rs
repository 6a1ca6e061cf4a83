use serde::Serialize;
use time::OffsetDateTime;

use crate::error::ValidationError;
use crate::util::parse_timestamp;

use super::{non_empty, required};

/// A pull request (or merge request) collected from a remote repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    number: i64,
    title: String,
    author: String,
    state: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    url: String,
}

impl PullRequest {
    /// Validate and build a pull request, parsing `created_at` as a timestamp
    pub fn new(
        number: i64,
        title: &str,
        author: &str,
        state: &str,
        created_at: &str,
        url: &str,
    ) -> Result<Self, ValidationError> {
        let parsed =
            parse_timestamp(created_at).ok_or_else(|| ValidationError::InvalidTimestamp {
                field: "created_at",
                value: created_at.to_string(),
            })?;
        Self::with_created_at(number, title, author, state, parsed, url)
    }

    /// Validate and build a pull request from an already parsed timestamp
    pub fn with_created_at(
        number: i64,
        title: &str,
        author: &str,
        state: &str,
        created_at: OffsetDateTime,
        url: &str,
    ) -> Result<Self, ValidationError> {
        if number <= 0 {
            return Err(ValidationError::InvalidNumber(number));
        }
        Ok(Self {
            number,
            title: non_empty("title", title)?,
            author: non_empty("author", author)?,
            state: non_empty("state", state)?,
            created_at,
            url: non_empty("url", url)?,
        })
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }
}

/// Unvalidated pull request fields as they come off the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub number: Option<i64>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub url: Option<String>,
}

impl TryFrom<PullRequestDraft> for PullRequest {
    type Error = ValidationError;

    fn try_from(draft: PullRequestDraft) -> Result<Self, Self::Error> {
        let number = draft.number.ok_or(ValidationError::MissingField("number"))?;
        let title = required("title", draft.title)?;
        let author = required("author", draft.author)?;
        let state = required("state", draft.state)?;
        let created_at = required("created_at", draft.created_at)?;
        let url = required("url", draft.url)?;
        PullRequest::new(number, &title, &author, &state, &created_at, &url)
    }
}
