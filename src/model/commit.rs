use serde::Serialize;
use time::OffsetDateTime;

use crate::error::ValidationError;
use crate::util::parse_timestamp;

use super::{non_empty, required};

/// A commit collected from a remote repository
///
/// Fields are trimmed and non-empty; identity within a repository is the sha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    sha: String,
    message: String,
    author: String,
    #[serde(with = "time::serde::rfc3339")]
    date: OffsetDateTime,
    url: String,
}

impl Commit {
    /// Validate and build a commit, parsing `date` as a timestamp
    pub fn new(
        sha: &str,
        message: &str,
        author: &str,
        date: &str,
        url: &str,
    ) -> Result<Self, ValidationError> {
        let parsed = parse_timestamp(date).ok_or_else(|| ValidationError::InvalidTimestamp {
            field: "date",
            value: date.to_string(),
        })?;
        Self::with_date(sha, message, author, parsed, url)
    }

    /// Validate and build a commit from an already parsed timestamp
    pub fn with_date(
        sha: &str,
        message: &str,
        author: &str,
        date: OffsetDateTime,
        url: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            sha: non_empty("sha", sha)?,
            message: non_empty("message", message)?,
            author: non_empty("author", author)?,
            date,
            url: non_empty("url", url)?,
        })
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn date(&self) -> OffsetDateTime {
        self.date
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Unvalidated commit fields as they come off the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitDraft {
    pub sha: Option<String>,
    pub message: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
}

impl TryFrom<CommitDraft> for Commit {
    type Error = ValidationError;

    fn try_from(draft: CommitDraft) -> Result<Self, Self::Error> {
        let sha = required("sha", draft.sha)?;
        let message = required("message", draft.message)?;
        let author = required("author", draft.author)?;
        let date = required("date", draft.date)?;
        let url = required("url", draft.url)?;
        Commit::new(&sha, &message, &author, &date, &url)
    }
}
