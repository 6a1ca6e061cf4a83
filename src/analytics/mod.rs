//! Bounded queries over loaded snapshot data
//!
//! Every query takes an inclusive [`DateRange`]; `DateRange::all()` covers
//! everything. Grouped results are ordered by count descending, ties by key
//! ascending. Daily results are ordered by day.

mod commit_type;
mod range;

pub use commit_type::CommitType;
pub use range::{DateRange, utc_date};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::model::{Commit, PullRequest, SnapshotData};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub commit_type: CommitType,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCount {
    pub author: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCount {
    pub state: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub day: Date,
    pub count: u64,
}

/// Earliest and latest timestamps of a data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub first: OffsetDateTime,
    pub last: OffsetDateTime,
}

impl DateSpan {
    fn extend(span: Option<Self>, at: OffsetDateTime) -> Option<Self> {
        Some(match span {
            None => Self { first: at, last: at },
            Some(s) => Self { first: s.first.min(at), last: s.last.max(at) },
        })
    }
}

/// Headline commit numbers for a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitKpis {
    pub total_commits: u64,
    pub unique_authors: u64,
    pub span: Option<DateSpan>,
    pub type_counts: Vec<TypeCount>,
}

impl CommitKpis {
    /// Count for one type, zero when absent
    pub fn count_of(&self, commit_type: CommitType) -> u64 {
        self.type_counts
            .iter()
            .find(|t| t.commit_type == commit_type)
            .map_or(0, |t| t.count)
    }
}

/// Sort grouped counts by count descending, then by key
fn rank<K: Ord>(map: FxHashMap<K, u64>) -> Vec<(K, u64)> {
    let mut counts: Vec<_> = map.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

fn by_day(dates: impl Iterator<Item = OffsetDateTime>) -> Vec<DailyCount> {
    let mut map: FxHashMap<Date, u64> = FxHashMap::default();
    for at in dates {
        *map.entry(utc_date(at)).or_default() += 1;
    }
    let mut days: Vec<_> = map
        .into_iter()
        .map(|(day, count)| DailyCount { day, count })
        .collect();
    days.sort_by_key(|d| d.day);
    days
}

/// Read-only view over the commits and pull requests of a snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAnalytics<'a> {
    commits: &'a [Commit],
    pull_requests: &'a [PullRequest],
}

impl<'a> SnapshotAnalytics<'a> {
    pub fn new(commits: &'a [Commit], pull_requests: &'a [PullRequest]) -> Self {
        Self { commits, pull_requests }
    }

    /// View over whichever data set was loaded
    pub fn from_data(data: &'a SnapshotData) -> Self {
        match data {
            SnapshotData::Commits(rows) => Self::new(rows, &[]),
            SnapshotData::PullRequests(rows) => Self::new(&[], rows),
        }
    }

    fn commits(&self, range: DateRange) -> impl Iterator<Item = &'a Commit> + use<'a> {
        self.commits.iter().filter(move |c| range.contains(c.date()))
    }

    fn pull_requests(&self, range: DateRange) -> impl Iterator<Item = &'a PullRequest> + use<'a> {
        self.pull_requests
            .iter()
            .filter(move |p| range.contains(p.created_at()))
    }

    // -------------------------------------------------------------------------
    // Commits
    // -------------------------------------------------------------------------

    pub fn count_commits(&self, range: DateRange) -> u64 {
        self.commits(range).count() as u64
    }

    pub fn count_commits_by_type(&self, commit_type: CommitType, range: DateRange) -> u64 {
        self.commits(range)
            .filter(|c| CommitType::classify(c.message()) == commit_type)
            .count() as u64
    }

    /// Non-zero counts per commit type
    pub fn commit_type_counts(&self, range: DateRange) -> Vec<TypeCount> {
        let mut map: FxHashMap<CommitType, u64> = FxHashMap::default();
        for commit in self.commits(range) {
            *map.entry(CommitType::classify(commit.message())).or_default() += 1;
        }
        rank(map)
            .into_iter()
            .map(|(commit_type, count)| TypeCount { commit_type, count })
            .collect()
    }

    pub fn commit_kpis(&self, range: DateRange) -> CommitKpis {
        let authors: FxHashSet<&str> = self.commits(range).map(Commit::author).collect();
        CommitKpis {
            total_commits: self.count_commits(range),
            unique_authors: authors.len() as u64,
            span: self.commit_date_range(range),
            type_counts: self.commit_type_counts(range),
        }
    }

    pub fn commits_by_author(&self, range: DateRange) -> Vec<AuthorCount> {
        let mut map: FxHashMap<&str, u64> = FxHashMap::default();
        for commit in self.commits(range) {
            *map.entry(commit.author()).or_default() += 1;
        }
        rank(map)
            .into_iter()
            .map(|(author, count)| AuthorCount { author: author.to_string(), count })
            .collect()
    }

    pub fn daily_commits(&self, range: DateRange) -> Vec<DailyCount> {
        by_day(self.commits(range).map(Commit::date))
    }

    pub fn commits_in_range(&self, range: DateRange) -> Vec<&'a Commit> {
        self.commits(range).collect()
    }

    pub fn commit_date_range(&self, range: DateRange) -> Option<DateSpan> {
        self.commits(range)
            .fold(None, |span, c| DateSpan::extend(span, c.date()))
    }

    // -------------------------------------------------------------------------
    // Pull requests
    // -------------------------------------------------------------------------

    pub fn count_pull_requests(&self, range: DateRange) -> u64 {
        self.pull_requests(range).count() as u64
    }

    pub fn count_pull_requests_by_state(&self, state: &str, range: DateRange) -> u64 {
        self.pull_requests(range)
            .filter(|p| p.state().eq_ignore_ascii_case(state))
            .count() as u64
    }

    pub fn pull_request_state_counts(&self, range: DateRange) -> Vec<StateCount> {
        let mut map: FxHashMap<&str, u64> = FxHashMap::default();
        for pr in self.pull_requests(range) {
            *map.entry(pr.state()).or_default() += 1;
        }
        rank(map)
            .into_iter()
            .map(|(state, count)| StateCount { state: state.to_string(), count })
            .collect()
    }

    pub fn pull_requests_by_author(&self, range: DateRange) -> Vec<AuthorCount> {
        let mut map: FxHashMap<&str, u64> = FxHashMap::default();
        for pr in self.pull_requests(range) {
            *map.entry(pr.author()).or_default() += 1;
        }
        rank(map)
            .into_iter()
            .map(|(author, count)| AuthorCount { author: author.to_string(), count })
            .collect()
    }

    pub fn daily_pull_requests(&self, range: DateRange) -> Vec<DailyCount> {
        by_day(self.pull_requests(range).map(PullRequest::created_at))
    }

    pub fn pull_requests_in_range(&self, range: DateRange) -> Vec<&'a PullRequest> {
        self.pull_requests(range).collect()
    }

    pub fn pull_request_date_range(&self, range: DateRange) -> Option<DateSpan> {
        self.pull_requests(range)
            .fold(None, |span, p| DateSpan::extend(span, p.created_at()))
    }
}
