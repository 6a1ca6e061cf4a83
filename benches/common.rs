// Shared benchmark helpers
// Functions here are used across different benchmark files
#![allow(dead_code)]

use gitsnap::model::{Commit, PullRequest};
use gitsnap::repository::Database;
use time::{Duration, OffsetDateTime};

const MESSAGES: [&str; 6] = [
    "feat: add endpoint",
    "fix: off by one",
    "docs: update readme",
    "chore(deps): bump",
    "Merge pull request #12",
    "tweak layout",
];

/// Generate commits spread one hour apart with rotating authors and types
pub fn generate_commits(n: usize) -> Vec<Commit> {
    let start = OffsetDateTime::from_unix_timestamp(1_735_689_600).unwrap(); // 2025-01-01
    (0..n)
        .map(|i| {
            Commit::with_date(
                &format!("{:040x}", i),
                MESSAGES[i % MESSAGES.len()],
                &format!("author_{}", i % 25),
                start + Duration::hours(i as i64),
                &format!("https://github.com/org/app/commit/{:040x}", i),
            )
            .unwrap()
        })
        .collect()
}

/// Generate pull requests, every third one still open
pub fn generate_pull_requests(n: usize) -> Vec<PullRequest> {
    let start = OffsetDateTime::from_unix_timestamp(1_735_689_600).unwrap();
    (0..n)
        .map(|i| {
            PullRequest::with_created_at(
                i as i64 + 1,
                &format!("Change {i}"),
                &format!("author_{}", i % 25),
                if i % 3 == 0 { "open" } else { "closed" },
                start + Duration::hours(3 * i as i64),
                &format!("https://github.com/org/app/pull/{}", i + 1),
            )
            .unwrap()
        })
        .collect()
}

/// Create in-memory database for benchmarks
pub async fn setup_bench_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.init_schema().await.unwrap();
    db
}
