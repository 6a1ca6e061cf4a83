// Collector tests
// Collection runs against a scripted in-process API

mod common;

use std::time::Duration;

use gitsnap::collector::{Collector, NoopProgress, PER_PAGE, RecordingProgress};
use gitsnap::error::{ApiError, SnapshotError};
use gitsnap::repository::{LocalStore, SnapshotStore};
use gitsnap::snapshot::SnapshotManager;
use tempfile::TempDir;

use common::{FakeApi, Failure, Feed, QUARTER, REPO, commit_draft, commit_drafts, pull_request_draft};

fn collector(api: FakeApi) -> (TempDir, Collector<FakeApi, LocalStore>) {
    let (dir, store) = common::create_local_store();
    let manager = SnapshotManager::new(store, QUARTER).with_list_ttl(Duration::ZERO);
    (dir, Collector::new(api, manager))
}

#[tokio::test]
async fn test_collect_paginates_until_short_page() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::rows(commit_drafts(PER_PAGE + 5)),
        Feed::pages(vec![vec![pull_request_draft(1, "open", "2025-03-01T10:00:00Z")]]),
    );
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert_eq!(collection.commits.as_ref().map(Vec::len), Some(PER_PAGE + 5));
    assert_eq!(collection.pull_requests.as_ref().map(Vec::len), Some(1));
    assert!(collection.commit_error.is_none());
    // Two commit pages plus one pull request page
    assert_eq!(collector.api().calls(), 3);
}

#[tokio::test]
async fn test_exact_page_multiple_needs_trailing_empty_page() {
    let api = FakeApi::new().with_repo(REPO, Feed::rows(commit_drafts(PER_PAGE)), Feed::pages(vec![]));
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert_eq!(collection.commits.map(|c| c.len()), Some(PER_PAGE));
    assert_eq!(collection.pull_requests.map(|p| p.len()), Some(0));
    assert_eq!(collector.api().calls(), 3);
}

#[tokio::test]
async fn test_invalid_records_are_skipped() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::pages(vec![vec![
            commit_draft("a1", "feat: ok", Some("Ana"), "2025-02-10T14:00:00Z"),
            commit_draft("b2", "fix: no author", None, "2025-02-10T15:00:00Z"),
            commit_draft("c3", "docs: bad date", Some("Ana"), "yesterday"),
        ]]),
        Feed::pages(vec![vec![
            pull_request_draft(1, "open", "2025-02-10T14:00:00Z"),
            pull_request_draft(0, "open", "2025-02-10T14:00:00Z"),
        ]]),
    );
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert_eq!(collection.commits.as_ref().map(Vec::len), Some(1));
    assert_eq!(collection.skipped_commits, 2);
    assert_eq!(collection.pull_requests.as_ref().map(Vec::len), Some(1));
    assert_eq!(collection.skipped_pull_requests, 1);
}

#[tokio::test]
async fn test_entity_failure_is_isolated() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::pages(vec![vec![commit_draft("a1", "feat: x", Some("Ana"), "2025-02-10T14:00:00Z")]]),
        Feed::failing(vec![], 1, Failure::RateLimited),
    );
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert_eq!(collection.commits.as_ref().map(Vec::len), Some(1));
    assert!(collection.pull_requests.is_none());
    assert!(matches!(collection.pull_request_error, Some(ApiError::RateLimited(_))));
    assert!(!collection.is_total_failure());
}

#[tokio::test]
async fn test_failure_mid_pagination_discards_pages() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::failing(vec![commit_drafts(PER_PAGE)], 2, Failure::Server),
        Feed::pages(vec![]),
    );
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert!(collection.commits.is_none());
    assert!(matches!(collection.commit_error, Some(ApiError::Status { status: 502, .. })));
}

#[tokio::test]
async fn test_page_limit_fails_entity_instead_of_truncating() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::rows(commit_drafts(PER_PAGE * 2 + 50)),
        Feed::pages(vec![vec![pull_request_draft(1, "open", "2025-03-01T10:00:00Z")]]),
    );
    let (_dir, collector) = collector(api);
    let collector = collector.with_max_pages(2);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert!(collection.commits.is_none());
    assert!(matches!(collection.commit_error, Some(ApiError::PageLimit(2))));
    assert_eq!(collection.pull_requests.as_ref().map(Vec::len), Some(1));

    // The snapshot records the failed entity as absent, not as a short count
    let id = collector
        .collect_and_create_snapshot(REPO, &NoopProgress, QUARTER)
        .await
        .unwrap();
    let meta = collector.manager().get_snapshot_metadata(&id, QUARTER).await.unwrap().unwrap();
    assert_eq!(meta.commits_count, 0);
    assert!(collector.manager().load_commits(&id, QUARTER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_repository_counts_as_no_commits() {
    let api = FakeApi::new().with_repo(REPO, Feed::failing(vec![], 1, Failure::Empty), Feed::pages(vec![]));
    let (_dir, collector) = collector(api);

    let collection = collector.collect(REPO, &NoopProgress).await.unwrap();
    assert_eq!(collection.commits.map(|c| c.len()), Some(0));
    assert!(collection.commit_error.is_none());
}

#[tokio::test]
async fn test_invalid_repo_name() {
    let (_dir, collector) = collector(FakeApi::new());
    let result = collector.collect("not-a-repo", &NoopProgress).await;
    assert!(matches!(result, Err(ApiError::InvalidRepoName(_))));
    assert_eq!(collector.api().calls(), 0);

    let result = collector
        .collect_and_create_snapshot("not-a-repo", &NoopProgress, QUARTER)
        .await;
    assert!(matches!(result, Err(SnapshotError::Collect { .. })));
}

#[tokio::test]
async fn test_total_failure_writes_nothing() {
    // Unknown repository: both entity types fail with NotFound
    let (_dir, collector) = collector(FakeApi::new());
    let progress = RecordingProgress::new();

    let result = collector
        .collect_and_create_snapshot("org/missing", &progress, QUARTER)
        .await;
    assert!(matches!(
        result,
        Err(SnapshotError::Collect { source: ApiError::NotFound(_), .. })
    ));

    let ids = collector
        .manager()
        .store()
        .list_snapshot_ids(QUARTER, "snapshot_")
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert!(progress.messages().iter().any(|m| m.starts_with("Error collecting data")));
}

#[tokio::test]
async fn test_partial_collection_still_snapshots() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::failing(vec![], 1, Failure::NotFound),
        Feed::pages(vec![vec![pull_request_draft(7, "closed", "2025-02-10T14:00:00Z")]]),
    );
    let (_dir, collector) = collector(api);

    let id = collector
        .collect_and_create_snapshot(REPO, &NoopProgress, QUARTER)
        .await
        .unwrap();
    let meta = collector
        .manager()
        .get_snapshot_metadata(&id, QUARTER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.commits_count, 0);
    assert_eq!(meta.pull_requests_count, 1);
    assert!(collector.manager().load_commits(&id, QUARTER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_progress_milestones() {
    let api = FakeApi::new().with_repo(
        REPO,
        Feed::pages(vec![vec![commit_draft("a1", "feat: x", Some("Ana"), "2025-02-10T14:00:00Z")]]),
        Feed::pages(vec![]),
    );
    let (_dir, collector) = collector(api);
    let progress = RecordingProgress::new();

    let id = collector
        .collect_and_create_snapshot(REPO, &progress, QUARTER)
        .await
        .unwrap();

    let messages = progress.messages();
    assert_eq!(messages.first().map(String::as_str), Some("Starting data collection for org/app..."));
    assert!(messages.contains(&"Collected 1 commits".to_string()));
    assert!(messages.contains(&"Collected 0 pull requests".to_string()));
    assert_eq!(messages.last(), Some(&format!("Snapshot created successfully: {id}")));
}

#[tokio::test]
async fn test_collect_all_isolates_failures() {
    let api = FakeApi::new()
        .with_repo(
            "org/a",
            Feed::pages(vec![vec![commit_draft("a1", "feat: x", Some("Ana"), "2025-02-10T14:00:00Z")]]),
            Feed::pages(vec![]),
        )
        .with_repo(
            "org/c",
            Feed::pages(vec![]),
            Feed::pages(vec![vec![pull_request_draft(3, "open", "2025-02-10T14:00:00Z")]]),
        );
    let (_dir, collector) = collector(api);
    let collector = collector.with_repos(vec!["org/a".into(), "org/b".into(), "org/c".into()]);
    assert_eq!(collector.available_repos().len(), 3);

    let report = collector.collect_all(&NoopProgress, QUARTER).await;
    assert_eq!(report.total(), 3);
    let created: Vec<&str> = report.created.iter().map(|c| c.repo.as_str()).collect();
    assert_eq!(created, ["org/a", "org/c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].repo, "org/b");

    for c in &report.created {
        let listed = collector
            .manager()
            .list_repository_snapshots(&c.repo, QUARTER)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].snapshot_id, c.snapshot_id);
    }
}
