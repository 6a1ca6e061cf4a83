// Snapshot manager tests
// Every lifecycle property is checked against each storage backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use gitsnap::error::SnapshotError;
use gitsnap::model::{DataKind, SnapshotData, SnapshotFile, SnapshotMetadata};
use gitsnap::repository::{ObjectBackend, SnapshotPackage, SnapshotStore, StoreBackend};
use gitsnap::snapshot::{SnapshotKey, SnapshotManager};
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path;
use time::OffsetDateTime;
use time::macros::datetime;

use common::{QUARTER, REPO, sample_commits, sample_pull_requests};

const T1: OffsetDateTime = datetime!(2025-04-02 08:15:30 UTC);
const T2: OffsetDateTime = datetime!(2025-04-03 09:00:00 UTC);

fn manager(store: StoreBackend) -> SnapshotManager<StoreBackend> {
    SnapshotManager::new(store, QUARTER).with_list_ttl(Duration::ZERO)
}

#[tokio::test]
async fn test_create_then_load_roundtrip() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let commits = sample_commits();
        let prs = sample_pull_requests();

        let id = mgr
            .create_snapshot_at(REPO, Some(commits.as_slice()), Some(prs.as_slice()), QUARTER, T1)
            .await
            .unwrap();
        assert_eq!(id, "snapshot_org_app_2025-04-02_08-15-30", "{name}");

        let meta = mgr.get_snapshot_metadata(&id, QUARTER).await.unwrap().unwrap();
        assert_eq!(meta.repository_name, REPO, "{name}");
        assert_eq!(meta.timestamp, "2025-04-02_08-15-30", "{name}");
        assert_eq!(meta.commits_count, 3, "{name}");
        assert_eq!(meta.pull_requests_count, 1, "{name}");
        assert_eq!(meta.created_at, "2025-04-02T08:15:30Z", "{name}");

        let loaded = mgr.load_snapshot_data(&id, DataKind::Commits, QUARTER).await.unwrap();
        assert_eq!(loaded, Some(SnapshotData::Commits(commits)), "{name}");
        let loaded = mgr.load_pull_requests(&id, QUARTER).await.unwrap();
        assert_eq!(loaded, Some(prs), "{name}");
    }
}

#[tokio::test]
async fn test_absent_data_set_loads_as_none() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let commits = sample_commits();

        let id = mgr
            .create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T1)
            .await
            .unwrap();
        assert_eq!(
            mgr.load_snapshot_data(&id, DataKind::PullRequests, QUARTER).await.unwrap(),
            None,
            "{name}"
        );

        // Empty data is written as no file at all
        let empty = mgr
            .create_snapshot_at(REPO, Some(Vec::new().as_slice()), Some(Vec::new().as_slice()), QUARTER, T2)
            .await
            .unwrap();
        assert!(mgr.load_commits(&empty, QUARTER).await.unwrap().is_none(), "{name}");
        let meta = mgr.get_snapshot_metadata(&empty, QUARTER).await.unwrap().unwrap();
        assert!(meta.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_list_newest_first_and_scoped_to_repo() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let commits = sample_commits();

        let older = mgr.create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T1).await.unwrap();
        let newer = mgr.create_snapshot_at(REPO, None, None, QUARTER, T2).await.unwrap();
        mgr.create_snapshot_at("org/app-v2", None, None, QUARTER, T1).await.unwrap();
        mgr.create_snapshot_at(REPO, None, None, "2025-2A", T1).await.unwrap();

        let listed = mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.snapshot_id.as_str()).collect();
        assert_eq!(ids, [newer.as_str(), older.as_str()], "{name}");

        assert!(mgr.list_repository_snapshots(REPO, "2019-1A").await.unwrap().is_empty(), "{name}");
        assert!(mgr.list_repository_snapshots("org/unknown", QUARTER).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_summary() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let commits = sample_commits();
        let prs = sample_pull_requests();

        let empty = mgr.export_snapshot_summary(REPO).await.unwrap();
        assert_eq!(empty.total_snapshots, 0, "{name}");
        assert!(empty.latest_snapshot.is_none(), "{name}");

        mgr.create_snapshot_at(REPO, Some(commits.as_slice()), Some(prs.as_slice()), QUARTER, T1).await.unwrap();
        let latest = mgr.create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T2).await.unwrap();

        let summary = mgr.export_snapshot_summary(REPO).await.unwrap();
        assert_eq!(summary.repository_name, REPO, "{name}");
        assert_eq!(summary.total_snapshots, 2, "{name}");
        assert_eq!(summary.total_commits, 6, "{name}");
        assert_eq!(summary.total_pull_requests, 1, "{name}");
        assert_eq!(summary.latest_snapshot.unwrap().snapshot_id, latest, "{name}");
    }
}

#[tokio::test]
async fn test_delete() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let commits = sample_commits();
        let prs = sample_pull_requests();

        let id = mgr
            .create_snapshot_at(REPO, Some(commits.as_slice()), Some(prs.as_slice()), QUARTER, T1)
            .await
            .unwrap();

        assert!(mgr.delete_snapshot(&id, QUARTER).await.unwrap(), "{name}");
        assert!(mgr.get_snapshot_metadata(&id, QUARTER).await.unwrap().is_none(), "{name}");
        assert!(mgr.load_commits(&id, QUARTER).await.unwrap().is_none(), "{name}");
        assert!(mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap().is_empty(), "{name}");

        assert!(!mgr.delete_snapshot(&id, QUARTER).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_listing_cache_sees_create_and_delete() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = SnapshotManager::new(store, QUARTER).with_list_ttl(Duration::from_secs(300));

        assert!(mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap().is_empty(), "{name}");
        let id = mgr.create_snapshot_at(REPO, None, None, QUARTER, T1).await.unwrap();
        assert_eq!(mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap().len(), 1, "{name}");

        mgr.delete_snapshot(&id, QUARTER).await.unwrap();
        assert!(mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_mixed_case_repo_listing() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);

        let id = mgr.create_snapshot_at("Org/App", None, None, QUARTER, T1).await.unwrap();
        assert_eq!(id, "snapshot_Org_App_2025-04-02_08-15-30", "{name}");

        let listed = mgr.list_repository_snapshots("Org/App", QUARTER).await.unwrap();
        assert_eq!(listed.len(), 1, "{name}");
        assert_eq!(listed[0].repository_name, "Org/App", "{name}");
        assert!(mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_listing_never_returns_other_casing() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);

        // Lowercase snapshot, mixed-case query: the lowercase slug matches but
        // the metadata names a different repository
        mgr.create_snapshot_at(REPO, None, None, QUARTER, T1).await.unwrap();
        assert!(mgr.list_repository_snapshots("Org/App", QUARTER).await.unwrap().is_empty(), "{name}");

        mgr.create_snapshot_at("Org/App", None, None, QUARTER, T2).await.unwrap();
        for repo in [REPO, "Org/App"] {
            let listed = mgr.list_repository_snapshots(repo, QUARTER).await.unwrap();
            assert_eq!(listed.len(), 1, "{name} {repo}");
            assert!(listed.iter().all(|m| m.repository_name == repo), "{name} {repo}");
        }
    }
}

#[tokio::test]
async fn test_invalid_ids_rejected_everywhere() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let mgr = manager(store);
        for bad in ["../etc", "snapshot_a/b", "", "not_a_snapshot"] {
            assert!(matches!(
                mgr.get_snapshot_metadata(bad, QUARTER).await,
                Err(SnapshotError::InvalidId(_))
            ));
            assert!(matches!(
                mgr.delete_snapshot(bad, QUARTER).await,
                Err(SnapshotError::InvalidId(_))
            ));
        }
        assert!(matches!(
            mgr.list_repository_snapshots(REPO, "../x").await,
            Err(SnapshotError::InvalidQuarter(_))
        ));
    }
}

#[tokio::test]
async fn test_snapshot_location() {
    let (dir, backends) = common::all_backends().await;
    let id = "snapshot_org_app_2025-04-02_08-15-30";
    let locations: Vec<String> = backends
        .into_iter()
        .map(|store| manager(store).snapshot_location(id, QUARTER, SnapshotFile::Commits).unwrap())
        .collect();

    let local = dir.path().join("data").join(QUARTER).join(id).join("commits.parquet");
    assert_eq!(locations[0], local.display().to_string());
    assert!(locations[1].starts_with("sqlite://"));
    assert_eq!(locations[2], format!("memory://snapshots/{QUARTER}/{id}/commits.parquet"));
}

/// Zero-count placeholder expected for a snapshot without usable metadata
fn assert_placeholder(meta: &SnapshotMetadata, id: &str, label: &str) {
    assert_eq!(meta.snapshot_id, id, "{label}");
    assert_eq!(meta.repository_name, REPO, "{label}");
    assert_eq!(meta.timestamp, "2025-04-02_08-15-30", "{label}");
    assert_eq!(meta.commits_count, 0, "{label}");
    assert_eq!(meta.pull_requests_count, 0, "{label}");
    assert_eq!(meta.created_at, "", "{label}");
}

#[tokio::test]
async fn test_incomplete_metadata_lists_as_placeholder() {
    let (_dir, backends) = common::all_backends().await;
    for store in backends {
        let name = store.name();
        let mgr = manager(store);
        let id = "snapshot_org_app_2025-04-02_08-15-30";
        let key = SnapshotKey::new(QUARTER, id).unwrap();
        let commits = sample_commits();

        // Data rows written, metadata left without its creation time
        let metadata = SnapshotMetadata {
            timestamp: "2025-04-02_08-15-30".into(),
            repository_name: REPO.into(),
            commits_count: 3,
            pull_requests_count: 0,
            snapshot_id: id.into(),
            created_at: String::new(),
        };
        mgr.store()
            .write_snapshot(SnapshotPackage {
                key: &key,
                metadata: &metadata,
                commits: Some(commits.as_slice()),
                pull_requests: None,
            })
            .await
            .unwrap();

        let listed = mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap();
        assert_eq!(listed.len(), 1, "{name}");
        assert_placeholder(&listed[0], id, name);

        let summary = mgr.export_snapshot_summary(REPO).await.unwrap();
        assert_eq!(summary.total_snapshots, 1, "{name}");
        assert_eq!(summary.total_commits, 0, "{name}");
        assert_placeholder(&summary.latest_snapshot.unwrap(), id, name);
    }
}

#[tokio::test]
async fn test_orphaned_data_files_list_as_placeholder() {
    let commits = sample_commits();

    // Local: one snapshot loses metadata.json, another has it corrupted
    let (dir, local) = common::create_local_store();
    let mgr = manager(local.into());
    let missing = mgr.create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T1).await.unwrap();
    let corrupt = mgr.create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T2).await.unwrap();
    let quarter_dir = dir.path().join("data").join(QUARTER);
    std::fs::remove_file(quarter_dir.join(&missing).join("metadata.json")).unwrap();
    std::fs::write(quarter_dir.join(&corrupt).join("metadata.json"), b"{ truncated").unwrap();
    assert!(quarter_dir.join(&missing).join("commits.parquet").is_file());

    let listed = mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].snapshot_id, corrupt);
    assert_eq!(listed[0].timestamp, "2025-04-03_09-00-00");
    assert_eq!(listed[0].commits_count, 0);
    assert_placeholder(&listed[1], &missing, "local");

    // Object: metadata object removed, commits object left behind
    let bucket = Arc::new(InMemory::new());
    let mgr = manager(ObjectBackend::new(bucket.clone(), "memory://snapshots").into());
    let id = mgr.create_snapshot_at(REPO, Some(commits.as_slice()), None, QUARTER, T1).await.unwrap();
    bucket
        .delete(&Path::from(format!("{QUARTER}/{id}/metadata.json")))
        .await
        .unwrap();

    let listed = mgr.list_repository_snapshots(REPO, QUARTER).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_placeholder(&listed[0], &id, "object");
    let summary = mgr.export_snapshot_summary(REPO).await.unwrap();
    assert_eq!(summary.total_snapshots, 1);
    assert_eq!(summary.total_commits, 0);
}
