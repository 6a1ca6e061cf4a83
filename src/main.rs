mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use gitsnap::analytics::{DateRange, SnapshotAnalytics};
use gitsnap::collector::{Collector, GitHubClient, GitLabClient, HostClient, Progress, VerboseProgress};
use gitsnap::config::{Config, HostConfig, StorageConfig};
use gitsnap::repository::{Database, LocalStore, ObjectBackend, SnapshotStore, StoreBackend, build_supabase_store};
use gitsnap::snapshot::SnapshotManager;
use gitsnap::util::{format_date, format_rfc3339, parse_date};

/// Pause between repositories in batch collection
const BATCH_PAUSE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    let store = open_store(&config.storage).await?;
    eprintln!("Using {} storage", config.storage.kind());

    let quarter_or_default = |q: Option<String>| q.unwrap_or_else(|| config.default_quarter().to_string());
    let manager = SnapshotManager::new(store, config.default_quarter()).with_list_ttl(config.list_ttl);

    match cli.command {
        Command::Repos => {
            if config.repo_names.is_empty() {
                eprintln!("No repositories configured (set REPO_NAMES)");
            }
            for repo in &config.repo_names {
                println!("{repo}");
            }
        }
        Command::Collect { repos, all, quarter } => {
            let quarter = quarter_or_default(quarter);
            let repos = if all || repos.is_empty() { config.repo_names.clone() } else { repos };
            if repos.is_empty() {
                bail!("No repositories to collect (pass owner/repo or set REPO_NAMES)");
            }

            let collector = Collector::new(open_host(&config.host)?, manager)
                .with_repos(repos)
                .with_pause(BATCH_PAUSE);
            let progress = VerboseProgress::new(!cli.quiet);
            let report = collector.collect_all(&progress, &quarter).await;
            progress.finish();

            for created in &report.created {
                println!("{}\t{}", created.repo, created.snapshot_id);
            }
            for failed in &report.failed {
                eprintln!("{}: {}", failed.repo, failed.error);
            }
            if !report.failed.is_empty() {
                bail!("{} of {} repositories failed", report.failed.len(), report.total());
            }
        }
        Command::List { repo, quarter } => {
            let quarter = quarter_or_default(quarter);
            let snapshots = manager
                .list_repository_snapshots(&repo, &quarter)
                .await
                .with_context(|| format!("Could not list snapshots of {repo}"))?;
            if snapshots.is_empty() {
                eprintln!("No snapshots of {repo} in {quarter}");
            }
            for s in snapshots {
                println!(
                    "{}\t{}\tcommits={}\tpull_requests={}",
                    s.snapshot_id, s.timestamp, s.commits_count, s.pull_requests_count
                );
            }
        }
        Command::Summary { repo, quarter } => {
            let quarter = quarter_or_default(quarter);
            let summary = manager.snapshot_summary(&repo, &quarter).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Show { snapshot_id, quarter, from, to } => {
            let quarter = quarter_or_default(quarter);
            let range = DateRange::new(parse_bound(from.as_deref())?, parse_bound(to.as_deref())?);

            let metadata = manager
                .get_snapshot_metadata(&snapshot_id, &quarter)
                .await?
                .with_context(|| format!("Snapshot not found: {snapshot_id} in {quarter}"))?;
            let commits = manager.load_commits(&snapshot_id, &quarter).await?.unwrap_or_default();
            let pull_requests = manager
                .load_pull_requests(&snapshot_id, &quarter)
                .await?
                .unwrap_or_default();
            let analytics = SnapshotAnalytics::new(&commits, &pull_requests);

            println!("{} ({}) taken {}", metadata.snapshot_id, metadata.repository_name, metadata.timestamp);
            println!("Range: {range}");

            let kpis = analytics.commit_kpis(range);
            println!("Commits: {} by {} authors", kpis.total_commits, kpis.unique_authors);
            if let Some(span) = kpis.span {
                println!("  {} .. {}", format_rfc3339(span.first), format_rfc3339(span.last));
            }
            for t in &kpis.type_counts {
                println!("  {:<10} {}", t.commit_type.label(), t.count);
            }
            for a in analytics.commits_by_author(range).iter().take(10) {
                println!("  {:<24} {}", a.author, a.count);
            }

            println!("Pull requests: {}", analytics.count_pull_requests(range));
            for s in analytics.pull_request_state_counts(range) {
                println!("  {:<10} {}", s.state, s.count);
            }
            if let Some(busiest) = analytics.daily_commits(range).into_iter().max_by_key(|d| d.count) {
                println!("Busiest day: {} ({} commits)", format_date(busiest.day), busiest.count);
            }
        }
        Command::Delete { snapshot_id, quarter } => {
            let quarter = quarter_or_default(quarter);
            if manager.delete_snapshot(&snapshot_id, &quarter).await? {
                println!("Deleted {snapshot_id}");
            } else {
                eprintln!("Nothing to delete: {snapshot_id} in {quarter}");
            }
        }
    }

    Ok(())
}

async fn open_store(storage: &StorageConfig) -> Result<StoreBackend> {
    let store: StoreBackend = match storage {
        StorageConfig::Local { data_dir } => LocalStore::new(data_dir).into(),
        StorageConfig::Table { database_path } => {
            if let Some(parent) = database_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create {}", parent.display()))?;
            }
            let path = database_path.to_str().context("Invalid path encoding")?;
            Database::new(path)
                .await
                .with_context(|| format!("Could not open database {path}"))?
                .into()
        }
        StorageConfig::Supabase(supabase) => {
            let object_store = build_supabase_store(supabase).context("Could not configure Supabase storage")?;
            ObjectBackend::new(object_store, supabase.object_base_url()).into()
        }
    };

    store
        .ensure_schema()
        .await
        .with_context(|| format!("Could not initialize {} storage", store.name()))?;
    Ok(store)
}

fn open_host(host: &HostConfig) -> Result<HostClient> {
    Ok(match host {
        HostConfig::GitHub(cfg) => HostClient::GitHub(GitHubClient::new(cfg.clone())?),
        HostConfig::GitLab(cfg) => HostClient::GitLab(GitLabClient::new(cfg.clone())?),
    })
}

fn parse_bound(raw: Option<&str>) -> Result<Option<time::Date>> {
    raw.map(|s| parse_date(s).with_context(|| format!("Invalid date {s:?}, expected YYYY-MM-DD")))
        .transpose()
}
