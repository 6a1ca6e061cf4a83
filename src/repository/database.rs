use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

use crate::analytics::{AuthorCount, CommitType, DailyCount, DateRange, DateSpan, StateCount, TypeCount};
use crate::error::StoreError;
use crate::model::{Commit, PullRequest, SnapshotFile};
use crate::snapshot::{SnapshotKey, validate_quarter};
use crate::util::{format_date, format_rfc3339, parse_date, parse_timestamp};

use super::SCHEMA_VERSION;
use super::store::{SnapshotPackage, SnapshotStore};

// Rows per multi-row INSERT, kept under SQLite's 32766 bound parameters
const BATCH_SIZE: usize = 3000;

/// Embedded table store for SQLite
///
/// `commits` and `pull_requests` hold the latest known state per repository
/// and are upserted on every snapshot. Snapshot content is kept separately
/// and never changes after it is written.
pub struct Database {
    pool: Pool<Sqlite>,
    path: String,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        // Configure connection options with PRAGMAs applied to every connection
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-64000"); // 64MB cache

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool, path: db_path.to_string() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Initialize database schema, returns true if schema was rebuilt
    pub async fn init_schema(&self) -> Result<bool, StoreError> {
        // Create metadata table first (needed to check version)
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        let stored_version = self.get_metadata("schema_version").await?;
        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                info!(from = %old, to = SCHEMA_VERSION, "schema version changed, rebuilding tables");
            }
            for table in ["snapshot_pull_requests", "snapshot_commits", "snapshots", "pull_requests", "commits"] {
                sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                    .execute(&self.pool)
                    .await?;
            }
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS commits (
                sha TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                message TEXT NOT NULL,
                author TEXT NOT NULL,
                date TEXT NOT NULL,
                date_ts INTEGER NOT NULL,
                url TEXT NOT NULL,
                PRIMARY KEY (sha, repo_name)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pull_requests (
                number INTEGER NOT NULL,
                repo_name TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_ts INTEGER NOT NULL,
                url TEXT NOT NULL,
                PRIMARY KEY (number, repo_name)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                quarter TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                repository_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                commits_count INTEGER NOT NULL,
                pull_requests_count INTEGER NOT NULL,
                metadata_json TEXT NOT NULL,
                PRIMARY KEY (quarter, snapshot_id)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshot_commits (
                quarter TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                sha TEXT NOT NULL,
                message TEXT NOT NULL,
                author TEXT NOT NULL,
                date TEXT NOT NULL,
                url TEXT NOT NULL,
                PRIMARY KEY (quarter, snapshot_id, position)
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshot_pull_requests (
                quarter TEXT NOT NULL,
                snapshot_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                url TEXT NOT NULL,
                PRIMARY KEY (quarter, snapshot_id, position)
            )"
        ).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_repo_date ON commits (repo_name, date_ts)")
            .execute(&self.pool)
            .await?;

        // Store current schema version
        if needs_rebuild {
            self.set_metadata("schema_version", SCHEMA_VERSION).await?;
        }

        Ok(needs_rebuild)
    }

    /// Get metadata value by key
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Current-state upserts
    // =========================================================================

    /// Insert or refresh commits of one repository
    pub async fn upsert_commits(&self, repo_name: &str, commits: &[Commit]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_commits_in_tx(&mut tx, repo_name, commits).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or refresh pull requests of one repository
    pub async fn upsert_pull_requests(&self, repo_name: &str, prs: &[PullRequest]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_pull_requests_in_tx(&mut tx, repo_name, prs).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_commits_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        repo_name: &str,
        commits: &[Commit],
    ) -> Result<(), StoreError> {
        for chunk in commits.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR REPLACE INTO commits (sha, repo_name, message, author, date, date_ts, url) "
            );
            qb.push_values(chunk, |mut row, c| {
                row.push_bind(c.sha())
                    .push_bind(repo_name)
                    .push_bind(c.message())
                    .push_bind(c.author())
                    .push_bind(format_rfc3339(c.date()))
                    .push_bind(c.date().unix_timestamp())
                    .push_bind(c.url());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn upsert_pull_requests_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        repo_name: &str,
        prs: &[PullRequest],
    ) -> Result<(), StoreError> {
        for chunk in prs.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT OR REPLACE INTO pull_requests \
                 (number, repo_name, title, author, state, created_at, created_ts, url) "
            );
            qb.push_values(chunk, |mut row, p| {
                row.push_bind(p.number())
                    .push_bind(repo_name)
                    .push_bind(p.title())
                    .push_bind(p.author())
                    .push_bind(p.state())
                    .push_bind(format_rfc3339(p.created_at()))
                    .push_bind(p.created_at().unix_timestamp())
                    .push_bind(p.url());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_snapshot_commits_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &SnapshotKey,
        commits: &[Commit],
    ) -> Result<(), StoreError> {
        for (n, chunk) in commits.chunks(BATCH_SIZE).enumerate() {
            let base = (n * BATCH_SIZE) as i64;
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO snapshot_commits \
                 (quarter, snapshot_id, position, sha, message, author, date, url) "
            );
            qb.push_values(chunk.iter().enumerate(), |mut row, (i, c)| {
                row.push_bind(key.quarter())
                    .push_bind(key.snapshot_id())
                    .push_bind(base + i as i64)
                    .push_bind(c.sha())
                    .push_bind(c.message())
                    .push_bind(c.author())
                    .push_bind(format_rfc3339(c.date()))
                    .push_bind(c.url());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn insert_snapshot_pull_requests_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        key: &SnapshotKey,
        prs: &[PullRequest],
    ) -> Result<(), StoreError> {
        for (n, chunk) in prs.chunks(BATCH_SIZE).enumerate() {
            let base = (n * BATCH_SIZE) as i64;
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO snapshot_pull_requests \
                 (quarter, snapshot_id, position, number, title, author, state, created_at, url) "
            );
            qb.push_values(chunk.iter().enumerate(), |mut row, (i, p)| {
                row.push_bind(key.quarter())
                    .push_bind(key.snapshot_id())
                    .push_bind(base + i as i64)
                    .push_bind(p.number())
                    .push_bind(p.title())
                    .push_bind(p.author())
                    .push_bind(p.state())
                    .push_bind(format_rfc3339(p.created_at()))
                    .push_bind(p.url());
            });
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Analytics over current state
    // =========================================================================

    /// Append `AND date(column, 'unixepoch') BETWEEN ...` for the set bounds
    fn push_range(qb: &mut QueryBuilder<'_, Sqlite>, ts_column: &str, range: DateRange) {
        if let Some(start) = range.start {
            qb.push(format_args!(" AND date({ts_column}, 'unixepoch') >= "))
                .push_bind(format_date(start));
        }
        if let Some(end) = range.end {
            qb.push(format_args!(" AND date({ts_column}, 'unixepoch') <= "))
                .push_bind(format_date(end));
        }
    }

    /// `CASE` expression mapping a message to its commit type, prefixes bound as parameters
    fn push_commit_type_case(qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push("CASE");
        for t in CommitType::PREFIXED {
            if let Some(prefix) = t.prefix() {
                qb.push(" WHEN substr(LOWER(message), 1, ")
                    .push_bind(prefix.len() as i64)
                    .push(") = ")
                    .push_bind(prefix)
                    .push(" THEN ")
                    .push_bind(t.as_str());
            }
        }
        qb.push(" ELSE ").push_bind(CommitType::Other.as_str()).push(" END");
    }

    pub async fn count_commits(&self, repo_name: &str, range: DateRange) -> Result<u64, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM commits WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    pub async fn commit_type_counts(&self, repo_name: &str, range: DateRange) -> Result<Vec<TypeCount>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT commit_type, COUNT(*) AS n FROM (SELECT ");
        Self::push_commit_type_case(&mut qb);
        qb.push(" AS commit_type FROM commits WHERE repo_name = ").push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);
        qb.push(") GROUP BY commit_type");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("commit_type");
            let n: i64 = row.get("n");
            let commit_type = CommitType::parse(&name).ok_or_else(|| StoreError::Corrupt {
                location: self.path.clone(),
                reason: format!("unknown commit type {name:?}"),
            })?;
            counts.push(TypeCount { commit_type, count: n as u64 });
        }
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.commit_type.cmp(&b.commit_type)));
        Ok(counts)
    }

    pub async fn commits_by_author(&self, repo_name: &str, range: DateRange) -> Result<Vec<AuthorCount>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT author, COUNT(*) AS n FROM commits WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);
        qb.push(" GROUP BY author ORDER BY n DESC, author ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|row| {
            AuthorCount {
                author: row.get("author"),
                count: row.get::<i64, _>("n") as u64,
            }
        }).collect())
    }

    pub async fn daily_commits(&self, repo_name: &str, range: DateRange) -> Result<Vec<DailyCount>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT date(date_ts, 'unixepoch') AS day, COUNT(*) AS n FROM commits WHERE repo_name = "
        );
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);
        qb.push(" GROUP BY day ORDER BY day ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut days = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("day");
            let day = parse_date(&raw).ok_or_else(|| StoreError::Corrupt {
                location: self.path.clone(),
                reason: format!("bad day {raw:?}"),
            })?;
            days.push(DailyCount { day, count: row.get::<i64, _>("n") as u64 });
        }
        Ok(days)
    }

    /// Commits in range, newest first
    pub async fn commits_in_range(&self, repo_name: &str, range: DateRange) -> Result<Vec<Commit>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT sha, message, author, date, url FROM commits WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);
        qb.push(" ORDER BY date_ts DESC, sha ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(|row| self.commit_from_row(row)).collect()
    }

    pub async fn commit_date_range(&self, repo_name: &str, range: DateRange) -> Result<Option<DateSpan>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT MIN(date_ts) AS first, MAX(date_ts) AS last FROM commits WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "date_ts", range);

        let row = qb.build().fetch_one(&self.pool).await?;
        let first: Option<i64> = row.get("first");
        let last: Option<i64> = row.get("last");
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(DateSpan {
                first: self.timestamp_from_unix(first)?,
                last: self.timestamp_from_unix(last)?,
            })),
            _ => Ok(None),
        }
    }

    pub async fn count_pull_requests(&self, repo_name: &str, range: DateRange) -> Result<u64, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM pull_requests WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "created_ts", range);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    pub async fn pull_request_state_counts(&self, repo_name: &str, range: DateRange) -> Result<Vec<StateCount>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT state, COUNT(*) AS n FROM pull_requests WHERE repo_name = ");
        qb.push_bind(repo_name);
        Self::push_range(&mut qb, "created_ts", range);
        qb.push(" GROUP BY state ORDER BY n DESC, state ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|row| {
            StateCount {
                state: row.get("state"),
                count: row.get::<i64, _>("n") as u64,
            }
        }).collect())
    }

    fn timestamp_from_unix(&self, ts: i64) -> Result<time::OffsetDateTime, StoreError> {
        time::OffsetDateTime::from_unix_timestamp(ts).map_err(|e| StoreError::Corrupt {
            location: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn commit_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Commit, StoreError> {
        let date: String = row.get("date");
        let parsed = parse_timestamp(&date);
        let commit = parsed
            .ok_or_else(|| format!("bad date {date:?}"))
            .and_then(|d| {
                Commit::with_date(row.get("sha"), row.get("message"), row.get("author"), d, row.get("url"))
                    .map_err(|e| e.to_string())
            });
        commit.map_err(|reason| StoreError::Corrupt { location: self.path.clone(), reason })
    }

    fn pull_request_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<PullRequest, StoreError> {
        PullRequest::new(
            row.get("number"),
            row.get("title"),
            row.get("author"),
            row.get("state"),
            row.get("created_at"),
            row.get("url"),
        )
        .map_err(|e| StoreError::Corrupt {
            location: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl SnapshotStore for Database {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.init_schema().await?;
        Ok(())
    }

    /// One transaction: snapshot rows, then current-state upserts
    async fn write_snapshot(&self, package: SnapshotPackage<'_>) -> Result<(), StoreError> {
        let key = package.key;
        let meta = package.metadata;
        let json = serde_json::to_string_pretty(meta)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO snapshots \
             (quarter, snapshot_id, repository_name, timestamp, commits_count, pull_requests_count, metadata_json) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(key.quarter())
        .bind(key.snapshot_id())
        .bind(&meta.repository_name)
        .bind(&meta.timestamp)
        .bind(meta.commits_count as i64)
        .bind(meta.pull_requests_count as i64)
        .bind(json)
        .execute(&mut *tx)
        .await?;

        if let Some(commits) = package.commits_to_write() {
            Self::insert_snapshot_commits_in_tx(&mut tx, key, commits).await?;
            Self::upsert_commits_in_tx(&mut tx, &meta.repository_name, commits).await?;
        }
        if let Some(prs) = package.pull_requests_to_write() {
            Self::insert_snapshot_pull_requests_in_tx(&mut tx, key, prs).await?;
            Self::upsert_pull_requests_in_tx(&mut tx, &meta.repository_name, prs).await?;
        }

        tx.commit().await?;
        debug!(snapshot = %key, "snapshot rows committed");
        Ok(())
    }

    async fn read_metadata_raw(&self, key: &SnapshotKey) -> Result<Option<Vec<u8>>, StoreError> {
        let json: Option<String> = sqlx::query_scalar(
            "SELECT metadata_json FROM snapshots WHERE quarter = ? AND snapshot_id = ?"
        )
        .bind(key.quarter())
        .bind(key.snapshot_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(json.map(String::into_bytes))
    }

    async fn read_commits(&self, key: &SnapshotKey) -> Result<Option<Vec<Commit>>, StoreError> {
        let rows = sqlx::query(
            "SELECT sha, message, author, date, url FROM snapshot_commits \
             WHERE quarter = ? AND snapshot_id = ? ORDER BY position"
        )
        .bind(key.quarter())
        .bind(key.snapshot_id())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let commits = rows.iter().map(|row| self.commit_from_row(row)).collect::<Result<_, _>>()?;
        Ok(Some(commits))
    }

    async fn read_pull_requests(
        &self,
        key: &SnapshotKey,
    ) -> Result<Option<Vec<PullRequest>>, StoreError> {
        let rows = sqlx::query(
            "SELECT number, title, author, state, created_at, url FROM snapshot_pull_requests \
             WHERE quarter = ? AND snapshot_id = ? ORDER BY position"
        )
        .bind(key.quarter())
        .bind(key.snapshot_id())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let prs = rows.iter().map(|row| self.pull_request_from_row(row)).collect::<Result<_, _>>()?;
        Ok(Some(prs))
    }

    async fn list_snapshot_ids(
        &self,
        quarter: &str,
        name_prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        if validate_quarter(quarter).is_err() {
            return Ok(Vec::new());
        }

        // substr instead of LIKE: `_` in ids would act as a wildcard
        let ids = sqlx::query_scalar(
            "SELECT snapshot_id FROM snapshots \
             WHERE quarter = ? AND substr(snapshot_id, 1, ?) = ?"
        )
        .bind(quarter)
        .bind(name_prefix.chars().count() as i64)
        .bind(name_prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete_snapshot(&self, key: &SnapshotKey) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for table in ["snapshot_commits", "snapshot_pull_requests", "snapshots"] {
            let result = sqlx::query(&format!(
                "DELETE FROM {table} WHERE quarter = ? AND snapshot_id = ?"
            ))
            .bind(key.quarter())
            .bind(key.snapshot_id())
            .execute(&mut *tx)
            .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed > 0)
    }

    fn file_location(&self, key: &SnapshotKey, file: SnapshotFile) -> String {
        let table = match file {
            SnapshotFile::Commits => "snapshot_commits",
            SnapshotFile::PullRequests => "snapshot_pull_requests",
            SnapshotFile::Metadata => "snapshots",
        };
        format!("sqlite://{}#{}/{}", self.path, table, key)
    }
}
