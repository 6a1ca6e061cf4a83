//! Environment-driven configuration
//!
//! [`Config::from_env`] reads process variables; [`Config::from_lookup`] takes
//! any lookup function so tests never touch the real environment. Empty
//! values count as unset.

use std::path::PathBuf;
use std::time::Duration;

use crate::collector::{DEFAULT_GITHUB_API, GitHubConfig, GitLabConfig};
use crate::error::ConfigError;
use crate::snapshot::{DEFAULT_LIST_TTL, validate_quarter};

pub const DEFAULT_QUARTER: &str = "2025-1B";
pub const DEFAULT_BUCKET: &str = "snapshots";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Supabase Storage reached through its S3-compatible endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl SupabaseConfig {
    pub fn s3_endpoint(&self) -> String {
        format!("{}/storage/v1/s3", self.url.trim_end_matches('/'))
    }

    /// First host label of the project URL
    pub fn project_ref(&self) -> &str {
        let host = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, rest)| rest);
        host.split(['.', '/', ':']).next().unwrap_or(host)
    }

    /// Base of public object URLs for this bucket
    pub fn object_base_url(&self) -> String {
        format!(
            "{}/storage/v1/object/{}",
            self.url.trim_end_matches('/'),
            self.bucket
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Parquet directories under `data_dir`
    Local { data_dir: PathBuf },
    /// SQLite file
    Table { database_path: PathBuf },
    Supabase(SupabaseConfig),
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Table { .. } => "table",
            Self::Supabase(_) => "supabase",
        }
    }
}

#[derive(Debug, Clone)]
pub enum HostConfig {
    GitHub(GitHubConfig),
    GitLab(GitLabConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: HostConfig,
    pub repo_names: Vec<String>,
    /// Never empty; the first entry is the default quarter
    pub quarters: Vec<String>,
    pub storage: StorageConfig,
    pub list_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let host = match get("GIT_HOST").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("github") => HostConfig::GitHub(GitHubConfig {
                token: get("GITHUB_TOKEN"),
                api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            }),
            Some("gitlab") => HostConfig::GitLab(GitLabConfig {
                url: require("GITLAB_URL")?,
                token: require("GITLAB_PAT")?,
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "GIT_HOST",
                    value: other.to_string(),
                });
            }
        };

        let repo_names = split_csv(get("REPO_NAMES").as_deref());

        let mut quarters = split_csv(get("QUARTERS").as_deref());
        if quarters.is_empty() {
            quarters.push(DEFAULT_QUARTER.to_string());
        }
        for q in &quarters {
            if validate_quarter(q).is_err() {
                return Err(ConfigError::Invalid {
                    var: "QUARTERS",
                    value: q.clone(),
                });
            }
        }

        let data_dir = get("DATA_DIR").map(PathBuf::from).unwrap_or_else(default_data_dir);
        let backend = get("STORAGE_BACKEND").map(|b| b.to_ascii_lowercase());
        let backend = backend.as_deref().unwrap_or(if get("SUPABASE_URL").is_some() {
            "supabase"
        } else {
            "local"
        });

        let storage = match backend {
            "local" | "parquet" => StorageConfig::Local { data_dir },
            "table" | "duckdb" | "sqlite" => StorageConfig::Table {
                database_path: get("DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_dir.join("gitsnap.db")),
            },
            "supabase" => StorageConfig::Supabase(SupabaseConfig {
                url: require("SUPABASE_URL")?,
                anon_key: require("SUPABASE_ANON_KEY")?,
                bucket: get("SUPABASE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                region: get("SUPABASE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                access_key_id: get("SUPABASE_S3_ACCESS_KEY_ID"),
                secret_access_key: get("SUPABASE_S3_SECRET_ACCESS_KEY"),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let list_ttl = match get("SNAPSHOT_LIST_TTL_SECS") {
            None => DEFAULT_LIST_TTL,
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    var: "SNAPSHOT_LIST_TTL_SECS",
                    value: raw.clone(),
                })?,
        };

        Ok(Self {
            host,
            repo_names,
            quarters,
            storage,
            list_ttl,
        })
    }

    pub fn default_quarter(&self) -> &str {
        self.quarters
            .first()
            .map_or(DEFAULT_QUARTER, String::as_str)
    }
}

/// Comma-separated list, trimmed, empties dropped
fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitsnap")
        .join("data")
}
