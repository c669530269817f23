//! Persistence for aggregated statistics.
//!
//! The pipeline talks to storage only through [`StatsStore`]:
//! - Stats snapshots per (entity type, region), replaced atomically
//! - Raw match payloads, appended per region and day
//! - Region processing status
//!
//! [`FileStore`] implements the contract on the local filesystem.

mod file;
pub mod jsonl;
mod payload;
mod sanitize;

pub use file::{FileStore, StatsEnvelope};
pub use payload::build_payload;
pub use sanitize::{sanitize_for_database, DEFAULT_MAX_PAYLOAD_BYTES, MAX_DEPTH};

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{EntityKind, Region, RegionStatus};
use crate::riot::MatchDto;

/// Scope name for stats aggregated over every region.
pub const GLOBAL_SCOPE: &str = "global";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.data_dir.join("stats")
    }

    pub fn matches_dir(&self) -> PathBuf {
        self.data_dir.join("matches")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn region_status_path(&self) -> PathBuf {
        self.state_dir().join("region_status.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Canonical form of a stats scope: `global` or a known region id.
pub fn normalize_scope(scope: &str) -> Result<&'static str, StorageError> {
    if scope.trim().eq_ignore_ascii_case(GLOBAL_SCOPE) {
        return Ok(GLOBAL_SCOPE);
    }
    scope
        .parse::<Region>()
        .map(|r| r.as_str())
        .map_err(|_| StorageError::InvalidPath(scope.to_string()))
}

/// Storage contract consumed by the pipeline and the API.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Replace the snapshot for one entity type and scope.
    ///
    /// The payload must already be sanitized. Returns false on failure.
    async fn save_stats(&self, kind: EntityKind, scope: &str, payload: &Value) -> bool;

    async fn get_stats(&self, kind: EntityKind, scope: &str) -> Option<Value>;

    /// Remove data older than `retention_days`; returns files removed.
    async fn cleanup_old_data(&self, retention_days: u32) -> Result<usize, StorageError>;

    async fn update_region_status(&self, status: RegionStatus) -> Result<(), StorageError>;

    async fn region_statuses(&self) -> Result<Vec<RegionStatus>, StorageError>;

    /// Keep a fetched raw match.
    async fn save_match(&self, region: Region, raw: &MatchDto) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.stats_dir(), PathBuf::from("/data/stats"));
        assert_eq!(config.matches_dir(), PathBuf::from("/data/matches"));
        assert_eq!(
            config.region_status_path(),
            PathBuf::from("/data/state/region_status.json")
        );
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(normalize_scope("global").unwrap(), "global");
        assert_eq!(normalize_scope("EUW1").unwrap(), "euw1");
        assert!(normalize_scope("../etc").is_err());
        assert!(normalize_scope("mars").is_err());
    }
}
