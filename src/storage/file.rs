//! Filesystem-backed stats store.
//!
//! Layout under the data directory:
//! - `stats/<scope>/<kind>.json`: snapshot envelope, replaced atomically
//! - `matches/<region>/<YYYY-MM-DD>.jsonl`: raw matches, appended
//! - `state/region_status.json`: latest status per region

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::jsonl::{day_from_path, JsonlWriter};
use super::{normalize_scope, StatsStore, StorageConfig, StorageError};
use crate::models::{EntityKind, Region, RegionStatus};
use crate::riot::MatchDto;

/// Stored form of a stats snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsEnvelope {
    pub saved_at: DateTime<Utc>,
    pub payload: Value,
}

/// Stats store on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StorageConfig,
    status_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            status_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn stats_path(&self, kind: EntityKind, scope: &str) -> Result<PathBuf, StorageError> {
        let scope = normalize_scope(scope)?;
        Ok(self
            .config
            .stats_dir()
            .join(scope)
            .join(format!("{}.json", kind.as_str())))
    }

    /// Write the snapshot to a temp file and rename it over the old one.
    pub fn write_stats(
        &self,
        kind: EntityKind,
        scope: &str,
        payload: &Value,
    ) -> Result<PathBuf, StorageError> {
        let path = self.stats_path(kind, scope)?;
        let envelope = StatsEnvelope {
            saved_at: Utc::now(),
            payload: payload.clone(),
        };
        write_atomic(&path, &serde_json::to_vec(&envelope)?)?;
        debug!("Wrote {} stats for {} to {:?}", kind, scope, path);
        Ok(path)
    }

    pub fn read_stats(&self, kind: EntityKind, scope: &str) -> Result<Option<StatsEnvelope>, StorageError> {
        let path = self.stats_path(kind, scope)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn append_match(&self, region: Region, raw: &MatchDto) -> Result<(), StorageError> {
        let writer = JsonlWriter::for_match_day(&self.config, region, Utc::now().date_naive());
        writer.append(raw)
    }

    pub fn read_statuses(&self) -> Result<Vec<RegionStatus>, StorageError> {
        let _guard = self.status_lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load_status_map()?.into_values().collect())
    }

    pub fn write_status(&self, status: RegionStatus) -> Result<(), StorageError> {
        let _guard = self.status_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut statuses = self.load_status_map()?;
        statuses.insert(status.region.as_str().to_string(), status);
        write_atomic(
            &self.config.region_status_path(),
            &serde_json::to_vec_pretty(&statuses)?,
        )
    }

    fn load_status_map(&self) -> Result<BTreeMap<String, RegionStatus>, StorageError> {
        let path = self.config.region_status_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&path)?;
        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("Discarding unreadable status file {:?}: {}", path, e);
                Ok(BTreeMap::new())
            }
        }
    }

    /// Remove match day files and stats snapshots older than the cutoff.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut removed = 0;
        let cutoff_day = cutoff.date_naive();

        for region_dir in subdirs(&self.config.matches_dir())? {
            for entry in fs::read_dir(&region_dir)? {
                let path = entry?.path();
                if day_from_path(&path).is_some_and(|day| day < cutoff_day) {
                    fs::remove_file(&path)?;
                    debug!("Removed {:?}", path);
                    removed += 1;
                }
            }
        }

        for scope_dir in subdirs(&self.config.stats_dir())? {
            for entry in fs::read_dir(&scope_dir)? {
                let path = entry?.path();
                if path.extension().map_or(true, |ext| ext != "json") {
                    continue;
                }
                let saved_at = fs::read(&path)
                    .ok()
                    .and_then(|bytes| serde_json::from_slice::<StatsEnvelope>(&bytes).ok())
                    .map(|env| env.saved_at);
                match saved_at {
                    Some(saved_at) if saved_at < cutoff => {
                        fs::remove_file(&path)?;
                        debug!("Removed {:?}", path);
                        removed += 1;
                    }
                    Some(_) => {}
                    None => warn!("Skipping unreadable snapshot {:?}", path),
                }
            }
        }

        Ok(removed)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(FileStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
    fs::create_dir_all(parent)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl StatsStore for FileStore {
    async fn save_stats(&self, kind: EntityKind, scope: &str, payload: &Value) -> bool {
        let scope_owned = scope.to_string();
        let payload = payload.clone();
        match self
            .blocking(move |store| store.write_stats(kind, &scope_owned, &payload))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to save {} stats for {}: {}", kind, scope, e);
                false
            }
        }
    }

    async fn get_stats(&self, kind: EntityKind, scope: &str) -> Option<Value> {
        let scope_owned = scope.to_string();
        match self
            .blocking(move |store| store.read_stats(kind, &scope_owned))
            .await
        {
            Ok(envelope) => envelope.map(|e| e.payload),
            Err(e) => {
                warn!("Failed to read {} stats for {}: {}", kind, scope, e);
                None
            }
        }
    }

    async fn cleanup_old_data(&self, retention_days: u32) -> Result<usize, StorageError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let removed = self
            .blocking(move |store| store.cleanup_before(cutoff))
            .await?;
        info!(
            "Cleanup removed {} files older than {} days",
            removed, retention_days
        );
        Ok(removed)
    }

    async fn update_region_status(&self, status: RegionStatus) -> Result<(), StorageError> {
        self.blocking(move |store| store.write_status(status)).await
    }

    async fn region_statuses(&self) -> Result<Vec<RegionStatus>, StorageError> {
        self.blocking(|store| store.read_statuses()).await
    }

    async fn save_match(&self, region: Region, raw: &MatchDto) -> Result<(), StorageError> {
        let raw = raw.clone();
        self.blocking(move |store| store.append_match(region, &raw))
            .await
    }
}
