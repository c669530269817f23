//! End-to-end refresh pipeline.
//!
//! continents → regions → compositions → unit/trait/item aggregates →
//! sanitized snapshots per region and for `global`.

pub mod continent;
pub mod region;

pub use continent::ContinentFetcher;
pub use region::RegionProcessor;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::aggregate::{aggregate_all, build_compositions};
use crate::fetch::FetchError;
use crate::models::{EntityKind, NormalizedMatch, Region};
use crate::riot::MatchSource;
use crate::storage::{
    build_payload, sanitize_for_database, StatsStore, StorageError, DEFAULT_MAX_PAYLOAD_BYTES,
    GLOBAL_SCOPE,
};

/// Errors raised inside a region run; always caught at the region boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Task failed: {0}")]
    Task(String),
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Regions to process
    #[serde(default = "default_regions")]
    pub regions: Vec<Region>,

    /// Match cap per region after deduplication
    #[serde(default = "default_matches_per_region")]
    pub matches_per_region: usize,

    /// Highest-ranked players sampled per region
    #[serde(default = "default_top_players")]
    pub top_players: usize,

    /// Recent match ids requested per player
    #[serde(default = "default_match_ids_per_player")]
    pub match_ids_per_player: usize,

    /// Concurrent match detail fetches
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Pause between regions of one continent
    #[serde(default = "default_region_delay_ms")]
    pub region_delay_ms: u64,

    /// Boards needed before a composition is reported
    #[serde(default = "default_min_composition_count")]
    pub min_composition_count: u32,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Data older than this is removed after every refresh
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_regions() -> Vec<Region> {
    Region::ALL.to_vec()
}

fn default_matches_per_region() -> usize {
    50
}

fn default_top_players() -> usize {
    10
}

fn default_match_ids_per_player() -> usize {
    20
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    1_000
}

fn default_region_delay_ms() -> u64 {
    200
}

fn default_min_composition_count() -> u32 {
    2
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_retention_days() -> u32 {
    7
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            matches_per_region: default_matches_per_region(),
            top_players: default_top_players(),
            match_ids_per_player: default_match_ids_per_player(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            region_delay_ms: default_region_delay_ms(),
            min_composition_count: default_min_composition_count(),
            max_payload_bytes: default_max_payload_bytes(),
            retention_days: default_retention_days(),
        }
    }
}

impl PipelineConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn region_delay(&self) -> Duration {
        Duration::from_millis(self.region_delay_ms)
    }
}

/// Unit of work scheduled by the [`ContinentFetcher`].
#[async_trait]
pub trait RegionWorker: Send + Sync {
    /// Matches for one region; failures are recorded, never returned.
    async fn process_region(&self, region: Region, matches_per_region: usize) -> Vec<NormalizedMatch>;

    /// Record a failure that escaped `process_region`.
    async fn mark_failed(&self, region: Region, reason: String);
}

/// Result of one refresh, as reported by the cron endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub success: bool,
    pub match_count: usize,
    pub regions_processed: usize,
}

/// One full fetch-aggregate-store cycle.
pub struct RefreshJob {
    fetcher: ContinentFetcher,
    store: Arc<dyn StatsStore>,
    config: PipelineConfig,
}

impl RefreshJob {
    pub fn new(source: Arc<dyn MatchSource>, store: Arc<dyn StatsStore>, config: PipelineConfig) -> Self {
        let processor = Arc::new(RegionProcessor::new(source, store.clone(), &config));
        let fetcher = ContinentFetcher::new(processor, config.regions.clone(), config.region_delay());
        Self {
            fetcher,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline. Failures are logged and reflected in `success`.
    ///
    /// Snapshots are only replaced when at least one match was collected.
    pub async fn run(&self) -> RefreshSummary {
        let started = Instant::now();
        info!(
            "Refresh started: {} regions, up to {} matches each",
            self.fetcher.regions().len(),
            self.config.matches_per_region
        );

        let matches = self
            .fetcher
            .process_all_continents_in_parallel(self.config.matches_per_region)
            .await;

        let mut by_region: BTreeMap<Region, Vec<NormalizedMatch>> = BTreeMap::new();
        for m in &matches {
            by_region.entry(m.region).or_default().push(m.clone());
        }
        let regions_processed = by_region.len();

        let mut success = !matches.is_empty();
        if matches.is_empty() {
            warn!("Refresh collected no matches; keeping previous snapshots");
        } else {
            for (region, region_matches) in &by_region {
                success &= self.save_scope(region.as_str(), region_matches).await;
            }
            success &= self.save_scope(GLOBAL_SCOPE, &matches).await;
        }

        match self.store.cleanup_old_data(self.config.retention_days).await {
            Ok(removed) => info!("Removed {} expired files", removed),
            Err(e) => warn!("Cleanup failed: {}", e),
        }

        info!(
            "Refresh finished in {:?}: {} matches from {} regions, success={}",
            started.elapsed(),
            matches.len(),
            regions_processed,
            success
        );

        RefreshSummary {
            success,
            match_count: matches.len(),
            regions_processed,
        }
    }

    /// Aggregate and store every entity type for one scope.
    async fn save_scope(&self, scope: &str, matches: &[NormalizedMatch]) -> bool {
        let compositions = build_compositions(matches, self.config.min_composition_count);
        let aggregates = aggregate_all(&compositions);

        let payloads = [
            (
                EntityKind::Compositions,
                build_payload(EntityKind::Compositions, scope, matches.len(), &compositions),
            ),
            (
                EntityKind::Units,
                build_payload(EntityKind::Units, scope, matches.len(), &aggregates.units),
            ),
            (
                EntityKind::Traits,
                build_payload(EntityKind::Traits, scope, matches.len(), &aggregates.traits),
            ),
            (
                EntityKind::Items,
                build_payload(EntityKind::Items, scope, matches.len(), &aggregates.items),
            ),
        ];

        let mut ok = true;
        for (kind, payload) in payloads {
            let payload: Value = match payload {
                Ok(payload) => sanitize_for_database(&payload, self.config.max_payload_bytes),
                Err(e) => {
                    error!("Failed to build {} payload for {}: {}", kind, scope, e);
                    ok = false;
                    continue;
                }
            };
            if !self.store.save_stats(kind, scope, &payload).await {
                error!("Failed to save {} stats for {}", kind, scope);
                ok = false;
            }
        }

        info!(
            "Saved {} scope: {} compositions, {} units, {} traits, {} items",
            scope,
            compositions.len(),
            aggregates.units.len(),
            aggregates.traits.len(),
            aggregates.items.len()
        );
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::region::testing::{FakeSource, MemoryStore};
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(regions: Vec<Region>) -> PipelineConfig {
        PipelineConfig {
            regions,
            batch_pause_ms: 0,
            region_delay_ms: 0,
            min_composition_count: 1,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.regions.len(), 15);
        assert_eq!(config.top_players, 10);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.region_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_config_partial_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
            regions = ["euw1", "kr"]
            matches_per_region = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.regions, vec![Region::Euw1, Region::Kr]);
        assert_eq!(config.matches_per_region, 5);
        assert_eq!(config.batch_pause_ms, 1_000);
    }

    #[test]
    fn test_summary_serialization() {
        let summary = RefreshSummary {
            success: true,
            match_count: 12,
            regions_processed: 3,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "matchCount": 12, "regionsProcessed": 3})
        );
    }

    #[tokio::test]
    async fn test_refresh_saves_region_and_global_snapshots() {
        let store = Arc::new(MemoryStore::default());
        let source = FakeSource::default()
            .with_region(Region::Na1, &[("a", 10, &["1", "2"])])
            .with_region(Region::Kr, &[("b", 10, &["1"])]);

        let job = RefreshJob::new(
            Arc::new(source),
            store.clone(),
            config(vec![Region::Na1, Region::Kr, Region::Euw1]),
        );
        let summary = job.run().await;

        assert_eq!(
            summary,
            RefreshSummary {
                success: true,
                match_count: 3,
                regions_processed: 2,
            }
        );

        let global = store.get_stats(EntityKind::Units, GLOBAL_SCOPE).await.unwrap();
        assert_eq!(global["region"], "global");
        assert_eq!(global["summary"]["totalGames"], 3);
        assert!(!global["units"].as_array().unwrap().is_empty());

        let na1 = store.get_stats(EntityKind::Compositions, "na1").await.unwrap();
        assert_eq!(na1["summary"]["totalGames"], 2);
        assert!(store.get_stats(EntityKind::Items, "kr").await.is_some());
        assert!(store.get_stats(EntityKind::Items, "euw1").await.is_none());

        assert_eq!(*store.cleanups.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_refresh_without_matches_keeps_snapshots() {
        let store = Arc::new(MemoryStore::default());
        let job = RefreshJob::new(
            Arc::new(FakeSource::default()),
            store.clone(),
            config(vec![Region::Na1]),
        );

        let summary = job.run().await;
        assert!(!summary.success);
        assert_eq!(summary.match_count, 0);
        assert!(store.stats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_reports_save_failures() {
        let store = Arc::new(MemoryStore {
            fail_saves: true,
            ..MemoryStore::default()
        });
        let source = FakeSource::default().with_region(Region::Na1, &[("a", 10, &["1"])]);
        let job = RefreshJob::new(Arc::new(source), store, config(vec![Region::Na1]));

        let summary = job.run().await;
        assert!(!summary.success);
        assert_eq!(summary.match_count, 1);
    }
}
