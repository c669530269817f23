//! Per-region fetch orchestration.
//!
//! league → summoner profiles → match id lists → match details, with the
//! region's status recorded at the end of every run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{PipelineConfig, PipelineError, RegionWorker};
use crate::fetch::FetchError;
use crate::models::{NormalizedMatch, Region, RegionStatus};
use crate::riot::convert::normalize_match;
use crate::riot::{LeagueEntry, MatchDto, MatchSource};
use crate::storage::StatsStore;

pub const NO_LEAGUE_DATA: &str = "No league data available";
pub const NO_SUMMONER_DATA: &str = "No summoner data available";
pub const NO_MATCH_IDS: &str = "No match ids available";
pub const NO_MATCH_DETAILS: &str = "No match details available";

enum RegionOutcome {
    Matches(Vec<NormalizedMatch>),
    Degraded(&'static str),
}

/// Fetches and normalizes the recent matches of one region's top players.
pub struct RegionProcessor {
    source: Arc<dyn MatchSource>,
    store: Arc<dyn StatsStore>,
    top_players: usize,
    match_ids_per_player: usize,
    batch_size: usize,
    batch_pause: Duration,
}

impl RegionProcessor {
    pub fn new(
        source: Arc<dyn MatchSource>,
        store: Arc<dyn StatsStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            top_players: config.top_players.max(1),
            match_ids_per_player: config.match_ids_per_player.max(1),
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause(),
        }
    }

    /// Never fails: problems are recorded in the region status and an
    /// empty list is returned.
    pub async fn process_region(&self, region: Region, matches_per_region: usize) -> Vec<NormalizedMatch> {
        info!("Processing region {}", region);

        let (status, matches) = match self.collect(region, matches_per_region).await {
            Ok(RegionOutcome::Matches(matches)) => {
                info!("Region {}: {} matches", region, matches.len());
                (RegionStatus::ok(region, matches.len()), matches)
            }
            Ok(RegionOutcome::Degraded(reason)) => {
                warn!("Region {} degraded: {}", region, reason);
                (RegionStatus::degraded(region, reason), Vec::new())
            }
            Err(e) => {
                error!("Region {} failed: {}", region, e);
                (RegionStatus::error(region, e.to_string()), Vec::new())
            }
        };

        self.record(status).await;
        matches
    }

    async fn record(&self, status: RegionStatus) {
        let region = status.region;
        if let Err(e) = self.store.update_region_status(status).await {
            warn!("Failed to update status for {}: {}", region, e);
        }
    }

    async fn collect(
        &self,
        region: Region,
        matches_per_region: usize,
    ) -> Result<RegionOutcome, PipelineError> {
        let mut entries = self
            .source
            .challenger_league(region)
            .await?
            .map(|league| league.entries)
            .unwrap_or_default();
        if entries.is_empty() {
            return Ok(RegionOutcome::Degraded(NO_LEAGUE_DATA));
        }

        entries.sort_by(|a, b| b.league_points.cmp(&a.league_points));
        entries.truncate(self.top_players);

        let puuids = self.fetch_puuids(region, entries).await?;
        if puuids.is_empty() {
            return Ok(RegionOutcome::Degraded(NO_SUMMONER_DATA));
        }
        debug!("Region {}: {} player profiles", region, puuids.len());

        let match_ids = self.fetch_match_ids(region, puuids, matches_per_region).await?;
        if match_ids.is_empty() {
            return Ok(RegionOutcome::Degraded(NO_MATCH_IDS));
        }
        debug!("Region {}: {} unique match ids", region, match_ids.len());

        let details = self.fetch_details(region, match_ids).await?;

        for raw in &details {
            if let Err(e) = self.store.save_match(region, raw).await {
                warn!("Failed to save match {}: {}", raw.metadata.match_id, e);
            }
        }

        let matches: Vec<NormalizedMatch> = details
            .iter()
            .map(|raw| normalize_match(region, raw))
            .filter(|m| !m.participants.is_empty())
            .collect();
        if matches.is_empty() {
            return Ok(RegionOutcome::Degraded(NO_MATCH_DETAILS));
        }

        Ok(RegionOutcome::Matches(matches))
    }

    /// Player puuids in league ranking order.
    async fn fetch_puuids(
        &self,
        region: Region,
        entries: Vec<LeagueEntry>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut set = JoinSet::new();
        for (idx, entry) in entries.into_iter().enumerate() {
            let source = self.source.clone();
            set.spawn(async move { (idx, source.summoner(region, &entry).await) });
        }

        let profiles = join_ordered(set).await?;
        Ok(profiles.into_iter().map(|s| s.puuid).collect())
    }

    /// Match ids deduplicated in first-seen order and capped.
    async fn fetch_match_ids(
        &self,
        region: Region,
        puuids: Vec<String>,
        cap: usize,
    ) -> Result<Vec<String>, PipelineError> {
        let count = self.match_ids_per_player;

        let mut set = JoinSet::new();
        for (idx, puuid) in puuids.into_iter().enumerate() {
            let source = self.source.clone();
            set.spawn(async move { (idx, source.match_ids(region, &puuid, count).await) });
        }

        let lists = join_ordered(set).await?;
        let mut seen = HashSet::new();
        let ids: Vec<String> = lists
            .into_iter()
            .flatten()
            .filter(|id| seen.insert(id.clone()))
            .take(cap)
            .collect();
        Ok(ids)
    }

    /// Details in concurrent batches with a pause between batches.
    ///
    /// Members that fail or come back empty are dropped.
    async fn fetch_details(
        &self,
        region: Region,
        match_ids: Vec<String>,
    ) -> Result<Vec<MatchDto>, PipelineError> {
        let mut details = Vec::with_capacity(match_ids.len());

        for (batch_no, batch) in match_ids.chunks(self.batch_size).enumerate() {
            if batch_no > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            let mut set = JoinSet::new();
            for (idx, id) in batch.iter().cloned().enumerate() {
                let source = self.source.clone();
                set.spawn(async move { (idx, id.clone(), source.match_detail(region, &id).await) });
            }

            let mut fetched = Vec::with_capacity(batch.len());
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((idx, _, Ok(Some(dto)))) => fetched.push((idx, dto)),
                    Ok((_, id, Ok(None))) => debug!("Match {} unavailable", id),
                    Ok((_, _, Err(e))) if e.is_credential() => return Err(e.into()),
                    Ok((_, id, Err(e))) => warn!("Match {} failed: {}", id, e),
                    Err(e) => warn!("Match detail task failed: {}", e),
                }
            }
            fetched.sort_by_key(|(idx, _)| *idx);
            details.extend(fetched.into_iter().map(|(_, dto)| dto));
        }

        Ok(details)
    }
}

/// Join a set of indexed fetches, keeping the spawn order.
///
/// Unavailable resources are skipped; a fetch error aborts the stage.
async fn join_ordered<T: Send + 'static>(
    mut set: JoinSet<(usize, Result<Option<T>, FetchError>)>,
) -> Result<Vec<T>, PipelineError> {
    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
        if let Some(value) = result? {
            results.push((idx, value));
        }
    }
    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl RegionWorker for RegionProcessor {
    async fn process_region(&self, region: Region, matches_per_region: usize) -> Vec<NormalizedMatch> {
        RegionProcessor::process_region(self, region, matches_per_region).await
    }

    async fn mark_failed(&self, region: Region, reason: String) {
        self.record(RegionStatus::error(region, reason)).await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::RegionHealth;
    use pretty_assertions::assert_eq;

    fn config() -> PipelineConfig {
        PipelineConfig {
            batch_size: 2,
            batch_pause_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn processor(source: FakeSource, store: Arc<MemoryStore>) -> RegionProcessor {
        RegionProcessor::new(Arc::new(source), store, &config())
    }

    #[tokio::test]
    async fn test_empty_league_is_degraded() {
        let store = Arc::new(MemoryStore::default());
        let mut source = FakeSource::default();
        source.leagues.insert(Region::Na1, vec![]);

        let matches = processor(source, store.clone())
            .process_region(Region::Na1, 10)
            .await;

        assert!(matches.is_empty());
        let status = store.status(Region::Na1).unwrap();
        assert_eq!(status.status, RegionHealth::Degraded);
        assert_eq!(status.reason.as_deref(), Some(NO_LEAGUE_DATA));
    }

    #[tokio::test]
    async fn test_missing_league_is_degraded() {
        let store = Arc::new(MemoryStore::default());
        let matches = processor(FakeSource::default(), store.clone())
            .process_region(Region::Kr, 10)
            .await;
        assert!(matches.is_empty());
        assert_eq!(
            store.status(Region::Kr).unwrap().reason.as_deref(),
            Some(NO_LEAGUE_DATA)
        );
    }

    #[tokio::test]
    async fn test_no_profiles_is_degraded() {
        let store = Arc::new(MemoryStore::default());
        let mut source = FakeSource::default();
        let mut anonymous = entry("x", 100);
        anonymous.puuid = None;
        source.leagues.insert(Region::Euw1, vec![anonymous]);

        processor(source, store.clone())
            .process_region(Region::Euw1, 10)
            .await;
        assert_eq!(
            store.status(Region::Euw1).unwrap().reason.as_deref(),
            Some(NO_SUMMONER_DATA)
        );
    }

    #[tokio::test]
    async fn test_no_match_ids_is_degraded() {
        let store = Arc::new(MemoryStore::default());
        let source = FakeSource::default().with_region(Region::Euw1, &[("p1", 100, &[])]);

        processor(source, store.clone())
            .process_region(Region::Euw1, 10)
            .await;
        assert_eq!(
            store.status(Region::Euw1).unwrap().reason.as_deref(),
            Some(NO_MATCH_IDS)
        );
    }

    #[tokio::test]
    async fn test_no_details_is_degraded() {
        let store = Arc::new(MemoryStore::default());
        let mut source = FakeSource::default().with_region(Region::Euw1, &[("p1", 100, &["1"])]);
        source.details.clear();

        processor(source, store.clone())
            .process_region(Region::Euw1, 10)
            .await;
        assert_eq!(
            store.status(Region::Euw1).unwrap().reason.as_deref(),
            Some(NO_MATCH_DETAILS)
        );
    }

    #[tokio::test]
    async fn test_dedupes_caps_and_persists() {
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(FakeSource::default().with_region(
            Region::Na1,
            &[
                ("low", 10, &["5", "6"]),
                ("high", 900, &["1", "2", "3"]),
                ("mid", 500, &["2", "3", "4"]),
            ],
        ));

        let matches = RegionProcessor::new(source.clone(), store.clone(), &config())
            .process_region(Region::Na1, 4)
            .await;

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["NA1_1", "NA1_2", "NA1_3", "NA1_4"]);
        assert!(matches.iter().all(|m| m.region == Region::Na1));

        let saved = store.saved_matches.lock().unwrap().clone();
        assert_eq!(saved, vec!["NA1_1", "NA1_2", "NA1_3", "NA1_4"]);

        // Shared ids are fetched once and nothing past the cap is requested.
        let mut requested = source.detail_calls.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec!["NA1_1", "NA1_2", "NA1_3", "NA1_4"]);

        let status = store.status(Region::Na1).unwrap();
        assert_eq!(status.status, RegionHealth::Ok);
        assert_eq!(status.match_count, 4);
    }

    #[tokio::test]
    async fn test_only_top_players_are_used() {
        let store = Arc::new(MemoryStore::default());
        let source = FakeSource::default().with_region(
            Region::Na1,
            &[("a", 3, &["1"]), ("b", 2, &["2"]), ("c", 1, &["3"])],
        );
        let config = PipelineConfig {
            top_players: 2,
            batch_pause_ms: 0,
            ..PipelineConfig::default()
        };

        let matches = RegionProcessor::new(Arc::new(source), store, &config)
            .process_region(Region::Na1, 10)
            .await;
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["NA1_1", "NA1_2"]);
    }

    #[tokio::test]
    async fn test_rejected_credentials_mark_error() {
        let store = Arc::new(MemoryStore::default());
        let mut source = FakeSource::default().with_region(Region::Br1, &[("p1", 1, &["1"])]);
        source.reject_region = Some(Region::Br1);

        let matches = processor(source, store.clone())
            .process_region(Region::Br1, 10)
            .await;

        assert!(matches.is_empty());
        let status = store.status(Region::Br1).unwrap();
        assert_eq!(status.status, RegionHealth::Error);
        assert!(status.reason.unwrap().contains("HTTP 403"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_batches() {
        let store = Arc::new(MemoryStore::default());
        let source = FakeSource::default().with_region(Region::Na1, &[("p1", 1, &["1", "2", "3"])]);
        let config = PipelineConfig {
            batch_size: 2,
            batch_pause_ms: 1_000,
            ..PipelineConfig::default()
        };

        let start = tokio::time::Instant::now();
        let matches = RegionProcessor::new(Arc::new(source), store, &config)
            .process_region(Region::Na1, 10)
            .await;

        assert_eq!(matches.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
    }
}
