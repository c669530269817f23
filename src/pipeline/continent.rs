//! Fan-out across continents.
//!
//! Continents run concurrently. Regions inside a continent share upstream
//! rate-limit pools, so they run one after another with a short delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info};

use super::RegionWorker;
use crate::models::{Continent, NormalizedMatch, Region};

/// Runs a [`RegionWorker`] over every configured region.
pub struct ContinentFetcher {
    worker: Arc<dyn RegionWorker>,
    regions: Vec<Region>,
    region_delay: Duration,
}

impl ContinentFetcher {
    pub fn new(worker: Arc<dyn RegionWorker>, regions: Vec<Region>, region_delay: Duration) -> Self {
        Self {
            worker,
            regions,
            region_delay,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Matches from every region, in completion order.
    pub async fn process_all_continents_in_parallel(
        &self,
        matches_per_region: usize,
    ) -> Vec<NormalizedMatch> {
        let mut continents = JoinSet::new();

        for continent in Continent::ALL {
            let regions: Vec<Region> = continent
                .regions()
                .into_iter()
                .filter(|r| self.regions.contains(r))
                .collect();
            if regions.is_empty() {
                continue;
            }

            let worker = self.worker.clone();
            let delay = self.region_delay;
            continents.spawn(async move {
                process_continent(worker, continent, regions, matches_per_region, delay).await
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = continents.join_next().await {
            match joined {
                Ok(matches) => all.extend(matches),
                Err(e) => error!("Continent task failed: {}", e),
            }
        }
        all
    }
}

/// Regions of one continent, strictly in order.
///
/// Each region runs in its own task so a panic stays contained.
async fn process_continent(
    worker: Arc<dyn RegionWorker>,
    continent: Continent,
    regions: Vec<Region>,
    matches_per_region: usize,
    delay: Duration,
) -> Vec<NormalizedMatch> {
    info!("Processing continent {} ({} regions)", continent, regions.len());
    let mut matches = Vec::new();

    for (idx, region) in regions.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let task_worker = worker.clone();
        let handle = tokio::spawn(async move {
            task_worker.process_region(region, matches_per_region).await
        });

        match handle.await {
            Ok(region_matches) => matches.extend(region_matches),
            Err(e) => {
                error!("Region {} task failed: {}", region, e);
                worker
                    .mark_failed(region, format!("Region task failed: {}", e))
                    .await;
            }
        }
    }

    info!("Continent {} done: {} matches", continent, matches.len());
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionHealth;
    use crate::pipeline::region::testing::{sample_match, FakeSource, MemoryStore};
    use crate::pipeline::region::RegionProcessor;
    use crate::pipeline::PipelineConfig;
    use crate::riot::convert::normalize_match;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Worker that yields one match per region and panics on a chosen one.
    #[derive(Default)]
    struct ScriptedWorker {
        panic_on: Option<Region>,
        calls: Mutex<Vec<Region>>,
        failed: Mutex<Vec<Region>>,
    }

    #[async_trait]
    impl RegionWorker for ScriptedWorker {
        async fn process_region(&self, region: Region, _matches_per_region: usize) -> Vec<NormalizedMatch> {
            self.calls.lock().unwrap().push(region);
            if self.panic_on == Some(region) {
                panic!("region {} blew up", region);
            }
            vec![normalize_match(region, &sample_match(&format!("{}_1", region)))]
        }

        async fn mark_failed(&self, region: Region, _reason: String) {
            self.failed.lock().unwrap().push(region);
        }
    }

    #[tokio::test]
    async fn test_failed_region_is_isolated() {
        let worker = Arc::new(ScriptedWorker {
            panic_on: Some(Region::Br1),
            ..ScriptedWorker::default()
        });
        let fetcher = ContinentFetcher::new(
            worker.clone(),
            vec![Region::Na1, Region::Br1, Region::La1],
            Duration::ZERO,
        );

        let matches = fetcher.process_all_continents_in_parallel(10).await;

        let mut regions: Vec<Region> = matches.iter().map(|m| m.region).collect();
        regions.sort();
        assert_eq!(regions, vec![Region::Na1, Region::La1]);
        assert_eq!(
            *worker.calls.lock().unwrap(),
            vec![Region::Na1, Region::Br1, Region::La1]
        );
        assert_eq!(*worker.failed.lock().unwrap(), vec![Region::Br1]);
    }

    #[tokio::test]
    async fn test_erroring_region_with_processor() {
        let store = Arc::new(MemoryStore::default());
        let mut source = FakeSource::default()
            .with_region(Region::Euw1, &[("a", 10, &["1"])])
            .with_region(Region::Eun1, &[("b", 10, &["1"])])
            .with_region(Region::Tr1, &[("c", 10, &["1"])]);
        source.reject_region = Some(Region::Eun1);

        let config = PipelineConfig {
            batch_pause_ms: 0,
            ..PipelineConfig::default()
        };
        let processor = Arc::new(RegionProcessor::new(Arc::new(source), store.clone(), &config));
        let fetcher = ContinentFetcher::new(
            processor,
            vec![Region::Euw1, Region::Eun1, Region::Tr1],
            Duration::ZERO,
        );

        let matches = fetcher.process_all_continents_in_parallel(10).await;

        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["EUW1_1", "TR1_1"]);
        assert_eq!(store.status(Region::Eun1).unwrap().status, RegionHealth::Error);
        assert_eq!(store.status(Region::Tr1).unwrap().status, RegionHealth::Ok);
    }

    #[tokio::test]
    async fn test_continents_run_concurrently() {
        let worker = Arc::new(ScriptedWorker::default());
        let fetcher = ContinentFetcher::new(
            worker.clone(),
            vec![Region::Na1, Region::Kr, Region::Euw1, Region::Oc1],
            Duration::ZERO,
        );

        let matches = fetcher.process_all_continents_in_parallel(10).await;
        assert_eq!(matches.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_regions() {
        let worker = Arc::new(ScriptedWorker::default());
        let fetcher = ContinentFetcher::new(
            worker,
            vec![Region::Na1, Region::Br1, Region::La1],
            Duration::from_millis(200),
        );

        let start = tokio::time::Instant::now();
        fetcher.process_all_continents_in_parallel(10).await;
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_unconfigured_regions_skipped() {
        let worker = Arc::new(ScriptedWorker::default());
        let fetcher = ContinentFetcher::new(worker.clone(), vec![Region::Jp1], Duration::ZERO);

        fetcher.process_all_continents_in_parallel(10).await;
        assert_eq!(*worker.calls.lock().unwrap(), vec![Region::Jp1]);
    }
}
