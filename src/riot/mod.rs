//! Riot Games TFT API client.
//!
//! All Riot endpoint specifics (hosts, paths, response shapes) are isolated
//! in this module. League and summoner resources are served from the
//! platform region host; match resources from the continent host.

pub mod convert;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::fetch::{FetchError, FetchOptions, Fetcher};
use crate::models::Region;

/// Default API host suffix, prefixed by a routing value.
pub const DEFAULT_API_HOST: &str = "api.riotgames.com";

// ── Riot API response types ─────────────────────────────────────────────────

/// Response of the challenger league endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueList {
    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub entries: Vec<LeagueEntry>,
}

/// One ranked player inside a league.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    /// Legacy encrypted summoner id; newer responses carry `puuid` instead
    #[serde(default)]
    pub summoner_id: Option<String>,

    #[serde(default)]
    pub puuid: Option<String>,

    #[serde(default)]
    pub league_points: i32,

    #[serde(default)]
    pub wins: u32,

    #[serde(default)]
    pub losses: u32,
}

/// Summoner profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    #[serde(default)]
    pub id: Option<String>,

    pub puuid: String,

    #[serde(default)]
    pub summoner_level: Option<i64>,
}

/// Match detail (`/tft/match/v1/matches/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDto {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub match_id: String,

    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInfo {
    #[serde(default)]
    pub game_datetime: Option<i64>,

    #[serde(default)]
    pub game_version: Option<String>,

    #[serde(default)]
    pub tft_set_number: Option<u32>,

    #[serde(default)]
    pub participants: Vec<ParticipantDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub placement: u8,

    #[serde(default)]
    pub level: u8,

    #[serde(default)]
    pub puuid: Option<String>,

    #[serde(default)]
    pub augments: Vec<String>,

    #[serde(default)]
    pub traits: Vec<TraitDto>,

    #[serde(default)]
    pub units: Vec<UnitDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDto {
    pub name: String,

    #[serde(default)]
    pub num_units: u8,

    #[serde(default)]
    pub style: Option<u8>,

    /// 0 means the trait is present but inactive
    #[serde(default)]
    pub tier_current: u8,

    #[serde(default)]
    pub tier_total: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDto {
    pub character_id: String,

    /// Star level
    #[serde(default)]
    pub tier: u8,

    #[serde(default)]
    pub rarity: Option<u8>,

    #[serde(default, rename = "itemNames")]
    pub item_names: Vec<String>,
}

// ── Source abstraction ──────────────────────────────────────────────────────

/// Upstream resources consumed by the region processor.
///
/// `Ok(None)` means the resource is unavailable; `Err` is reserved for
/// fatal failures such as rejected credentials.
#[async_trait]
pub trait MatchSource: Send + Sync {
    async fn challenger_league(&self, region: Region) -> Result<Option<LeagueList>, FetchError>;

    async fn summoner(
        &self,
        region: Region,
        entry: &LeagueEntry,
    ) -> Result<Option<Summoner>, FetchError>;

    /// Match ids live on the continental host of `region`.
    async fn match_ids(
        &self,
        region: Region,
        puuid: &str,
        count: usize,
    ) -> Result<Option<Vec<String>>, FetchError>;

    async fn match_detail(
        &self,
        region: Region,
        match_id: &str,
    ) -> Result<Option<MatchDto>, FetchError>;
}

/// Riot API client.
pub struct RiotClient {
    fetcher: Fetcher,
    scheme: String,
    api_host: String,
}

impl RiotClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self::with_host(fetcher, "https", DEFAULT_API_HOST)
    }

    /// Client against a non-default host, e.g. a local proxy.
    pub fn with_host(fetcher: Fetcher, scheme: &str, api_host: &str) -> Self {
        Self {
            fetcher,
            scheme: scheme.to_string(),
            api_host: api_host.trim_end_matches('/').to_string(),
        }
    }

    /// Build `{scheme}://{route}.{host}/{segments...}` with escaped segments.
    fn endpoint(&self, route: &str, segments: &[&str]) -> Result<Url, FetchError> {
        let base = format!("{}://{}.{}", self.scheme, route, self.api_host);
        let mut url = Url::parse(&base)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(base.clone()))?
            .clear()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl MatchSource for RiotClient {
    async fn challenger_league(&self, region: Region) -> Result<Option<LeagueList>, FetchError> {
        let url = self.endpoint(region.as_str(), &["tft", "league", "v1", "challenger"])?;
        info!("Riot: fetching challenger league for {}", region);
        self.fetcher.fetch_json(&url, FetchOptions::default()).await
    }

    async fn summoner(
        &self,
        region: Region,
        entry: &LeagueEntry,
    ) -> Result<Option<Summoner>, FetchError> {
        let url = match (&entry.puuid, &entry.summoner_id) {
            (Some(puuid), _) => self.endpoint(
                region.as_str(),
                &["tft", "summoner", "v1", "summoners", "by-puuid", puuid.as_str()],
            )?,
            (None, Some(id)) => self.endpoint(
                region.as_str(),
                &["tft", "summoner", "v1", "summoners", id.as_str()],
            )?,
            (None, None) => return Ok(None),
        };
        self.fetcher.fetch_json(&url, FetchOptions::default()).await
    }

    async fn match_ids(
        &self,
        region: Region,
        puuid: &str,
        count: usize,
    ) -> Result<Option<Vec<String>>, FetchError> {
        let mut url = self.endpoint(
            region.continent().as_str(),
            &["tft", "match", "v1", "matches", "by-puuid", puuid, "ids"],
        )?;
        url.query_pairs_mut()
            .append_pair("count", &count.to_string());
        self.fetcher.fetch_json(&url, FetchOptions::for_region(region)).await
    }

    async fn match_detail(
        &self,
        region: Region,
        match_id: &str,
    ) -> Result<Option<MatchDto>, FetchError> {
        let url = self.endpoint(
            region.continent().as_str(),
            &["tft", "match", "v1", "matches", match_id],
        )?;
        self.fetcher.fetch_json(&url, FetchOptions::for_region(region)).await
    }
}

/// Sample match detail response.
#[cfg(test)]
pub(crate) const SAMPLE_MATCH_JSON: &str = r#"{
    "metadata": {"data_version": "6", "match_id": "NA1_1001", "participants": ["p1", "p2"]},
    "info": {
        "game_datetime": 1700000000000,
        "game_version": "Version 14.1",
        "tft_set_number": 13,
        "participants": [
            {
                "placement": 1, "level": 9, "puuid": "p1", "gold_left": 3,
                "augments": ["TFT9_Augment_Example"],
                "traits": [
                    {"name": "TFT13_Ambusher", "num_units": 4, "style": 2, "tier_current": 2, "tier_total": 3},
                    {"name": "TFT13_Family", "num_units": 1, "style": 0, "tier_current": 0, "tier_total": 3}
                ],
                "units": [
                    {"character_id": "TFT13_Jinx", "tier": 3, "rarity": 4,
                     "itemNames": ["TFT_Item_InfinityEdge", "TFT_Item_LastWhisper"]},
                    {"character_id": "TFT13_Vi", "tier": 2, "rarity": 1, "itemNames": []}
                ]
            },
            {
                "placement": 8, "level": 7, "puuid": "p2",
                "traits": [],
                "units": [{"character_id": "TFT13_Ekko", "tier": 1}]
            }
        ]
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetcherConfig, RawResponse, ScriptedTransport};
    use crate::rate_limit::{ManualClock, RateLimitConfig, RateLimiterRegistry};
    use std::sync::Arc;
    use std::time::Duration;

    fn client(script: Vec<RawResponse>) -> (Arc<ScriptedTransport>, RiotClient) {
        let transport = Arc::new(ScriptedTransport::new(script.into_iter().map(Ok).collect()));
        let limits = Arc::new(RateLimiterRegistry::with_clock(
            RateLimitConfig::default(),
            Arc::new(ManualClock::new()),
        ));
        let fetcher = Fetcher::new(
            transport.clone(),
            limits,
            FetcherConfig {
                base_delay: Duration::from_millis(1),
                ..FetcherConfig::default()
            },
        );
        (transport, RiotClient::new(fetcher))
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let (_t, client) = client(vec![]);
        let url = client
            .endpoint("americas", &["tft", "match", "v1", "matches", "by-puuid", "a/b c", "ids"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://americas.api.riotgames.com/tft/match/v1/matches/by-puuid/a%2Fb%20c/ids"
        );
    }

    #[test]
    fn test_match_dto_deserialize() {
        let dto: MatchDto = serde_json::from_str(SAMPLE_MATCH_JSON).unwrap();
        assert_eq!(dto.metadata.match_id, "NA1_1001");
        assert_eq!(dto.info.participants.len(), 2);
        let first = &dto.info.participants[0];
        assert_eq!(first.units[0].item_names.len(), 2);
        assert_eq!(first.traits[1].tier_current, 0);
        assert!(dto.info.participants[1].augments.is_empty());
    }

    #[test]
    fn test_league_deserialize_with_and_without_puuid() {
        let json = r#"{"tier": "CHALLENGER", "entries": [
            {"summonerId": "s1", "leaguePoints": 1200, "wins": 40, "losses": 10},
            {"puuid": "p2", "leaguePoints": 900}
        ]}"#;
        let league: LeagueList = serde_json::from_str(json).unwrap();
        assert_eq!(league.entries.len(), 2);
        assert_eq!(league.entries[0].summoner_id.as_deref(), Some("s1"));
        assert_eq!(league.entries[1].puuid.as_deref(), Some("p2"));
        assert_eq!(league.entries[1].wins, 0);
    }

    #[tokio::test]
    async fn test_client_fetches_match_detail() {
        let (transport, client) = client(vec![RawResponse::json(200, SAMPLE_MATCH_JSON)]);
        let dto = client
            .match_detail(Region::Na1, "NA1_1001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dto.metadata.match_id, "NA1_1001");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_summoner_without_identity_skips_request() {
        let (transport, client) = client(vec![]);
        let entry = LeagueEntry {
            summoner_id: None,
            puuid: None,
            league_points: 0,
            wins: 0,
            losses: 0,
        };
        assert!(client.summoner(Region::Na1, &entry).await.unwrap().is_none());
        assert_eq!(transport.calls(), 0);
    }
}
