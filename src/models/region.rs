//! Riot routing values: platform regions, continents and endpoint classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// A platform region (league/summoner resources live here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Na1,
    Br1,
    La1,
    La2,
    Euw1,
    Eun1,
    Tr1,
    Ru,
    Me1,
    Kr,
    Jp1,
    Oc1,
    Sg2,
    Tw2,
    Vn2,
}

impl Region {
    pub const ALL: [Region; 15] = [
        Region::Na1,
        Region::Br1,
        Region::La1,
        Region::La2,
        Region::Euw1,
        Region::Eun1,
        Region::Tr1,
        Region::Ru,
        Region::Me1,
        Region::Kr,
        Region::Jp1,
        Region::Oc1,
        Region::Sg2,
        Region::Tw2,
        Region::Vn2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Na1 => "na1",
            Region::Br1 => "br1",
            Region::La1 => "la1",
            Region::La2 => "la2",
            Region::Euw1 => "euw1",
            Region::Eun1 => "eun1",
            Region::Tr1 => "tr1",
            Region::Ru => "ru",
            Region::Me1 => "me1",
            Region::Kr => "kr",
            Region::Jp1 => "jp1",
            Region::Oc1 => "oc1",
            Region::Sg2 => "sg2",
            Region::Tw2 => "tw2",
            Region::Vn2 => "vn2",
        }
    }

    /// The continent whose match-v1 host serves this region's matches.
    pub fn continent(&self) -> Continent {
        match self {
            Region::Na1 | Region::Br1 | Region::La1 | Region::La2 => Continent::Americas,
            Region::Euw1 | Region::Eun1 | Region::Tr1 | Region::Ru | Region::Me1 => {
                Continent::Europe
            }
            Region::Kr | Region::Jp1 => Continent::Asia,
            Region::Oc1 | Region::Sg2 | Region::Tw2 | Region::Vn2 => Continent::Sea,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| ModelError::UnknownRegion(s.to_string()))
    }
}

/// A geographic grouping of regions sharing an upstream rate-limit pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Continent {
    Americas,
    Europe,
    Asia,
    Sea,
}

impl Continent {
    pub const ALL: [Continent; 4] = [
        Continent::Americas,
        Continent::Europe,
        Continent::Asia,
        Continent::Sea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::Americas => "americas",
            Continent::Europe => "europe",
            Continent::Asia => "asia",
            Continent::Sea => "sea",
        }
    }

    /// Regions routed through this continent, in processing order.
    pub fn regions(&self) -> Vec<Region> {
        Region::ALL
            .iter()
            .copied()
            .filter(|r| r.continent() == *self)
            .collect()
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host prefix of a Riot API request. Each one owns its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingValue {
    Region(Region),
    Continent(Continent),
}

impl RoutingValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingValue::Region(r) => r.as_str(),
            RoutingValue::Continent(c) => c.as_str(),
        }
    }

    /// Parse the routing value from an API host such as `na1.api.riotgames.com`.
    pub fn from_host(host: &str) -> Option<Self> {
        let prefix = host.split('.').next()?.to_ascii_lowercase();
        if let Some(continent) = Continent::ALL.iter().find(|c| c.as_str() == prefix) {
            return Some(RoutingValue::Continent(*continent));
        }
        Region::ALL
            .iter()
            .find(|r| r.as_str() == prefix)
            .map(|r| RoutingValue::Region(*r))
    }
}

impl fmt::Display for RoutingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class of upstream endpoint; each class has its own method rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// App-wide budget shared by every method on a routing value.
    Application,
    League,
    Summoner,
    MatchIds,
    MatchDetail,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Application => "application",
            EndpointClass::League => "league",
            EndpointClass::Summoner => "summoner",
            EndpointClass::MatchIds => "match_ids",
            EndpointClass::MatchDetail => "match_detail",
        }
    }

    /// Infer the endpoint class from a request path.
    pub fn from_path(path: &str) -> Option<Self> {
        if path.starts_with("/tft/league/") {
            Some(EndpointClass::League)
        } else if path.starts_with("/tft/summoner/") {
            Some(EndpointClass::Summoner)
        } else if path.starts_with("/tft/match/") {
            if path.ends_with("/ids") {
                Some(EndpointClass::MatchIds)
            } else {
                Some(EndpointClass::MatchDetail)
            }
        } else {
            None
        }
    }
}
