//! Normalized match records produced by the region processor.

use serde::{Deserialize, Serialize};

use super::Region;

/// A unit on a participant's final board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUnit {
    pub id: String,
    /// Star level (1-3).
    pub star: u8,
    #[serde(default)]
    pub items: Vec<String>,
}

/// A trait active on a participant's final board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTrait {
    pub id: String,
    pub tier: u8,
    pub num_units: u8,
}

/// One player's result within a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedParticipant {
    /// Final placement, 1-8.
    pub placement: u8,
    pub level: u8,
    #[serde(default)]
    pub augments: Vec<String>,
    pub units: Vec<BoardUnit>,
    pub traits: Vec<ActiveTrait>,
}

impl NormalizedParticipant {
    pub fn is_win(&self) -> bool {
        self.placement == 1
    }

    pub fn is_top4(&self) -> bool {
        self.placement <= 4
    }
}

/// A completed game flattened for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMatch {
    pub id: String,
    pub region: Region,
    #[serde(default)]
    pub game_datetime: Option<i64>,
    pub participants: Vec<NormalizedParticipant>,
}
