//! Per-region processing status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Region;

/// Outcome of the last processing run for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegionHealth {
    #[default]
    Ok,
    /// No usable data, but nothing failed outright.
    Degraded,
    Error,
}

/// Persisted status record for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStatus {
    pub region: Region,
    pub status: RegionHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Matches normalized in the last run.
    #[serde(default)]
    pub match_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl RegionStatus {
    pub fn new(region: Region, status: RegionHealth, reason: Option<String>) -> Self {
        Self {
            region,
            status,
            reason,
            match_count: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn ok(region: Region, match_count: usize) -> Self {
        Self {
            match_count,
            ..Self::new(region, RegionHealth::Ok, None)
        }
    }

    pub fn degraded(region: Region, reason: impl Into<String>) -> Self {
        Self::new(region, RegionHealth::Degraded, Some(reason.into()))
    }

    pub fn error(region: Region, reason: impl Into<String>) -> Self {
        Self::new(region, RegionHealth::Error, Some(reason.into()))
    }
}
