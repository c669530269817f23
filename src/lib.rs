//! # TFT Meta
//!
//! TeamFight Tactics match aggregation: pulls top-ladder matches from the
//! Riot API, aggregates compositions, units, traits and items, and serves
//! the resulting snapshots over HTTP.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (regions, matches, aggregates, status)
//! - **rate_limit**: Sliding-window limiters per routing value and endpoint
//! - **fetch**: Rate-limited HTTP fetcher with retry classification
//! - **riot**: Riot API client and match normalization
//! - **aggregate**: Composition building and weighted entity statistics
//! - **pipeline**: Continent/region orchestration and the refresh job
//! - **storage**: Filesystem snapshots, raw match archive, region status
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod api;
pub mod config;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod riot;
pub mod storage;

pub use models::*;

use std::time::Duration;

/// Parse a refresh interval such as `"6h"`, `"30m"`, `"90s"` or `"1d"`.
///
/// A bare number is taken as seconds. Overflowing values are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit_secs) = match s.char_indices().last()? {
        (idx, 'd') => (&s[..idx], 86_400),
        (idx, 'h') => (&s[..idx], 3_600),
        (idx, 'm') => (&s[..idx], 60),
        (idx, 's') => (&s[..idx], 1),
        _ => (s, 1),
    };

    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(unit_secs).map(Duration::from_secs)
}
