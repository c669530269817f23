//! Statistics aggregation engine.
//!
//! Folds normalized matches into derived statistics:
//! - Compositions (team-build signatures) from participant boards
//! - Unit, trait and item aggregates from compositions
//!
//! Every average is weighted by composition count: `Σ(metric × weight) /
//! Σ(weight)`, with an absent count weighing 1. Sums are accumulated during
//! the fold and divided once when the entity is finished.

mod compositions;
mod items;
mod traits;
mod units;

pub use compositions::build_compositions;
pub use items::extract_items;
pub use traits::extract_traits;
pub use units::extract_units;

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::warn;

use crate::models::{Composition, ItemAggregate, TraitAggregate, UnitAggregate};

/// All aggregate lists derived from one composition list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub units: Vec<UnitAggregate>,
    pub traits: Vec<TraitAggregate>,
    pub items: Vec<ItemAggregate>,
}

/// Run every extractor over the same compositions.
pub fn aggregate_all(compositions: &[Composition]) -> Aggregates {
    Aggregates {
        units: extract_units(compositions),
        traits: extract_traits(compositions),
        items: extract_items(compositions),
    }
}

/// Weighted running sums for one entity.
#[derive(Debug, Clone, Default)]
pub(crate) struct WeightedStats {
    count: u32,
    weight: f64,
    placement: f64,
    win: f64,
    top4: f64,
}

impl WeightedStats {
    pub(crate) fn add(&mut self, comp: &Composition) {
        let weight = comp.weight();
        self.count += comp.count.unwrap_or(1);
        self.weight += weight;
        self.placement += comp.avg_placement * weight;
        self.win += comp.win_rate * weight;
        self.top4 += comp.top4_rate * weight;
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn avg_placement(&self) -> f64 {
        ratio(self.placement, self.weight)
    }

    pub(crate) fn win_rate(&self) -> f64 {
        ratio(self.win, self.weight)
    }

    pub(crate) fn top4_rate(&self) -> f64 {
        ratio(self.top4, self.weight)
    }
}

fn ratio(sum: f64, weight: f64) -> f64 {
    if weight > 0.0 {
        sum / weight
    } else {
        0.0
    }
}

/// Trimmed back-references to compositions, deduplicated by id.
#[derive(Debug, Clone, Default)]
pub(crate) struct RelatedCompositions {
    by_id: HashMap<String, Composition>,
}

impl RelatedCompositions {
    pub(crate) fn insert(&mut self, comp: &Composition) {
        self.by_id
            .entry(comp.id.clone())
            .or_insert_with(|| comp.trimmed());
    }

    /// Sorted by count desc, then id.
    pub(crate) fn into_sorted(self) -> Vec<Composition> {
        let mut comps: Vec<Composition> = self.by_id.into_values().collect();
        comps.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
        comps
    }
}

/// Compositions that pass validation; the rest are logged and skipped.
pub(crate) fn valid_compositions(
    compositions: &[Composition],
) -> impl Iterator<Item = &Composition> {
    compositions.iter().filter(|comp| match comp.validate() {
        Ok(()) => true,
        Err(e) => {
            warn!("Skipping composition {:?}: {}", comp.id, e);
            false
        }
    })
}

/// `count / total`, or 0 for an empty run.
pub(crate) fn play_rate(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total)
    }
}

/// Count desc, then id asc.
pub(crate) fn by_count_then_id(a_count: u32, a_id: &str, b_count: u32, b_id: &str) -> Ordering {
    b_count.cmp(&a_count).then_with(|| a_id.cmp(b_id))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::TraitRef;

    #[test]
    fn test_weighted_stats() {
        let mut stats = WeightedStats::default();
        stats.add(&comp("a", Some(3), 2.0, 50.0, vec![], vec![]));
        stats.add(&comp("b", None, 8.0, 0.0, vec![], vec![]));

        assert_eq!(stats.count(), 4);
        assert!((stats.avg_placement() - 3.5).abs() < 1e-9);
        assert!((stats.win_rate() - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let stats = WeightedStats::default();
        assert_eq!(stats.avg_placement(), 0.0);
        assert!(!stats.win_rate().is_nan());
    }

    #[test]
    fn test_play_rate() {
        assert_eq!(play_rate(1, 4), 0.25);
        assert_eq!(play_rate(0, 0), 0.0);
    }

    #[test]
    fn test_related_compositions_deduplicated_and_trimmed() {
        let mut related = RelatedCompositions::default();
        let a = comp(
            "a",
            Some(1),
            4.0,
            0.0,
            vec![unit("TFT13_Jinx", &[])],
            vec![TraitRef::from_asset("TFT13_Ambusher", 2, 4)],
        );
        let b = comp("b", Some(5), 4.0, 0.0, vec![], vec![]);
        related.insert(&a);
        related.insert(&b);
        related.insert(&a);

        let sorted = related.into_sorted();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].id, "b");
        assert!(sorted[1].units.is_empty());
        assert!(sorted[1].traits.is_empty());
    }

    #[test]
    fn test_aggregate_all_empty() {
        let aggregates = aggregate_all(&[]);
        assert_eq!(aggregates, Aggregates::default());
    }
}
