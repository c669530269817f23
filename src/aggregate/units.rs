//! Unit aggregates keyed by unit id.

use std::collections::{HashMap, HashSet};

use crate::models::{Composition, UnitAggregate};

use super::{by_count_then_id, play_rate, valid_compositions, RelatedCompositions, WeightedStats};

#[derive(Default)]
struct UnitAcc {
    name: String,
    icon: Option<String>,
    stats: WeightedStats,
    related: RelatedCompositions,
}

/// Fold compositions into one aggregate per unit id.
///
/// A unit listed twice on the same composition contributes once.
pub fn extract_units(compositions: &[Composition]) -> Vec<UnitAggregate> {
    let mut acc: HashMap<String, UnitAcc> = HashMap::new();

    for comp in valid_compositions(compositions) {
        let mut seen = HashSet::new();
        for unit in &comp.units {
            if unit.id.is_empty() || !seen.insert(unit.id.as_str()) {
                continue;
            }
            let entry = acc.entry(unit.id.clone()).or_insert_with(|| UnitAcc {
                name: unit.name.clone(),
                icon: unit.icon.clone(),
                ..UnitAcc::default()
            });
            entry.stats.add(comp);
            entry.related.insert(comp);
        }
    }

    let total: u32 = acc.values().map(|u| u.stats.count()).sum();

    let mut units: Vec<UnitAggregate> = acc
        .into_iter()
        .map(|(id, u)| UnitAggregate {
            id,
            name: u.name,
            icon: u.icon,
            count: u.stats.count(),
            avg_placement: u.stats.avg_placement(),
            win_rate: u.stats.win_rate(),
            top4_rate: u.stats.top4_rate(),
            play_rate: play_rate(u.stats.count(), total),
            related_compositions: u.related.into_sorted(),
        })
        .collect();

    units.sort_by(|a, b| by_count_then_id(a.count, &a.id, b.count, &b.id));
    units
}
