//! Item aggregates keyed by item id, with a per-carrier breakdown.

use std::collections::{HashMap, HashSet};

use crate::models::{Composition, ItemAggregate, ItemUnitStats};

use super::{by_count_then_id, play_rate, valid_compositions, RelatedCompositions, WeightedStats};

#[derive(Default)]
struct CarrierAcc {
    unit_name: String,
    stats: WeightedStats,
    related: RelatedCompositions,
}

#[derive(Default)]
struct ItemAcc {
    name: String,
    icon: Option<String>,
    stats: WeightedStats,
    related: RelatedCompositions,
    carriers: HashMap<String, CarrierAcc>,
}

/// Fold compositions into one aggregate per item id.
///
/// An item counts once per composition no matter how many units carry it;
/// each carrying unit gets its own entry in the breakdown.
pub fn extract_items(compositions: &[Composition]) -> Vec<ItemAggregate> {
    let mut acc: HashMap<String, ItemAcc> = HashMap::new();

    for comp in valid_compositions(compositions) {
        let mut seen_items = HashSet::new();
        let mut seen_pairs = HashSet::new();

        for unit in &comp.units {
            for item in &unit.items {
                if item.id.is_empty() {
                    continue;
                }
                let entry = acc.entry(item.id.clone()).or_insert_with(|| ItemAcc {
                    name: item.name.clone(),
                    icon: item.icon.clone(),
                    ..ItemAcc::default()
                });

                if seen_items.insert(item.id.as_str()) {
                    entry.stats.add(comp);
                    entry.related.insert(comp);
                }

                if !unit.id.is_empty() && seen_pairs.insert((item.id.as_str(), unit.id.as_str())) {
                    let carrier = entry
                        .carriers
                        .entry(unit.id.clone())
                        .or_insert_with(|| CarrierAcc {
                            unit_name: unit.name.clone(),
                            ..CarrierAcc::default()
                        });
                    carrier.stats.add(comp);
                    carrier.related.insert(comp);
                }
            }
        }
    }

    let total: u32 = acc.values().map(|i| i.stats.count()).sum();

    let mut items: Vec<ItemAggregate> = acc
        .into_iter()
        .map(|(id, i)| {
            let mut units: Vec<ItemUnitStats> = i
                .carriers
                .into_iter()
                .map(|(unit_id, c)| ItemUnitStats {
                    unit_id,
                    unit_name: c.unit_name,
                    count: c.stats.count(),
                    avg_placement: c.stats.avg_placement(),
                    win_rate: c.stats.win_rate(),
                    top4_rate: c.stats.top4_rate(),
                    related_compositions: c.related.into_sorted(),
                })
                .collect();
            units.sort_by(|a, b| by_count_then_id(a.count, &a.unit_id, b.count, &b.unit_id));

            ItemAggregate {
                id,
                name: i.name,
                icon: i.icon,
                count: i.stats.count(),
                avg_placement: i.stats.avg_placement(),
                win_rate: i.stats.win_rate(),
                top4_rate: i.stats.top4_rate(),
                play_rate: play_rate(i.stats.count(), total),
                related_compositions: i.related.into_sorted(),
                units,
            }
        })
        .collect();

    items.sort_by(|a, b| by_count_then_id(a.count, &a.id, b.count, &b.id));
    items
}
