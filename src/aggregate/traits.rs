//! Trait aggregates keyed by (trait id, active tier).

use std::collections::{HashMap, HashSet};

use crate::models::{Composition, TraitAggregate};

use super::{play_rate, valid_compositions, RelatedCompositions, WeightedStats};

#[derive(Default)]
struct TraitAcc {
    name: String,
    icon: Option<String>,
    stats: WeightedStats,
    related: RelatedCompositions,
}

/// Fold compositions into one aggregate per trait and tier.
///
/// The same trait active at a different tier is a separate entry.
pub fn extract_traits(compositions: &[Composition]) -> Vec<TraitAggregate> {
    let mut acc: HashMap<(String, u8), TraitAcc> = HashMap::new();

    for comp in valid_compositions(compositions) {
        let mut seen = HashSet::new();
        for t in &comp.traits {
            if t.id.is_empty() || !seen.insert((t.id.as_str(), t.tier)) {
                continue;
            }
            let entry = acc
                .entry((t.id.clone(), t.tier))
                .or_insert_with(|| TraitAcc {
                    name: t.name.clone(),
                    icon: t.icon.clone(),
                    ..TraitAcc::default()
                });
            entry.stats.add(comp);
            entry.related.insert(comp);
        }
    }

    let total: u32 = acc.values().map(|t| t.stats.count()).sum();

    let mut traits: Vec<TraitAggregate> = acc
        .into_iter()
        .map(|((id, tier), t)| TraitAggregate {
            id,
            name: t.name,
            icon: t.icon,
            tier,
            count: t.stats.count(),
            avg_placement: t.stats.avg_placement(),
            win_rate: t.stats.win_rate(),
            top4_rate: t.stats.top4_rate(),
            play_rate: play_rate(t.stats.count(), total),
            related_compositions: t.related.into_sorted(),
        })
        .collect();

    traits.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.tier.cmp(&b.tier))
    });
    traits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::comp;
    use crate::models::TraitRef;
    use pretty_assertions::assert_eq;

    fn ambusher(tier: u8) -> TraitRef {
        TraitRef::from_asset("TFT13_Ambusher", tier, 2 * tier)
    }

    #[test]
    fn test_traits_keyed_by_tier() {
        let comps = vec![
            comp("A", Some(3), 2.0, 50.0, vec![], vec![ambusher(2)]),
            comp("B", Some(1), 8.0, 0.0, vec![], vec![ambusher(2)]),
            comp("C", Some(2), 4.0, 0.0, vec![], vec![ambusher(3)]),
        ];

        let traits = extract_traits(&comps);
        assert_eq!(traits.len(), 2);

        let silver = &traits[0];
        assert_eq!((silver.id.as_str(), silver.tier), ("TFT13_Ambusher", 2));
        assert_eq!(silver.name, "Ambusher");
        assert_eq!(silver.count, 4);
        assert!((silver.avg_placement - 3.5).abs() < 1e-9);
        assert!((silver.win_rate - 37.5).abs() < 1e-9);
        assert!((silver.play_rate - 4.0 / 6.0).abs() < 1e-9);

        let gold = &traits[1];
        assert_eq!(gold.tier, 3);
        assert_eq!(gold.count, 2);
        assert_eq!(gold.related_compositions.len(), 1);
    }

    #[test]
    fn test_missing_count_weighs_one() {
        let comps = vec![comp("A", None, 5.0, 0.0, vec![], vec![ambusher(1)])];
        let traits = extract_traits(&comps);
        assert_eq!(traits[0].count, 1);
        assert_eq!(traits[0].avg_placement, 5.0);
        assert_eq!(traits[0].related_compositions[0].count, Some(1));
    }

    #[test]
    fn test_idempotent_and_empty() {
        let comps = vec![
            comp("A", Some(2), 3.0, 10.0, vec![], vec![ambusher(2), ambusher(3)]),
            comp("B", Some(2), 5.0, 0.0, vec![], vec![ambusher(3)]),
        ];
        assert_eq!(extract_traits(&comps), extract_traits(&comps));
        assert!(extract_traits(&[]).is_empty());
    }
}
