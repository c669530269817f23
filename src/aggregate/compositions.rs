//! Composition detection from participant boards.
//!
//! A board's signature is its significant traits (tier 2 and up, or every
//! active trait when none reach tier 2) plus up to three carry units.
//! Boards sharing a signature fold into one [`Composition`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{
    display_name, signature_id, ActiveTrait, BoardUnit, Composition, ItemRef, NormalizedMatch,
    NormalizedParticipant, TraitRef, UnitRef,
};

const MIN_SIGNATURE_TIER: u8 = 2;
const MAX_CARRIES: usize = 3;
const MAX_UNIT_ITEMS: usize = 3;

#[derive(Default)]
struct UnitTally {
    boards: u32,
    items: HashMap<String, u32>,
}

#[derive(Default)]
struct CompAcc {
    traits: Vec<ActiveTrait>,
    carries: Vec<String>,
    boards: u32,
    placement_sum: u64,
    wins: u32,
    top4: u32,
    units: HashMap<String, UnitTally>,
}

impl CompAcc {
    fn add(&mut self, p: &NormalizedParticipant) {
        self.boards += 1;
        self.placement_sum += u64::from(p.placement);
        if p.is_win() {
            self.wins += 1;
        }
        if p.is_top4() {
            self.top4 += 1;
        }
        for unit in &p.units {
            let tally = self.units.entry(unit.id.clone()).or_default();
            tally.boards += 1;
            for item in &unit.items {
                *tally.items.entry(item.clone()).or_insert(0) += 1;
            }
        }
    }
}

fn signature_traits(p: &NormalizedParticipant) -> Vec<ActiveTrait> {
    let mut traits: Vec<ActiveTrait> = p
        .traits
        .iter()
        .filter(|t| t.tier >= MIN_SIGNATURE_TIER)
        .cloned()
        .collect();
    if traits.is_empty() {
        traits = p.traits.clone();
    }
    traits.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.tier.cmp(&b.tier)));
    traits
}

/// Most items, then highest star, then id.
fn carry_units(units: &[BoardUnit]) -> Vec<String> {
    let mut ranked: Vec<&BoardUnit> = units.iter().collect();
    ranked.sort_by(|a, b| {
        b.items
            .len()
            .cmp(&a.items.len())
            .then_with(|| b.star.cmp(&a.star))
            .then_with(|| a.id.cmp(&b.id))
    });
    let mut carries: Vec<String> = ranked
        .into_iter()
        .take(MAX_CARRIES)
        .map(|u| u.id.clone())
        .collect();
    carries.sort();
    carries
}

fn signature_fields(traits: &[ActiveTrait], carries: &[String]) -> Vec<String> {
    traits
        .iter()
        .map(|t| format!("{}:{}", t.id, t.tier))
        .chain(carries.iter().map(|c| format!("unit:{}", c)))
        .collect()
}

/// Two highest-tier trait names, falling back to carry names.
fn composition_name(traits: &[ActiveTrait], carries: &[String]) -> String {
    let mut ranked: Vec<&ActiveTrait> = traits.iter().collect();
    ranked.sort_by(|a, b| {
        b.tier
            .cmp(&a.tier)
            .then_with(|| b.num_units.cmp(&a.num_units))
            .then_with(|| a.id.cmp(&b.id))
    });
    let names: Vec<String> = if ranked.is_empty() {
        carries.iter().map(|c| display_name(c)).collect()
    } else {
        ranked.iter().take(2).map(|t| display_name(&t.id)).collect()
    };
    names.join(" ")
}

fn finish(id: String, acc: CompAcc) -> Option<Composition> {
    let name = composition_name(&acc.traits, &acc.carries);
    let boards = f64::from(acc.boards);

    let mut units: Vec<(&String, &UnitTally)> = acc
        .units
        .iter()
        .filter(|(_, tally)| tally.boards * 2 >= acc.boards)
        .collect();
    units.sort_by(|a, b| b.1.boards.cmp(&a.1.boards).then_with(|| a.0.cmp(b.0)));

    let units: Vec<UnitRef> = units
        .into_iter()
        .map(|(unit_id, tally)| {
            let mut items: Vec<(&String, &u32)> = tally.items.iter().collect();
            items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let mut unit = UnitRef::from_asset(unit_id);
            unit.items = items
                .into_iter()
                .take(MAX_UNIT_ITEMS)
                .map(|(item, _)| ItemRef::from_asset(item))
                .collect();
            unit
        })
        .collect();

    let mut traits: Vec<TraitRef> = acc
        .traits
        .iter()
        .map(|t| TraitRef::from_asset(&t.id, t.tier, t.num_units))
        .collect();
    traits.sort_by(|a, b| b.tier.cmp(&a.tier).then_with(|| a.id.cmp(&b.id)));

    match Composition::new(id, name) {
        Ok(comp) => Some(
            comp.with_stats(
                acc.boards,
                acc.placement_sum as f64 / boards,
                f64::from(acc.wins) / boards * 100.0,
                f64::from(acc.top4) / boards * 100.0,
            )
            .with_units(units)
            .with_traits(traits),
        ),
        Err(e) => {
            warn!("Dropping composition: {}", e);
            None
        }
    }
}

/// Group every participant board into compositions.
///
/// Compositions seen on fewer than `min_count` boards are dropped. The
/// result is sorted by count desc, then id.
pub fn build_compositions(matches: &[NormalizedMatch], min_count: u32) -> Vec<Composition> {
    let mut acc: HashMap<String, CompAcc> = HashMap::new();

    for m in matches {
        for p in &m.participants {
            let traits = signature_traits(p);
            let carries = carry_units(&p.units);
            if traits.is_empty() && carries.is_empty() {
                continue;
            }

            let fields = signature_fields(&traits, &carries);
            let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
            let id = signature_id(&refs);

            acc.entry(id)
                .or_insert_with(|| CompAcc {
                    traits,
                    carries,
                    ..CompAcc::default()
                })
                .add(p);
        }
    }

    let mut comps: Vec<Composition> = acc
        .into_iter()
        .filter(|(_, c)| c.boards >= min_count.max(1))
        .filter_map(|(id, c)| finish(id, c))
        .collect();

    comps.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
    debug!(
        "Built {} compositions from {} matches",
        comps.len(),
        matches.len()
    );
    comps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Region;
    use pretty_assertions::assert_eq;

    fn board(placement: u8, traits: &[(&str, u8)], units: &[(&str, u8, &[&str])]) -> NormalizedParticipant {
        NormalizedParticipant {
            placement,
            level: 8,
            augments: vec![],
            units: units
                .iter()
                .map(|(id, star, items)| BoardUnit {
                    id: id.to_string(),
                    star: *star,
                    items: items.iter().map(|i| i.to_string()).collect(),
                })
                .collect(),
            traits: traits
                .iter()
                .map(|(id, tier)| ActiveTrait {
                    id: id.to_string(),
                    tier: *tier,
                    num_units: tier * 2,
                })
                .collect(),
        }
    }

    fn game(id: &str, participants: Vec<NormalizedParticipant>) -> NormalizedMatch {
        NormalizedMatch {
            id: id.to_string(),
            region: Region::Euw1,
            game_datetime: None,
            participants,
        }
    }

    fn jinx_board(placement: u8) -> NormalizedParticipant {
        board(
            placement,
            &[("TFT13_Ambusher", 2), ("TFT13_Family", 3), ("TFT13_Scrap", 1)],
            &[
                ("TFT13_Jinx", 3, &["TFT_Item_InfinityEdge", "TFT_Item_LastWhisper"]),
                ("TFT13_Vi", 2, &["TFT_Item_Bloodthirster"]),
                ("TFT13_Sevika", 2, &["TFT_Item_Titans"]),
            ],
        )
    }

    #[test]
    fn test_same_signature_folds_together() {
        let matches = vec![
            game("M1", vec![jinx_board(1), board(8, &[("TFT13_Sniper", 2)], &[("TFT13_Cait", 2, &[])])]),
            game("M2", vec![jinx_board(4)]),
        ];

        let comps = build_compositions(&matches, 1);
        assert_eq!(comps.len(), 2);

        let jinx = &comps[0];
        assert_eq!(jinx.count, Some(2));
        assert_eq!(jinx.avg_placement, 2.5);
        assert_eq!(jinx.win_rate, 50.0);
        assert_eq!(jinx.top4_rate, 100.0);
        assert_eq!(jinx.name, "Family Ambusher");
        assert_eq!(jinx.id.len(), 16);

        let trait_ids: Vec<&str> = jinx.traits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(trait_ids, vec!["TFT13_Family", "TFT13_Ambusher"]);

        let jinx_unit = jinx.units.iter().find(|u| u.id == "TFT13_Jinx").unwrap();
        assert_eq!(jinx_unit.items.len(), 2);
        assert_eq!(jinx_unit.name, "Jinx");
    }

    #[test]
    fn test_min_count_filters_rare_boards() {
        let matches = vec![
            game("M1", vec![jinx_board(1), board(8, &[("TFT13_Sniper", 2)], &[])]),
            game("M2", vec![jinx_board(2)]),
        ];
        let comps = build_compositions(&matches, 2);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].count, Some(2));
    }

    #[test]
    fn test_falls_back_to_low_tier_traits() {
        let matches = vec![game("M1", vec![board(5, &[("TFT13_Scrap", 1)], &[])])];
        let comps = build_compositions(&matches, 1);
        assert_eq!(comps[0].name, "Scrap");
        assert_eq!(comps[0].traits[0].tier, 1);
    }

    #[test]
    fn test_rare_units_excluded() {
        let mut with_extra = jinx_board(3);
        with_extra.units.push(BoardUnit {
            id: "TFT13_Ekko".to_string(),
            star: 1,
            items: vec![],
        });
        let matches = vec![game("M1", vec![jinx_board(1), jinx_board(2), with_extra])];

        let comps = build_compositions(&matches, 1);
        assert_eq!(comps.len(), 1);
        let unit_ids: Vec<&str> = comps[0].units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(unit_ids, vec!["TFT13_Jinx", "TFT13_Sevika", "TFT13_Vi"]);
    }

    #[test]
    fn test_empty_boards_ignored() {
        let matches = vec![game("M1", vec![board(1, &[], &[])])];
        assert!(build_compositions(&matches, 1).is_empty());
        assert!(build_compositions(&[], 1).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let matches = vec![game(
            "M1",
            vec![
                jinx_board(1),
                board(2, &[("TFT13_Sniper", 2)], &[("TFT13_Cait", 2, &[])]),
                board(3, &[("TFT13_Rebel", 3)], &[("TFT13_Jayce", 2, &[])]),
            ],
        )];
        assert_eq!(build_compositions(&matches, 1), build_compositions(&matches, 1));
    }
}
