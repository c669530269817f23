//! Conversion from Riot match payloads to normalized matches.

use crate::models::{ActiveTrait, BoardUnit, NormalizedMatch, NormalizedParticipant, Region};

use super::{MatchDto, ParticipantDto};

/// Flatten a match detail into the shape the aggregator consumes.
///
/// Participants with an out-of-range placement are dropped, as are traits
/// that are present on the board but not active.
pub fn normalize_match(region: Region, dto: &MatchDto) -> NormalizedMatch {
    let participants = dto
        .info
        .participants
        .iter()
        .filter(|p| (1..=8).contains(&p.placement))
        .map(normalize_participant)
        .collect();

    NormalizedMatch {
        id: dto.metadata.match_id.clone(),
        region,
        game_datetime: dto.info.game_datetime,
        participants,
    }
}

fn normalize_participant(p: &ParticipantDto) -> NormalizedParticipant {
    let units = p
        .units
        .iter()
        .filter(|u| !u.character_id.is_empty())
        .map(|u| BoardUnit {
            id: u.character_id.clone(),
            star: u.tier,
            items: u.item_names.clone(),
        })
        .collect();

    let traits = p
        .traits
        .iter()
        .filter(|t| t.tier_current > 0)
        .map(|t| ActiveTrait {
            id: t.name.clone(),
            tier: t.tier_current,
            num_units: t.num_units,
        })
        .collect();

    NormalizedParticipant {
        placement: p.placement,
        level: p.level,
        augments: p.augments.clone(),
        units,
        traits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot::SAMPLE_MATCH_JSON;

    #[test]
    fn test_normalize_match() {
        let dto: MatchDto = serde_json::from_str(SAMPLE_MATCH_JSON).unwrap();
        let normalized = normalize_match(Region::Na1, &dto);

        assert_eq!(normalized.id, "NA1_1001");
        assert_eq!(normalized.region, Region::Na1);
        assert_eq!(normalized.participants.len(), 2);

        let winner = &normalized.participants[0];
        assert!(winner.is_win());
        assert_eq!(winner.level, 9);
        assert_eq!(winner.augments, vec!["TFT9_Augment_Example".to_string()]);
        assert_eq!(winner.traits.len(), 1, "inactive trait is dropped");
        assert_eq!(winner.traits[0].id, "TFT13_Ambusher");
        assert_eq!(winner.traits[0].tier, 2);
        assert_eq!(winner.units[0].star, 3);
        assert_eq!(winner.units[0].items.len(), 2);

        let last = &normalized.participants[1];
        assert!(!last.is_top4());
        assert!(last.traits.is_empty());
    }

    #[test]
    fn test_normalize_drops_invalid_placements() {
        let mut dto: MatchDto = serde_json::from_str(SAMPLE_MATCH_JSON).unwrap();
        dto.info.participants[1].placement = 0;
        let normalized = normalize_match(Region::Na1, &dto);
        assert_eq!(normalized.participants.len(), 1);
    }
}
