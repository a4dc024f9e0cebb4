//! Ranking primitives: matchup scoring with tier bonuses, tier classification
//! from a member's best tag, and best-tag tracking.
//!
//! Contract:
//! - A winner always earns `base_win_points` for beating one opponent.
//! - Bonuses only go to winners with at least `min_rounds_for_bonus` rounds
//!   who are not already Gold, and only for beating a *higher* tier.
//! - Integer arithmetic only; percentile cut-offs round up.

use tg_core::{EngineParams, RoundParticipant, TagNumber, Tier};

/// Points `winner` earns for finishing ahead of `loser`.
pub fn compute_matchup_points(
    winner: &RoundParticipant,
    loser: &RoundParticipant,
    params: &EngineParams,
) -> u64 {
    let base = params.base_win_points;
    if winner.rounds_played < params.min_rounds_for_bonus || winner.tier == Tier::Gold {
        return base;
    }
    let bonus = match (winner.tier, loser.tier) {
        (Tier::Silver, Tier::Gold) | (Tier::Bronze, Tier::Silver) => params.standard_upset_bonus,
        (Tier::Bronze, Tier::Gold) => params.giant_slayer_bonus,
        _ => 0,
    };
    base.saturating_add(bonus)
}

/// Classify a member by the best tag they ever held against the guild size.
///
/// Gold: `best <= ceil(total * gold_pct / 100)`.
/// Silver: `best <= ceil(total * silver_pct / 100)`.
/// No best tag or an empty guild classifies Bronze.
pub fn classify_tier(
    best_tag_ever: Option<TagNumber>,
    total_members: u32,
    params: &EngineParams,
) -> Tier {
    let best = match best_tag_ever {
        Some(t) if total_members > 0 => t.get(),
        _ => return Tier::Bronze,
    };
    if best <= band_cutoff(total_members, params.gold_band_pct) {
        Tier::Gold
    } else if best <= band_cutoff(total_members, params.silver_band_pct) {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

/// Keep the numerically lowest tag seen so far. `None` means "no tag yet".
#[inline]
pub fn update_best_tag_ever(
    current_best: Option<TagNumber>,
    new_tag: Option<TagNumber>,
) -> Option<TagNumber> {
    match (current_best, new_tag) {
        (Some(c), Some(n)) => Some(c.min(n)),
        (None, n) => n,
        (c, None) => c,
    }
}

/// `ceil(total * pct / 100)` in integers.
#[inline]
fn band_cutoff(total: u32, pct: u8) -> u32 {
    let scaled = u64::from(total) * u64::from(pct);
    let cut = scaled.div_ceil(100);
    u32::try_from(cut).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tag(n: u32) -> TagNumber { TagNumber::new(n).unwrap() }

    fn part(tier: Tier, rounds: u32) -> RoundParticipant {
        RoundParticipant {
            member_id: "m".parse().unwrap(),
            tag: tag(1),
            rounds_played: rounds,
            best_tag: None,
            tier,
        }
    }

    #[test]
    fn upsets_earn_bonuses() {
        let p = EngineParams::default();
        assert_eq!(compute_matchup_points(&part(Tier::Silver, 5), &part(Tier::Gold, 5), &p), 150);
        assert_eq!(compute_matchup_points(&part(Tier::Bronze, 5), &part(Tier::Silver, 5), &p), 150);
        assert_eq!(compute_matchup_points(&part(Tier::Bronze, 5), &part(Tier::Gold, 5), &p), 200);
    }

    #[test]
    fn no_bonus_for_newcomers_gold_or_downward_wins() {
        let p = EngineParams::default();
        assert_eq!(compute_matchup_points(&part(Tier::Bronze, 2), &part(Tier::Gold, 5), &p), 100);
        assert_eq!(compute_matchup_points(&part(Tier::Gold, 9), &part(Tier::Bronze, 5), &p), 100);
        assert_eq!(compute_matchup_points(&part(Tier::Silver, 9), &part(Tier::Bronze, 5), &p), 100);
        assert_eq!(compute_matchup_points(&part(Tier::Silver, 9), &part(Tier::Silver, 5), &p), 100);
    }

    #[test]
    fn tier_bands_round_up() {
        let p = EngineParams::default();
        // 10 members: gold <= 1, silver <= 4
        assert_eq!(classify_tier(Some(tag(1)), 10, &p), Tier::Gold);
        assert_eq!(classify_tier(Some(tag(2)), 10, &p), Tier::Silver);
        assert_eq!(classify_tier(Some(tag(4)), 10, &p), Tier::Silver);
        assert_eq!(classify_tier(Some(tag(5)), 10, &p), Tier::Bronze);
        // 15 members: gold <= 2, silver <= 6
        assert_eq!(classify_tier(Some(tag(2)), 15, &p), Tier::Gold);
        assert_eq!(classify_tier(Some(tag(6)), 15, &p), Tier::Silver);
        assert_eq!(classify_tier(Some(tag(7)), 15, &p), Tier::Bronze);
    }

    #[test]
    fn degenerate_tier_inputs_are_bronze() {
        let p = EngineParams::default();
        assert_eq!(classify_tier(None, 10, &p), Tier::Bronze);
        assert_eq!(classify_tier(Some(tag(1)), 0, &p), Tier::Bronze);
    }

    #[test]
    fn best_tag_tracking() {
        assert_eq!(update_best_tag_ever(None, Some(tag(5))), Some(tag(5)));
        assert_eq!(update_best_tag_ever(Some(tag(2)), None), Some(tag(2)));
        assert_eq!(update_best_tag_ever(Some(tag(4)), Some(tag(2))), Some(tag(2)));
        assert_eq!(update_best_tag_ever(Some(tag(2)), Some(tag(4))), Some(tag(2)));
        assert_eq!(update_best_tag_ever(None, None), None);
    }

    fn any_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Gold), Just(Tier::Silver), Just(Tier::Bronze)]
    }

    proptest! {
        #[test]
        fn matchup_is_at_least_base(w in any_tier(), l in any_tier(), rounds in 0u32..20) {
            let p = EngineParams::default();
            let pts = compute_matchup_points(&part(w, rounds), &part(l, 5), &p);
            prop_assert!(pts >= p.base_win_points);
            let exact_base = rounds < p.min_rounds_for_bonus || w == Tier::Gold || w == l;
            if exact_base {
                prop_assert_eq!(pts, p.base_win_points);
            }
        }
    }
}
