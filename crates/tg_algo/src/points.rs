//! Round points engine.
//!
//! Every participant "beats" everyone holding a worse (numerically higher)
//! post-allocation tag in the same round and earns the matchup points for
//! each such opponent. Awards come back in canonical points order:
//! `(tag asc, member_id asc)`.

use tg_core::{determinism::StableOrd, EngineParams, PointAward, RoundParticipant};

use crate::ranking::compute_matchup_points;

/// Score one round. Empty input yields an empty result.
pub fn score_round(participants: &[RoundParticipant], params: &EngineParams) -> Vec<PointAward> {
    let mut ordered: Vec<&RoundParticipant> = participants.iter().collect();
    ordered.sort_by(|a, b| a.stable_cmp(b));

    let mut awards = Vec::with_capacity(ordered.len());
    for (i, winner) in ordered.iter().enumerate() {
        let mut points: u64 = 0;
        let mut beaten: u32 = 0;
        for loser in ordered[i + 1..].iter().filter(|l| l.tag > winner.tag) {
            points = points.saturating_add(compute_matchup_points(winner, loser, params));
            beaten += 1;
        }
        awards.push(PointAward {
            member_id: winner.member_id.clone(),
            points,
            opponents_beaten: beaten,
            tier: winner.tier,
        });
    }
    awards
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tg_core::{TagNumber, Tier};

    fn part(m: &str, tag: u32, tier: Tier, rounds: u32) -> RoundParticipant {
        RoundParticipant {
            member_id: m.parse().unwrap(),
            tag: TagNumber::new(tag).unwrap(),
            rounds_played: rounds,
            best_tag: None,
            tier,
        }
    }

    #[test]
    fn three_tier_round() {
        let p = EngineParams::default();
        let awards = score_round(
            &[
                part("charlie", 3, Tier::Bronze, 10),
                part("alice", 1, Tier::Gold, 10),
                part("bob", 2, Tier::Silver, 10),
            ],
            &p,
        );
        let got: Vec<(&str, u64, u32)> = awards
            .iter()
            .map(|a| (a.member_id.as_str(), a.points, a.opponents_beaten))
            .collect();
        assert_eq!(got, vec![("alice", 200, 2), ("bob", 100, 1), ("charlie", 0, 0)]);
        assert_eq!(awards[1].tier, Tier::Silver);
    }

    #[test]
    fn upset_winner_collects_bonus() {
        let p = EngineParams::default();
        // Bronze member finished with the best tag this round.
        let awards = score_round(
            &[part("gold", 2, Tier::Gold, 10), part("underdog", 1, Tier::Bronze, 10)],
            &p,
        );
        assert_eq!(awards[0].member_id.as_str(), "underdog");
        assert_eq!(awards[0].points, 200);
    }

    #[test]
    fn empty_round() {
        assert!(score_round(&[], &EngineParams::default()).is_empty());
    }

    proptest! {
        #[test]
        fn opponents_beaten_total(n in 0usize..40) {
            let ps: Vec<RoundParticipant> = (0..n)
                .map(|i| part(&format!("m{i}"), (n - i) as u32, Tier::Bronze, 0))
                .collect();
            let awards = score_round(&ps, &EngineParams::default());
            let total: u64 = awards.iter().map(|a| u64::from(a.opponents_beaten)).sum();
            prop_assert_eq!(total, (n * n.saturating_sub(1) / 2) as u64);
            prop_assert_eq!(awards.len(), n);
        }
    }
}
