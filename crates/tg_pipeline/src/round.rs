//! Round processing: validate → fingerprint → allocate → project → stats → score.
//!
//! Pure over its inputs. The engine owns the state, applies the resulting
//! board through the batch collaborator and records stats and awards.
//!
//! Determinism:
//! - Allocation and scoring use the canonical orders from `tg_core::determinism`.
//! - Bonus eligibility and tier come from the member's stats *before* the
//!   round; the post-round best tag and tier are reported for the next one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tg_algo::allocation::{
    allocate_closed_pool, allocate_from_reset, apply_changes_to_slots, project_final_state,
    slots_by_member,
};
use tg_algo::{classify_tier, score_round, update_best_tag_ever};
use tg_core::{
    determinism::sort_canonical, EngineParams, LeaderboardSlotMap, MemberId, MemberStats,
    MemberTagAssignment, PointAward, ResolvedSeason, RoundInput, RoundParticipant, Sha256,
    TagAllocationInput, TagChange, TagNumber,
};
use tg_io::hasher::fingerprint;

use crate::season::should_award_points;
use crate::PipelineError;

/// How a round moves tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    /// Closed-pool reassignment among current tag holders.
    #[default]
    Standard,
    /// Full reset: tags 1..N by finish order.
    Qualifying,
}

/// Everything `process_round` reads besides the results.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub params: &'a EngineParams,
    pub season: &'a ResolvedSeason,
    /// Board before the round.
    pub slots: &'a LeaderboardSlotMap,
    /// Stats before the round; missing members start from default.
    pub stats: &'a BTreeMap<MemberId, MemberStats>,
    /// Fingerprint recorded the last time this round was processed.
    pub previous_fingerprint: Option<&'a Sha256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub fingerprint: Sha256,
    pub changes: Vec<TagChange>,
    pub slots: LeaderboardSlotMap,
    pub snapshot: Vec<MemberTagAssignment>,
    /// Post-round stats of every participant.
    pub stats: BTreeMap<MemberId, MemberStats>,
    /// Empty off-season.
    pub awards: Vec<PointAward>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundDisposition {
    /// Results hash to the recorded fingerprint; nothing to do.
    Unchanged { fingerprint: Sha256 },
    Processed(RoundOutcome),
}

/// Structural checks on a round's results.
pub fn validate_results(results: &[RoundInput]) -> Result<(), PipelineError> {
    if results.is_empty() {
        return Err(PipelineError::Validation("round has no results".into()));
    }
    let mut seen = BTreeSet::new();
    for r in results {
        if r.finish_rank == 0 {
            return Err(PipelineError::Validation(format!(
                "{}: finish_rank must be >= 1",
                r.member_id
            )));
        }
        if !seen.insert(&r.member_id) {
            return Err(PipelineError::Validation(format!("{} listed twice", r.member_id)));
        }
    }
    Ok(())
}

pub fn process_round(
    kind: RoundKind,
    results: &[RoundInput],
    ctx: &RoundContext<'_>,
) -> Result<RoundDisposition, PipelineError> {
    validate_results(results)?;

    let fp = fingerprint(results)?;
    if ctx.previous_fingerprint == Some(&fp) {
        debug!(fingerprint = %fp, "round unchanged");
        return Ok(RoundDisposition::Unchanged { fingerprint: fp });
    }

    let mut ordered = results.to_vec();
    sort_canonical(&mut ordered);

    let held = slots_by_member(ctx.slots);
    let (changes, slots, snapshot) = match kind {
        RoundKind::Standard => {
            let inputs: Vec<TagAllocationInput> = ordered
                .iter()
                .map(|r| TagAllocationInput {
                    member_id: r.member_id.clone(),
                    finish_rank: r.finish_rank,
                    current_tag: held.get(&r.member_id).copied(),
                })
                .collect();
            let changes = allocate_closed_pool(&inputs);
            let slots = apply_changes_to_slots(ctx.slots, &changes);
            let snapshot = project_final_state(&held, &changes);
            (changes, slots, snapshot)
        }
        RoundKind::Qualifying => {
            if ordered.len() > ctx.params.max_tag as usize {
                return Err(PipelineError::Validation(format!(
                    "{} finishers exceed max_tag {}",
                    ordered.len(),
                    ctx.params.max_tag
                )));
            }
            let order: Vec<MemberId> = ordered.iter().map(|r| r.member_id.clone()).collect();
            let changes = allocate_from_reset(&order);
            let slots = apply_changes_to_slots(&LeaderboardSlotMap::new(), &changes);
            let snapshot = project_final_state(&BTreeMap::new(), &changes);
            (changes, slots, snapshot)
        }
    };

    let post: BTreeMap<&MemberId, TagNumber> = snapshot.iter().map(|a| (&a.member_id, a.tag)).collect();
    let total = u32::try_from(slots.len()).unwrap_or(u32::MAX);

    let mut stats = BTreeMap::new();
    let mut participants = Vec::new();
    for r in &ordered {
        let before = ctx.stats.get(&r.member_id).cloned().unwrap_or_default();
        let tag = post.get(&r.member_id).copied();
        let best = update_best_tag_ever(before.best_tag, tag);
        stats.insert(
            r.member_id.clone(),
            MemberStats {
                rounds_played: before.rounds_played.saturating_add(1),
                best_tag: best,
                tier: classify_tier(best, total, ctx.params),
            },
        );
        // Untagged finishers move no tags and score nothing.
        if let Some(tag) = tag {
            participants.push(RoundParticipant {
                member_id: r.member_id.clone(),
                tag,
                rounds_played: before.rounds_played,
                best_tag: best,
                tier: before.tier,
            });
        }
    }

    let awards = if should_award_points(ctx.season) {
        score_round(&participants, ctx.params)
    } else {
        Vec::new()
    };

    info!(
        fingerprint = %fp,
        kind = ?kind,
        count = results.len(),
        changes = changes.len(),
        awards = awards.len(),
        "round processed"
    );

    Ok(RoundDisposition::Processed(RoundOutcome {
        fingerprint: fp,
        changes,
        slots,
        snapshot,
        stats,
        awards,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::{SeasonId, Tier};

    fn mid(s: &str) -> MemberId { s.parse().unwrap() }
    fn tag(n: u32) -> TagNumber { TagNumber::new(n).unwrap() }
    fn ri(m: &str, rank: u32) -> RoundInput { RoundInput { member_id: mid(m), finish_rank: rank } }
    fn in_season() -> ResolvedSeason {
        ResolvedSeason { season_id: Some("s1".parse::<SeasonId>().unwrap()), is_active: true }
    }

    fn run(
        kind: RoundKind,
        results: &[RoundInput],
        slots: &LeaderboardSlotMap,
        season: &ResolvedSeason,
        prev: Option<&Sha256>,
    ) -> RoundDisposition {
        let params = EngineParams::default();
        let stats = BTreeMap::new();
        let ctx = RoundContext { params: &params, season, slots, stats: &stats, previous_fingerprint: prev };
        process_round(kind, results, &ctx).unwrap()
    }

    fn board() -> LeaderboardSlotMap {
        [(tag(1), mid("alice")), (tag(2), mid("bob")), (tag(3), mid("carol"))].into_iter().collect()
    }

    #[test]
    fn standard_round_reassigns_and_scores() {
        let results = [ri("carol", 1), ri("alice", 2), ri("bob", 3), ri("newbie", 4)];
        let RoundDisposition::Processed(out) = run(RoundKind::Standard, &results, &board(), &in_season(), None)
        else {
            panic!("expected processing");
        };
        let slots: Vec<(u32, &str)> = out.slots.iter().map(|(t, m)| (t.get(), m.as_str())).collect();
        assert_eq!(slots, vec![(1, "carol"), (2, "alice"), (3, "bob")]);
        // Newbie played but holds no tag: counted, not scored.
        assert_eq!(out.stats[&mid("newbie")].rounds_played, 1);
        assert_eq!(out.stats[&mid("newbie")].best_tag, None);
        assert_eq!(out.awards.len(), 3);
        assert_eq!(out.awards[0].member_id, mid("carol"));
        assert_eq!(out.awards[0].opponents_beaten, 2);
        assert_eq!(out.stats[&mid("carol")].tier, Tier::Gold);
    }

    #[test]
    fn off_season_moves_tags_without_points() {
        let results = [ri("bob", 1), ri("alice", 2)];
        let RoundDisposition::Processed(out) =
            run(RoundKind::Standard, &results, &board(), &ResolvedSeason::off_season(), None)
        else {
            panic!("expected processing");
        };
        assert_eq!(out.changes.len(), 2);
        assert!(out.awards.is_empty());
    }

    #[test]
    fn qualifying_round_resets_board() {
        let results = [ri("zed", 1), ri("alice", 2)];
        let RoundDisposition::Processed(out) = run(RoundKind::Qualifying, &results, &board(), &in_season(), None)
        else {
            panic!("expected processing");
        };
        let snap: Vec<(u32, &str)> = out.snapshot.iter().map(|a| (a.tag.get(), a.member_id.as_str())).collect();
        assert_eq!(snap, vec![(1, "zed"), (2, "alice")]);
        assert_eq!(out.slots.len(), 2);
    }

    #[test]
    fn same_results_are_skipped() {
        let results = [ri("bob", 1), ri("alice", 2)];
        let fp = fingerprint(&results).unwrap();
        let d = run(RoundKind::Standard, &[ri("alice", 2), ri("bob", 1)], &board(), &in_season(), Some(&fp));
        assert_eq!(d, RoundDisposition::Unchanged { fingerprint: fp });
    }

    #[test]
    fn malformed_results_are_validation_errors() {
        assert!(validate_results(&[]).is_err());
        assert!(validate_results(&[ri("a", 0)]).is_err());
        let err = validate_results(&[ri("a", 1), ri("a", 2)]).unwrap_err();
        assert!(err.is_validation());
    }
}
