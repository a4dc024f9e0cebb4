//! Leaderboard slot builder and ordered single insertion.
//!
//! Input pairs are `"tag:member"` strings. Malformed pairs are skipped
//! silently; callers that need strict checking validate upstream.

use std::collections::{BTreeMap, BTreeSet};

use tg_core::{LeaderboardSlotMap, MemberId, TagNumber};

/// Parse `"tag:member"`. Returns `None` for anything malformed.
pub fn parse_assignment_pair(s: &str) -> Option<(TagNumber, MemberId)> {
    let (tag, member) = s.split_once(':')?;
    let tag: TagNumber = tag.trim().parse().ok()?;
    let member: MemberId = member.trim().parse().ok()?;
    Some((tag, member))
}

/// Fold a new finish order into the current slot map.
///
/// 1. Current holders that appear in the new pairs are re-seated from slot 1
///    upward, keeping their current relative order.
/// 2. New-pair members not yet seated follow, in pair tag order.
/// 3. Current holders the new pairs don't mention keep their slot number; if
///    that slot is already taken they move to the lowest free slot.
pub fn build_leaderboard_slots<S: AsRef<str>>(
    current: &LeaderboardSlotMap,
    new_pairs: &[S],
) -> LeaderboardSlotMap {
    let intents: BTreeMap<TagNumber, MemberId> = new_pairs
        .iter()
        .filter_map(|p| parse_assignment_pair(p.as_ref()))
        .collect();
    let intent_members: BTreeSet<&MemberId> = intents.values().collect();

    let mut out = LeaderboardSlotMap::new();
    let mut seated: BTreeSet<MemberId> = BTreeSet::new();

    for member in current.values() {
        if intent_members.contains(member) && seated.insert(member.clone()) {
            let slot = lowest_free_slot(&out);
            out.insert(slot, member.clone());
        }
    }

    for member in intents.values() {
        if seated.insert(member.clone()) {
            let slot = lowest_free_slot(&out);
            out.insert(slot, member.clone());
        }
    }

    for (tag, member) in current {
        if seated.insert(member.clone()) {
            let slot = if out.contains_key(tag) { lowest_free_slot(&out) } else { *tag };
            out.insert(slot, member.clone());
        }
    }

    out
}

/// Insert `member` at `tag`, re-seating current holders from slot 1 in order.
///
/// The new holder goes in front of the first holder whose original tag is at
/// or beyond `tag`; with no such holder it is appended at the end. The
/// requested tag itself counts as the insertion point, so its holder moves
/// down behind the newcomer. Slots are compacted from 1, so on a board with
/// gaps the newcomer can land below `tag`. A member already on the board is
/// moved rather than duplicated.
pub fn insert_tag_holder(
    current: &LeaderboardSlotMap,
    tag: TagNumber,
    member: &MemberId,
) -> LeaderboardSlotMap {
    let mut out = LeaderboardSlotMap::new();
    let mut next = 0usize;
    let mut inserted = false;

    for (original, holder) in current {
        if holder == member {
            continue;
        }
        if !inserted && *original >= tag {
            out.insert(TagNumber::from_index(next), member.clone());
            next += 1;
            inserted = true;
        }
        out.insert(TagNumber::from_index(next), holder.clone());
        next += 1;
    }
    if !inserted {
        out.insert(TagNumber::from_index(next), member.clone());
    }
    out
}

fn lowest_free_slot(slots: &LeaderboardSlotMap) -> TagNumber {
    let mut candidate = 1u32;
    for t in slots.keys() {
        match t.get().cmp(&candidate) {
            core::cmp::Ordering::Equal => candidate += 1,
            core::cmp::Ordering::Greater => break,
            core::cmp::Ordering::Less => {}
        }
    }
    TagNumber::new(candidate).unwrap_or(TagNumber::from_index(0))
}
