//! Final-state projection: "who holds what" after a batch of changes.

use std::collections::BTreeMap;

use tg_core::{
    determinism::sort_canonical, LeaderboardSlotMap, MemberId, MemberTagAssignment, TagChange,
    TagNumber,
};

/// Copy `current_state`, apply every change as `new_holder -> tag`, and return
/// all pairs sorted by `(tag, member_id)`.
///
/// Applying the same changes twice gives the same snapshot as applying them once.
pub fn project_final_state(
    current_state: &BTreeMap<MemberId, TagNumber>,
    changes: &[TagChange],
) -> Vec<MemberTagAssignment> {
    let mut state = current_state.clone();
    for c in changes {
        state.insert(c.new_holder.clone(), c.tag);
    }
    let mut out: Vec<MemberTagAssignment> = state
        .into_iter()
        .map(|(member_id, tag)| MemberTagAssignment { member_id, tag })
        .collect();
    sort_canonical(&mut out);
    out
}

/// Apply changes to a slot map: the new holder leaves any slot they occupied
/// and takes the changed slot, displacing whoever was there.
pub fn apply_changes_to_slots(slots: &LeaderboardSlotMap, changes: &[TagChange]) -> LeaderboardSlotMap {
    let mut out = slots.clone();
    for c in changes {
        out.retain(|_, holder| *holder != c.new_holder);
        out.insert(c.tag, c.new_holder.clone());
    }
    out
}

/// Invert a slot map into member -> tag.
pub fn slots_by_member(slots: &LeaderboardSlotMap) -> BTreeMap<MemberId, TagNumber> {
    slots.iter().map(|(t, m)| (m.clone(), *t)).collect()
}
