//! Closed-pool reassignment among members who already hold a tag.
//!
//! Contract:
//! - Only inputs with `current_tag = Some(_)` take part; everyone else is
//!   ignored (no tag granted, no error).
//! - The pool is exactly the eligible members' tags, sorted ascending.
//! - Members are ordered by `(finish_rank, current_tag, member_id)`; pool[i]
//!   goes to the i-th member.
//! - Only real moves are emitted. The result is a permutation of the pool.

use std::collections::BTreeMap;

use tg_core::{
    determinism::StableOrd, MemberId, TagAllocationInput, TagChange, TagNumber,
};

/// Reassign the eligible members' tags by finish order.
pub fn allocate_closed_pool(inputs: &[TagAllocationInput]) -> Vec<TagChange> {
    let mut eligible: Vec<(&TagAllocationInput, TagNumber)> = inputs
        .iter()
        .filter_map(|i| i.current_tag.map(|t| (i, t)))
        .collect();
    if eligible.is_empty() {
        return Vec::new();
    }

    let holder_of: BTreeMap<TagNumber, &MemberId> =
        eligible.iter().map(|(i, t)| (*t, &i.member_id)).collect();

    let mut pool: Vec<TagNumber> = eligible.iter().map(|(_, t)| *t).collect();
    pool.sort_unstable();

    eligible.sort_by(|a, b| a.0.stable_cmp(b.0));

    eligible
        .iter()
        .zip(pool)
        .filter(|((_, held), assigned)| held != assigned)
        .map(|((input, _), assigned)| TagChange {
            tag: assigned,
            previous_holder: holder_of.get(&assigned).map(|m| (*m).clone()),
            new_holder: input.member_id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mid(s: &str) -> MemberId { s.parse().unwrap() }
    fn tag(n: u32) -> TagNumber { TagNumber::new(n).unwrap() }
    fn input(m: &str, rank: u32, cur: u32) -> TagAllocationInput {
        TagAllocationInput { member_id: mid(m), finish_rank: rank, current_tag: TagNumber::new(cur) }
    }

    #[test]
    fn two_member_swap() {
        let changes = allocate_closed_pool(&[input("alice", 2, 1), input("bob", 1, 2)]);
        assert_eq!(
            changes,
            vec![
                TagChange { tag: tag(1), previous_holder: Some(mid("alice")), new_holder: mid("bob") },
                TagChange { tag: tag(2), previous_holder: Some(mid("bob")), new_holder: mid("alice") },
            ]
        );
    }

    #[test]
    fn untagged_members_are_ignored() {
        let changes = allocate_closed_pool(&[
            input("newbie", 1, 0),
            input("alice", 2, 7),
            input("bob", 3, 3),
        ]);
        // Pool {3, 7}: alice takes 3, bob takes 7; newbie gets nothing.
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.new_holder != mid("newbie")));
        assert_eq!(changes[0].tag, tag(3));
        assert_eq!(changes[0].new_holder, mid("alice"));
    }

    #[test]
    fn no_op_moves_are_suppressed() {
        let changes = allocate_closed_pool(&[input("a", 1, 1), input("b", 2, 2)]);
        assert!(changes.is_empty());
    }

    #[test]
    fn finish_tie_keeps_better_tag_first() {
        let changes = allocate_closed_pool(&[input("a", 1, 4), input("b", 1, 2), input("c", 0, 9)]);
        // Order: c (rank 0), b (rank 1, tag 2), a (rank 1, tag 4) over pool {2, 4, 9}.
        let got: Vec<(u32, &str)> = changes.iter().map(|c| (c.tag.get(), c.new_holder.as_str())).collect();
        assert_eq!(got, vec![(2, "c"), (4, "b"), (9, "a")]);
    }

    #[test]
    fn empty_pool() {
        assert!(allocate_closed_pool(&[]).is_empty());
        assert!(allocate_closed_pool(&[input("x", 1, 0)]).is_empty());
    }

    proptest! {
        #[test]
        fn result_is_a_permutation_of_the_pool(
            ranks in proptest::collection::vec(1u32..6, 1..12),
            untagged in proptest::collection::vec(any::<bool>(), 12),
        ) {
            let inputs: Vec<TagAllocationInput> = ranks
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let cur = if untagged[i] { 0 } else { (i as u32) * 3 + 1 };
                    input(&format!("m{i}"), *r, cur)
                })
                .collect();
            let mut state: BTreeMap<MemberId, TagNumber> = inputs
                .iter()
                .filter_map(|i| i.current_tag.map(|t| (i.member_id.clone(), t)))
                .collect();
            let mut before: Vec<TagNumber> = state.values().copied().collect();
            before.sort();

            let changes = allocate_closed_pool(&inputs);
            for c in &changes {
                prop_assert!(state.contains_key(&c.new_holder), "ineligible member received a tag");
                state.insert(c.new_holder.clone(), c.tag);
            }
            let mut after: Vec<TagNumber> = state.values().copied().collect();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }
}
