//! Determinism utilities: stable total orders for entities that must sort
//! canonically before they are scored, allocated or hashed.
//!
//! Every order here ends with the member id so that no two distinct values
//! compare `Equal`; callers can use unstable sorts without losing determinism.

use core::cmp::Ordering;

use crate::entities::{MemberTagAssignment, RoundInput, RoundParticipant, TagAllocationInput};

/// Provide a **total**, stable order for values that must sort canonically.
pub trait StableOrd {
    fn stable_cmp(&self, other: &Self) -> Ordering;
}

impl StableOrd for RoundParticipant {
    /// Points order: `(tag asc, member_id asc)`.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.tag
            .cmp(&other.tag)
            .then_with(|| self.member_id.as_str().cmp(other.member_id.as_str()))
    }
}

impl StableOrd for RoundInput {
    /// Fingerprint order: `(finish_rank asc, member_id asc)`.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.finish_rank
            .cmp(&other.finish_rank)
            .then_with(|| self.member_id.as_str().cmp(other.member_id.as_str()))
    }
}

impl StableOrd for TagAllocationInput {
    /// Closed-pool order: `(finish_rank asc, current_tag asc, member_id asc)`.
    /// On a finish tie the member already holding the better tag keeps priority.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.finish_rank
            .cmp(&other.finish_rank)
            .then_with(|| self.current_tag.cmp(&other.current_tag))
            .then_with(|| self.member_id.as_str().cmp(other.member_id.as_str()))
    }
}

impl StableOrd for MemberTagAssignment {
    /// Snapshot order: `(tag asc, member_id asc)`.
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.tag
            .cmp(&other.tag)
            .then_with(|| self.member_id.as_str().cmp(other.member_id.as_str()))
    }
}

/// Sort any slice of `StableOrd` values **in place** into canonical order.
#[inline]
pub fn sort_canonical<T: StableOrd>(xs: &mut [T]) {
    xs.sort_by(|a, b| a.stable_cmp(b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Tier;
    use crate::ids::{MemberId, TagNumber};

    fn mid(s: &str) -> MemberId { s.parse().unwrap() }
    fn tag(n: u32) -> TagNumber { TagNumber::new(n).unwrap() }

    #[test]
    fn participants_sort_by_tag_then_member() {
        let p = |m: &str, t: u32| RoundParticipant {
            member_id: mid(m),
            tag: tag(t),
            rounds_played: 0,
            best_tag: None,
            tier: Tier::Bronze,
        };
        let mut xs = vec![p("carol", 2), p("bob", 1), p("alice", 2)];
        sort_canonical(&mut xs);
        let got: Vec<&str> = xs.iter().map(|x| x.member_id.as_str()).collect();
        assert_eq!(got, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn allocation_ties_prefer_better_current_tag() {
        let a = TagAllocationInput { member_id: mid("a"), finish_rank: 1, current_tag: Some(tag(5)) };
        let b = TagAllocationInput { member_id: mid("b"), finish_rank: 1, current_tag: Some(tag(2)) };
        assert_eq!(b.stable_cmp(&a), Ordering::Less);
    }

    #[test]
    fn round_inputs_sort_by_rank_then_member() {
        let mut xs = vec![
            RoundInput { member_id: mid("z"), finish_rank: 1 },
            RoundInput { member_id: mid("b"), finish_rank: 2 },
            RoundInput { member_id: mid("a"), finish_rank: 2 },
        ];
        sort_canonical(&mut xs);
        let got: Vec<(&str, u32)> = xs.iter().map(|x| (x.member_id.as_str(), x.finish_rank)).collect();
        assert_eq!(got, vec![("z", 1), ("a", 2), ("b", 2)]);
    }
}
