//! Full reset allocation from a qualifying round's finish order.
//!
//! Tag `i + 1` goes to `finish_order[i]`, unconditionally. The caller clears
//! every prior tag of the guild before applying the result, so no change
//! carries a previous holder.

use tg_core::{MemberId, TagChange, TagNumber};

pub fn allocate_from_reset(finish_order: &[MemberId]) -> Vec<TagChange> {
    finish_order
        .iter()
        .enumerate()
        .map(|(i, member)| TagChange {
            tag: TagNumber::from_index(i),
            previous_holder: None,
            new_holder: member.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_position_is_a_change() {
        let order: Vec<MemberId> = ["c", "a", "b"].iter().map(|s| s.parse().unwrap()).collect();
        let changes = allocate_from_reset(&order);
        let got: Vec<(u32, &str)> = changes.iter().map(|c| (c.tag.get(), c.new_holder.as_str())).collect();
        assert_eq!(got, vec![(1, "c"), (2, "a"), (3, "b")]);
        assert!(changes.iter().all(|c| c.previous_holder.is_none()));
    }

    #[test]
    fn empty_order() {
        assert!(allocate_from_reset(&[]).is_empty());
    }
}
