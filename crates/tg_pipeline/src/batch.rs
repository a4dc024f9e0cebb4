//! Batch tag-assignment collaborator and its in-memory implementation.
//!
//! Contract:
//! - A batch is applied entirely or not at all.
//! - `Swap` and `Round` batches must be a permutation of the tags the
//!   requesting members hold right now; the closed-pool allocator re-derives
//!   the moves and must agree with every request.
//! - `Reset` batches replace the guild's whole board.
//! - `Claim` batches only take unheld tags.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tg_algo::allocation::{
    allocate_closed_pool, apply_changes_to_slots, insert_tag_holder, slots_by_member,
};
use tg_core::{
    AssignmentSource, GuildId, LeaderboardSlotMap, MemberId, TagAllocationInput,
    TagAssignmentRequest, TagNumber,
};
use tg_io::hasher::batch_id;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignError {
    /// The tag belongs to someone else; the request has to go through the swap saga.
    #[error("tag {tag} is held by {holder}; a swap is required")]
    SwapRequired { tag: TagNumber, holder: MemberId },

    #[error("batch {batch_id} rejected: {reason}")]
    Rejected { batch_id: String, reason: String },

    #[error("leaderboard unavailable: {0}")]
    Unavailable(String),
}

impl AssignError {
    /// Rejections are about the request, not the collaborator.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AssignError::Unavailable(_))
    }
}

#[async_trait]
pub trait BatchTagAssigner: Send + Sync {
    /// Apply all requests atomically and return the guild's resulting board.
    async fn assign_batch(
        &self,
        guild_id: &GuildId,
        requests: &[TagAssignmentRequest],
        batch_id: &str,
        source: AssignmentSource,
    ) -> Result<LeaderboardSlotMap, AssignError>;

    /// Give one member one tag.
    ///
    /// An unheld tag is granted directly. A tag held by another member fails
    /// with `SwapRequired` when the claimant already has a tag; an untagged
    /// claimant is inserted in front of the holder instead.
    async fn assign_single(
        &self,
        guild_id: &GuildId,
        member_id: &MemberId,
        tag: TagNumber,
    ) -> Result<LeaderboardSlotMap, AssignError>;

    async fn leaderboard(&self, guild_id: &GuildId) -> Result<LeaderboardSlotMap, AssignError>;
}

#[async_trait]
impl<T: BatchTagAssigner + ?Sized> BatchTagAssigner for Arc<T> {
    async fn assign_batch(
        &self,
        guild_id: &GuildId,
        requests: &[TagAssignmentRequest],
        batch_id: &str,
        source: AssignmentSource,
    ) -> Result<LeaderboardSlotMap, AssignError> {
        (**self).assign_batch(guild_id, requests, batch_id, source).await
    }

    async fn assign_single(
        &self,
        guild_id: &GuildId,
        member_id: &MemberId,
        tag: TagNumber,
    ) -> Result<LeaderboardSlotMap, AssignError> {
        (**self).assign_single(guild_id, member_id, tag).await
    }

    async fn leaderboard(&self, guild_id: &GuildId) -> Result<LeaderboardSlotMap, AssignError> {
        (**self).leaderboard(guild_id).await
    }
}

/* ------------------------------ In-memory board ------------------------------ */

/// Every guild's board behind one lock.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    boards: RwLock<BTreeMap<GuildId, LeaderboardSlotMap>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a guild's board.
    pub async fn set_slots(&self, guild_id: &GuildId, slots: LeaderboardSlotMap) {
        self.boards.write().await.insert(guild_id.clone(), slots);
    }
}

fn reject(batch_id: &str, reason: impl Into<String>) -> AssignError {
    AssignError::Rejected { batch_id: batch_id.to_string(), reason: reason.into() }
}

fn check_distinct(batch_id: &str, requests: &[TagAssignmentRequest]) -> Result<(), AssignError> {
    let mut members = BTreeSet::new();
    let mut tags = BTreeSet::new();
    for r in requests {
        if !members.insert(&r.member_id) {
            return Err(reject(batch_id, format!("member {} appears twice", r.member_id)));
        }
        if !tags.insert(r.tag) {
            return Err(reject(batch_id, format!("tag {} requested twice", r.tag)));
        }
    }
    Ok(())
}

/// Closed-pool re-validation: requested tags must permute the requesters' held tags.
fn apply_permutation(
    board: &LeaderboardSlotMap,
    requests: &[TagAssignmentRequest],
    batch_id: &str,
) -> Result<LeaderboardSlotMap, AssignError> {
    let held = slots_by_member(board);
    let mut inputs = Vec::with_capacity(requests.len());
    for r in requests {
        let current = held
            .get(&r.member_id)
            .copied()
            .ok_or_else(|| reject(batch_id, format!("member {} holds no tag", r.member_id)))?;
        inputs.push(TagAllocationInput {
            member_id: r.member_id.clone(),
            finish_rank: r.tag.get(),
            current_tag: Some(current),
        });
    }

    let held_tags: BTreeSet<TagNumber> = inputs.iter().filter_map(|i| i.current_tag).collect();
    let wanted_tags: BTreeSet<TagNumber> = requests.iter().map(|r| r.tag).collect();
    if held_tags != wanted_tags {
        return Err(reject(batch_id, "requested tags are not the tags the members hold"));
    }

    let changes = allocate_closed_pool(&inputs);
    let wanted: BTreeMap<&MemberId, TagNumber> = requests.iter().map(|r| (&r.member_id, r.tag)).collect();
    if let Some(c) = changes.iter().find(|c| wanted.get(&c.new_holder) != Some(&c.tag)) {
        return Err(reject(batch_id, format!("allocation disagrees for {}", c.new_holder)));
    }
    Ok(apply_changes_to_slots(board, &changes))
}

fn apply_claims(
    board: &LeaderboardSlotMap,
    requests: &[TagAssignmentRequest],
) -> Result<LeaderboardSlotMap, AssignError> {
    let mut out = board.clone();
    for r in requests {
        match out.get(&r.tag) {
            Some(holder) if *holder == r.member_id => continue,
            Some(holder) => {
                return Err(AssignError::SwapRequired { tag: r.tag, holder: holder.clone() })
            }
            None => {
                out.retain(|_, m| *m != r.member_id);
                out.insert(r.tag, r.member_id.clone());
            }
        }
    }
    Ok(out)
}

#[async_trait]
impl BatchTagAssigner for MemoryLeaderboard {
    async fn assign_batch(
        &self,
        guild_id: &GuildId,
        requests: &[TagAssignmentRequest],
        batch_id: &str,
        source: AssignmentSource,
    ) -> Result<LeaderboardSlotMap, AssignError> {
        check_distinct(batch_id, requests)?;

        let mut boards = self.boards.write().await;
        let board = boards.get(guild_id).cloned().unwrap_or_default();
        let next = match source {
            AssignmentSource::Swap | AssignmentSource::Round => {
                apply_permutation(&board, requests, batch_id)?
            }
            AssignmentSource::Claim => apply_claims(&board, requests)?,
            AssignmentSource::Reset => {
                requests.iter().map(|r| (r.tag, r.member_id.clone())).collect()
            }
        };
        info!(
            guild_id = %guild_id,
            batch_id,
            source = source.as_str(),
            count = requests.len(),
            "batch applied"
        );
        boards.insert(guild_id.clone(), next.clone());
        Ok(next)
    }

    async fn assign_single(
        &self,
        guild_id: &GuildId,
        member_id: &MemberId,
        tag: TagNumber,
    ) -> Result<LeaderboardSlotMap, AssignError> {
        let request = TagAssignmentRequest { member_id: member_id.clone(), tag };
        let id = batch_id(AssignmentSource::Claim, guild_id, std::slice::from_ref(&request))
            .map_err(|e| AssignError::Unavailable(e.to_string()))?;

        let mut boards = self.boards.write().await;
        let board = boards.get(guild_id).cloned().unwrap_or_default();
        let claimant_tagged = board.values().any(|m| m == member_id);

        let next = match board.get(&tag) {
            Some(holder) if holder != member_id && !claimant_tagged => {
                debug!(guild_id = %guild_id, member_id = %member_id, tag = tag.get(), "ordered insert");
                insert_tag_holder(&board, tag, member_id)
            }
            _ => apply_claims(&board, std::slice::from_ref(&request))?,
        };
        info!(guild_id = %guild_id, batch_id = %id, member_id = %member_id, tag = tag.get(), "tag claimed");
        boards.insert(guild_id.clone(), next.clone());
        Ok(next)
    }

    async fn leaderboard(&self, guild_id: &GuildId) -> Result<LeaderboardSlotMap, AssignError> {
        Ok(self.boards.read().await.get(guild_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mid(s: &str) -> MemberId { s.parse().unwrap() }
    fn tag(n: u32) -> TagNumber { TagNumber::new(n).unwrap() }
    fn req(m: &str, t: u32) -> TagAssignmentRequest { TagAssignmentRequest { member_id: mid(m), tag: tag(t) } }
    fn flat(b: &LeaderboardSlotMap) -> Vec<(u32, String)> {
        b.iter().map(|(t, m)| (t.get(), m.to_string())).collect()
    }

    async fn seeded() -> (MemoryLeaderboard, GuildId) {
        let lb = MemoryLeaderboard::new();
        let g: GuildId = "g1".parse().unwrap();
        lb.set_slots(&g, [(tag(1), mid("a")), (tag(2), mid("b")), (tag(3), mid("c"))].into_iter().collect())
            .await;
        (lb, g)
    }

    #[tokio::test]
    async fn swap_batch_permutes_holders() {
        let (lb, g) = seeded().await;
        let out = lb
            .assign_batch(&g, &[req("a", 3), req("c", 1)], "SWAP-x", AssignmentSource::Swap)
            .await
            .unwrap();
        assert_eq!(flat(&out), vec![(1, "c".into()), (2, "b".into()), (3, "a".into())]);
    }

    #[tokio::test]
    async fn stale_swap_is_rejected_and_board_untouched() {
        let (lb, g) = seeded().await;
        // a asks for 2 but b is not part of the batch.
        let err = lb
            .assign_batch(&g, &[req("a", 2), req("c", 1)], "SWAP-y", AssignmentSource::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignError::Rejected { .. }));
        assert!(err.is_rejection());
        let board = lb.leaderboard(&g).await.unwrap();
        assert_eq!(board.get(&tag(1)), Some(&mid("a")));
    }

    #[tokio::test]
    async fn duplicate_requests_are_rejected() {
        let (lb, g) = seeded().await;
        let err = lb
            .assign_batch(&g, &[req("a", 2), req("a", 1)], "SWAP-z", AssignmentSource::Swap)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignError::Rejected { .. }));
    }

    #[tokio::test]
    async fn reset_replaces_board() {
        let (lb, g) = seeded().await;
        let out = lb
            .assign_batch(&g, &[req("z", 1), req("a", 2)], "RESET-1", AssignmentSource::Reset)
            .await
            .unwrap();
        assert_eq!(flat(&out), vec![(1, "z".into()), (2, "a".into())]);
    }

    #[tokio::test]
    async fn single_claims() {
        let (lb, g) = seeded().await;
        // Unheld tag: direct grant, old slot vacated.
        let out = lb.assign_single(&g, &mid("b"), tag(9)).await.unwrap();
        assert_eq!(flat(&out), vec![(1, "a".into()), (3, "c".into()), (9, "b".into())]);
        // Held tag, tagged claimant: swap required.
        let err = lb.assign_single(&g, &mid("c"), tag(1)).await.unwrap_err();
        assert_eq!(err, AssignError::SwapRequired { tag: tag(1), holder: mid("a") });
        // Held tag, untagged claimant: ordered insert.
        let out = lb.assign_single(&g, &mid("n"), tag(3)).await.unwrap();
        assert_eq!(
            flat(&out),
            vec![(1, "a".into()), (2, "n".into()), (3, "c".into()), (4, "b".into())]
        );
    }
}
