//! Domain entities shared by the algorithm, I/O and pipeline layers.
//!
//! Everything here is plain data. Invariants that span several values
//! (unique holders, one live intent per member) are enforced by the layers
//! that own the state, not by these types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::{GuildId, MemberId, SeasonId, TagNumber};

/// Full guild tag assignment: slot -> holder. Keys need not be contiguous.
pub type LeaderboardSlotMap = BTreeMap<TagNumber, MemberId>;

/// Percentile band of a member's best tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Tier {
    Gold,
    Silver,
    #[default]
    Bronze,
}

impl Tier {
    /// 0 for the top band, 2 for the bottom band.
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            Tier::Gold => 0,
            Tier::Silver => 1,
            Tier::Bronze => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Gold => "gold",
            Tier::Silver => "silver",
            Tier::Bronze => "bronze",
        }
    }
}

/// One resulting reassignment. Emitted only where the holder actually changed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TagChange {
    pub tag: TagNumber,
    pub previous_holder: Option<MemberId>,
    pub new_holder: MemberId,
}

/// One participant's allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TagAllocationInput {
    pub member_id: MemberId,
    /// 1-based finish position.
    pub finish_rank: u32,
    /// `None` = not in the closed pool.
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_tag: Option<TagNumber>,
}

/// Participant as seen by the points engine (tags are post-allocation).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundParticipant {
    pub member_id: MemberId,
    pub tag: TagNumber,
    pub rounds_played: u32,
    /// Season-best tag; `None` when the member never held one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub best_tag: Option<TagNumber>,
    pub tier: Tier,
}

/// Result of scoring one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointAward {
    pub member_id: MemberId,
    pub points: u64,
    pub opponents_beaten: u32,
    pub tier: Tier,
}

/// A guild's season configuration. At most one active season per guild.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeasonState {
    pub season_id: SeasonId,
    pub name: String,
    pub is_active: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub start: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub end: Option<DateTime<Utc>>,
}

/// Season context chosen for one round. `season_id == None` means off-season.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolvedSeason {
    pub season_id: Option<SeasonId>,
    pub is_active: bool,
}

impl ResolvedSeason {
    pub fn off_season() -> Self {
        Self::default()
    }
}

/// A member's standing request to acquire a tag. One live intent per (guild, member).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwapIntent {
    pub guild_id: GuildId,
    pub member_id: MemberId,
    pub current_tag: TagNumber,
    pub target_tag: TagNumber,
    pub requested_at: DateTime<Utc>,
}

/// Minimal round state fed to the idempotency fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundInput {
    pub member_id: MemberId,
    pub finish_rank: u32,
}

/// One (member, tag) pair of a final-state snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemberTagAssignment {
    pub member_id: MemberId,
    pub tag: TagNumber,
}

/// "Give `member_id` tag `tag`" as handed to the batch-assignment collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TagAssignmentRequest {
    pub member_id: MemberId,
    pub tag: TagNumber,
}

/// Why a batch of assignments is being applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AssignmentSource {
    /// Closed cycle of swap intents.
    Swap,
    /// A single member claiming an unheld tag.
    Claim,
    /// Closed-pool reassignment after a round.
    Round,
    /// Full reset from a qualifying round.
    Reset,
}

impl AssignmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentSource::Swap => "swap",
            AssignmentSource::Claim => "claim",
            AssignmentSource::Round => "round",
            AssignmentSource::Reset => "reset",
        }
    }
}

/// Running per-member counters the points engine reads.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemberStats {
    pub rounds_played: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub best_tag: Option<TagNumber>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tier: Tier,
}
