//! Inbound and outbound events of the league engine.
//!
//! JSON objects tagged by a snake_case `"type"` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tg_core::{
    AssignmentSource, GuildId, MemberId, MemberTagAssignment, PointAward, RoundInput, SeasonId,
    Sha256, TagChange, TagNumber,
};

use crate::round::RoundKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    RoundFinalized {
        guild_id: GuildId,
        round_id: String,
        #[serde(default)]
        kind: RoundKind,
        results: Vec<RoundInput>,
    },
    /// Reprocess a stored round. `results` replaces the stored results when given.
    RecalculateRound {
        guild_id: GuildId,
        round_id: String,
        #[serde(default)]
        results: Option<Vec<RoundInput>>,
        #[serde(default)]
        rollback_season_id: Option<SeasonId>,
    },
    SwapRequested {
        guild_id: GuildId,
        member_id: MemberId,
        target_tag: TagNumber,
        requested_at: DateTime<Utc>,
    },
    SwapCancelled {
        guild_id: GuildId,
        member_id: MemberId,
    },
    TagClaimRequested {
        guild_id: GuildId,
        member_id: MemberId,
        tag: TagNumber,
        requested_at: DateTime<Utc>,
    },
    /// Re-seat the whole guild from a stored round's finish order.
    TagResetRequested {
        guild_id: GuildId,
        round_id: String,
    },
    SeasonStartRequested {
        guild_id: GuildId,
        season_id: String,
        name: String,
        #[serde(default)]
        start: Option<DateTime<Utc>>,
    },
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::RoundFinalized { .. } => "round_finalized",
            InboundEvent::RecalculateRound { .. } => "recalculate_round",
            InboundEvent::SwapRequested { .. } => "swap_requested",
            InboundEvent::SwapCancelled { .. } => "swap_cancelled",
            InboundEvent::TagClaimRequested { .. } => "tag_claim_requested",
            InboundEvent::TagResetRequested { .. } => "tag_reset_requested",
            InboundEvent::SeasonStartRequested { .. } => "season_start_requested",
        }
    }

    pub fn guild_id(&self) -> &GuildId {
        match self {
            InboundEvent::RoundFinalized { guild_id, .. }
            | InboundEvent::RecalculateRound { guild_id, .. }
            | InboundEvent::SwapRequested { guild_id, .. }
            | InboundEvent::SwapCancelled { guild_id, .. }
            | InboundEvent::TagClaimRequested { guild_id, .. }
            | InboundEvent::TagResetRequested { guild_id, .. }
            | InboundEvent::SeasonStartRequested { guild_id, .. } => guild_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    /// The request itself is wrong.
    Validation,
    /// A store or leaderboard failed.
    Collaborator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    LeaderboardUpdated {
        guild_id: GuildId,
        source: AssignmentSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        round_id: Option<String>,
        changes: Vec<TagChange>,
        slots: Vec<MemberTagAssignment>,
    },
    PointsAwarded {
        guild_id: GuildId,
        round_id: String,
        season_id: SeasonId,
        awards: Vec<PointAward>,
    },
    RoundUnchanged {
        guild_id: GuildId,
        round_id: String,
        fingerprint: Sha256,
    },
    SwapPending {
        guild_id: GuildId,
        member_id: MemberId,
        current_tag: TagNumber,
        target_tag: TagNumber,
        chain_len: usize,
    },
    SwapExecuted {
        guild_id: GuildId,
        batch_id: String,
        cycle: Vec<MemberId>,
        slots: Vec<MemberTagAssignment>,
    },
    SwapFailed {
        guild_id: GuildId,
        member_id: MemberId,
        #[serde(skip_serializing_if = "Option::is_none")]
        batch_id: Option<String>,
        reason: String,
    },
    SwapCancelled {
        guild_id: GuildId,
        member_id: MemberId,
        existed: bool,
    },
    SeasonStarted {
        guild_id: GuildId,
        season_id: SeasonId,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_season_id: Option<SeasonId>,
    },
    Rejected {
        event: String,
        kind: RejectKind,
        reason: String,
    },
}

impl OutboundEvent {
    /// True for outcomes caused by a failing collaborator.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutboundEvent::SwapFailed { .. }
                | OutboundEvent::Rejected { kind: RejectKind::Collaborator, .. }
        )
    }
}
