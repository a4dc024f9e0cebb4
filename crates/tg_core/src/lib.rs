//! tg_core: Core types, identifiers, tiers and engine parameters.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`tg_algo`, `tg_io`, `tg_pipeline`, `tg_cli`).
//!
//! - Identifiers: `MemberId`, `GuildId`, `SeasonId`, `TagNumber`, `Sha256`
//! - Entities: tag changes, allocation inputs, participants, awards, intents
//! - Deterministic ordering helpers
//! - `EngineParams` with domain validation
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod determinism;
pub mod entities;
pub mod ids;
pub mod variables;

pub use entities::{
    AssignmentSource, LeaderboardSlotMap, MemberStats, MemberTagAssignment, PointAward,
    ResolvedSeason, RoundInput, RoundParticipant, SeasonState, SwapIntent, TagAllocationInput,
    TagAssignmentRequest, TagChange, Tier,
};
pub use ids::{GuildId, IdError, MemberId, SeasonId, Sha256, TagNumber};
pub use variables::{EngineParams, ParamsError};
