//! tg_pipeline: orchestration of the tag engine.
//!
//! Season resolution, round processing, the batch tag-assignment contract,
//! the swap saga and the `LeagueEngine` event loop. Hashing and storage are
//! delegated to `tg_io`, math to `tg_algo`.

#![forbid(unsafe_code)]

pub mod batch;
pub mod engine;
pub mod error;
pub mod events;
pub mod round;
pub mod season;
pub mod swap_saga;

pub use batch::{AssignError, BatchTagAssigner, MemoryLeaderboard};
pub use engine::{LeagueEngine, PointEntry, Standing};
pub use error::PipelineError;
pub use events::{InboundEvent, OutboundEvent, RejectKind};
pub use round::{process_round, RoundContext, RoundDisposition, RoundKind, RoundOutcome};
pub use season::{resolve_season, should_award_points, validate_season_start};
pub use swap_saga::{detect_cycle, SagaError, SwapOutcome, SwapSagaCoordinator};
