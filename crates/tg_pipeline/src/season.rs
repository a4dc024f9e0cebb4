//! Season Policy Resolver.
//!
//! Decides which season a round's points belong to. A rollback season id
//! (recalculating a historical round) always wins; otherwise the guild's
//! active season; otherwise off-season, where tags move but no points accrue.

use tg_core::{ResolvedSeason, SeasonId, SeasonState};

use crate::PipelineError;

pub fn resolve_season(
    rollback_season_id: Option<&SeasonId>,
    active_season: Option<&SeasonState>,
) -> ResolvedSeason {
    if let Some(id) = rollback_season_id {
        return ResolvedSeason { season_id: Some(id.clone()), is_active: true };
    }
    match active_season {
        Some(s) if s.is_active => ResolvedSeason { season_id: Some(s.season_id.clone()), is_active: true },
        _ => ResolvedSeason::off_season(),
    }
}

#[inline]
pub fn should_award_points(resolved: &ResolvedSeason) -> bool {
    resolved.season_id.is_some()
}

/// Pre-condition check for starting a season. Uniqueness is checked by the
/// season owner, not here.
pub fn validate_season_start(season_id: &str, season_name: &str) -> Result<SeasonId, PipelineError> {
    if season_id.trim().is_empty() {
        return Err(PipelineError::Validation("season id is required".into()));
    }
    if season_name.trim().is_empty() {
        return Err(PipelineError::Validation("season name is required".into()));
    }
    season_id
        .parse()
        .map_err(|e| PipelineError::Validation(format!("season id {season_id:?}: {e}")))
}
