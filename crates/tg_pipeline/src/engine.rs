//! League engine: turns inbound events into state changes and outbound events.
//!
//! Round, season and points bookkeeping live in one in-process state behind
//! an async mutex. Tags live in the batch collaborator and pending swaps in
//! the intent store, so those paths go through the swap saga instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tg_algo::allocation::{allocate_from_reset, slots_by_member};
use tg_core::{
    determinism::sort_canonical, AssignmentSource, EngineParams, GuildId, LeaderboardSlotMap,
    MemberId, MemberStats, MemberTagAssignment, PointAward, ResolvedSeason, RoundInput, SeasonId,
    SeasonState, Sha256, SwapIntent, TagAssignmentRequest, TagChange, TagNumber, Tier,
};
use tg_io::hasher::batch_id;
use tg_io::intent_store::IntentStore;

use crate::batch::{AssignError, BatchTagAssigner};
use crate::events::{InboundEvent, OutboundEvent, RejectKind};
use crate::round::{process_round, RoundContext, RoundDisposition, RoundKind};
use crate::season::{resolve_season, should_award_points, validate_season_start};
use crate::swap_saga::{SagaError, SwapOutcome, SwapSagaCoordinator};
use crate::PipelineError;

/// One member's award for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEntry {
    pub round_id: String,
    pub season_id: SeasonId,
    pub member_id: MemberId,
    pub points: u64,
    pub opponents_beaten: u32,
    pub tier: Tier,
}

/// Season total of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub member_id: MemberId,
    pub total_points: u64,
    pub rounds_scored: u32,
}

#[derive(Debug, Clone)]
struct RoundRecord {
    kind: RoundKind,
    results: Vec<RoundInput>,
    fingerprint: Sha256,
    season_id: Option<SeasonId>,
    pre_slots: LeaderboardSlotMap,
    pre_stats: BTreeMap<MemberId, MemberStats>,
}

#[derive(Debug, Default)]
struct GuildState {
    seasons: Vec<SeasonState>,
    rounds: BTreeMap<String, RoundRecord>,
    stats: BTreeMap<MemberId, MemberStats>,
    ledger: Vec<PointEntry>,
}

impl GuildState {
    fn active_season(&self) -> Option<&SeasonState> {
        self.seasons.iter().find(|s| s.is_active)
    }

    fn record_awards(&mut self, round_id: &str, season_id: &SeasonId, awards: &[PointAward]) {
        self.ledger.extend(awards.iter().map(|a| PointEntry {
            round_id: round_id.to_string(),
            season_id: season_id.clone(),
            member_id: a.member_id.clone(),
            points: a.points,
            opponents_beaten: a.opponents_beaten,
            tier: a.tier,
        }));
    }
}

fn snapshot(slots: &LeaderboardSlotMap) -> Vec<MemberTagAssignment> {
    slots
        .iter()
        .map(|(tag, m)| MemberTagAssignment { member_id: m.clone(), tag: *tag })
        .collect()
}

/// Slots whose holder differs between two boards.
fn diff_boards(before: &LeaderboardSlotMap, after: &LeaderboardSlotMap) -> Vec<TagChange> {
    after
        .iter()
        .filter(|(tag, holder)| before.get(*tag) != Some(*holder))
        .map(|(tag, holder)| TagChange {
            tag: *tag,
            previous_holder: before.get(tag).cloned(),
            new_holder: holder.clone(),
        })
        .collect()
}

fn requests_from(changes: &[TagChange]) -> Vec<TagAssignmentRequest> {
    changes
        .iter()
        .map(|c| TagAssignmentRequest { member_id: c.new_holder.clone(), tag: c.tag })
        .collect()
}

pub struct LeagueEngine<S, A> {
    params: EngineParams,
    assigner: Arc<A>,
    saga: SwapSagaCoordinator<S, Arc<A>>,
    state: Mutex<BTreeMap<GuildId, GuildState>>,
}

impl<S: IntentStore, A: BatchTagAssigner> LeagueEngine<S, A> {
    pub fn new(params: EngineParams, store: S, assigner: Arc<A>) -> Self {
        let saga = SwapSagaCoordinator::new(store, Arc::clone(&assigner), &params);
        Self { params, assigner, saga, state: Mutex::new(BTreeMap::new()) }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn saga(&self) -> &SwapSagaCoordinator<S, Arc<A>> {
        &self.saga
    }

    /// Handle one event; failures come back as `Rejected` events.
    pub async fn handle(&self, event: InboundEvent) -> Vec<OutboundEvent> {
        let kind = event.kind();
        let guild_id = event.guild_id().clone();
        match self.try_handle(event).await {
            Ok(out) => out,
            Err(e) => {
                let reject = if e.is_validation() { RejectKind::Validation } else { RejectKind::Collaborator };
                match reject {
                    RejectKind::Validation => debug!(guild_id = %guild_id, event = kind, error = %e, "event rejected"),
                    RejectKind::Collaborator => warn!(guild_id = %guild_id, event = kind, error = %e, "event failed"),
                }
                vec![OutboundEvent::Rejected { event: kind.to_string(), kind: reject, reason: e.to_string() }]
            }
        }
    }

    pub async fn try_handle(&self, event: InboundEvent) -> Result<Vec<OutboundEvent>, PipelineError> {
        match event {
            InboundEvent::RoundFinalized { guild_id, round_id, kind, results } => {
                self.round_finalized(guild_id, round_id, kind, results).await
            }
            InboundEvent::RecalculateRound { guild_id, round_id, results, rollback_season_id } => {
                let mut state = self.state.lock().await;
                let guild = state.entry(guild_id.clone()).or_default();
                let season = resolve_season(rollback_season_id.as_ref(), guild.active_season());
                self.recalculate(guild, &guild_id, &round_id, results, season)
            }
            InboundEvent::SwapRequested { guild_id, member_id, target_tag, requested_at } => {
                self.swap_requested(guild_id, member_id, target_tag, requested_at).await
            }
            InboundEvent::SwapCancelled { guild_id, member_id } => {
                let existed = self.saga.cancel_intent(&guild_id, &member_id).await?;
                Ok(vec![OutboundEvent::SwapCancelled { guild_id, member_id, existed }])
            }
            InboundEvent::TagClaimRequested { guild_id, member_id, tag, requested_at } => {
                self.tag_claim(guild_id, member_id, tag, requested_at).await
            }
            InboundEvent::TagResetRequested { guild_id, round_id } => self.tag_reset(guild_id, round_id).await,
            InboundEvent::SeasonStartRequested { guild_id, season_id, name, start } => {
                self.season_start(guild_id, &season_id, name, start).await
            }
        }
    }

    /* ---------------------------------- Rounds ---------------------------------- */

    async fn round_finalized(
        &self,
        guild_id: GuildId,
        round_id: String,
        kind: RoundKind,
        results: Vec<RoundInput>,
    ) -> Result<Vec<OutboundEvent>, PipelineError> {
        let mut state = self.state.lock().await;
        let guild = state.entry(guild_id.clone()).or_default();

        // A round seen before keeps its season and never moves tags again.
        if let Some(record) = guild.rounds.get(&round_id) {
            let season = ResolvedSeason {
                is_active: record.season_id.is_some(),
                season_id: record.season_id.clone(),
            };
            return self.recalculate(guild, &guild_id, &round_id, Some(results), season);
        }

        let pre_slots = self.assigner.leaderboard(&guild_id).await?;
        let season = resolve_season(None, guild.active_season());
        let ctx = RoundContext {
            params: &self.params,
            season: &season,
            slots: &pre_slots,
            stats: &guild.stats,
            previous_fingerprint: None,
        };
        let out = match process_round(kind, &results, &ctx)? {
            RoundDisposition::Processed(out) => out,
            RoundDisposition::Unchanged { fingerprint } => {
                return Ok(vec![OutboundEvent::RoundUnchanged { guild_id, round_id, fingerprint }]);
            }
        };

        let source = match kind {
            RoundKind::Standard => AssignmentSource::Round,
            RoundKind::Qualifying => AssignmentSource::Reset,
        };
        let requests = requests_from(&out.changes);
        let board = if requests.is_empty() && kind == RoundKind::Standard {
            pre_slots.clone()
        } else {
            let id = batch_id(source, &guild_id, &requests)?;
            self.assigner.assign_batch(&guild_id, &requests, &id, source).await?
        };

        let pre_stats: BTreeMap<MemberId, MemberStats> = results
            .iter()
            .filter_map(|r| guild.stats.get(&r.member_id).map(|s| (r.member_id.clone(), s.clone())))
            .collect();
        guild.stats.extend(out.stats);
        guild.rounds.insert(
            round_id.clone(),
            RoundRecord {
                kind,
                results,
                fingerprint: out.fingerprint,
                season_id: season.season_id.clone(),
                pre_slots,
                pre_stats,
            },
        );

        let mut events = vec![OutboundEvent::LeaderboardUpdated {
            guild_id: guild_id.clone(),
            source,
            round_id: Some(round_id.clone()),
            changes: out.changes,
            slots: snapshot(&board),
        }];
        if let (true, Some(season_id)) = (should_award_points(&season), season.season_id) {
            guild.record_awards(&round_id, &season_id, &out.awards);
            events.push(OutboundEvent::PointsAwarded { guild_id, round_id, season_id, awards: out.awards });
        }
        Ok(events)
    }

    /// Re-score a stored round from its pre-round state. Live tags and
    /// counters stay as they are; the round's ledger entries are replaced.
    fn recalculate(
        &self,
        guild: &mut GuildState,
        guild_id: &GuildId,
        round_id: &str,
        results: Option<Vec<RoundInput>>,
        season: ResolvedSeason,
    ) -> Result<Vec<OutboundEvent>, PipelineError> {
        let record = guild.rounds.get(round_id).cloned().ok_or_else(|| PipelineError::UnknownRound {
            guild_id: guild_id.to_string(),
            round_id: round_id.to_string(),
        })?;
        let results = results.unwrap_or_else(|| record.results.clone());
        let previous = (record.season_id == season.season_id).then_some(&record.fingerprint);

        let ctx = RoundContext {
            params: &self.params,
            season: &season,
            slots: &record.pre_slots,
            stats: &record.pre_stats,
            previous_fingerprint: previous,
        };
        let out = match process_round(record.kind, &results, &ctx)? {
            RoundDisposition::Unchanged { fingerprint } => {
                return Ok(vec![OutboundEvent::RoundUnchanged {
                    guild_id: guild_id.clone(),
                    round_id: round_id.to_string(),
                    fingerprint,
                }]);
            }
            RoundDisposition::Processed(out) => out,
        };

        guild.ledger.retain(|e| e.round_id != round_id);
        if let Some(r) = guild.rounds.get_mut(round_id) {
            r.results = results;
            r.fingerprint = out.fingerprint;
            r.season_id = season.season_id.clone();
        }
        info!(guild_id = %guild_id, round_id, awards = out.awards.len(), "round recalculated");

        let mut events = Vec::new();
        if let (true, Some(season_id)) = (should_award_points(&season), season.season_id) {
            guild.record_awards(round_id, &season_id, &out.awards);
            events.push(OutboundEvent::PointsAwarded {
                guild_id: guild_id.clone(),
                round_id: round_id.to_string(),
                season_id,
                awards: out.awards,
            });
        }
        Ok(events)
    }

    async fn tag_reset(&self, guild_id: GuildId, round_id: String) -> Result<Vec<OutboundEvent>, PipelineError> {
        let order: Vec<MemberId> = {
            let state = self.state.lock().await;
            let record = state
                .get(&guild_id)
                .and_then(|g| g.rounds.get(&round_id))
                .ok_or_else(|| PipelineError::UnknownRound {
                    guild_id: guild_id.to_string(),
                    round_id: round_id.clone(),
                })?;
            let mut results = record.results.clone();
            sort_canonical(&mut results);
            results.into_iter().map(|r| r.member_id).collect()
        };
        if order.len() > self.params.max_tag as usize {
            return Err(PipelineError::Validation(format!(
                "{} finishers exceed max_tag {}",
                order.len(),
                self.params.max_tag
            )));
        }

        let changes = allocate_from_reset(&order);
        let requests = requests_from(&changes);
        let id = batch_id(AssignmentSource::Reset, &guild_id, &requests)?;
        let board = self.assigner.assign_batch(&guild_id, &requests, &id, AssignmentSource::Reset).await?;
        info!(guild_id = %guild_id, round_id = %round_id, batch_id = %id, count = order.len(), "tags reset");
        Ok(vec![OutboundEvent::LeaderboardUpdated {
            guild_id,
            source: AssignmentSource::Reset,
            round_id: Some(round_id),
            changes,
            slots: snapshot(&board),
        }])
    }

    /* ---------------------------------- Swaps ---------------------------------- */

    async fn swap_requested(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        target_tag: TagNumber,
        requested_at: DateTime<Utc>,
    ) -> Result<Vec<OutboundEvent>, PipelineError> {
        let board = self.assigner.leaderboard(&guild_id).await?;
        let Some(current_tag) = slots_by_member(&board).get(&member_id).copied() else {
            return Err(PipelineError::Validation(format!("{member_id} holds no tag to swap")));
        };
        if !board.contains_key(&target_tag) {
            return Err(PipelineError::Validation(format!(
                "tag {target_tag} is not held by anyone; claim it instead"
            )));
        }
        let intent = SwapIntent { guild_id, member_id, current_tag, target_tag, requested_at };
        self.submit(intent).await
    }

    async fn tag_claim(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        tag: TagNumber,
        requested_at: DateTime<Utc>,
    ) -> Result<Vec<OutboundEvent>, PipelineError> {
        if !self.params.tag_in_range(tag.get()) {
            return Err(PipelineError::Validation(format!(
                "tag {tag} exceeds max_tag {}",
                self.params.max_tag
            )));
        }
        let before = self.assigner.leaderboard(&guild_id).await?;
        match self.assigner.assign_single(&guild_id, &member_id, tag).await {
            Ok(after) => Ok(vec![OutboundEvent::LeaderboardUpdated {
                guild_id,
                source: AssignmentSource::Claim,
                round_id: None,
                changes: diff_boards(&before, &after),
                slots: snapshot(&after),
            }]),
            Err(AssignError::SwapRequired { tag, holder }) => {
                debug!(guild_id = %guild_id, member_id = %member_id, holder = %holder, "claim routed to swap saga");
                let board = self.assigner.leaderboard(&guild_id).await?;
                let Some(current_tag) = slots_by_member(&board).get(&member_id).copied() else {
                    return Err(PipelineError::Validation(format!("{member_id} holds no tag to swap")));
                };
                let intent = SwapIntent { guild_id, member_id, current_tag, target_tag: tag, requested_at };
                self.submit(intent).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn submit(&self, intent: SwapIntent) -> Result<Vec<OutboundEvent>, PipelineError> {
        let guild_id = intent.guild_id.clone();
        let member_id = intent.member_id.clone();
        match self.saga.submit_intent(intent).await {
            Ok(SwapOutcome::Pending { intent, chain_len }) => Ok(vec![OutboundEvent::SwapPending {
                guild_id,
                member_id,
                current_tag: intent.current_tag,
                target_tag: intent.target_tag,
                chain_len,
            }]),
            Ok(SwapOutcome::Executed { batch_id, cycle, slots, .. }) => Ok(vec![OutboundEvent::SwapExecuted {
                guild_id,
                batch_id,
                cycle,
                slots: snapshot(&slots),
            }]),
            Err(SagaError::Assign { batch_id, source }) => Ok(vec![OutboundEvent::SwapFailed {
                guild_id,
                member_id,
                batch_id: Some(batch_id),
                reason: source.to_string(),
            }]),
            Err(e) => Err(e.into()),
        }
    }

    /* ---------------------------------- Seasons ---------------------------------- */

    async fn season_start(
        &self,
        guild_id: GuildId,
        raw_season_id: &str,
        name: String,
        start: Option<DateTime<Utc>>,
    ) -> Result<Vec<OutboundEvent>, PipelineError> {
        let season_id = validate_season_start(raw_season_id, &name)?;
        let mut state = self.state.lock().await;
        let guild = state.entry(guild_id.clone()).or_default();
        if guild.seasons.iter().any(|s| s.season_id == season_id) {
            return Err(PipelineError::Validation(format!("season {season_id} already exists")));
        }

        let mut previous_season_id = None;
        for s in guild.seasons.iter_mut().filter(|s| s.is_active) {
            s.is_active = false;
            s.end = start;
            previous_season_id = Some(s.season_id.clone());
        }
        guild.seasons.push(SeasonState {
            season_id: season_id.clone(),
            name: name.clone(),
            is_active: true,
            start,
            end: None,
        });
        info!(guild_id = %guild_id, season_id = %season_id, "season started");
        Ok(vec![OutboundEvent::SeasonStarted { guild_id, season_id, name, previous_season_id }])
    }

    /* ---------------------------------- Queries ---------------------------------- */

    pub async fn leaderboard(&self, guild_id: &GuildId) -> Result<LeaderboardSlotMap, PipelineError> {
        Ok(self.assigner.leaderboard(guild_id).await?)
    }

    pub async fn active_season(&self, guild_id: &GuildId) -> Option<SeasonState> {
        let state = self.state.lock().await;
        state.get(guild_id).and_then(|g| g.active_season().cloned())
    }

    pub async fn member_stats(&self, guild_id: &GuildId, member_id: &MemberId) -> Option<MemberStats> {
        let state = self.state.lock().await;
        state.get(guild_id).and_then(|g| g.stats.get(member_id).cloned())
    }

    /// Season totals, highest first; ties by member id.
    pub async fn season_standings(&self, guild_id: &GuildId, season_id: &SeasonId) -> Vec<Standing> {
        let state = self.state.lock().await;
        let Some(guild) = state.get(guild_id) else {
            return Vec::new();
        };
        let mut totals: BTreeMap<&MemberId, (u64, u32)> = BTreeMap::new();
        for e in guild.ledger.iter().filter(|e| &e.season_id == season_id) {
            let t = totals.entry(&e.member_id).or_default();
            t.0 = t.0.saturating_add(e.points);
            t.1 += 1;
        }
        let mut out: Vec<Standing> = totals
            .into_iter()
            .map(|(m, (total_points, rounds_scored))| Standing {
                member_id: m.clone(),
                total_points,
                rounds_scored,
            })
            .collect();
        out.sort_by(|a, b| b.total_points.cmp(&a.total_points).then_with(|| a.member_id.cmp(&b.member_id)));
        out
    }

    /// Every award of one member, in the order rounds were scored.
    pub async fn point_history(&self, guild_id: &GuildId, member_id: &MemberId) -> Vec<PointEntry> {
        let state = self.state.lock().await;
        state
            .get(guild_id)
            .map(|g| g.ledger.iter().filter(|e| &e.member_id == member_id).cloned().collect())
            .unwrap_or_default()
    }
}
