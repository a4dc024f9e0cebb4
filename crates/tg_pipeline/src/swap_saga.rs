//! Swap Saga Coordinator.
//!
//! Members file "I want tag T" intents one at a time. Each intent is stored
//! under `(guild, member)`, overwriting any earlier one. After every store the
//! guild's outstanding intents are re-read, reconciled against the live board
//! and walked from the submitter:
//! `next(m)` is the member currently holding `m.target_tag`. When the walk
//! revisits a member the intents close into a cycle, which is executed as a
//! single batch and then consumed.
//!
//! Contract:
//! - One live intent per member keeps every out-degree at most 1, which is
//!   what makes the single successor walk sound.
//! - The whole persist -> read -> detect -> execute -> delete sequence runs
//!   inside one exclusive section per guild.
//! - Before the walk every intent is checked against the board. Rounds, resets
//!   and claims move tags while intents wait: an intent whose member moved is
//!   rewritten with the member's current tag, one whose member now holds the
//!   target (or no tag at all) is deleted. Current tags are then distinct.
//! - A failed batch leaves every intent in place for the next detection;
//!   nothing is retried or rolled back here.
//! - After a successful batch the consumed intents are deleted best-effort. A
//!   leftover names a tag its member already holds and is dropped by the next
//!   reconciliation.
//! - With a TTL configured, intents older than the TTL (measured against the
//!   submission being processed) are deleted and ignored.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tg_algo::allocation::slots_by_member;
use tg_core::{
    AssignmentSource, EngineParams, GuildId, LeaderboardSlotMap, MemberId, SwapIntent,
    TagAssignmentRequest, TagNumber,
};
use tg_io::hasher::batch_id;
use tg_io::intent_store::{IntentKey, IntentStore, StoreError};

use crate::batch::{AssignError, BatchTagAssigner};

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("invalid swap intent: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("swap batch {batch_id} failed: {source}")]
    Assign {
        batch_id: String,
        #[source]
        source: AssignError,
    },

    #[error("batch id derivation failed: {0}")]
    BatchId(String),

    #[error("leaderboard unavailable: {0}")]
    Board(#[source] AssignError),
}

/// What a submission led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Stored; no closed cycle yet. `chain_len` is how far the walk got.
    Pending { intent: SwapIntent, chain_len: usize },
    /// A cycle closed and was applied; its intents are gone.
    Executed {
        batch_id: String,
        cycle: Vec<MemberId>,
        requests: Vec<TagAssignmentRequest>,
        slots: LeaderboardSlotMap,
    },
}

pub struct SwapSagaCoordinator<S, A> {
    store: S,
    assigner: A,
    max_tag: u32,
    ttl: Option<Duration>,
    // One entry per guild ever seen, never pruned; guilds are few.
    guild_locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl<S: IntentStore, A: BatchTagAssigner> SwapSagaCoordinator<S, A> {
    pub fn new(store: S, assigner: A, params: &EngineParams) -> Self {
        let ttl = params
            .intent_ttl_secs
            .and_then(|s| i64::try_from(s).ok())
            .and_then(Duration::try_seconds);
        Self {
            store,
            assigner,
            max_tag: params.max_tag,
            ttl,
            guild_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn guild_lock(&self, guild_id: &GuildId) -> Arc<Mutex<()>> {
        let mut locks = self.guild_locks.lock().await;
        locks.entry(guild_id.clone()).or_default().clone()
    }

    fn validate(&self, intent: &SwapIntent) -> Result<(), SagaError> {
        if intent.current_tag == intent.target_tag {
            return Err(SagaError::Validation(format!(
                "{} already holds tag {}",
                intent.member_id, intent.target_tag
            )));
        }
        for t in [intent.current_tag, intent.target_tag] {
            if t.get() > self.max_tag {
                return Err(SagaError::Validation(format!("tag {t} exceeds max_tag {}", self.max_tag)));
            }
        }
        Ok(())
    }

    /// Store `intent` and execute the cycle it closes, if any.
    pub async fn submit_intent(&self, intent: SwapIntent) -> Result<SwapOutcome, SagaError> {
        self.validate(&intent)?;
        let lock = self.guild_lock(&intent.guild_id).await;
        let _guard = lock.lock().await;

        let guild_id = intent.guild_id.clone();
        let board = self.assigner.leaderboard(&guild_id).await.map_err(SagaError::Board)?;
        let held = slots_by_member(&board);
        let intent = match held.get(&intent.member_id) {
            None => {
                return Err(SagaError::Validation(format!("{} holds no tag to swap", intent.member_id)));
            }
            Some(&t) if t == intent.target_tag => {
                return Err(SagaError::Validation(format!(
                    "{} already holds tag {}",
                    intent.member_id, intent.target_tag
                )));
            }
            Some(&t) => SwapIntent { current_tag: t, ..intent },
        };

        self.store
            .put(&IntentKey::for_member(&guild_id, &intent.member_id), &intent)
            .await?;
        debug!(
            guild_id = %guild_id,
            member_id = %intent.member_id,
            current_tag = intent.current_tag.get(),
            target_tag = intent.target_tag.get(),
            "swap intent stored"
        );

        let live = self.load_live(&guild_id, &intent, &held).await?;
        let (cycle, walked) = detect_cycle(&intent.member_id, &live);
        let Some(cycle) = cycle else {
            debug!(guild_id = %guild_id, member_id = %intent.member_id, walk = walked, "no cycle yet");
            return Ok(SwapOutcome::Pending { intent, chain_len: walked });
        };

        let requests: Vec<TagAssignmentRequest> = cycle
            .iter()
            .map(|i| TagAssignmentRequest { member_id: i.member_id.clone(), tag: i.target_tag })
            .collect();
        let id = batch_id(AssignmentSource::Swap, &guild_id, &requests)
            .map_err(|e| SagaError::BatchId(e.to_string()))?;

        let slots = match self
            .assigner
            .assign_batch(&guild_id, &requests, &id, AssignmentSource::Swap)
            .await
        {
            Ok(slots) => slots,
            Err(source) => {
                warn!(guild_id = %guild_id, batch_id = %id, error = %source, "swap batch rejected; intents kept");
                return Err(SagaError::Assign { batch_id: id, source });
            }
        };

        for i in &cycle {
            if let Err(e) = self.store.delete(&IntentKey::for_member(&guild_id, &i.member_id)).await {
                warn!(guild_id = %guild_id, member_id = %i.member_id, error = %e, "consumed swap intent left in store");
            }
        }
        let members: Vec<MemberId> = cycle.iter().map(|i| i.member_id.clone()).collect();
        info!(guild_id = %guild_id, batch_id = %id, count = members.len(), "swap cycle executed");

        Ok(SwapOutcome::Executed { batch_id: id, cycle: members, requests, slots })
    }

    /// Drop a member's pending intent. `false` when there was none.
    pub async fn cancel_intent(&self, guild_id: &GuildId, member_id: &MemberId) -> Result<bool, SagaError> {
        let lock = self.guild_lock(guild_id).await;
        let _guard = lock.lock().await;
        let existed = self.store.delete(&IntentKey::for_member(guild_id, member_id)).await?;
        debug!(guild_id = %guild_id, member_id = %member_id, existed, "swap intent cancelled");
        Ok(existed)
    }

    /// Every stored intent of the guild, by member id.
    pub async fn pending_intents(&self, guild_id: &GuildId) -> Result<Vec<SwapIntent>, SagaError> {
        let lock = self.guild_lock(guild_id).await;
        let _guard = lock.lock().await;
        Ok(self.load_all(guild_id).await?)
    }

    async fn load_all(&self, guild_id: &GuildId) -> Result<Vec<SwapIntent>, StoreError> {
        let keys = self.store.list_keys_by_prefix(&IntentKey::guild_prefix(guild_id)).await?;
        let mut out = Vec::with_capacity(keys.len());
        for k in keys {
            // A key deleted between list and get is simply gone.
            if let Some(i) = self.store.get(&k).await? {
                out.push(i);
            }
        }
        out.sort_by(|a, b| a.member_id.cmp(&b.member_id));
        Ok(out)
    }

    /// Intents that are still alive and consistent with `held`.
    ///
    /// Expired intents (relative to `now_intent`) and intents that no longer
    /// make sense on the board are deleted; moved members get their intent
    /// rewritten with the tag they hold now.
    async fn load_live(
        &self,
        guild_id: &GuildId,
        now_intent: &SwapIntent,
        held: &BTreeMap<MemberId, TagNumber>,
    ) -> Result<Vec<SwapIntent>, StoreError> {
        let all = self.load_all(guild_id).await?;
        let now = now_intent.requested_at;
        let mut live = Vec::with_capacity(all.len());
        for mut i in all {
            let key = IntentKey::for_member(guild_id, &i.member_id);
            if self.ttl.is_some_and(|ttl| now.signed_duration_since(i.requested_at) > ttl) {
                self.store.delete(&key).await?;
                debug!(guild_id = %guild_id, member_id = %i.member_id, "expired swap intent dropped");
                continue;
            }
            match held.get(&i.member_id) {
                Some(&t) if t == i.target_tag => {
                    self.store.delete(&key).await?;
                    debug!(guild_id = %guild_id, member_id = %i.member_id, tag = t.get(), "swap intent already satisfied");
                }
                None => {
                    self.store.delete(&key).await?;
                    debug!(guild_id = %guild_id, member_id = %i.member_id, "swap intent dropped: member holds no tag");
                }
                Some(&t) if t != i.current_tag => {
                    debug!(
                        guild_id = %guild_id,
                        member_id = %i.member_id,
                        from = i.current_tag.get(),
                        to = t.get(),
                        "swap intent follows moved tag"
                    );
                    i.current_tag = t;
                    self.store.put(&key, &i).await?;
                    live.push(i);
                }
                Some(_) => live.push(i),
            }
        }
        Ok(live)
    }
}

/// Walk successors from `start`. Returns the cycle (in walk order) if the walk
/// revisits a member, plus the number of members visited.
///
/// The cycle need not contain `start`: a chain can lead into a loop that was
/// already closed by others.
pub fn detect_cycle<'a>(start: &MemberId, intents: &'a [SwapIntent]) -> (Option<Vec<&'a SwapIntent>>, usize) {
    let mut by_member: BTreeMap<&MemberId, &SwapIntent> = BTreeMap::new();
    let mut by_current: BTreeMap<TagNumber, &SwapIntent> = BTreeMap::new();
    for i in intents {
        by_member.insert(&i.member_id, i);
        // Reconciled intents carry distinct current tags; on unreconciled input
        // the lowest member id wins and the batch collaborator re-checks.
        by_current.entry(i.current_tag).or_insert(i);
    }

    let Some(mut cur) = by_member.get(start).copied() else {
        return (None, 0);
    };
    let mut path: Vec<&SwapIntent> = Vec::new();
    let mut seen: BTreeMap<&MemberId, usize> = BTreeMap::new();
    loop {
        if let Some(&at) = seen.get(&cur.member_id) {
            let walked = path.len();
            return (Some(path.split_off(at)), walked);
        }
        seen.insert(&cur.member_id, path.len());
        path.push(cur);
        match by_current.get(&cur.target_tag) {
            Some(&next) => cur = next,
            None => return (None, path.len()),
        }
    }
}
