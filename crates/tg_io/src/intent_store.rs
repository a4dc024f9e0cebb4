//! Swap-intent store: the key-value collaborator of the swap saga.
//!
//! Keys are `swap_intent:{guild}:{member}`, so one guild's intents share the
//! prefix `swap_intent:{guild}:`. Identifier tokens never contain `:`.
//!
//! The contract assumes per-key last-write-wins and nothing stronger; the
//! saga serializes its own read-modify-write sequences per guild.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use tg_core::{GuildId, MemberId, SwapIntent};

use crate::canonical_json::write_canonical_file;

const KEY_NAMESPACE: &str = "swap_intent";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("intent store unavailable: {0}")]
    Unavailable(String),

    #[error("intent record {key} is corrupt: {msg}")]
    Corrupt { key: String, msg: String },
}

/// Store key of one member's live intent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntentKey(String);

impl IntentKey {
    pub fn for_member(guild_id: &GuildId, member_id: &MemberId) -> Self {
        IntentKey(format!("{KEY_NAMESPACE}:{guild_id}:{member_id}"))
    }

    /// Prefix shared by every key of `guild_id`.
    pub fn guild_prefix(guild_id: &GuildId) -> String {
        format!("{KEY_NAMESPACE}:{guild_id}:")
    }

    /// Parse a raw key; `None` unless it has the `swap_intent:{guild}:{member}` shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let (ns, guild, member) = (parts.next()?, parts.next()?, parts.next()?);
        if ns != KEY_NAMESPACE || parts.next().is_some() {
            return None;
        }
        let guild: GuildId = guild.parse().ok()?;
        let member: MemberId = member.parse().ok()?;
        Some(IntentKey::for_member(&guild, &member))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistent intent storage.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Insert or overwrite.
    async fn put(&self, key: &IntentKey, intent: &SwapIntent) -> Result<(), StoreError>;

    async fn get(&self, key: &IntentKey) -> Result<Option<SwapIntent>, StoreError>;

    /// Remove a key. Returns `false` when nothing was stored under it.
    async fn delete(&self, key: &IntentKey) -> Result<bool, StoreError>;

    /// All keys starting with `prefix`, ascending.
    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<IntentKey>, StoreError>;
}

#[async_trait]
impl<T: IntentStore + ?Sized> IntentStore for Arc<T> {
    async fn put(&self, key: &IntentKey, intent: &SwapIntent) -> Result<(), StoreError> {
        (**self).put(key, intent).await
    }
    async fn get(&self, key: &IntentKey) -> Result<Option<SwapIntent>, StoreError> {
        (**self).get(key).await
    }
    async fn delete(&self, key: &IntentKey) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }
    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<IntentKey>, StoreError> {
        (**self).list_keys_by_prefix(prefix).await
    }
}

/* ------------------------------ In-memory store ------------------------------ */

/// Process-local store, used by tests and the single-process engine.
#[derive(Debug, Default, Clone)]
pub struct MemoryIntentStore {
    entries: Arc<RwLock<BTreeMap<IntentKey, SwapIntent>>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn put(&self, key: &IntentKey, intent: &SwapIntent) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.clone(), intent.clone());
        Ok(())
    }

    async fn get(&self, key: &IntentKey) -> Result<Option<SwapIntent>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &IntentKey) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<IntentKey>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|k| k.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }
}

/* ------------------------------ File-backed store ------------------------------ */

/// One canonical-JSON file per key under a root directory.
///
/// File names are the hex-encoded key plus `.json`, which keeps them portable.
/// Writes go through the atomic temp-file + rename path on the blocking pool;
/// reads, deletes and listings use `tokio::fs`.
#[derive(Debug, Clone)]
pub struct FileIntentStore {
    root: PathBuf,
}

impl FileIntentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &IntentKey) -> PathBuf {
        self.root.join(format!("{}.json", hex::encode(key.as_str())))
    }

    fn key_from_file_name(name: &str) -> Option<IntentKey> {
        let stem = name.strip_suffix(".json")?;
        let raw = hex::decode(stem).ok()?;
        IntentKey::parse(std::str::from_utf8(&raw).ok()?)
    }
}

fn unavailable(e: impl fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl IntentStore for FileIntentStore {
    async fn put(&self, key: &IntentKey, intent: &SwapIntent) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let (target, record) = (path.clone(), intent.clone());
        tokio::task::spawn_blocking(move || write_canonical_file(&target, &record))
            .await
            .map_err(unavailable)?
            .map_err(unavailable)?;
        debug!(key = %key, path = %path.display(), "intent written");
        Ok(())
    }

    async fn get(&self, key: &IntentKey) -> Result<Option<SwapIntent>, StoreError> {
        let text = match fs::read_to_string(self.path_for(key)).await {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt { key: key.to_string(), msg: e.to_string() })
    }

    async fn delete(&self, key: &IntentKey) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<IntentKey>, StoreError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(e)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(unavailable)? {
            let name = entry.file_name();
            // Temp files and foreign files don't decode to a key.
            if let Some(key) = name.to_str().and_then(Self::key_from_file_name) {
                if key.as_str().starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
