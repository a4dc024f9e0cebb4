//! crates/tg_io/src/hasher.rs
//!
//! Deterministic hashing for the tag engine.
//!
//! - `sha256_canonical(..)` hashes JSON values/structs through canonical_json.
//! - `sha256_hex(..)` hashes raw bytes.
//! - `fingerprint(..)` is the round idempotency fingerprint: inputs sorted by
//!   `(finish_rank, member_id)`, one `rank|member` record per line, SHA-256.
//!   The same set in any order gives the same digest.
//! - `batch_id(..)` derives `<SOURCE>-<16 hex>` ids for assignment batches.
//!
//! Hex digests are **lowercase**.

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use tg_core::{
    determinism::sort_canonical, AssignmentSource, GuildId, RoundInput, Sha256 as Digest256,
    TagAssignmentRequest,
};

use crate::canonical_json::to_canonical_bytes;

/* ----------------------------------- Errors ----------------------------------- */

#[derive(Error, Debug)]
pub enum HashError {
    #[error("canonicalization error: {0}")]
    Canonical(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

/* ------------------------------- Raw hashing ------------------------------- */

/// SHA-256 over raw bytes, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 over **canonical JSON bytes** of any serializable value.
pub fn sha256_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = to_canonical_bytes(value).map_err(|e| HashError::Canonical(e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

/* --------------------------- Round fingerprint --------------------------- */

/// Order-independent digest of a round's `(member, finish_rank)` set.
pub fn fingerprint(inputs: &[RoundInput]) -> Result<Digest256, HashError> {
    let mut sorted = inputs.to_vec();
    sort_canonical(&mut sorted);

    let mut hasher = Sha256::new();
    for i in &sorted {
        // Member tokens never contain '|' or '\n'.
        hasher.update(i.finish_rank.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(i.member_id.as_str().as_bytes());
        hasher.update(b"\n");
    }
    let hex = hex::encode(hasher.finalize());
    hex.parse::<Digest256>()
        .map_err(|e| HashError::InvalidDigest(format!("{hex}: {e}")))
}

/* ------------------------------- Batch ids ------------------------------- */

/// `<SOURCE>-<16 hex>` from the canonical hash of `(guild, requests)`.
///
/// Requests are hashed in `(tag, member)` order, so the same cycle discovered
/// from different starting members gets the same id.
pub fn batch_id(
    source: AssignmentSource,
    guild_id: &GuildId,
    requests: &[TagAssignmentRequest],
) -> Result<String, HashError> {
    let mut reqs: Vec<&TagAssignmentRequest> = requests.iter().collect();
    reqs.sort_by(|a, b| a.tag.cmp(&b.tag).then_with(|| a.member_id.cmp(&b.member_id)));
    let payload = json!({
        "guild_id": guild_id,
        "source": source,
        "requests": reqs,
    });
    let hex = sha256_canonical(&payload)?;
    Ok(format!("{}-{}", source.as_str().to_ascii_uppercase(), &hex[..16]))
}

/* ------------------------------------ Tests ------------------------------------ */
