//! crates/tg_io/src/lib.rs
//! I/O layer of the tag engine.
//!
//! - Canonical JSON (sorted keys, compact) and atomic file writes.
//! - SHA-256 hashing, the round fingerprint and batch ids.
//! - Parameter-file loading.
//! - The swap-intent store contract with in-memory and file-backed stores.
//!
//! Shared error type (`IoError`) with `From` conversions used across modules.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for tg_io file and JSON handling.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (create_dir_all, rename, fsync, etc.)
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON serialization/deserialization errors with an optional JSON Pointer.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Content parsed but failed domain validation.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

/* ---------------- From conversions (used by file modules) ---------------- */

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps line/column, not a pointer; report against the root.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

impl From<tg_core::ParamsError> for IoError {
    fn from(e: tg_core::ParamsError) -> Self {
        IoError::Invalid(e.to_string())
    }
}

pub mod canonical_json;
pub mod config;
pub mod hasher;
pub mod intent_store;

pub mod prelude {
    pub use crate::canonical_json::{to_canonical_bytes, write_canonical_file};
    pub use crate::config::load_params;
    pub use crate::hasher::{batch_id, fingerprint, sha256_canonical, sha256_hex};
    pub use crate::intent_store::{
        FileIntentStore, IntentKey, IntentStore, MemoryIntentStore, StoreError,
    };
    pub use crate::{IoError, IoResult};
}
