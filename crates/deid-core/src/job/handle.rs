//! Job handle generation.
//!
//! The service names jobs by a caller-chosen string of at most 36 characters
//! from `[a-z0-9-]`. Handles are `deid-<item>-<suffix>`, where the suffix is
//! the first 12 hex digits of SHA-256(item, process nonce, counter).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MAX_HANDLE_LEN: usize = 36;
const PREFIX: &str = "deid-";
const SUFFIX_LEN: usize = 12;

/// Correlation id for one submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Wraps an existing handle (e.g. from the CLI `status` command).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces handles that are unique for the lifetime of the generator.
#[derive(Debug)]
pub struct HandleGenerator {
    nonce: u128,
    counter: AtomicU64,
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleGenerator {
    pub fn new() -> Self {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
            ^ u128::from(std::process::id());
        Self::with_nonce(nonce)
    }

    /// Fixed nonce; used by tests that need reproducible handles.
    pub fn with_nonce(nonce: u128) -> Self {
        Self {
            nonce,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self, item_id: u64) -> JobHandle {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(item_id.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(n.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        let suffix = &digest[..SUFFIX_LEN];

        // Room left for the item part: 36 - "deid-" - "-" - suffix.
        let room = MAX_HANDLE_LEN - PREFIX.len() - 1 - SUFFIX_LEN;
        let item = item_id.to_string();
        let item = &item[item.len().saturating_sub(room)..];
        JobHandle(format!("{PREFIX}{item}-{suffix}"))
    }
}
