//! Durable JSON snapshots of the cache.
//!
//! One JSON object per store: top-level keys are cache keys, each value is a
//! record `{key, prompt, sourceA, sourceB, derived, ttlSeconds, timestamp,
//! expiresAt}` with ISO-8601 timestamps. Snapshots are written to a sibling
//! temp file and renamed into place.
//!
//! Loading is lenient: a record that fails to parse is skipped with a
//! warning, and records already expired at load time are dropped silently
//! (counted in a single info line).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::entry::{CacheEntry, CachePayload};
use super::key::namespace_of;
use crate::{RavenError, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    key: String,
    #[serde(flatten)]
    payload: CachePayload,
    ttl_seconds: u64,
    timestamp: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<&CacheEntry> for PersistedEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            payload: entry.payload.clone(),
            ttl_seconds: entry.ttl_seconds,
            timestamp: entry.created_at,
            expires_at: entry.expires_at,
        }
    }
}

/// Load all entries still valid at `now`, oldest first.
///
/// A missing file is an empty snapshot, not an error.
pub(crate) fn load(path: &Path, now: DateTime<Utc>) -> Result<Vec<CacheEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)
        .map_err(|e| RavenError::Persistence(format!("failed to read {path:?}: {e}")))?;
    let raw: BTreeMap<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| RavenError::Persistence(format!("failed to parse {path:?}: {e}")))?;

    let mut expired = 0usize;
    let mut entries: Vec<CacheEntry> = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let record: PersistedEntry = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, error = %e, "skipping unreadable cache record");
                continue;
            }
        };
        if now >= record.expires_at {
            expired += 1;
            continue;
        }
        entries.push(CacheEntry {
            namespace: namespace_of(&key).to_string(),
            key,
            payload: record.payload,
            created_at: record.timestamp,
            ttl_seconds: record.ttl_seconds,
            expires_at: record.expires_at,
            sequence: 0,
        });
    }

    entries.sort_by_key(|e| e.created_at);
    for (seq, entry) in entries.iter_mut().enumerate() {
        entry.sequence = seq as u64;
    }

    if expired > 0 {
        info!(path = %path.display(), expired, "discarded expired entries from cache snapshot");
    }
    Ok(entries)
}

/// Write `entries` as a snapshot, replacing any previous one.
pub(crate) fn save<'a>(path: &Path, entries: impl IntoIterator<Item = &'a CacheEntry>) -> Result<()> {
    let snapshot: BTreeMap<&str, PersistedEntry> = entries
        .into_iter()
        .map(|e| (e.key.as_str(), PersistedEntry::from(e)))
        .collect();
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            RavenError::Persistence(format!("failed to create {parent:?}: {e}"))
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .map_err(|e| RavenError::Persistence(format!("failed to write {tmp:?}: {e}")))?;
    fs::rename(&tmp, path)
        .map_err(|e| RavenError::Persistence(format!("failed to replace {path:?}: {e}")))?;
    Ok(())
}
