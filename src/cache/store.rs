//! The namespaced TTL cache store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CachePayload, EntrySummary};
use super::key::{self, namespace_of};
use super::persist;
use crate::telemetry;

/// Configuration for the cache store.
///
/// ```rust
/// # use raven::cache::CacheConfig;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .default_ttl_seconds(120)
///     .persist_path("/tmp/raven-cache.json");
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries. Default: 1,000.
    pub max_entries: usize,
    /// TTL applied by [`CacheStore::put_default`]. Default: 300s.
    pub default_ttl_seconds: u64,
    /// Snapshot file. `None` keeps the store in memory only.
    pub persist_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            default_ttl_seconds: 300,
            persist_path: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the default TTL in seconds.
    pub fn default_ttl_seconds(mut self, secs: u64) -> Self {
        self.default_ttl_seconds = secs;
        self
    }

    /// Enable persistence to the given file.
    pub fn persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }
}

/// Running request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
}

/// Point-in-time statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    #[serde(flatten)]
    pub counters: CacheCounters,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
    pub hit_rate_percent: f64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    counters: CacheCounters,
    next_sequence: u64,
    /// Bumped each time a snapshot of the entries is taken.
    snapshot_generation: u64,
}

impl State {
    /// Key of the entry with the earliest `created_at` (insertion order on ties).
    fn oldest_key(&self) -> Option<String> {
        self.entries
            .values()
            .min_by_key(|e| (e.created_at, e.sequence))
            .map(|e| e.key.clone())
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let key = self.oldest_key()?;
        self.entries.remove(&key);
        self.counters.evictions += 1;
        Some(key)
    }
}

/// Namespaced key/value store with per-entry TTL, a hard size bound and
/// optional JSON persistence.
///
/// Constructed explicitly and shared via `Arc`; every component that caches
/// receives the same instance.
///
/// # Semantics
///
/// - A lookup never returns an expired entry; an expired entry found by
///   [`get`](Self::get) is removed and counted as a miss.
/// - The store never holds more than `max_entries`. Inserting a new key at
///   capacity first evicts the entry with the earliest `created_at`. Reads do
///   not refresh an entry's position: eviction is insertion-ordered, not LRU.
/// - With persistence enabled, every [`put`](Self::put) rewrites the snapshot
///   with all currently valid entries. Inside a tokio runtime the file write
///   runs on the blocking pool and `put` returns without waiting for it;
///   outside one it is written inline. A write never replaces a newer
///   snapshot. Persistence failures are logged and the store carries on in
///   memory. [`flush`](Self::flush) and [`shutdown`](Self::shutdown) always
///   write inline.
///
/// # Concurrency
///
/// One mutex guards the entry map and counters. There is no per-key
/// single-flight: two callers that miss on the same key concurrently both
/// fetch upstream and the later `put` wins.
pub struct CacheStore {
    state: Mutex<State>,
    /// Generation of the last snapshot on disk; held while writing.
    persisted: Arc<Mutex<u64>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Create a store, loading the snapshot when persistence is configured.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Create a store driven by a custom clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut state = State::default();

        if let Some(path) = &config.persist_path {
            match persist::load(path, clock.now()) {
                Ok(entries) => {
                    // Keep the newest entries if the snapshot outgrew the bound.
                    let skip = entries.len().saturating_sub(config.max_entries);
                    for entry in entries.into_iter().skip(skip) {
                        state.next_sequence = entry.sequence + 1;
                        state.entries.insert(entry.key.clone(), entry);
                    }
                    info!(
                        path = %path.display(),
                        entries = state.entries.len(),
                        "loaded cache snapshot"
                    );
                }
                Err(e) => warn!(error = %e, "cache snapshot unavailable, starting empty"),
            }
        }

        info!(
            max_entries = config.max_entries,
            default_ttl_seconds = config.default_ttl_seconds,
            persistent = config.persist_path.is_some(),
            "cache store initialised"
        );

        Self {
            state: Mutex::new(state),
            persisted: Arc::new(Mutex::new(0)),
            config,
            clock,
        }
    }

    /// Build the namespaced key for a request. See [`key::generate_key`].
    pub fn generate_key(subject: &str, namespace: &str, discriminators: &[&str]) -> String {
        key::generate_key(subject, namespace, discriminators)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up an unexpired entry.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let namespace = namespace_of(key).to_string();
        let mut state = self.lock();
        state.counters.total_requests += 1;

        let found = match state.entries.get(key).cloned() {
            Some(entry) if entry.is_expired_at(now) => {
                debug!(
                    key,
                    expired_for_s = -entry.seconds_until_expiry(now),
                    "cache entry expired"
                );
                state.entries.remove(key);
                None
            }
            other => other,
        };

        match found {
            Some(entry) => {
                state.counters.hits += 1;
                drop(state);
                debug!(
                    key,
                    expires_in_s = entry.seconds_until_expiry(now),
                    "cache hit"
                );
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "namespace" => namespace)
                    .increment(1);
                Some(entry)
            }
            None => {
                state.counters.misses += 1;
                drop(state);
                debug!(key, "cache miss");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "namespace" => namespace)
                    .increment(1);
                None
            }
        }
    }

    /// Insert or overwrite an entry with the given TTL.
    pub fn put(&self, key: impl Into<String>, payload: CachePayload, ttl_seconds: u64) {
        let key = key.into();
        let now = self.clock.now();
        let expires_at = chrono::Duration::try_seconds(ttl_seconds.min(i64::MAX as u64) as i64)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut state = self.lock();
        if self.config.max_entries == 0 {
            debug!(key, "cache disabled (max_entries = 0), not storing");
            return;
        }
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_entries {
            if let Some(evicted) = state.evict_oldest() {
                info!(key = evicted, "cache evicting oldest entry");
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key.clone(),
            CacheEntry {
                namespace: namespace_of(&key).to_string(),
                key: key.clone(),
                payload,
                created_at: now,
                ttl_seconds,
                expires_at,
                sequence,
            },
        );
        debug!(key, ttl_seconds, size = state.entries.len(), "cache store");
        drop(state);

        if self.config.persist_path.is_some() {
            self.persist_in_background();
        }
    }

    /// Insert with the configured default TTL.
    pub fn put_default(&self, key: impl Into<String>, payload: CachePayload) {
        self.put(key, payload, self.config.default_ttl_seconds);
    }

    /// Remove the entry with the earliest `created_at`.
    pub fn evict_oldest(&self) -> bool {
        let evicted = self.lock().evict_oldest();
        match evicted {
            Some(key) => {
                info!(key, "cache evicting oldest entry");
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
                true
            }
            None => false,
        }
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, e| !e.is_expired_at(now));
        let removed = before - state.entries.len();
        drop(state);
        if removed > 0 {
            info!(removed, "cache cleanup removed expired entries");
        }
        removed
    }

    /// Remove a single entry. Does not touch the counters.
    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove all entries, returning how many there were.
    pub fn clear(&self) -> usize {
        let count = {
            let mut state = self.lock();
            let count = state.entries.len();
            state.entries.clear();
            count
        };
        info!(count, "cache cleared");
        count
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is held, expired or not. Does not touch the counters.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn counters(&self) -> CacheCounters {
        self.lock().counters
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let state = self.lock();
        let counters = state.counters;
        let expired_entries = state
            .entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .count();
        let hit_rate_percent = if counters.total_requests > 0 {
            let rate = counters.hits as f64 / counters.total_requests as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };
        CacheStats {
            counters,
            active_entries: state.entries.len(),
            expired_entries,
            max_entries: self.config.max_entries,
            hit_rate_percent,
        }
    }

    /// Summaries of held entries, oldest first.
    pub fn list_entries(&self, include_expired: bool) -> Vec<EntrySummary> {
        let now = self.clock.now();
        let state = self.lock();
        let mut entries: Vec<&CacheEntry> = state
            .entries
            .values()
            .filter(|e| include_expired || !e.is_expired_at(now))
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.sequence));
        entries
            .into_iter()
            .map(|e| EntrySummary::of(e, now))
            .collect()
    }

    /// Write all valid entries to the snapshot file.
    ///
    /// A no-op returning `Ok` when persistence is disabled.
    pub fn flush(&self) -> crate::Result<()> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(());
        };
        snapshot.write(&self.persisted)
    }

    /// Capture the valid entries under the state lock, tagged with a fresh
    /// generation so writes can be ordered.
    fn snapshot(&self) -> Option<Snapshot> {
        let path = self.config.persist_path.clone()?;
        let now = self.clock.now();
        let mut state = self.lock();
        state.snapshot_generation += 1;
        let entries = state
            .entries
            .values()
            .filter(|e| !e.is_expired_at(now))
            .cloned()
            .collect();
        Some(Snapshot {
            path,
            entries,
            generation: state.snapshot_generation,
        })
    }

    fn persist_logged(&self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "cache persistence failed, continuing in memory");
        }
    }

    fn persist_in_background(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.persist_logged();
            return;
        };
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        let persisted = self.persisted.clone();
        handle.spawn_blocking(move || {
            if let Err(e) = snapshot.write(&persisted) {
                warn!(error = %e, "cache persistence failed, continuing in memory");
            }
        });
    }

    /// Flush valid entries to disk, then release the in-memory state.
    pub fn shutdown(&self) {
        self.persist_logged();
        let mut state = self.lock();
        let released = state.entries.len();
        state.entries.clear();
        info!(released, "cache store shut down");
    }
}

/// Valid entries captured at one point, waiting to be written.
struct Snapshot {
    path: PathBuf,
    entries: Vec<CacheEntry>,
    generation: u64,
}

impl Snapshot {
    /// Write unless a newer generation is already on disk.
    fn write(&self, persisted: &Mutex<u64>) -> crate::Result<()> {
        let mut last = persisted.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation <= *last {
            debug!(
                generation = self.generation,
                written = *last,
                "skipping stale cache snapshot"
            );
            return Ok(());
        }
        persist::save(&self.path, &self.entries)?;
        *last = self.generation;
        debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "cache snapshot written"
        );
        Ok(())
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    fn store(max: usize) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = CacheStore::with_clock(CacheConfig::new().max_entries(max), clock.clone());
        (store, clock)
    }

    #[test]
    fn config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 1_000);
        assert_eq!(config.default_ttl_seconds, 300);
        assert!(config.persist_path.is_none());
    }

    #[test]
    fn overwrite_at_capacity_does_not_evict() {
        let (store, clock) = store(2);
        store.put("a", CachePayload::new("a"), 60);
        clock.advance(Duration::from_secs(1));
        store.put("b", CachePayload::new("b"), 60);
        store.put("a", CachePayload::new("a2"), 60);
        assert_eq!(store.len(), 2);
        assert_eq!(store.counters().evictions, 0);
        assert_eq!(store.get("a").unwrap().payload.prompt, "a2");
    }

    #[test]
    fn overwrite_resets_creation_time() {
        let (store, clock) = store(2);
        store.put("a", CachePayload::new("a"), 60);
        clock.advance(Duration::from_secs(1));
        store.put("b", CachePayload::new("b"), 60);
        clock.advance(Duration::from_secs(1));
        store.put("a", CachePayload::new("a"), 60);
        clock.advance(Duration::from_secs(1));
        store.put("c", CachePayload::new("c"), 60);
        assert!(!store.contains_key("b"));
        assert!(store.contains_key("a"));
    }

    #[test]
    fn ties_evict_in_insertion_order() {
        let (store, _clock) = store(2);
        store.put("first", CachePayload::new("1"), 60);
        store.put("second", CachePayload::new("2"), 60);
        store.put("third", CachePayload::new("3"), 60);
        assert!(!store.contains_key("first"));
        assert!(store.contains_key("second"));
        assert!(store.contains_key("third"));
    }

    #[test]
    fn reads_do_not_refresh_eviction_order() {
        let (store, clock) = store(2);
        store.put("old", CachePayload::new("old"), 60);
        clock.advance(Duration::from_secs(1));
        store.put("new", CachePayload::new("new"), 60);
        assert!(store.get("old").is_some());
        store.put("newest", CachePayload::new("newest"), 60);
        assert!(!store.contains_key("old"));
    }

    #[test]
    fn evict_oldest_on_empty_store() {
        let (store, _clock) = store(2);
        assert!(!store.evict_oldest());
        assert_eq!(store.counters().evictions, 0);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let (store, _clock) = store(0);
        store.put("a", CachePayload::new("a"), 60);
        assert!(store.is_empty());
    }

    #[test]
    fn stats_hit_rate() {
        let (store, _clock) = store(10);
        store.put("k", CachePayload::new("k").with_derived(json!(1)), 60);
        store.get("k");
        store.get("k");
        store.get("missing");
        let stats = store.stats();
        assert_eq!(stats.counters.hits, 2);
        assert_eq!(stats.counters.misses, 1);
        assert_eq!(stats.counters.total_requests, 3);
        assert_eq!(stats.hit_rate_percent, 66.67);
        assert_eq!(stats.active_entries, 1);
    }

    #[test]
    fn list_entries_filters_expired() {
        let (store, clock) = store(10);
        store.put("short", CachePayload::new("short"), 10);
        store.put("long", CachePayload::new("long").with_source_a(json!([])), 100);
        clock.advance(Duration::from_secs(20));
        let valid = store.list_entries(false);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].key, "long");
        assert_eq!(valid[0].data_types, vec!["sourceA"]);
        assert_eq!(store.list_entries(true).len(), 2);
    }

    #[test]
    fn stale_snapshot_never_replaces_a_newer_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = CacheStore::with_clock(
            CacheConfig::new().persist_path(&path),
            Arc::new(ManualClock::starting_now()),
        );
        store.put("a", CachePayload::new("a"), 60);

        let stale = store.snapshot().unwrap();
        store.put("b", CachePayload::new("b"), 60);
        stale.write(&store.persisted).unwrap();

        let on_disk = persist::load(&path, store.now()).unwrap();
        assert_eq!(on_disk.len(), 2);
    }
}
