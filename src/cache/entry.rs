//! Cache entries and namespaces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data-source families that partition the cache key space.
///
/// The string forms are part of the persisted key format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Prediction-market events.
    Market,
    /// Social-sentiment coin lists.
    Sentiment,
    /// Reasoning aggregator results.
    Reasoning,
}

impl Namespace {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Namespace::Market => "polymarket",
            Namespace::Sentiment => "lunarcrush",
            Namespace::Reasoning => "reasoning",
        }
    }

    /// TTL used for live data in this namespace.
    pub const fn ttl_seconds(&self) -> u64 {
        match self {
            Namespace::Market => 900,
            Namespace::Sentiment => 3600,
            Namespace::Reasoning => 600,
        }
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored value of a cache entry.
///
/// Mirrors the persisted record layout: the originating prompt (or key) plus
/// up to two raw source payloads and one derived payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePayload {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub source_a: Option<Value>,
    #[serde(default)]
    pub source_b: Option<Value>,
    #[serde(default)]
    pub derived: Option<Value>,
}

impl CachePayload {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source_a(mut self, value: Value) -> Self {
        self.source_a = Some(value);
        self
    }

    #[must_use]
    pub fn with_source_b(mut self, value: Value) -> Self {
        self.source_b = Some(value);
        self
    }

    #[must_use]
    pub fn with_derived(mut self, value: Value) -> Self {
        self.derived = Some(value);
        self
    }
}

/// One cached value with its lifetime metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub namespace: String,
    pub payload: CachePayload,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub expires_at: DateTime<Utc>,
    /// Insertion order; breaks `created_at` ties during eviction.
    pub(crate) sequence: u64,
}

impl CacheEntry {
    /// An entry is expired from its `expires_at` instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds until expiry at `now`; negative once expired.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> f64 {
        (self.expires_at - now).num_milliseconds() as f64 / 1000.0
    }
}

/// Listing view of an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub key: String,
    pub namespace: String,
    /// Prompt, truncated to 50 characters.
    pub prompt: String,
    /// Which payload slots are filled (`sourceA`, `sourceB`, `derived`).
    pub data_types: Vec<&'static str>,
    pub ttl_seconds: u64,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub expired: bool,
    pub seconds_until_expiry: f64,
}

impl EntrySummary {
    pub(crate) fn of(entry: &CacheEntry, now: DateTime<Utc>) -> Self {
        let prompt = if entry.payload.prompt.chars().count() > 50 {
            let head: String = entry.payload.prompt.chars().take(50).collect();
            format!("{head}...")
        } else {
            entry.payload.prompt.clone()
        };
        let data_types = [
            ("sourceA", entry.payload.source_a.is_some()),
            ("sourceB", entry.payload.source_b.is_some()),
            ("derived", entry.payload.derived.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();

        Self {
            key: entry.key.clone(),
            namespace: entry.namespace.clone(),
            prompt,
            data_types,
            ttl_seconds: entry.ttl_seconds,
            created: entry.created_at,
            expires: entry.expires_at,
            expired: entry.is_expired_at(now),
            seconds_until_expiry: entry.seconds_until_expiry(now),
        }
    }
}
