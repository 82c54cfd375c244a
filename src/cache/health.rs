//! Short-lived memo of tool health reports.
//!
//! Health probes hit upstream APIs, so repeated `health()` calls within the
//! TTL reuse the previous report per tool.

use std::time::Duration;

use moka::future::Cache;

use crate::types::HealthReport;

/// Configuration for the health memo.
#[derive(Debug, Clone)]
pub struct HealthCacheConfig {
    /// Maximum number of memoised reports. Default: 64.
    pub max_entries: u64,
    /// How long a report is reused. Default: 30s.
    pub ttl: Duration,
}

impl Default for HealthCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 64,
            ttl: Duration::from_secs(30),
        }
    }
}

impl HealthCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Per-tool health reports with a TTL.
pub struct HealthCache {
    cache: Cache<String, HealthReport>,
}

impl HealthCache {
    pub fn new(config: &HealthCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, tool: &str) -> Option<HealthReport> {
        self.cache.get(tool).await
    }

    pub async fn insert(&self, report: HealthReport) {
        self.cache.insert(report.tool.clone(), report).await;
    }

    /// Forget every memoised report.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new(&HealthCacheConfig::default())
    }
}
