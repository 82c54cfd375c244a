//! Reasoning aggregator: fuses prediction-market events and social-sentiment
//! coins into one scored position recommendation.
//!
//! # Pipeline
//!
//! ```text
//! CacheCheck ──hit──► return cached report
//!     │ miss
//!     ▼
//! Qualify ──no──► [{"info": ...}]   (no upstream calls, nothing cached)
//!     │ yes
//!     ▼
//! FetchMarket ∥ FetchSentiment   (each: Fetched | Degraded(substitute))
//!     ▼
//! Merge ─► Score ─► StoreCache ─► return [report]
//!   └─ failure ─► neutral fallback report (stored and returned)
//! ```
//!
//! The aggregator looks its two sources up by name in the shared
//! [`ToolRegistry`] on every call, so unregistering a source tool makes the
//! next report use substitute data for it. It holds the registry weakly and
//! is itself registered there.
//!
//! There is no single-flight: two identical requests that miss concurrently
//! both fetch, and the later store wins.

mod analysis;
mod sources;
mod subject;
mod triggers;

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

pub use analysis::{
    BEARISH_PROBABILITY, BULLISH_PROBABILITY, HIGH_VOLUME, MergedContext, Scored,
    analysis_text, fallback_confidence, merge, position_for, score,
};
pub use sources::{
    MARKET_SOURCE, SENTIMENT_SOURCE, SourceData, market_substitute, sentiment_substitute,
};
pub use subject::{GENERAL_SUBJECT, extract_subject, filter_relevant_coins};
pub use triggers::{DEFAULT_TRIGGERS, Triggers};

use crate::cache::{CachePayload, CacheStore, Namespace, fingerprint, generate_key};
use crate::executor::{ExecutionConfig, ToolExecutor};
use crate::registry::ToolRegistry;
use crate::types::{DataSources, Params, param_str};
use crate::{COMPOSITE_TAG, Result, Tool};

/// Tool name of the aggregator.
pub const TOOL_NAME: &str = "combined_reasoning";

/// Informational result for queries that don't qualify.
pub const NOT_QUALIFIED_INFO: &str = "Query doesn't require combined market analysis";

/// Aggregator settings.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Tool providing prediction-market events. Default: `get_events`.
    pub market_tool: String,
    /// Tool providing sentiment coins. Default: `get_coins_list`.
    pub sentiment_tool: String,
    /// Cache TTL for reports. Default: 600s.
    pub ttl_seconds: u64,
    /// Execution settings for each source fetch. Default: one attempt, 20s.
    pub execution: ExecutionConfig,
    /// Trigger patterns. Default: [`DEFAULT_TRIGGERS`].
    pub triggers: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            market_tool: "get_events".to_string(),
            sentiment_tool: "get_coins_list".to_string(),
            ttl_seconds: Namespace::Reasoning.ttl_seconds(),
            execution: ExecutionConfig::single_attempt().timeout(Duration::from_secs(20)),
            triggers: DEFAULT_TRIGGERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AggregatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn market_tool(mut self, name: impl Into<String>) -> Self {
        self.market_tool = name.into();
        self
    }

    pub fn sentiment_tool(mut self, name: impl Into<String>) -> Self {
        self.sentiment_tool = name.into();
        self
    }

    pub fn ttl_seconds(mut self, secs: u64) -> Self {
        self.ttl_seconds = secs;
        self
    }

    pub fn execution(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    pub fn triggers<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// The `combined_reasoning` composite tool.
pub struct ReasoningAggregator {
    registry: Weak<ToolRegistry>,
    cache: Arc<CacheStore>,
    executor: ToolExecutor,
    triggers: Triggers,
    config: AggregatorConfig,
}

impl ReasoningAggregator {
    /// Create an aggregator that finds its sources in `registry`.
    ///
    /// Fails only if a trigger pattern does not compile.
    pub fn new(
        registry: &Arc<ToolRegistry>,
        cache: Arc<CacheStore>,
        config: AggregatorConfig,
    ) -> Result<Self> {
        Ok(Self {
            registry: Arc::downgrade(registry),
            cache,
            executor: ToolExecutor::new(config.execution.clone()),
            triggers: Triggers::new(&config.triggers)?,
            config,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Whether a query uses positional/comparative language.
    pub fn qualifies(&self, query: &str) -> bool {
        self.triggers.matches(query)
    }

    /// Cache key for a (subject, query) pair.
    pub fn cache_key(subject: &str, query: &str) -> String {
        generate_key(subject, Namespace::Reasoning.as_str(), &[query])
    }

    fn source(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.upgrade()?.get(name)
    }

    /// Run the pipeline for one query. Never fails.
    #[instrument(skip(self, keyword))]
    pub async fn analyze(&self, query: &str, keyword: Option<&str>) -> Value {
        let subject = keyword
            .map(str::to_string)
            .unwrap_or_else(|| extract_subject(query));
        let key = Self::cache_key(&subject, query);

        if let Some(entry) = self.cache.get(&key)
            && let Some(result) = entry
                .payload
                .derived
                .as_ref()
                .and_then(|d| d.get("reasoningResult"))
                .filter(|r| r.as_array().is_some_and(|a| !a.is_empty()))
        {
            info!(
                key,
                expires_in_s = entry.seconds_until_expiry(self.cache.now()),
                "reasoning cache hit"
            );
            return result.clone();
        }

        if !self.qualifies(query) {
            debug!("query does not qualify for combined analysis");
            return json!([{ "info": NOT_QUALIFIED_INFO }]);
        }
        info!(
            subject,
            triggers = ?self.triggers.matching_patterns(query),
            "running combined analysis"
        );

        let market_tool = self.source(&self.config.market_tool);
        let sentiment_tool = self.source(&self.config.sentiment_tool);
        let (market, sentiment) = join(
            sources::fetch_market(&self.executor, market_tool.as_deref(), &subject),
            sources::fetch_sentiment(&self.executor, sentiment_tool.as_deref(), &subject),
        )
        .await;

        let data_sources = DataSources {
            source_a: market.info(),
            source_b: sentiment.info(),
        };
        let now = self.cache.now();
        let (report, summary) = match merge(&subject, market.records(), sentiment.records()) {
            Ok(merged) => {
                let scored = score(&merged.summary);
                debug!(
                    market_score = scored.market_score,
                    sentiment_score = scored.sentiment_score,
                    position = ?scored.position,
                    "scored context"
                );
                let report = analysis::report(&merged, &scored, data_sources, now);
                (report, Some(merged.summary))
            }
            Err(e) => {
                warn!(error = %e, "merge failed, returning fallback analysis");
                let report = analysis::fallback_report(
                    &subject,
                    market.records().len(),
                    sentiment.records().len(),
                    data_sources,
                    &e.to_string(),
                    now,
                );
                (report, None)
            }
        };

        let result = json!([report]);
        let payload = CachePayload::new(key.clone())
            .with_source_a(json!({ "events": market.records() }))
            .with_source_b(json!({ "coins": sentiment.records() }))
            .with_derived(json!({
                "reasoningResult": result,
                "summary": summary,
                "recordCounts": {
                    "sourceA": market.records().len(),
                    "sourceB": sentiment.records().len(),
                },
                "keyword": subject,
                "query": query,
                "cacheType": "reasoning_analysis",
                "queryHash": fingerprint(&subject, Namespace::Reasoning.as_str(), &[query]),
            }));
        self.cache.put(key, payload, self.config.ttl_seconds);

        result
    }
}

#[async_trait]
impl Tool for ReasoningAggregator {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Analyze market positions by combining prediction-market and sentiment data"
    }

    fn capability_tags(&self) -> &[&'static str] {
        &[COMPOSITE_TAG, "reasoning"]
    }

    fn examples(&self) -> &[&'static str] {
        &[
            "What will be better to take a position in this market?",
            "Should I go long or short on Trump market?",
            "Analyze Bitcoin sentiment: buy or sell?",
        ]
    }

    async fn invoke(&self, params: &Params) -> Result<Value> {
        let query = param_str(params, "query").unwrap_or_default();
        let keyword = param_str(params, "keyword");
        Ok(self.analyze(query, keyword).await)
    }

    fn should_handle(&self, query: &str) -> bool {
        self.qualifies(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_namespaced_and_stable() {
        let a = ReasoningAggregator::cache_key("Bitcoin", "Go long on BTC?");
        let b = ReasoningAggregator::cache_key("bitcoin", "go long on btc?");
        assert_eq!(a, b);
        assert!(a.starts_with("reasoning::bitcoin::"));
    }

    #[test]
    fn config_defaults() {
        let config = AggregatorConfig::default();
        assert_eq!(config.ttl_seconds, 600);
        assert_eq!(config.execution.max_attempts, 1);
        assert_eq!(config.market_tool, "get_events");
        assert_eq!(config.triggers.len(), DEFAULT_TRIGGERS.len());
    }

    #[test]
    fn invalid_trigger_fails_construction() {
        let registry = Arc::new(ToolRegistry::new());
        let cache = Arc::new(CacheStore::in_memory());
        let config = AggregatorConfig::new().triggers(["(bad"]);
        assert!(ReasoningAggregator::new(&registry, cache, config).is_err());
    }
}
