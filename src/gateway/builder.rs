//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::Orchestrator;
use crate::cache::{CacheConfig, CacheStore, HealthCache, HealthCacheConfig};
use crate::executor::{ExecutionConfig, ToolExecutor};
use crate::providers::{LunarCrushClient, PolymarketClient};
use crate::reasoning::{AggregatorConfig, ReasoningAggregator};
use crate::registry::{DispatchRules, ToolRegistry};
use crate::{RavenError, Result, Tool};

/// Main entry point for creating orchestrator instances.
pub struct Raven;

impl Raven {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> RavenBuilder {
        RavenBuilder::new()
    }
}

/// Builder for configuring orchestrator instances.
///
/// Tools are registered in a fixed order: Polymarket, LunarCrush, custom
/// tools in the order added, then the reasoning aggregator.
pub struct RavenBuilder {
    cache_config: CacheConfig,
    cache: Option<Arc<CacheStore>>,
    execution: ExecutionConfig,
    rules: DispatchRules,
    polymarket_url: Option<String>,
    lunarcrush_key: Option<String>,
    lunarcrush_url: Option<String>,
    http_timeout: Option<Duration>,
    reasoning: Option<AggregatorConfig>,
    health_cache: HealthCacheConfig,
    tools: Vec<Arc<dyn Tool>>,
}

impl Default for RavenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RavenBuilder {
    pub fn new() -> Self {
        Self {
            cache_config: CacheConfig::default(),
            cache: None,
            execution: ExecutionConfig::default(),
            rules: DispatchRules::default(),
            polymarket_url: None,
            lunarcrush_key: None,
            lunarcrush_url: None,
            http_timeout: None,
            reasoning: Some(AggregatorConfig::default()),
            health_cache: HealthCacheConfig::default(),
            tools: Vec::new(),
        }
    }

    /// Configure the cache store built by [`build`](Self::build).
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Share an existing cache store instead of building one.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Timeout and retry settings for tool execution.
    pub fn execution(mut self, config: ExecutionConfig) -> Self {
        self.execution = config;
        self
    }

    /// Keyword dispatch rules and default tool.
    pub fn dispatch_rules(mut self, rules: DispatchRules) -> Self {
        self.rules = rules;
        self
    }

    /// Enable the Polymarket events tool against the public API.
    pub fn polymarket(self) -> Self {
        self.polymarket_url(crate::providers::polymarket::DEFAULT_BASE_URL)
    }

    /// Enable the Polymarket events tool against a custom base URL.
    pub fn polymarket_url(mut self, base_url: impl Into<String>) -> Self {
        self.polymarket_url = Some(base_url.into());
        self
    }

    /// Enable the LunarCrush coins tool.
    pub fn lunarcrush(mut self, api_key: impl Into<String>) -> Self {
        self.lunarcrush_key = Some(api_key.into());
        self
    }

    /// Override the LunarCrush base URL.
    pub fn lunarcrush_url(mut self, base_url: impl Into<String>) -> Self {
        self.lunarcrush_url = Some(base_url.into());
        self
    }

    /// Per-request HTTP timeout for the upstream clients.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Configure the reasoning aggregator (enabled by default).
    pub fn reasoning(mut self, config: AggregatorConfig) -> Self {
        self.reasoning = Some(config);
        self
    }

    /// Don't register the reasoning aggregator.
    pub fn without_reasoning(mut self) -> Self {
        self.reasoning = None;
        self
    }

    /// Memoisation settings for health reports.
    pub fn health_cache(mut self, config: HealthCacheConfig) -> Self {
        self.health_cache = config;
        self
    }

    /// Register an additional tool.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails with [`RavenError::Configuration`] if a tool is invalid, a
    /// trigger pattern does not compile, or no tool is configured.
    pub fn build(self) -> Result<Orchestrator> {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CacheStore::new(self.cache_config)));
        let registry = Arc::new(ToolRegistry::with_rules(self.rules));

        if let Some(url) = self.polymarket_url {
            let mut client = PolymarketClient::with_base_url(url).with_cache(cache.clone());
            if let Some(timeout) = self.http_timeout {
                client = client.with_timeout(timeout);
            }
            registry.register(Arc::new(client));
        }

        match self.lunarcrush_key {
            Some(key) => {
                let url = self
                    .lunarcrush_url
                    .unwrap_or_else(|| crate::providers::lunarcrush::DEFAULT_BASE_URL.to_string());
                let mut client = LunarCrushClient::with_base_url(key, url).with_cache(cache.clone());
                if let Some(timeout) = self.http_timeout {
                    client = client.with_timeout(timeout);
                }
                registry.register(Arc::new(client));
            }
            None if self.lunarcrush_url.is_some() => {
                warn!("LunarCrush URL configured without an API key, tool not registered");
            }
            None => {}
        }

        for tool in self.tools {
            let name = tool.name().to_string();
            if !registry.register(tool) {
                return Err(RavenError::Configuration(format!(
                    "invalid tool '{name}': tools need a non-blank name"
                )));
            }
        }

        if let Some(config) = self.reasoning {
            let aggregator = ReasoningAggregator::new(&registry, cache.clone(), config)?;
            registry.register(Arc::new(aggregator));
        }

        if registry.is_empty() {
            return Err(RavenError::Configuration("no tools configured".to_string()));
        }

        info!(
            tools = ?registry.names(),
            default_tool = %registry.rules().default_tool,
            "orchestrator ready"
        );

        Ok(Orchestrator::new(
            registry,
            cache,
            ToolExecutor::new(self.execution),
            HealthCache::new(&self.health_cache),
        ))
    }
}
