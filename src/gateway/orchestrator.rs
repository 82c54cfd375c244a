//! Orchestrator - dispatch, parameter preparation and execution for queries

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStore, HealthCache};
use crate::executor::ToolExecutor;
use crate::reasoning::extract_subject;
use crate::registry::{DispatchRule, ToolRegistry};
use crate::types::{HealthReport, Params, QueryOutcome, Record, ToolInfo};
use crate::{Result, Tool};

/// Snapshot of how free-text queries are routed.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingInfo {
    pub default_tool: String,
    /// Composite tools consulted before keyword rules, in registration order.
    pub composite_tools: Vec<String>,
    pub rules: Vec<DispatchRule>,
    pub tools: Vec<ToolInfo>,
}

/// Front door for queries: owns the registry, the shared cache and the
/// execution wrapper.
///
/// Built with [`Raven::builder()`](super::Raven::builder).
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    cache: Arc<CacheStore>,
    executor: ToolExecutor,
    health: HealthCache,
}

impl Orchestrator {
    pub(crate) fn new(
        registry: Arc<ToolRegistry>,
        cache: Arc<CacheStore>,
        executor: ToolExecutor,
        health: HealthCache,
    ) -> Self {
        Self {
            registry,
            cache,
            executor,
            health,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Answer a free-text query.
    ///
    /// `extra` parameters override the prepared ones but leave routing to the
    /// query text. Only an explicit `"tool"` entry picks the tool, and even
    /// then a composite tool that claims the query wins.
    #[instrument(skip(self, extra))]
    pub async fn query(&self, text: &str, extra: Option<Params>) -> QueryOutcome {
        match self.try_query(text, extra).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "query failed");
                e.into()
            }
        }
    }

    async fn try_query(&self, text: &str, extra: Option<Params>) -> Result<QueryOutcome> {
        let routing = extra.as_ref().filter(|p| p.contains_key("tool"));
        let tool = self.registry.intelligent_dispatch(text, routing)?;
        let params = prepare_params(tool.as_ref(), text, extra);
        debug!(tool = tool.name(), ?params, "prepared parameters");
        let records = self.executor.execute(tool.as_ref(), &params).await?;
        info!(tool = tool.name(), records = records.len(), "query answered");
        Ok(QueryOutcome::Success {
            tool: tool.name().to_string(),
            records,
        })
    }

    /// Run explicit parameters; `"tool"` names the tool, otherwise the
    /// default tool runs.
    #[instrument(skip(self, params))]
    pub async fn run(&self, params: Params) -> QueryOutcome {
        let tool = match self.registry.resolve(&params) {
            Ok(tool) => tool,
            Err(e) => return e.into(),
        };
        match self.executor.execute(tool.as_ref(), &params).await {
            Ok(records) => QueryOutcome::Success {
                tool: tool.name().to_string(),
                records,
            },
            Err(e) => {
                warn!(tool = tool.name(), error = %e, "run failed");
                e.into()
            }
        }
    }

    /// Run several explicit requests concurrently.
    ///
    /// Requests naming an unknown tool are logged and skipped; failed
    /// executions yield an empty record list.
    pub async fn run_concurrently(&self, requests: Vec<Params>) -> HashMap<String, Vec<Record>> {
        let calls = requests
            .into_iter()
            .filter_map(|params| match self.registry.resolve(&params) {
                Ok(tool) => Some((tool, params)),
                Err(e) => {
                    warn!(error = %e, "skipping unresolvable request");
                    None
                }
            })
            .collect();
        self.executor.execute_concurrently(calls).await
    }

    /// Health of every registered tool, probed concurrently.
    ///
    /// Reports are memoised briefly so repeated calls don't hammer upstream.
    pub async fn health(&self) -> Vec<HealthReport> {
        let probes = self.registry.tools().into_iter().map(|tool| async move {
            if let Some(report) = self.health.get(tool.name()).await {
                return report;
            }
            let report = self.executor.health_check_tool(tool.as_ref()).await;
            self.health.insert(report.clone()).await;
            report
        });
        join_all(probes).await
    }

    /// Metadata for every registered tool.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry.list()
    }

    pub fn routing_info(&self) -> RoutingInfo {
        let tools = self.registry.tools();
        RoutingInfo {
            default_tool: self.registry.rules().default_tool.clone(),
            composite_tools: tools
                .iter()
                .filter(|t| t.is_composite())
                .map(|t| t.name().to_string())
                .collect(),
            rules: self.registry.rules().rules.clone(),
            tools: tools.iter().map(|t| t.info()).collect(),
        }
    }

    /// Flush the cache snapshot and drop memoised health reports.
    pub fn shutdown(&self) {
        self.health.invalidate_all();
        self.cache.shutdown();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("executor", &self.executor)
            .finish()
    }
}

/// Fill in the parameters a tool expects for a free-text query.
///
/// Defaults depend on the tool's capability tags; explicit `extra` values
/// always win.
fn prepare_params(tool: &dyn Tool, text: &str, extra: Option<Params>) -> Params {
    let mut params = extra.unwrap_or_default();
    let tags = tool.capability_tags();
    let mut default = |key: &str, value: Value| {
        params.entry(key.to_string()).or_insert(value);
    };

    default("query", json!(text));
    if tool.is_composite() {
        return params;
    }
    if tags.contains(&"events") {
        default("keyword", json!(extract_subject(text)));
        default("limit", json!(5));
        default("time_filter", json!("recent"));
    } else if tags.contains(&"coins") {
        default("limit", json!(10));
        default("sort", json!("mc"));
        default("category", json!(""));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Tagged(&'static str, &'static [&'static str]);

    #[async_trait]
    impl Tool for Tagged {
        fn name(&self) -> &str {
            self.0
        }

        fn capability_tags(&self) -> &[&'static str] {
            self.1
        }

        async fn invoke(&self, _params: &Params) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn event_tools_get_subject_keyword() {
        let tool = Tagged("get_events", &["prediction-markets", "events"]);
        let params = prepare_params(&tool, "show me the bitcoin markets", None);
        assert_eq!(params["keyword"], "Bitcoin");
        assert_eq!(params["limit"], 5);
        assert_eq!(params["time_filter"], "recent");
        assert_eq!(params["query"], "show me the bitcoin markets");
    }

    #[test]
    fn coin_tools_get_list_defaults() {
        let tool = Tagged("get_coins_list", &["sentiment", "coins"]);
        let params = prepare_params(&tool, "top coins", None);
        assert_eq!(params["limit"], 10);
        assert_eq!(params["sort"], "mc");
        assert_eq!(params["category"], "");
        assert!(!params.contains_key("keyword"));
    }

    #[test]
    fn extra_params_win() {
        let tool = Tagged("get_coins_list", &["coins"]);
        let extra = json!({"limit": 3, "sort": "gs"}).as_object().cloned();
        let params = prepare_params(&tool, "coins", extra);
        assert_eq!(params["limit"], 3);
        assert_eq!(params["sort"], "gs");
    }

    #[test]
    fn composite_tools_only_get_query() {
        let tool = Tagged("combined_reasoning", &[crate::COMPOSITE_TAG, "events"]);
        let params = prepare_params(&tool, "long or short?", None);
        assert_eq!(params.len(), 1);
        assert_eq!(params["query"], "long or short?");
    }
}
