//! End-to-end tests through the orchestrator, with wiremock standing in for
//! Polymarket and LunarCrush.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use raven::{
    ExecutionConfig, FailureKind, HealthStatus, Orchestrator, Params, QueryOutcome, Raven,
    RavenError, Result, Tool,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Hangs;

#[async_trait]
impl Tool for Hangs {
    fn name(&self) -> &str {
        "hangs"
    }

    async fn invoke(&self, _params: &Params) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, params: &Params) -> Result<Value> {
        Ok(Value::Object(params.clone()))
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap()
}

async fn polymarket_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "1",
                "title": "Bitcoin above $100k by December?",
                "slug": "btc-100k",
                "volume": 1250000,
                "outcomePrices": "[\"0.65\", \"0.35\"]"
            },
            {
                "id": "2",
                "title": "NBA Finals winner",
                "slug": "nba-finals",
                "volume": 400000,
                "outcomePrices": "[\"0.40\", \"0.60\"]"
            }
        ])))
        .mount(&server)
        .await;
    server
}

async fn lunarcrush_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/list/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "s": "BTC", "n": "Bitcoin", "p": 64000.0, "gs": 85.2, "pc": 2.45 },
                { "s": "ETH", "n": "Ethereum", "p": 3100.0, "gs": 60.0, "pc": 1.1 }
            ]
        })))
        .mount(&server)
        .await;
    server
}

async fn orchestrator(polymarket: &MockServer, lunarcrush: &MockServer) -> Orchestrator {
    Raven::builder()
        .polymarket_url(polymarket.uri())
        .lunarcrush("lc-test")
        .lunarcrush_url(lunarcrush.uri())
        .execution(ExecutionConfig::single_attempt().timeout(Duration::from_secs(5)))
        .build()
        .unwrap()
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn event_query_reaches_polymarket() {
    let (pm, lc) = (polymarket_server().await, lunarcrush_server().await);
    let raven = orchestrator(&pm, &lc).await;

    let outcome = raven
        .query(
            "show me sports events",
            Some(params(json!({ "keyword": "sports" }))),
        )
        .await;

    match &outcome {
        QueryOutcome::Success { tool, records } => {
            assert_eq!(tool, "get_events");
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["title"], "NBA Finals winner");
            assert_eq!(records[0]["price"], 0.4);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn coin_query_reaches_lunarcrush_with_prepared_params() {
    let pm = polymarket_server().await;
    let lc = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/list/v1"))
        .and(query_param("limit", "10"))
        .and(query_param("sort", "mc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "symbol": "BTC", "name": "Bitcoin" }
        ])))
        .expect(1)
        .mount(&lc)
        .await;
    let raven = orchestrator(&pm, &lc).await;

    let outcome = raven.query("bitcoin price", None).await;
    match &outcome {
        QueryOutcome::Success { tool, records } => {
            assert_eq!(tool, "get_coins_list");
            assert_eq!(records[0]["symbol"], "BTC");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn extra_params_do_not_change_routing() {
    let pm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&pm)
        .await;
    let lc = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/list/v1"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "symbol": "BTC", "name": "Bitcoin", "galaxy_score": 85.2 }
        ])))
        .expect(1)
        .mount(&lc)
        .await;
    let raven = orchestrator(&pm, &lc).await;

    let outcome = raven
        .query("top coins by galaxy score", Some(params(json!({ "limit": 3 }))))
        .await;
    match &outcome {
        QueryOutcome::Success { tool, records } => {
            assert_eq!(tool, "get_coins_list");
            assert_eq!(records.len(), 1);
        }
        other => panic!("expected success, got {other:?}"),
    }

    // An explicit tool still routes.
    let outcome = raven
        .query(
            "top coins by galaxy score",
            Some(params(json!({ "tool": "get_events", "keyword": "general" }))),
        )
        .await;
    match &outcome {
        QueryOutcome::Success { tool, .. } => assert_eq!(tool, "get_events"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn position_query_is_answered_by_the_aggregator() {
    let (pm, lc) = (polymarket_server().await, lunarcrush_server().await);
    let raven = orchestrator(&pm, &lc).await;

    let outcome = raven
        .query("Should I go long or short on Bitcoin?", None)
        .await;
    match &outcome {
        QueryOutcome::Success { tool, records } => {
            assert_eq!(tool, "combined_reasoning");
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["dataSources"]["sourceA"]["status"], "live");
            assert_eq!(records[0]["dataSources"]["sourceB"]["status"], "live");
            assert!(records[0]["recommendation"]["position"].is_string());
        }
        other => panic!("expected success, got {other:?}"),
    }

    // The report and both source results are cached.
    let namespaces: Vec<String> = raven
        .cache()
        .list_entries(false)
        .into_iter()
        .map(|e| e.namespace)
        .collect();
    assert!(namespaces.iter().any(|n| n == "reasoning"));
    assert!(namespaces.iter().any(|n| n == "polymarket"));
    assert!(namespaces.iter().any(|n| n == "lunarcrush"));
}

#[tokio::test]
async fn unknown_tool_is_a_failure_value() {
    let raven = Raven::builder()
        .tool(Arc::new(Echo))
        .without_reasoning()
        .build()
        .unwrap();

    let outcome = raven.run(params(json!({ "tool": "nope" }))).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::ToolNotFound));
    assert!(outcome.records().is_empty());

    // Free text still lands on the only registered tool.
    let outcome = raven.query("hello", None).await;
    match outcome {
        QueryOutcome::Success { tool, records } => {
            assert_eq!(tool, "echo");
            assert_eq!(records[0]["query"], "hello");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn hanging_tool_times_out() {
    let raven = Raven::builder()
        .tool(Arc::new(Hangs))
        .without_reasoning()
        .execution(
            ExecutionConfig::new()
                .timeout(Duration::from_secs(2))
                .max_attempts(2),
        )
        .build()
        .unwrap();

    let outcome = raven.run(params(json!({ "tool": "hangs" }))).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::ExecutionTimeout));
    match outcome {
        QueryOutcome::Failure { message, .. } => assert!(message.contains("hangs")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn run_concurrently_skips_unknown_tools() {
    let (pm, lc) = (polymarket_server().await, lunarcrush_server().await);
    let raven = orchestrator(&pm, &lc).await;

    let results = raven
        .run_concurrently(vec![
            params(json!({ "tool": "get_events", "limit": 1 })),
            params(json!({ "tool": "get_coins_list" })),
            params(json!({ "tool": "nope" })),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results["get_events"].len(), 1);
    assert_eq!(results["get_coins_list"].len(), 2);
}

// ============================================================================
// Health and introspection
// ============================================================================

#[tokio::test]
async fn health_reports_each_tool() {
    let pm = polymarket_server().await;
    let lc = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/list/v1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&lc)
        .await;
    let raven = orchestrator(&pm, &lc).await;

    let reports = raven.health().await;
    assert_eq!(reports.len(), 3);
    let status = |name: &str| {
        reports
            .iter()
            .find(|r| r.tool == name)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status("get_events"), HealthStatus::Healthy);
    assert_eq!(status("get_coins_list"), HealthStatus::Unhealthy);
}

#[tokio::test]
async fn routing_info_describes_dispatch() {
    let (pm, lc) = (polymarket_server().await, lunarcrush_server().await);
    let raven = orchestrator(&pm, &lc).await;

    let info = raven.routing_info();
    assert_eq!(info.default_tool, "get_events");
    assert_eq!(info.composite_tools, vec!["combined_reasoning"]);
    assert!(!info.rules.is_empty());
    let names: Vec<&str> = info.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_events", "get_coins_list", "combined_reasoning"]);
    assert_eq!(raven.list_tools().len(), 3);
}

#[test]
fn building_without_tools_fails() {
    let err = Raven::builder().without_reasoning().build().unwrap_err();
    assert!(matches!(err, RavenError::Configuration(_)));
}

#[tokio::test]
async fn shutdown_releases_the_cache() {
    let (pm, lc) = (polymarket_server().await, lunarcrush_server().await);
    let raven = orchestrator(&pm, &lc).await;
    raven.query("bitcoin price", None).await;
    assert!(!raven.cache().is_empty());

    raven.shutdown();
    assert!(raven.cache().is_empty());
}
