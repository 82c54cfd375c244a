//! Tests for [`ToolRegistry`] resolution and free-text dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use raven::registry::{DispatchRules, ToolRegistry};
use raven::{COMPOSITE_TAG, Params, RavenError, Result, Tool};

struct Named(&'static str);

#[async_trait]
impl Tool for Named {
    fn name(&self) -> &str {
        self.0
    }

    async fn invoke(&self, _params: &Params) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Composite tool that claims queries mentioning "long".
struct Composite;

#[async_trait]
impl Tool for Composite {
    fn name(&self) -> &str {
        "combined_reasoning"
    }

    fn capability_tags(&self) -> &[&'static str] {
        &[COMPOSITE_TAG]
    }

    async fn invoke(&self, _params: &Params) -> Result<Value> {
        Ok(Value::Null)
    }

    fn should_handle(&self, query: &str) -> bool {
        query.to_lowercase().contains("long")
    }
}

/// Claims everything but lacks the composite tag, so is never consulted.
struct Greedy;

#[async_trait]
impl Tool for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    async fn invoke(&self, _params: &Params) -> Result<Value> {
        Ok(Value::Null)
    }

    fn should_handle(&self, _query: &str) -> bool {
        true
    }
}

fn params(value: Value) -> Params {
    value.as_object().cloned().unwrap()
}

fn registry(names: &[&'static str]) -> ToolRegistry {
    let registry = ToolRegistry::new();
    for name in names {
        assert!(registry.register(Arc::new(Named(name))));
    }
    registry
}

const QUERIES: &[&str] = &[
    "",
    "hello there",
    "polymarket coins",
    "lunarcrush events",
    "bitcoin price",
    "who wins the election market?",
    "sports tonight",
    "should I go long?",
    "galaxy score for ETH",
];

// =========================================================================
// Registration
// =========================================================================

#[test]
fn register_replaces_in_place() {
    let registry = registry(&["a", "b", "c"]);
    assert!(registry.register(Arc::new(Named("b"))));
    assert_eq!(registry.names(), vec!["a", "b", "c"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn blank_names_are_rejected() {
    let registry = ToolRegistry::new();
    assert!(!registry.register(Arc::new(Named(" "))));
    assert!(registry.is_empty());
}

#[test]
fn unregister_removes() {
    let registry = registry(&["get_events", "get_coins_list"]);
    assert!(registry.unregister("get_events"));
    assert!(!registry.unregister("get_events"));
    assert_eq!(registry.names(), vec!["get_coins_list"]);
}

// =========================================================================
// resolve
// =========================================================================

#[test]
fn resolve_uses_tool_param_or_default() {
    let registry = registry(&["get_coins_list", "get_events"]);
    let tool = registry
        .resolve(&params(json!({ "tool": "get_coins_list" })))
        .unwrap();
    assert_eq!(tool.name(), "get_coins_list");

    let tool = registry.resolve(&Params::new()).unwrap();
    assert_eq!(tool.name(), "get_events");
}

#[test]
fn resolve_unknown_tool_lists_available() {
    let registry = registry(&["get_events"]);
    match registry.resolve(&params(json!({ "tool": "nope" }))) {
        Err(RavenError::ToolNotFound { name, available }) => {
            assert_eq!(name, "nope");
            assert_eq!(available, vec!["get_events"]);
        }
        Err(other) => panic!("expected ToolNotFound, got {other:?}"),
        Ok(tool) => panic!("expected ToolNotFound, got {}", tool.name()),
    }
}

#[test]
fn resolve_missing_default_is_not_found() {
    let registry = registry(&["get_coins_list"]);
    assert!(matches!(
        registry.resolve(&Params::new()),
        Err(RavenError::ToolNotFound { .. })
    ));
}

// =========================================================================
// intelligent_dispatch
// =========================================================================

#[test]
fn dispatch_is_total_over_a_non_empty_registry() {
    let registry = registry(&["custom"]);
    for query in QUERIES {
        let tool = registry.intelligent_dispatch(query, None).unwrap();
        assert_eq!(tool.name(), "custom", "query {query:?}");
    }
}

#[test]
fn empty_registry_is_tool_not_found() {
    let registry = ToolRegistry::new();
    for query in QUERIES {
        assert!(matches!(
            registry.intelligent_dispatch(query, None),
            Err(RavenError::ToolNotFound { .. })
        ));
    }
}

#[test]
fn rule_priority_ignores_registration_order() {
    let forward = registry(&["get_events", "get_coins_list"]);
    let backward = registry(&["get_coins_list", "get_events"]);
    for query in QUERIES {
        let a = forward.intelligent_dispatch(query, None).unwrap();
        let b = backward.intelligent_dispatch(query, None).unwrap();
        assert_eq!(a.name(), b.name(), "query {query:?}");
    }
}

#[test]
fn keyword_rules_pick_the_source() {
    let registry = registry(&["get_events", "get_coins_list"]);
    let pick = |q| registry.intelligent_dispatch(q, None).unwrap().name().to_string();
    assert_eq!(pick("polymarket coins"), "get_events");
    assert_eq!(pick("lunarcrush events"), "get_coins_list");
    assert_eq!(pick("bitcoin price"), "get_coins_list");
    assert_eq!(pick("bitcoin prediction price"), "get_events");
    assert_eq!(pick("hello there"), "get_events");
}

#[test]
fn unregistered_rule_target_falls_through() {
    let registry = registry(&["get_events"]);
    let tool = registry.intelligent_dispatch("bitcoin price", None).unwrap();
    assert_eq!(tool.name(), "get_events");
}

#[test]
fn composite_claims_before_rules_and_params() {
    let registry = registry(&["get_events", "get_coins_list"]);
    registry.register(Arc::new(Composite));

    let tool = registry
        .intelligent_dispatch("polymarket: go long?", None)
        .unwrap();
    assert_eq!(tool.name(), "combined_reasoning");

    let explicit = params(json!({ "tool": "get_coins_list" }));
    let tool = registry
        .intelligent_dispatch("long or short", Some(&explicit))
        .unwrap();
    assert_eq!(tool.name(), "combined_reasoning");

    let tool = registry.intelligent_dispatch("sports", None).unwrap();
    assert_eq!(tool.name(), "get_events");
}

#[test]
fn untagged_tools_never_claim_queries() {
    let registry = registry(&["get_coins_list"]);
    registry.register(Arc::new(Greedy));
    let tool = registry.intelligent_dispatch("bitcoin price", None).unwrap();
    assert_eq!(tool.name(), "get_coins_list");
}

#[test]
fn explicit_params_resolve() {
    let registry = registry(&["get_events", "get_coins_list"]);
    let explicit = params(json!({ "tool": "get_coins_list" }));
    let tool = registry
        .intelligent_dispatch("sports tonight", Some(&explicit))
        .unwrap();
    assert_eq!(tool.name(), "get_coins_list");

    let bad = params(json!({ "tool": "missing" }));
    assert!(registry.intelligent_dispatch("sports", Some(&bad)).is_err());

    // Empty params are treated as none.
    let tool = registry
        .intelligent_dispatch("bitcoin price", Some(&Params::new()))
        .unwrap();
    assert_eq!(tool.name(), "get_coins_list");
}

#[test]
fn custom_default_tool() {
    let registry = ToolRegistry::with_rules(DispatchRules::empty().default_tool("b"));
    registry.register(Arc::new(Named("a")));
    registry.register(Arc::new(Named("b")));
    let tool = registry.intelligent_dispatch("anything", None).unwrap();
    assert_eq!(tool.name(), "b");
}
