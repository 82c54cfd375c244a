//! Keyword dispatch rules for free-text queries.
//!
//! Rules are grouped by [`RuleKind`] and always evaluated in kind priority
//! order (source mention before domain keyword), then in declaration order.
//! Registration order of the tools themselves never affects which rule wins.
//!
//! Matching is a case-insensitive substring test, so `"bitcoin price"` matches
//! the term `"price"`.

use serde::{Deserialize, Serialize};

/// Default tool name for explicit requests that don't name one.
pub const DEFAULT_TOOL: &str = "get_events";

/// Priority class of a dispatch rule. Lower variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// The query names the upstream source outright.
    SourceMention,
    /// The query mentions a domain keyword the tool covers.
    DomainKeyword,
}

/// One keyword rule mapping query terms to a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRule {
    pub tool: String,
    pub kind: RuleKind,
    /// The rule matches if any of these terms appears in the query.
    pub any_of: Vec<String>,
    /// ...and none of these do.
    #[serde(default)]
    pub none_of: Vec<String>,
}

impl DispatchRule {
    pub fn matches(&self, query_lower: &str) -> bool {
        self.any_of
            .iter()
            .any(|t| query_lower.contains(t.to_lowercase().as_str()))
            && !self
                .none_of
                .iter()
                .any(|t| query_lower.contains(t.to_lowercase().as_str()))
    }
}

/// Ordered keyword rules plus the default tool name.
///
/// [`Default`] carries the market/sentiment rules:
///
/// ```rust
/// # use raven::registry::DispatchRules;
/// let rules = DispatchRules::default();
/// assert_eq!(rules.candidates("what does polymarket say?")[0], "get_events");
/// assert_eq!(rules.candidates("bitcoin price and sentiment")[0], "get_coins_list");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRules {
    #[serde(default)]
    pub rules: Vec<DispatchRule>,
    #[serde(default = "default_tool_name")]
    pub default_tool: String,
}

fn default_tool_name() -> String {
    DEFAULT_TOOL.to_string()
}

impl Default for DispatchRules {
    fn default() -> Self {
        Self::empty()
            .source("get_events", &["polymarket"])
            .source("get_coins_list", &["lunarcrush"])
            .domain(
                "get_events",
                &["events", "market", "prediction", "sports", "politics"],
            )
            .domain_excluding(
                "get_coins_list",
                &["coins", "price", "sentiment", "galaxy"],
                &["events", "market", "prediction"],
            )
    }
}

impl DispatchRules {
    /// No keyword rules, default tool [`DEFAULT_TOOL`].
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            default_tool: default_tool_name(),
        }
    }

    /// Add a source-mention rule.
    pub fn source(self, tool: &str, terms: &[&str]) -> Self {
        self.rule(tool, RuleKind::SourceMention, terms, &[])
    }

    /// Add a domain-keyword rule.
    pub fn domain(self, tool: &str, terms: &[&str]) -> Self {
        self.rule(tool, RuleKind::DomainKeyword, terms, &[])
    }

    /// Add a domain-keyword rule that is suppressed by any of `unless`.
    pub fn domain_excluding(self, tool: &str, terms: &[&str], unless: &[&str]) -> Self {
        self.rule(tool, RuleKind::DomainKeyword, terms, unless)
    }

    fn rule(mut self, tool: &str, kind: RuleKind, any_of: &[&str], none_of: &[&str]) -> Self {
        self.rules.push(DispatchRule {
            tool: tool.to_string(),
            kind,
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
            none_of: none_of.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Set the default tool name.
    pub fn default_tool(mut self, name: impl Into<String>) -> Self {
        self.default_tool = name.into();
        self
    }

    /// Tool names whose rules match `query`, highest priority first.
    ///
    /// A tool may appear more than once; the caller takes the first one it
    /// has registered.
    pub fn candidates(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        let mut matched: Vec<&DispatchRule> =
            self.rules.iter().filter(|r| r.matches(&query)).collect();
        // Stable: declaration order is kept within a kind.
        matched.sort_by_key(|r| r.kind);
        matched.into_iter().map(|r| r.tool.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_mention_beats_domain_keyword() {
        let rules = DispatchRules::default();
        // "coins" alone would pick the sentiment tool; the source name wins.
        assert_eq!(
            rules.candidates("polymarket coins")[0],
            "get_events",
        );
        assert_eq!(rules.candidates("lunarcrush events")[0], "get_coins_list");
    }

    #[test]
    fn domain_exclusion() {
        let rules = DispatchRules::default();
        assert_eq!(rules.candidates("coin price"), vec!["get_coins_list"]);
        assert_eq!(rules.candidates("price of prediction"), vec!["get_events"]);
    }

    #[test]
    fn case_insensitive() {
        let rules = DispatchRules::default();
        assert_eq!(rules.candidates("SPORTS tonight"), vec!["get_events"]);
    }

    #[test]
    fn declaration_order_does_not_beat_kind() {
        let rules = DispatchRules::empty()
            .domain("b", &["x"])
            .source("a", &["x"]);
        assert_eq!(rules.candidates("x"), vec!["a", "b"]);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(DispatchRules::default().candidates("hello").is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let rules: DispatchRules = serde_json::from_str(r#"{"rules": []}"#).unwrap();
        assert_eq!(rules.default_tool, DEFAULT_TOOL);
    }
}
