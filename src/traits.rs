//! Core Tool trait

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::types::{Params, ToolInfo};

/// Capability tag carried by tools that orchestrate other tools.
///
/// The dispatcher only consults [`Tool::should_handle`] on tools with this tag.
pub const COMPOSITE_TAG: &str = "composite";

/// A registered capability: one upstream data source or a composite of several.
///
/// Tools are constructed once at startup and registered explicitly with a
/// [`ToolRegistry`](crate::registry::ToolRegistry); there is no runtime
/// discovery.
///
/// `invoke` may return any JSON value. The execution wrapper normalises it
/// into a list of records: arrays are taken as-is, `null` becomes an empty
/// list and anything else is wrapped in a one-element list.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, used as the registry key.
    fn name(&self) -> &str;

    /// One-line human readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Capability tags (e.g. `"prediction-markets"`, `"sentiment"`, [`COMPOSITE_TAG`]).
    fn capability_tags(&self) -> &[&'static str] {
        &[]
    }

    /// Example queries this tool answers, for listings.
    fn examples(&self) -> &[&'static str] {
        &[]
    }

    /// Run the tool with structured parameters.
    async fn invoke(&self, params: &Params) -> Result<Value>;

    /// Optional health probe.
    ///
    /// `Ok(None)` means the tool has no probe of its own; `Ok(Some(details))`
    /// is a passing probe and `Err` a failing one.
    async fn health_check(&self) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Whether a composite tool wants to take over this free-text query.
    fn should_handle(&self, _query: &str) -> bool {
        false
    }

    /// Whether this tool carries [`COMPOSITE_TAG`].
    fn is_composite(&self) -> bool {
        self.capability_tags().contains(&COMPOSITE_TAG)
    }

    /// Listing metadata for this tool.
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            tags: self
                .capability_tags()
                .iter()
                .map(|t| t.to_string())
                .collect(),
            examples: self.examples().iter().map(|e| e.to_string()).collect(),
        }
    }
}
