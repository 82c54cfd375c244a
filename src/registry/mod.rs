//! Tool registry and dispatcher.
//!
//! The registry holds tools in registration order. It is populated once at
//! startup from a fixed list (see [`RavenBuilder`](crate::RavenBuilder)) and
//! only changes through explicit [`register`](ToolRegistry::register) and
//! [`unregister`](ToolRegistry::unregister) calls.
//!
//! # Dispatch
//!
//! ```text
//! resolve(params)                 intelligent_dispatch(query, params)
//!   params["tool"] or default       1. composite tool whose should_handle(query) matches
//!   registered? ─► tool             2. resolve(params) when params are supplied
//!   else ToolNotFound               3. keyword rules (source mention > domain keyword)
//!                                   4. default tool
//!                                   5. first registered tool
//!                                   6. ToolNotFound
//! ```
//!
//! Both paths are total: they return a registered tool or `ToolNotFound`.

pub mod dispatch;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, instrument};

pub use dispatch::{DEFAULT_TOOL, DispatchRule, DispatchRules, RuleKind};

use crate::executor::ToolExecutor;
use crate::types::{Params, ToolInfo, param_str};
use crate::{RavenError, Result, Tool};

/// Registered tools plus the rules used to pick one.
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
    rules: DispatchRules,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Empty registry with the default dispatch rules.
    pub fn new() -> Self {
        Self::with_rules(DispatchRules::default())
    }

    /// Empty registry with custom dispatch rules.
    pub fn with_rules(rules: DispatchRules) -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
            rules,
        }
    }

    pub fn rules(&self) -> &DispatchRules {
        &self.rules
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn Tool>>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Tool>>> {
        self.tools.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tool, replacing any tool with the same name in place.
    ///
    /// Returns `false` (and logs) if the tool fails validation.
    pub fn register(&self, tool: Arc<dyn Tool>) -> bool {
        if !ToolExecutor::validate(tool.as_ref()) {
            error!(name = tool.name(), "refusing to register invalid tool");
            return false;
        }
        let name = tool.name().to_string();
        let mut tools = self.write();
        match tools.iter().position(|t| t.name() == name) {
            Some(idx) => {
                tools[idx] = tool;
                info!(tool = %name, "replaced registered tool");
            }
            None => {
                tools.push(tool);
                info!(tool = %name, total = tools.len(), "registered tool");
            }
        }
        true
    }

    /// Remove a tool by name. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut tools = self.write();
        let before = tools.len();
        tools.retain(|t| t.name() != name);
        let removed = tools.len() != before;
        if removed {
            info!(tool = name, "unregistered tool");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().iter().any(|t| t.name() == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|t| t.name().to_string()).collect()
    }

    /// Listing metadata for every registered tool.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.read().iter().map(|t| t.info()).collect()
    }

    /// Snapshot of the registered tools.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn not_found(&self, name: &str) -> RavenError {
        RavenError::ToolNotFound {
            name: name.to_string(),
            available: self.names(),
        }
    }

    /// Resolve explicit parameters to a tool.
    ///
    /// The `"tool"` parameter names the tool; without it the default tool is
    /// used.
    pub fn resolve(&self, params: &Params) -> Result<Arc<dyn Tool>> {
        let name = param_str(params, "tool").unwrap_or(self.rules.default_tool.as_str());
        self.get(name).ok_or_else(|| self.not_found(name))
    }

    /// Pick a tool for a free-text query.
    #[instrument(skip(self, params), fields(has_params = params.is_some()))]
    pub fn intelligent_dispatch(
        &self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<Arc<dyn Tool>> {
        let tools = self.tools();

        if let Some(tool) = tools
            .iter()
            .find(|t| t.is_composite() && t.should_handle(query))
        {
            info!(tool = tool.name(), "dispatch: composite tool claimed query");
            return Ok(tool.clone());
        }

        if let Some(params) = params
            && !params.is_empty()
        {
            let tool = self.resolve(params)?;
            debug!(tool = tool.name(), "dispatch: explicit parameters");
            return Ok(tool);
        }

        for candidate in self.rules.candidates(query) {
            if let Some(tool) = tools.iter().find(|t| t.name() == candidate) {
                debug!(tool = candidate, "dispatch: keyword rule");
                return Ok(tool.clone());
            }
        }

        if let Some(tool) = tools.iter().find(|t| t.name() == self.rules.default_tool) {
            debug!(tool = tool.name(), "dispatch: default tool");
            return Ok(tool.clone());
        }

        match tools.first() {
            Some(tool) => {
                debug!(tool = tool.name(), "dispatch: first registered tool");
                Ok(tool.clone())
            }
            None => Err(self.not_found(&self.rules.default_tool)),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("rules", &self.rules)
            .finish()
    }
}
