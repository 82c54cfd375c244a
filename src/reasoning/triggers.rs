//! Positional/comparative language that qualifies a query for aggregation.

use regex::RegexSet;

use crate::{RavenError, Result};

/// Default trigger patterns, matched against the lowercased query.
pub const DEFAULT_TRIGGERS: &[&str] = &[
    r"take position",
    r"better.*position",
    r"go long",
    r"go short",
    r"better.*market",
    r"position.*market",
    r"long.*short",
    r"buy.*sell",
    r"bull.*bear",
    r"invest.*trade",
];

/// Compiled trigger patterns.
#[derive(Debug, Clone)]
pub struct Triggers {
    set: RegexSet,
}

impl Triggers {
    /// Compile a set of patterns. An invalid pattern is a configuration error.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = RegexSet::new(patterns)
            .map_err(|e| RavenError::Configuration(format!("invalid trigger pattern: {e}")))?;
        Ok(Self { set })
    }

    pub fn defaults() -> Result<Self> {
        Self::new(DEFAULT_TRIGGERS)
    }

    /// Whether any pattern matches `query` (case-insensitive).
    pub fn matches(&self, query: &str) -> bool {
        self.set.is_match(&query.to_lowercase())
    }

    /// Patterns that matched, for logging.
    pub fn matching_patterns(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.set
            .matches(&query)
            .into_iter()
            .map(|i| self.set.patterns()[i].as_str())
            .collect()
    }
}
