//! Structured pipeline outcome

use serde::{Deserialize, Serialize};

use super::Record;
use crate::RavenError;

/// Failure classes surfaced to pipeline callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolNotFound,
    ExecutionTimeout,
    ExecutionFailure,
    Other,
}

impl From<&RavenError> for FailureKind {
    fn from(err: &RavenError) -> Self {
        match err {
            RavenError::ToolNotFound { .. } => FailureKind::ToolNotFound,
            RavenError::ExecutionTimeout { .. } => FailureKind::ExecutionTimeout,
            RavenError::ExecutionFailure { .. } => FailureKind::ExecutionFailure,
            _ => FailureKind::Other,
        }
    }
}

/// What a query through the orchestrator produced.
///
/// Failures are values, not errors: front-ends render them like any other
/// result and nothing in the pipeline aborts the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success { tool: String, records: Vec<Record> },
    Failure { kind: FailureKind, message: String },
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }

    /// Records of a successful outcome, empty for failures.
    pub fn records(&self) -> &[Record] {
        match self {
            QueryOutcome::Success { records, .. } => records,
            QueryOutcome::Failure { .. } => &[],
        }
    }

    /// Failure class, if this is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            QueryOutcome::Failure { kind, .. } => Some(*kind),
            QueryOutcome::Success { .. } => None,
        }
    }
}

impl From<RavenError> for QueryOutcome {
    fn from(err: RavenError) -> Self {
        QueryOutcome::Failure {
            kind: FailureKind::from(&err),
            message: err.to_string(),
        }
    }
}
