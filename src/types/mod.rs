//! Public types for the Raven API.

mod health;
mod outcome;
mod params;
mod reasoning;
mod tool;

pub use health::{HealthReport, HealthStatus};
pub use outcome::{FailureKind, QueryOutcome};
pub use params::{Params, Record, normalize_output, param_str, param_u64};
pub use reasoning::{
    Confidence, ContextSummary, DataSourceInfo, DataSources, MarketSignals, OverallSignal,
    Position, ReasoningReport, Recommendation, SentimentSignals, SourceStatus,
};
pub use tool::ToolInfo;
