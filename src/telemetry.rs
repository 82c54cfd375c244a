//! Telemetry metric name constants.
//!
//! Centralised metric names for raven operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `raven_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tool`: tool name (e.g. "get_events", "combined_reasoning")
//! - `status`: outcome: "ok", "timeout" or "error"
//! - `namespace`: cache namespace (e.g. "polymarket", "reasoning")
//! - `source`: aggregator data source: "market" or "sentiment"

/// Total tool executions through the execution wrapper.
///
/// Labels: `tool`, `status` ("ok" | "timeout" | "error").
pub const EXECUTIONS_TOTAL: &str = "raven_executions_total";

/// Execution duration in seconds, including retries and backoff.
///
/// Labels: `tool`.
pub const EXECUTION_DURATION_SECONDS: &str = "raven_execution_duration_seconds";

/// Total retry attempts (not counting the initial attempt).
///
/// Labels: `tool`.
pub const RETRIES_TOTAL: &str = "raven_retries_total";

/// Total cache hits.
///
/// Labels: `namespace`.
pub const CACHE_HITS_TOTAL: &str = "raven_cache_hits_total";

/// Total cache misses, including expired entries.
///
/// Labels: `namespace`.
pub const CACHE_MISSES_TOTAL: &str = "raven_cache_misses_total";

/// Total capacity evictions.
pub const CACHE_EVICTIONS_TOTAL: &str = "raven_cache_evictions_total";

/// Total substitute data sets used by the reasoning aggregator.
///
/// Labels: `source`.
pub const SOURCE_FALLBACKS_TOTAL: &str = "raven_source_fallbacks_total";
