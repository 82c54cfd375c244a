//! Execution wrapper: timeout, bounded retry and exponential backoff around
//! a single [`Tool`] invocation.
//!
//! Every tool call in the crate goes through [`ToolExecutor`], whether it
//! comes from the orchestrator or from inside the reasoning aggregator.
//!
//! # Retry discipline
//!
//! Attempts are indexed from zero. Each attempt runs under
//! [`ExecutionConfig::timeout`]:
//!
//! - success returns immediately, normalised into a list of records;
//! - a timeout retries straight away, or fails with
//!   [`RavenError::ExecutionTimeout`] on the final attempt;
//! - any other error sleeps `backoff_unit * 2^attempt` (or the provider's
//!   `retry_after` hint) before retrying, or fails with
//!   [`RavenError::ExecutionFailure`] wrapping the cause on the final attempt.
//!
//! There is no cancellation: an attempt always runs until it finishes or
//! times out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::telemetry;
use crate::types::{HealthReport, Params, Record, normalize_output};
use crate::{RavenError, Result, Tool};

/// Timeout and retry settings for tool execution.
///
/// ```rust
/// # use raven::ExecutionConfig;
/// # use std::time::Duration;
/// let config = ExecutionConfig::new()
///     .timeout(Duration::from_secs(10))
///     .max_attempts(5)
///     .backoff_unit(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Deadline for a single attempt. Default: 30s.
    pub timeout: Duration,
    /// Maximum number of attempts (including the first). Values below 1 are
    /// treated as 1. Default: 3.
    pub max_attempts: u32,
    /// Backoff time unit; the delay after failed attempt `n` is
    /// `backoff_unit * 2^n`. Default: 1s.
    pub backoff_unit: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl ExecutionConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum attempts (including the first).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the backoff time unit.
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Delay after a failed attempt (0-indexed): `backoff_unit * 2^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay after a failure, preferring a provider `retry_after` hint.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs tools under an [`ExecutionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    config: ExecutionConfig,
}

impl ToolExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Whether a tool may be registered and run.
    ///
    /// The invocation entry point is guaranteed by the [`Tool`] trait, so
    /// this only checks for a non-blank name.
    pub fn validate(tool: &dyn Tool) -> bool {
        !tool.name().trim().is_empty()
    }

    /// Invoke `tool` with timeout and retry, returning normalised records.
    #[instrument(skip(self, tool, params), fields(tool = tool.name()))]
    pub async fn execute(&self, tool: &dyn Tool, params: &Params) -> Result<Vec<Record>> {
        let name = tool.name().to_string();
        let attempts = self.config.attempts();
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            let last = attempt + 1 >= attempts;
            match tokio::time::timeout(self.config.timeout, tool.invoke(params)).await {
                Ok(Ok(value)) => {
                    let records = normalize_output(value);
                    debug!(attempt = attempt + 1, records = records.len(), "tool succeeded");
                    record_execution(&name, "ok", started);
                    return Ok(records);
                }
                Err(_elapsed) => {
                    if last {
                        warn!(
                            attempts,
                            timeout_ms = self.config.timeout.as_millis() as u64,
                            "tool timed out on final attempt"
                        );
                        record_execution(&name, "timeout", started);
                        return Err(RavenError::ExecutionTimeout {
                            tool: name,
                            timeout: self.config.timeout,
                            attempts,
                        });
                    }
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "tool timed out, retrying"
                    );
                }
                Ok(Err(e)) => {
                    if last {
                        warn!(attempts, error = %e, "tool failed on final attempt");
                        record_execution(&name, "error", started);
                        return Err(RavenError::ExecutionFailure {
                            tool: name,
                            attempts,
                            source: Box::new(e),
                        });
                    }
                    let delay = self.config.effective_delay(attempt, e.retry_after());
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        transient = e.is_transient(),
                        error = %e,
                        "retrying after tool error"
                    );
                    metrics::counter!(telemetry::RETRIES_TOTAL, "tool" => name.clone())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            }
            metrics::counter!(telemetry::RETRIES_TOTAL, "tool" => name.clone()).increment(1);
            attempt += 1;
        }
    }

    /// Run several invocations concurrently and join them.
    ///
    /// The result maps each tool name to its records. A failed invocation is
    /// logged and its slot holds an empty list; it never fails the batch.
    pub async fn execute_concurrently(
        &self,
        calls: Vec<(Arc<dyn Tool>, Params)>,
    ) -> HashMap<String, Vec<Record>> {
        let futures = calls.iter().map(|(tool, params)| async move {
            let name = tool.name().to_string();
            match self.execute(tool.as_ref(), params).await {
                Ok(records) => (name, records),
                Err(e) => {
                    error!(tool = %name, error = %e, "concurrent execution failed");
                    (name, Vec::new())
                }
            }
        });
        join_all(futures).await.into_iter().collect()
    }

    /// Probe a tool's health, bounded by the configured timeout.
    pub async fn health_check_tool(&self, tool: &dyn Tool) -> HealthReport {
        let name = tool.name();
        if !Self::validate(tool) {
            return HealthReport::unhealthy(name, "invalid tool: blank name");
        }
        match tokio::time::timeout(self.config.timeout, tool.health_check()).await {
            Ok(Ok(details)) => HealthReport::healthy(name, details),
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "health check failed");
                HealthReport::unhealthy(name, e.to_string())
            }
            Err(_) => HealthReport::unhealthy(
                name,
                format!("health check timed out after {:?}", self.config.timeout),
            ),
        }
    }
}

fn record_execution(tool: &str, status: &'static str, started: Instant) {
    metrics::counter!(telemetry::EXECUTIONS_TOTAL,
        "tool" => tool.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::EXECUTION_DURATION_SECONDS, "tool" => tool.to_owned())
        .record(started.elapsed().as_secs_f64());
}
