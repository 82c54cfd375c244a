//! Raven - cached, multi-source market signal orchestration
//!
//! This crate routes free-text and structured queries to registered
//! [`Tool`]s (prediction-market events, social-sentiment coins, and a
//! composite reasoning aggregator over both), runs them under a retrying
//! execution wrapper and shares one namespaced TTL cache between them.
//!
//! # Example
//!
//! ```rust,no_run
//! use raven::{Raven, QueryOutcome};
//!
//! #[tokio::main]
//! async fn main() -> raven::Result<()> {
//!     let orchestrator = Raven::builder()
//!         .polymarket()
//!         .lunarcrush("lc-your-key")
//!         .build()?;
//!
//!     match orchestrator.query("Should I go long or short on Bitcoin?", None).await {
//!         QueryOutcome::Success { tool, records } => {
//!             println!("{tool}: {}", serde_json::to_string_pretty(&records)?);
//!         }
//!         QueryOutcome::Failure { kind, message } => eprintln!("{kind:?}: {message}"),
//!     }
//!
//!     orchestrator.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Custom tools
//!
//! ```rust
//! use async_trait::async_trait;
//! use raven::{Params, Raven, Tool};
//! use serde_json::{Value, json};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn invoke(&self, params: &Params) -> raven::Result<Value> {
//!         Ok(json!([params]))
//!     }
//! }
//!
//! let orchestrator = Raven::builder()
//!     .tool(std::sync::Arc::new(Echo))
//!     .without_reasoning()
//!     .build()
//!     .unwrap();
//! assert_eq!(orchestrator.registry().names(), vec!["echo"]);
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod providers;
pub mod reasoning;
pub mod registry;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use error::{RavenError, Result};
pub use executor::{ExecutionConfig, ToolExecutor};
pub use gateway::{Orchestrator, Raven, RavenBuilder, RoutingInfo};
pub use traits::{COMPOSITE_TAG, Tool};
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    Confidence, ContextSummary, DataSourceInfo, DataSources, FailureKind, HealthReport,
    HealthStatus, MarketSignals, OverallSignal, Params, Position, QueryOutcome, ReasoningReport,
    Recommendation, Record, SentimentSignals, SourceStatus, ToolInfo, normalize_output,
    param_str, param_u64,
};
