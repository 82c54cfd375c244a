//! Fetching the two aggregator sources, with labelled substitutes.
//!
//! A fetch never fails: an unavailable or failing tool yields
//! [`SourceData::Degraded`] carrying a fixed substitute data set and the
//! reason, so the aggregator can always produce a report.

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::Tool;
use crate::executor::ToolExecutor;
use crate::telemetry;
use crate::types::{DataSourceInfo, Params, Record, SourceStatus};

use super::subject::filter_relevant_coins;

/// Label for the prediction-market source in metrics and logs.
pub const MARKET_SOURCE: &str = "market";
/// Label for the social-sentiment source in metrics and logs.
pub const SENTIMENT_SOURCE: &str = "sentiment";

const SUBSTITUTE_ORIGIN: &str = "substitute";

/// Outcome of fetching one source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    /// Records returned by the live tool.
    Fetched { origin: String, records: Vec<Record> },
    /// The tool was unavailable or failed; `substitute` stands in.
    Degraded {
        substitute: Vec<Record>,
        reason: String,
    },
}

impl SourceData {
    pub fn records(&self) -> &[Record] {
        match self {
            SourceData::Fetched { records, .. } => records,
            SourceData::Degraded { substitute, .. } => substitute,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceData::Degraded { .. })
    }

    /// Provenance as reported to callers.
    pub fn info(&self) -> DataSourceInfo {
        match self {
            SourceData::Fetched { origin, records } => DataSourceInfo {
                status: SourceStatus::Live,
                origin: origin.clone(),
                record_count: records.len(),
                reason: None,
            },
            SourceData::Degraded { substitute, reason } => DataSourceInfo {
                status: SourceStatus::Substitute,
                origin: SUBSTITUTE_ORIGIN.to_string(),
                record_count: substitute.len(),
                reason: Some(reason.clone()),
            },
        }
    }
}

/// Substitute prediction-market events for `subject`.
pub fn market_substitute(subject: &str) -> Vec<Record> {
    vec![
        json!({
            "title": format!("{subject} Election Outcome"),
            "price": 0.65,
            "volume": 1_250_000,
            "status": "active",
            "category": "politics",
            "source": SUBSTITUTE_ORIGIN,
        }),
        json!({
            "title": format!("{subject} Market Prediction"),
            "price": 0.58,
            "volume": 890_000,
            "status": "active",
            "category": "general",
            "source": SUBSTITUTE_ORIGIN,
        }),
    ]
}

/// Substitute sentiment coins.
pub fn sentiment_substitute() -> Vec<Record> {
    vec![
        json!({
            "name": "Bitcoin",
            "symbol": "BTC",
            "galaxy_score": 85.2,
            "percent_change_24h": 2.45,
            "sentiment": "Bullish",
            "source": SUBSTITUTE_ORIGIN,
        }),
        json!({
            "name": "Ethereum",
            "symbol": "ETH",
            "galaxy_score": 82.7,
            "percent_change_24h": 1.87,
            "sentiment": "Bullish",
            "source": SUBSTITUTE_ORIGIN,
        }),
    ]
}

fn params(pairs: [(&str, Value); 3]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn degraded(source: &'static str, substitute: Vec<Record>, reason: String) -> SourceData {
    warn!(source, %reason, "using substitute data");
    metrics::counter!(telemetry::SOURCE_FALLBACKS_TOTAL, "source" => source).increment(1);
    SourceData::Degraded { substitute, reason }
}

/// Fetch prediction-market events about `subject`.
pub async fn fetch_market(
    executor: &ToolExecutor,
    tool: Option<&dyn Tool>,
    subject: &str,
) -> SourceData {
    let Some(tool) = tool else {
        return degraded(
            MARKET_SOURCE,
            market_substitute(subject),
            "market tool not registered".to_string(),
        );
    };
    let params = params([
        ("keyword", json!(subject)),
        ("limit", json!(5)),
        ("time_filter", json!("recent")),
    ]);
    match executor.execute(tool, &params).await {
        Ok(records) => {
            info!(tool = tool.name(), events = records.len(), "fetched market events");
            SourceData::Fetched {
                origin: tool.name().to_string(),
                records,
            }
        }
        Err(e) => degraded(MARKET_SOURCE, market_substitute(subject), e.to_string()),
    }
}

/// Fetch sentiment coins, keeping those relevant to `subject`.
pub async fn fetch_sentiment(
    executor: &ToolExecutor,
    tool: Option<&dyn Tool>,
    subject: &str,
) -> SourceData {
    let Some(tool) = tool else {
        return degraded(
            SENTIMENT_SOURCE,
            sentiment_substitute(),
            "sentiment tool not registered".to_string(),
        );
    };
    let params = params([
        ("limit", json!(10)),
        ("sort", json!("gs")),
        ("category", json!("")),
    ]);
    match executor.execute(tool, &params).await {
        Ok(records) => {
            let fetched = records.len();
            let relevant = filter_relevant_coins(records, subject);
            info!(
                tool = tool.name(),
                fetched,
                relevant = relevant.len(),
                "fetched sentiment coins"
            );
            SourceData::Fetched {
                origin: tool.name().to_string(),
                records: relevant,
            }
        }
        Err(e) => degraded(SENTIMENT_SOURCE, sentiment_substitute(), e.to_string()),
    }
}
