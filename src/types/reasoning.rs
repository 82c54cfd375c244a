//! Reasoning aggregator output types.
//!
//! A [`ReasoningReport`] is what the `combined_reasoning` tool returns (as a
//! single JSON record) and what it stores in the `reasoning` cache namespace.
//! All structs serialise in camelCase so cached payloads and tool output
//! share one wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommended position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Long,
    Short,
    Neutral,
}

/// Confidence in a recommendation, derived from how many distinct reasoning
/// statements the scoring rules produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// HIGH at six or more statements, MEDIUM at three or more, else LOW.
    pub fn from_statement_count(count: usize) -> Self {
        match count {
            n if n >= 6 => Confidence::High,
            n if n >= 3 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Direction both sources agree on, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSignal {
    Bullish,
    Bearish,
    Neutral,
}

/// Summary of prediction-market records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignals {
    pub total_volume: f64,
    /// Mean implied probability (outcome price) across events.
    pub average_probability: f64,
    pub event_count: usize,
    /// Events priced above 0.6.
    pub bullish_events: usize,
    /// Events priced below 0.4.
    pub bearish_events: usize,
}

/// Summary of social-sentiment records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSignals {
    pub average_galaxy_score: f64,
    pub average_price_change_24h: f64,
    pub coin_count: usize,
    pub bullish_coins: usize,
    pub bearish_coins: usize,
}

/// Derived signals of a merged context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_signals: Option<MarketSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_signals: Option<SentimentSignals>,
    pub overall_signal: OverallSignal,
}

/// Whether a source's records came from the live tool or a substitute set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Live,
    Substitute,
}

/// Provenance of one source's data in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceInfo {
    pub status: SourceStatus,
    /// Tool name for live data, `"substitute"` otherwise.
    pub origin: String,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DataSourceInfo {
    pub fn is_substitute(&self) -> bool {
        self.status == SourceStatus::Substitute
    }
}

/// Provenance of both sources. `sourceA` is prediction markets, `sourceB`
/// is social sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSources {
    pub source_a: DataSourceInfo,
    pub source_b: DataSourceInfo,
}

/// The scored recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub position: Position,
    pub rationale: String,
    pub subject: String,
    pub score: i32,
}

/// Full aggregator result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningReport {
    /// Human readable multi-line analysis.
    pub reasoning_analysis: String,
    pub context_summary: ContextSummary,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub data_sources: DataSources,
    pub analysis_timestamp: DateTime<Utc>,
    /// `"built_in_rules"` for scored reports, `"fallback"` otherwise.
    pub analysis_method: String,
    pub market_score: i32,
    pub sentiment_score: i32,
    /// Set on the degraded path taken when merging or scoring failed.
    #[serde(default)]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
