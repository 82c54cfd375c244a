//! Merge and rule-based scoring.
//!
//! Field defaults when a record lacks a value: event `price` 0.5, event
//! `volume` 0, coin `galaxy_score` 50, coin `percent_change_24h` 0. Numeric
//! strings are accepted.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{
    Confidence, ContextSummary, DataSources, MarketSignals, OverallSignal, Position,
    ReasoningReport, Recommendation, Record, SentimentSignals,
};
use crate::{RavenError, Result};

/// Events priced above this are bullish.
pub const BULLISH_PROBABILITY: f64 = 0.6;
/// Events priced below this are bearish.
pub const BEARISH_PROBABILITY: f64 = 0.4;
/// Total event volume above this earns a point.
pub const HIGH_VOLUME: f64 = 500_000.0;

pub const METHOD_RULES: &str = "built_in_rules";
pub const METHOD_FALLBACK: &str = "fallback";

/// Both sources merged into one summary.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedContext {
    pub subject: String,
    pub summary: ContextSummary,
    pub event_count: usize,
    pub coin_count: usize,
}

fn number(record: &Record, field: &str, default: f64) -> f64 {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RavenError::DataError(format!("{name} is not finite: {value}")))
    }
}

fn market_signals(events: &[Record]) -> Result<Option<MarketSignals>> {
    if events.is_empty() {
        return Ok(None);
    }
    let prices: Vec<f64> = events.iter().map(|e| number(e, "price", 0.5)).collect();
    let total_volume = events.iter().map(|e| number(e, "volume", 0.0)).sum();
    Ok(Some(MarketSignals {
        total_volume: ensure_finite("total volume", total_volume)?,
        average_probability: ensure_finite("average probability", mean(&prices))?,
        event_count: events.len(),
        bullish_events: prices.iter().filter(|p| **p > BULLISH_PROBABILITY).count(),
        bearish_events: prices.iter().filter(|p| **p < BEARISH_PROBABILITY).count(),
    }))
}

fn sentiment_signals(coins: &[Record]) -> Result<Option<SentimentSignals>> {
    if coins.is_empty() {
        return Ok(None);
    }
    let scores: Vec<f64> = coins.iter().map(|c| number(c, "galaxy_score", 50.0)).collect();
    let changes: Vec<f64> = coins
        .iter()
        .map(|c| number(c, "percent_change_24h", 0.0))
        .collect();
    Ok(Some(SentimentSignals {
        average_galaxy_score: ensure_finite("average galaxy score", mean(&scores))?,
        average_price_change_24h: ensure_finite("average 24h change", mean(&changes))?,
        coin_count: coins.len(),
        bullish_coins: changes.iter().filter(|c| **c > 0.0).count(),
        bearish_coins: changes.iter().filter(|c| **c < 0.0).count(),
    }))
}

/// Merge event and coin records into one context.
///
/// Fails with [`RavenError::DataError`] when a derived metric is not finite.
pub fn merge(subject: &str, events: &[Record], coins: &[Record]) -> Result<MergedContext> {
    let market = market_signals(events)?;
    let sentiment = sentiment_signals(coins)?;

    let probability = market.as_ref().map_or(0.5, |m| m.average_probability);
    let change = sentiment
        .as_ref()
        .map_or(0.0, |s| s.average_price_change_24h);
    let overall_signal = if probability > BULLISH_PROBABILITY && change > 0.0 {
        OverallSignal::Bullish
    } else if probability < BEARISH_PROBABILITY && change < 0.0 {
        OverallSignal::Bearish
    } else {
        OverallSignal::Neutral
    };

    Ok(MergedContext {
        subject: subject.to_string(),
        summary: ContextSummary {
            market_signals: market,
            sentiment_signals: sentiment,
            overall_signal,
        },
        event_count: events.len(),
        coin_count: coins.len(),
    })
}

/// Scores and reasoning statements for one context.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub market_score: i32,
    pub sentiment_score: i32,
    pub market_reasons: Vec<String>,
    pub sentiment_reasons: Vec<String>,
    pub position: Position,
    pub rationale: String,
    pub confidence: Confidence,
}

impl Scored {
    pub fn total(&self) -> i32 {
        self.market_score + self.sentiment_score
    }
}

fn score_market(m: &MarketSignals, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    let p = m.average_probability;
    if p > BULLISH_PROBABILITY {
        score += 2;
        reasons.push(format!("Prediction markets show bullish sentiment (avg price: {p:.2})"));
    } else if p < BEARISH_PROBABILITY {
        score -= 2;
        reasons.push(format!("Prediction markets show bearish sentiment (avg price: {p:.2})"));
    } else {
        reasons.push(format!("Prediction markets show neutral sentiment (avg price: {p:.2})"));
    }

    if m.total_volume > HIGH_VOLUME {
        score += 1;
        reasons.push(format!(
            "High market volume indicates strong interest (${})",
            thousands(m.total_volume)
        ));
    }

    let (bull, bear) = (m.bullish_events, m.bearish_events);
    if bull > bear {
        score += 1;
        reasons.push(format!("More bullish than bearish events ({bull} vs {bear})"));
    } else if bear > bull {
        score -= 1;
        reasons.push(format!("More bearish than bullish events ({bear} vs {bull})"));
    }
    score
}

fn score_sentiment(s: &SentimentSignals, reasons: &mut Vec<String>) -> i32 {
    let mut score = 0;
    let g = s.average_galaxy_score;
    if g > 75.0 {
        score += 2;
        reasons.push(format!("High galaxy score indicates strong sentiment (avg: {g:.1})"));
    } else if g < 50.0 {
        score -= 2;
        reasons.push(format!("Low galaxy score indicates weak sentiment (avg: {g:.1})"));
    } else {
        reasons.push(format!("Moderate galaxy score (avg: {g:.1})"));
    }

    let c = s.average_price_change_24h;
    if c > 2.0 {
        score += 2;
        reasons.push(format!("Strong positive price momentum (+{c:.2}%)"));
    } else if c > 0.0 {
        score += 1;
        reasons.push(format!("Positive price momentum (+{c:.2}%)"));
    } else if c < -2.0 {
        score -= 2;
        reasons.push(format!("Strong negative price momentum ({c:.2}%)"));
    } else if c < 0.0 {
        score -= 1;
        reasons.push(format!("Negative price momentum ({c:.2}%)"));
    }

    let (up, down) = (s.bullish_coins, s.bearish_coins);
    if up > down {
        score += 1;
        reasons.push(format!("More coins trending up than down ({up} vs {down})"));
    } else if down > up {
        score -= 1;
        reasons.push(format!("More coins trending down than up ({down} vs {up})"));
    }
    score
}

/// Map a total score to a position and rationale.
pub fn position_for(total: i32) -> (Position, String) {
    match total {
        t if t >= 3 => (
            Position::Long,
            format!(
                "Strong bullish signals from both prediction markets and sentiment data (score: +{t})"
            ),
        ),
        t if t >= 1 => (
            Position::Long,
            format!("Moderate bullish signals (score: +{t})"),
        ),
        t if t <= -3 => (
            Position::Short,
            format!(
                "Strong bearish signals from both prediction markets and sentiment data (score: {t})"
            ),
        ),
        t if t <= -1 => (
            Position::Short,
            format!("Moderate bearish signals (score: {t})"),
        ),
        t => (
            Position::Neutral,
            format!("Mixed signals, no clear direction (score: {t})"),
        ),
    }
}

/// Apply the scoring rules to a merged summary.
pub fn score(summary: &ContextSummary) -> Scored {
    let mut market_reasons = Vec::new();
    let mut sentiment_reasons = Vec::new();
    let market_score = summary
        .market_signals
        .as_ref()
        .map_or(0, |m| score_market(m, &mut market_reasons));
    let sentiment_score = summary
        .sentiment_signals
        .as_ref()
        .map_or(0, |s| score_sentiment(s, &mut sentiment_reasons));

    let (position, rationale) = position_for(market_score + sentiment_score);
    let confidence =
        Confidence::from_statement_count(market_reasons.len() + sentiment_reasons.len());

    Scored {
        market_score,
        sentiment_score,
        market_reasons,
        sentiment_reasons,
        position,
        rationale,
        confidence,
    }
}

fn position_label(position: Position) -> &'static str {
    match position {
        Position::Long => "LONG",
        Position::Short => "SHORT",
        Position::Neutral => "NEUTRAL",
    }
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "HIGH",
        Confidence::Medium => "MEDIUM",
        Confidence::Low => "LOW",
    }
}

fn signal_label(signal: OverallSignal) -> &'static str {
    match signal {
        OverallSignal::Bullish => "bullish",
        OverallSignal::Bearish => "bearish",
        OverallSignal::Neutral => "neutral",
    }
}

/// Human readable analysis block.
pub fn analysis_text(subject: &str, scored: &Scored) -> String {
    let mut lines = vec![
        format!("MARKET POSITION ANALYSIS FOR {}:", subject.to_uppercase()),
        String::new(),
        "PREDICTION MARKET SIGNALS:".to_string(),
    ];
    lines.extend(scored.market_reasons.iter().map(|r| format!("• {r}")));
    lines.push(String::new());
    lines.push("SENTIMENT SIGNALS:".to_string());
    lines.extend(scored.sentiment_reasons.iter().map(|r| format!("• {r}")));
    lines.push(String::new());
    lines.push(format!("COMBINED ANALYSIS SCORE: {}", scored.total()));
    lines.push(format!("RECOMMENDATION: {}", position_label(scored.position)));
    lines.push(format!("RATIONALE: {}", scored.rationale));
    lines.push(format!("CONFIDENCE: {}", confidence_label(scored.confidence)));
    lines.join("\n")
}

/// Full report for a scored context.
pub fn report(
    merged: &MergedContext,
    scored: &Scored,
    data_sources: DataSources,
    now: DateTime<Utc>,
) -> ReasoningReport {
    ReasoningReport {
        reasoning_analysis: analysis_text(&merged.subject, scored),
        context_summary: merged.summary.clone(),
        recommendation: Recommendation {
            position: scored.position,
            rationale: scored.rationale.clone(),
            subject: merged.subject.clone(),
            score: scored.total(),
        },
        confidence: scored.confidence,
        data_sources,
        analysis_timestamp: now,
        analysis_method: METHOD_RULES.to_string(),
        market_score: scored.market_score,
        sentiment_score: scored.sentiment_score,
        fallback: false,
        note: None,
    }
}

/// Confidence of a fallback report, from record counts alone.
pub fn fallback_confidence(event_count: usize, coin_count: usize) -> Confidence {
    if event_count >= 3 && coin_count >= 3 {
        Confidence::High
    } else if event_count >= 1 && coin_count >= 1 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Minimal neutral report used when merging or scoring failed.
pub fn fallback_report(
    subject: &str,
    event_count: usize,
    coin_count: usize,
    data_sources: DataSources,
    reason: &str,
    now: DateTime<Utc>,
) -> ReasoningReport {
    let summary = ContextSummary {
        market_signals: None,
        sentiment_signals: None,
        overall_signal: OverallSignal::Neutral,
    };
    ReasoningReport {
        reasoning_analysis: format!(
            "Based on available data for '{subject}', the market shows {} signals.",
            signal_label(summary.overall_signal)
        ),
        context_summary: summary,
        recommendation: Recommendation {
            position: Position::Neutral,
            rationale: format!(
                "Analysis based on {event_count} market events and {coin_count} sentiment indicators."
            ),
            subject: subject.to_string(),
            score: 0,
        },
        confidence: fallback_confidence(event_count, coin_count),
        data_sources,
        analysis_timestamp: now,
        analysis_method: METHOD_FALLBACK.to_string(),
        market_score: 0,
        sentiment_score: 0,
        fallback: true,
        note: Some(format!("Fallback analysis: {reason}")),
    }
}

/// Format with comma thousands separators, no decimals.
fn thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bitcoin_context() -> MergedContext {
        let events = [
            json!({"price": 0.65, "volume": 1_250_000}),
            json!({"price": 0.58, "volume": 890_000}),
        ];
        let coins = [
            json!({"galaxy_score": 85.2, "percent_change_24h": 2.45}),
            json!({"galaxy_score": 82.7, "percent_change_24h": 1.87}),
        ];
        merge("Bitcoin", &events, &coins).unwrap()
    }

    #[test]
    fn merge_summarises_both_sources() {
        let ctx = bitcoin_context();
        let market = ctx.summary.market_signals.as_ref().unwrap();
        assert_eq!(market.total_volume, 2_140_000.0);
        assert!((market.average_probability - 0.615).abs() < 1e-9);
        assert_eq!((market.bullish_events, market.bearish_events), (1, 0));
        let sentiment = ctx.summary.sentiment_signals.as_ref().unwrap();
        assert!((sentiment.average_galaxy_score - 83.95).abs() < 1e-9);
        assert_eq!((sentiment.bullish_coins, sentiment.bearish_coins), (2, 0));
        assert_eq!(ctx.summary.overall_signal, OverallSignal::Bullish);
    }

    #[test]
    fn bitcoin_scores_long_high() {
        let scored = score(&bitcoin_context().summary);
        assert_eq!(scored.market_score, 4);
        assert_eq!(scored.sentiment_score, 5);
        assert_eq!(scored.position, Position::Long);
        assert_eq!(scored.confidence, Confidence::High);
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let ctx = merge("x", &[json!({})], &[json!({"percent_change_24h": "-3.5"})]).unwrap();
        let market = ctx.summary.market_signals.unwrap();
        assert_eq!(market.average_probability, 0.5);
        assert_eq!(market.total_volume, 0.0);
        let sentiment = ctx.summary.sentiment_signals.unwrap();
        assert_eq!(sentiment.average_galaxy_score, 50.0);
        assert_eq!(sentiment.average_price_change_24h, -3.5);
    }

    #[test]
    fn bearish_scoring() {
        let events = [json!({"price": 0.2, "volume": 10}), json!({"price": 0.3})];
        let coins = [json!({"galaxy_score": 30, "percent_change_24h": -4.0})];
        let ctx = merge("x", &events, &coins).unwrap();
        assert_eq!(ctx.summary.overall_signal, OverallSignal::Bearish);
        let scored = score(&ctx.summary);
        // market: -2 (probability) -1 (bearish events); sentiment: -2 -2 -1
        assert_eq!(scored.market_score, -3);
        assert_eq!(scored.sentiment_score, -5);
        assert_eq!(scored.position, Position::Short);
    }

    #[test]
    fn empty_sources_are_neutral_low() {
        let ctx = merge("x", &[], &[]).unwrap();
        assert!(ctx.summary.market_signals.is_none());
        let scored = score(&ctx.summary);
        assert_eq!(scored.position, Position::Neutral);
        assert_eq!(scored.confidence, Confidence::Low);
    }

    #[test]
    fn non_finite_metric_fails_merge() {
        let events = [json!({"price": "NaN"})];
        assert!(matches!(
            merge("x", &events, &[]),
            Err(RavenError::DataError(_))
        ));
    }

    #[test]
    fn position_cutoffs() {
        assert_eq!(position_for(3).0, Position::Long);
        assert_eq!(position_for(1).0, Position::Long);
        assert_eq!(position_for(0).0, Position::Neutral);
        assert_eq!(position_for(-1).0, Position::Short);
        assert_eq!(position_for(-3).0, Position::Short);
        assert!(position_for(2).1.starts_with("Moderate bullish"));
    }

    #[test]
    fn analysis_text_layout() {
        let scored = score(&bitcoin_context().summary);
        let text = analysis_text("Bitcoin", &scored);
        assert!(text.starts_with("MARKET POSITION ANALYSIS FOR BITCOIN:"));
        assert!(text.contains("High market volume indicates strong interest ($2,140,000)"));
        assert!(text.contains("RECOMMENDATION: LONG"));
        assert!(text.ends_with("CONFIDENCE: HIGH"));
    }

    #[test]
    fn fallback_confidence_from_counts() {
        assert_eq!(fallback_confidence(3, 3), Confidence::High);
        assert_eq!(fallback_confidence(1, 2), Confidence::Medium);
        assert_eq!(fallback_confidence(0, 5), Confidence::Low);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1_000.0), "1,000");
        assert_eq!(thousands(2_140_000.4), "2,140,000");
    }
}
