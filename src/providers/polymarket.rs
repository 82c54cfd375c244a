//! Polymarket gamma API client (`get_events`).
//!
//! See: <https://docs.polymarket.com/developers/gamma-markets-api/overview>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{DEFAULT_HTTP_TIMEOUT, check_status, http_client, lenient_f64, records_from};
use crate::cache::{CachePayload, CacheStore, Namespace, generate_key};
use crate::types::{Params, param_str, param_u64};
use crate::{RavenError, Result, Tool};

/// Default base URL for the Polymarket gamma API.
pub const DEFAULT_BASE_URL: &str = "https://gamma-api.polymarket.com";

/// Tool name.
pub const TOOL_NAME: &str = "get_events";

const DEFAULT_LIMIT: u64 = 5;
const MAX_FETCH: u64 = 50;

/// Related search terms for broad keywords.
const KEYWORD_EXPANSIONS: &[(&str, &[&str])] = &[
    ("politics", &["election", "trump", "biden", "congress", "senate"]),
    ("sports", &["nfl", "nba", "football", "basketball", "soccer"]),
    ("crypto", &["bitcoin", "ethereum", "crypto", "btc", "eth"]),
    ("technology", &["ai", "tech", "apple", "google", "meta"]),
    ("entertainment", &["movie", "music", "celebrity", "oscar", "grammy"]),
];

/// Keywords for which the markets endpoint is tried first.
const POLITICS_TERMS: &[&str] = &["politics", "election", "biden", "trump"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Event,
    Market,
}

impl Listing {
    fn path(self) -> &'static str {
        match self {
            Listing::Event => "events",
            Listing::Market => "markets",
        }
    }

    fn untitled(self) -> &'static str {
        match self {
            Listing::Event => "Untitled Event",
            Listing::Market => "Untitled Market",
        }
    }

    fn url_segment(self) -> &'static str {
        match self {
            Listing::Event => "event",
            Listing::Market => "market",
        }
    }
}

/// Client for Polymarket prediction-market events.
///
/// Parameters: `keyword` (default: all events), `limit` (default 5) and
/// `time_filter` (only part of the cache key). Results are cached for
/// 15 minutes in the `polymarket` namespace when a cache is attached.
#[derive(Clone)]
pub struct PolymarketClient {
    http: Client,
    base_url: String,
    cache: Option<Arc<CacheStore>>,
    timeout: Duration,
}

impl PolymarketClient {
    /// Create a client against the public gamma API.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: http_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Consult and populate `cache` around upstream calls.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cache key for a request.
    pub fn cache_key(keyword: &str, limit: u64, time_filter: &str) -> String {
        generate_key(
            &format!("event:{}", keyword.trim()),
            Namespace::Market.as_str(),
            &[
                &format!("limit={limit}"),
                &format!("time_filter={time_filter}"),
            ],
        )
    }

    /// Fetch events matching `keyword`, newest API order, at most `limit`.
    pub async fn fetch_events(&self, keyword: &str, limit: u64) -> Result<Vec<Value>> {
        let terms = search_terms(keyword);
        let keyword_lower = keyword.to_lowercase();

        if POLITICS_TERMS.iter().any(|t| keyword_lower.contains(t)) {
            debug!(keyword, "politics keyword, trying markets endpoint first");
            match self.fetch_listing(Listing::Market, limit, &terms).await {
                Ok(markets) if !markets.is_empty() => return Ok(markets),
                Ok(_) => debug!("no matching markets, trying events"),
                Err(RavenError::Api { status, .. }) => {
                    debug!(status, "markets endpoint failed, trying events")
                }
                Err(e) => return Err(e),
            }
        }

        match self.fetch_listing(Listing::Event, limit, &terms).await {
            Ok(events) => Ok(events),
            Err(RavenError::Api { status, message }) => {
                warn!(status, %message, "events endpoint failed, falling back to markets");
                self.fetch_listing(Listing::Market, limit, &terms).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_listing(
        &self,
        listing: Listing,
        limit: u64,
        terms: &[String],
    ) -> Result<Vec<Value>> {
        let url = format!("{}/{}", self.base_url, listing.path());
        let fetch = (limit.saturating_mul(2)).clamp(1, MAX_FETCH);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("limit", fetch.to_string()),
                ("offset", "0".to_string()),
                ("active", "true".to_string()),
            ])
            .send()
            .await?;

        check_status(&response, "Polymarket")?;

        let body: Value = response.json().await?;
        let items = records_from(body)?;
        let fetched = items.len();
        let formatted: Vec<Value> = items
            .iter()
            .filter(|item| matches_terms(item, terms))
            .take(limit as usize)
            .map(|item| format_listing(item, listing))
            .collect();
        debug!(
            endpoint = listing.path(),
            fetched,
            matched = formatted.len(),
            "polymarket listing"
        );
        Ok(formatted)
    }
}

impl Default for PolymarketClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase search terms for a keyword; empty means "match everything".
fn search_terms(keyword: &str) -> Vec<String> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() || keyword == "general" {
        return Vec::new();
    }
    let mut terms = vec![keyword.clone()];
    if let Some((_, related)) = KEYWORD_EXPANSIONS.iter().find(|(k, _)| *k == keyword) {
        terms.extend(related.iter().map(|t| t.to_string()));
    }
    terms
}

fn tag_labels(item: &Value) -> Vec<String> {
    item.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| match tag {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => o
                        .get("label")
                        .or_else(|| o.get("slug"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn text_field<'a>(item: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| item.get(*name).and_then(Value::as_str))
}

fn matches_terms(item: &Value, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {}",
        text_field(item, &["title", "question"]).unwrap_or_default(),
        text_field(item, &["description"]).unwrap_or_default(),
        tag_labels(item).join(" "),
    )
    .to_lowercase();
    terms.iter().any(|t| haystack.contains(t.as_str()))
}

/// First outcome price, from `outcomePrices` on a market or on an event's
/// first market. The API sends it as a JSON-encoded string array.
fn first_outcome_price(item: &Value) -> Option<f64> {
    let prices = item.get("outcomePrices").or_else(|| {
        item.get("markets")
            .and_then(Value::as_array)
            .and_then(|m| m.first())
            .and_then(|m| m.get("outcomePrices"))
    })?;
    let decoded;
    let array = match prices {
        Value::String(s) => {
            decoded = serde_json::from_str::<Value>(s).ok()?;
            decoded.as_array()?
        }
        Value::Array(a) => a,
        _ => return None,
    };
    lenient_f64(array.first())
}

fn format_listing(item: &Value, listing: Listing) -> Value {
    let title = match listing {
        Listing::Event => text_field(item, &["title", "question"]),
        Listing::Market => text_field(item, &["question", "title"]),
    }
    .unwrap_or(listing.untitled());
    let slug = text_field(item, &["slug"]).unwrap_or_default();
    let id = match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let url_ref = if slug.is_empty() { id.as_str() } else { slug };
    let volume = lenient_f64(item.get("volume"))
        .or_else(|| lenient_f64(item.get("volume_24h")))
        .unwrap_or(0.0);

    let mut record = json!({
        "title": title,
        "description": text_field(item, &["description"]).unwrap_or_default(),
        "endDate": item.get("end_date").or_else(|| item.get("endDate")).cloned().unwrap_or(Value::Null),
        "volume": volume,
        "url": format!("https://polymarket.com/{}/{url_ref}", listing.url_segment()),
        "marketSlug": slug,
        "id": id,
        "tags": tag_labels(item),
        "source": "polymarket",
    });
    if let Some(price) = first_outcome_price(item)
        && let Some(obj) = record.as_object_mut()
    {
        obj.insert("price".to_string(), json!(price));
    }
    record
}

#[async_trait]
impl Tool for PolymarketClient {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetch prediction market events from Polymarket"
    }

    fn capability_tags(&self) -> &[&'static str] {
        &["prediction-markets", "events"]
    }

    fn examples(&self) -> &[&'static str] {
        &[
            "Fetch me sports events",
            "Show 3 Trump election markets",
            "Get crypto events today",
        ]
    }

    async fn invoke(&self, params: &Params) -> Result<Value> {
        let keyword = param_str(params, "keyword").unwrap_or_default();
        let limit = param_u64(params, "limit").unwrap_or(DEFAULT_LIMIT);
        let time_filter = param_str(params, "time_filter").unwrap_or("all");
        let key = Self::cache_key(keyword, limit, time_filter);

        if let Some(cache) = &self.cache
            && let Some(entry) = cache.get(&key)
            && let Some(events) = entry.payload.source_a.as_ref().and_then(|d| d.get("events"))
        {
            debug!(key, "polymarket cache hit");
            return Ok(events.clone());
        }

        let events = self.fetch_events(keyword, limit).await?;
        info!(keyword, events = events.len(), "fetched polymarket events");

        if let Some(cache) = &self.cache {
            let payload = CachePayload::new(key.clone()).with_source_a(json!({
                "events": events,
                "keyword": keyword,
                "cacheType": "subgraph_result",
            }));
            cache.put(key, payload, Namespace::Market.ttl_seconds());
        }
        Ok(Value::Array(events))
    }

    async fn health_check(&self) -> Result<Option<Value>> {
        let url = format!("{}/events", self.base_url);
        let response = self.http.get(&url).query(&[("limit", "1")]).send().await?;
        check_status(&response, "Polymarket")?;
        Ok(Some(json!({
            "api_endpoint": self.base_url,
            "timeout_s": self.timeout.as_secs(),
            "status": "reachable",
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansions_apply_to_broad_keywords() {
        let terms = search_terms("Politics");
        assert_eq!(terms[0], "politics");
        assert!(terms.contains(&"senate".to_string()));
        assert_eq!(search_terms("trump"), vec!["trump"]);
        assert!(search_terms("general").is_empty());
        assert!(search_terms("  ").is_empty());
    }

    #[test]
    fn filter_checks_title_description_and_tags() {
        let terms = search_terms("nba");
        assert!(matches_terms(&json!({"title": "NBA Finals"}), &terms));
        assert!(matches_terms(&json!({"question": "x", "description": "nba"}), &terms));
        assert!(matches_terms(
            &json!({"title": "x", "tags": [{"label": "NBA"}]}),
            &terms
        ));
        assert!(!matches_terms(&json!({"title": "NFL"}), &terms));
    }

    #[test]
    fn formats_event_with_price() {
        let item = json!({
            "id": 42,
            "title": "Will BTC hit 100k?",
            "slug": "btc-100k",
            "volume": "1250000.5",
            "endDate": "2026-12-31T00:00:00Z",
            "markets": [{"outcomePrices": "[\"0.65\", \"0.35\"]"}],
            "tags": ["Crypto"],
        });
        let record = format_listing(&item, Listing::Event);
        assert_eq!(record["title"], "Will BTC hit 100k?");
        assert_eq!(record["id"], "42");
        assert_eq!(record["volume"], 1250000.5);
        assert_eq!(record["price"], 0.65);
        assert_eq!(record["url"], "https://polymarket.com/event/btc-100k");
        assert_eq!(record["tags"], json!(["Crypto"]));
        assert_eq!(record["source"], "polymarket");
    }

    #[test]
    fn formats_market_without_price() {
        let record = format_listing(&json!({"question": "Q?", "id": "m1"}), Listing::Market);
        assert_eq!(record["title"], "Q?");
        assert_eq!(record["url"], "https://polymarket.com/market/m1");
        assert!(record.get("price").is_none());
        assert_eq!(record["volume"], 0.0);
    }

    #[test]
    fn cache_key_in_market_namespace() {
        let key = PolymarketClient::cache_key("Trump", 5, "recent");
        assert!(key.starts_with("polymarket::event:trump::"));
        assert_ne!(key, PolymarketClient::cache_key("Trump", 3, "recent"));
    }
}
