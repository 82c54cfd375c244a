//! LunarCrush API v4 client (`get_coins_list`).
//!
//! See: <https://lunarcrush.com/developers/api/endpoints>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{DEFAULT_HTTP_TIMEOUT, check_status, http_client, records_from};
use crate::cache::{CachePayload, CacheStore, Namespace, generate_key};
use crate::types::{Params, param_str, param_u64};
use crate::{Result, Tool};

/// Default base URL for the LunarCrush public API.
pub const DEFAULT_BASE_URL: &str = "https://lunarcrush.com/api4/public";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "LUNARCRUSH_API_KEY";

/// Tool name.
pub const TOOL_NAME: &str = "get_coins_list";

const DEFAULT_LIMIT: u64 = 10;
const DEFAULT_SORT: &str = "mc";

/// One coin as LunarCrush sends it (abbreviated field names).
#[derive(Debug, Deserialize)]
struct RawCoin {
    #[serde(alias = "s")]
    symbol: Option<String>,
    #[serde(alias = "n")]
    name: Option<String>,
    #[serde(alias = "p")]
    price: Option<f64>,
    #[serde(alias = "mc")]
    market_cap: Option<f64>,
    #[serde(alias = "pc")]
    percent_change_24h: Option<f64>,
    #[serde(alias = "gs")]
    galaxy_score: Option<f64>,
    #[serde(alias = "ar")]
    alt_rank: Option<f64>,
    #[serde(default)]
    categories: Option<Value>,
    #[serde(alias = "v")]
    volume_24h: Option<f64>,
    #[serde(alias = "ss")]
    social_score: Option<f64>,
    #[serde(alias = "md")]
    market_dominance: Option<f64>,
}

impl RawCoin {
    fn into_record(self) -> Value {
        let categories: Vec<String> = match self.categories {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        json!({
            "symbol": self.symbol.unwrap_or_default(),
            "name": self.name.unwrap_or_default(),
            "price": self.price,
            "market_cap": self.market_cap,
            "percent_change_24h": self.percent_change_24h,
            "galaxy_score": self.galaxy_score,
            "alt_rank": self.alt_rank,
            "categories": categories,
            "market_dominance": self.market_dominance,
            "volume_24h": self.volume_24h,
            "social_score": self.social_score,
            "source": "lunarcrush",
        })
    }
}

/// Client for LunarCrush coin sentiment.
///
/// Parameters: `limit` (default 10), `sort` (default `mc`) and `category`.
/// Results are cached for an hour in the `lunarcrush` namespace, keyed by
/// the UTC hour so each calendar hour gets fresh data.
#[derive(Clone)]
pub struct LunarCrushClient {
    api_key: String,
    http: Client,
    base_url: String,
    cache: Option<Arc<CacheStore>>,
}

impl LunarCrushClient {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            http: http_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: None,
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
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cache key for a request made at `now`.
    pub fn cache_key(sort: &str, category: &str, limit: u64, now: DateTime<Utc>) -> String {
        let identifier = format!("{sort}_{category}_{limit}");
        let bucket = now.format("%Y-%m-%dT%H").to_string();
        generate_key(
            identifier.trim_matches('_'),
            Namespace::Sentiment.as_str(),
            &[&format!("hour={bucket}")],
        )
    }

    /// Fetch the coin list.
    pub async fn fetch_coins(&self, limit: u64, sort: &str, category: &str) -> Result<Vec<Value>> {
        let url = format!("{}/coins/list/v1", self.base_url);
        let mut query = vec![("limit", limit.to_string()), ("sort", sort.to_string())];
        if !category.is_empty() {
            query.push(("category", category.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&query)
            .send()
            .await?;

        check_status(&response, "LunarCrush")?;

        let body: Value = response.json().await?;
        let coins = records_from(body)?
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RawCoin>(item) {
                Ok(coin) => Some(coin.into_record()),
                Err(e) => {
                    debug!(error = %e, "skipping malformed coin");
                    None
                }
            })
            .collect();
        Ok(coins)
    }

    fn now(&self) -> DateTime<Utc> {
        self.cache.as_ref().map_or_else(Utc::now, |c| c.now())
    }
}

#[async_trait]
impl Tool for LunarCrushClient {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetch cryptocurrency sentiment and market data from LunarCrush"
    }

    fn capability_tags(&self) -> &[&'static str] {
        &["sentiment", "coins"]
    }

    fn examples(&self) -> &[&'static str] {
        &[
            "Get Bitcoin sentiment analysis",
            "Show top 5 trending crypto coins",
            "Fetch crypto market data",
        ]
    }

    async fn invoke(&self, params: &Params) -> Result<Value> {
        let limit = param_u64(params, "limit").unwrap_or(DEFAULT_LIMIT);
        let sort = param_str(params, "sort").unwrap_or(DEFAULT_SORT);
        let category = param_str(params, "category").unwrap_or_default();
        let key = Self::cache_key(sort, category, limit, self.now());

        if let Some(cache) = &self.cache
            && let Some(entry) = cache.get(&key)
            && let Some(coins) = entry.payload.source_b.as_ref().and_then(|d| d.get("coins"))
        {
            debug!(key, "lunarcrush cache hit");
            return Ok(coins.clone());
        }

        let coins = self.fetch_coins(limit, sort, category).await?;
        info!(limit, sort, category, coins = coins.len(), "fetched lunarcrush coins");

        if let Some(cache) = &self.cache {
            let payload = CachePayload::new(key.clone()).with_source_b(json!({
                "coins": coins,
                "cacheType": "time_bucketed",
            }));
            cache.put(key, payload, Namespace::Sentiment.ttl_seconds());
        }
        Ok(Value::Array(coins))
    }

    async fn health_check(&self) -> Result<Option<Value>> {
        let url = format!("{}/coins/list/v1", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[("limit", "1")])
            .send()
            .await?;
        check_status(&response, "LunarCrush")?;
        Ok(Some(json!({
            "api_endpoint": self.base_url,
            "status": "reachable",
        })))
    }
}
