//! Upstream data-source clients.
//!
//! Each client is a [`Tool`](crate::Tool): a thin reqwest wrapper around one
//! REST provider that consults the shared [`CacheStore`](crate::cache::CacheStore)
//! before going upstream. Clients return errors rather than demo data; the
//! reasoning aggregator decides when to substitute.

pub mod lunarcrush;
pub mod polymarket;

pub use lunarcrush::LunarCrushClient;
pub use polymarket::PolymarketClient;

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{RavenError, Result};

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("raven/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Map a non-success status to a crate error.
pub(crate) fn check_status(response: &reqwest::Response, provider: &str) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 => Err(RavenError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(RavenError::RateLimited { retry_after })
        }
        402 => Err(RavenError::Api {
            status: 402,
            message: format!("{provider} API requires a paid subscription"),
        }),
        code => Err(RavenError::Api {
            status: code,
            message: format!("{provider} API error: {status}"),
        }),
    }
}

/// Extract the record list from a response body: a bare array or an object
/// with a `data` array.
pub(crate) fn records_from(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(RavenError::DataError(
                "response object has no `data` array".to_string(),
            )),
        },
        _ => Err(RavenError::DataError(
            "response is neither an array nor an object".to_string(),
        )),
    }
}

/// Read a number that upstream may send as a JSON number or a string.
pub(crate) fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_from_array_or_data() {
        assert_eq!(records_from(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(records_from(json!({"data": [1]})).unwrap().len(), 1);
        assert!(matches!(
            records_from(json!({"error": "x"})),
            Err(RavenError::DataError(_))
        ));
        assert!(records_from(json!("x")).is_err());
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(lenient_f64(Some(&json!(1.5))), Some(1.5));
        assert_eq!(lenient_f64(Some(&json!("2.25"))), Some(2.25));
        assert_eq!(lenient_f64(Some(&json!(null))), None);
        assert_eq!(lenient_f64(None), None);
    }
}
