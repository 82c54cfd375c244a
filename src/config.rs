//! Configuration loading for the `raven` CLI.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.raven/config.toml` (user)
//! 3. `/etc/raven/config.toml` (system)
//!
//! Unlike an explicit path, the standard locations are optional: with no
//! file present every section takes its defaults. The LunarCrush API key
//! falls back to the `LUNARCRUSH_API_KEY` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::CacheConfig;
use crate::executor::ExecutionConfig;
use crate::gateway::{Raven, RavenBuilder};
use crate::providers::lunarcrush::API_KEY_ENV;
use crate::providers::polymarket::DEFAULT_BASE_URL as POLYMARKET_URL;
use crate::reasoning::AggregatorConfig;
use crate::registry::DispatchRules;
use crate::{RavenError, Result};

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub reasoning: ReasoningSection,
    #[serde(default)]
    pub routing: DispatchRules,
}

/// `[cache]`
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum entries (default: 1000).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// TTL for entries stored without one (default: 300).
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Snapshot file (default: `~/.raven/cache.json`).
    #[serde(default = "default_persist_path")]
    pub persist_path: Option<PathBuf>,
    /// Set to false to keep the cache in memory only.
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl_seconds: default_ttl(),
            persist_path: default_persist_path(),
            persist: true,
        }
    }
}

fn default_max_entries() -> usize {
    1_000
}

fn default_ttl() -> u64 {
    300
}

fn default_persist_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".raven").join("cache.json"))
}

fn default_true() -> bool {
    true
}

/// `[execution]`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// Per-attempt timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Attempts including the first (default: 3).
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Backoff unit in milliseconds (default: 1000).
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_attempts: default_attempts(),
            backoff_ms: default_backoff(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    1_000
}

/// `[providers.*]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersSection {
    #[serde(default)]
    pub polymarket: PolymarketSection,
    #[serde(default)]
    pub lunarcrush: LunarCrushSection,
}

/// `[providers.polymarket]`
#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_polymarket_url")]
    pub base_url: String,
}

impl Default for PolymarketSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_polymarket_url(),
        }
    }
}

fn default_polymarket_url() -> String {
    POLYMARKET_URL.to_string()
}

/// `[providers.lunarcrush]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LunarCrushSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// `[reasoning]`
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Report TTL in seconds (default: 600).
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl Default for ReasoningSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: None,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist; the standard locations are optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RavenError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            RavenError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        debug!(?path, "loaded config");
        Ok(config)
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(RavenError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".raven").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/raven/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// LunarCrush API key from the config file or the environment.
    pub fn lunarcrush_api_key(&self) -> Option<String> {
        self.providers
            .lunarcrush
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .default_ttl_seconds(self.cache.default_ttl_seconds);
        if self.cache.persist
            && let Some(path) = &self.cache.persist_path
        {
            config = config.persist_path(path);
        }
        config
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig::new()
            .timeout(Duration::from_secs(self.execution.timeout_secs))
            .max_attempts(self.execution.max_attempts)
            .backoff_unit(Duration::from_millis(self.execution.backoff_ms))
    }

    /// A builder carrying every setting from this config.
    pub fn into_builder(self) -> RavenBuilder {
        let mut builder = Raven::builder()
            .cache_config(self.cache_config())
            .execution(self.execution_config());

        if self.providers.polymarket.enabled {
            builder = builder.polymarket_url(&self.providers.polymarket.base_url);
        }
        if let Some(key) = self.lunarcrush_api_key() {
            builder = builder.lunarcrush(key);
        }
        if let Some(url) = &self.providers.lunarcrush.base_url {
            builder = builder.lunarcrush_url(url);
        }

        builder = if self.reasoning.enabled {
            let mut reasoning = AggregatorConfig::new();
            if let Some(ttl) = self.reasoning.ttl_seconds {
                reasoning = reasoning.ttl_seconds(ttl);
            }
            builder.reasoning(reasoning)
        } else {
            builder.without_reasoning()
        };

        builder.dispatch_rules(self.routing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.cache.default_ttl_seconds, 300);
        assert!(config.cache.persist);
        assert_eq!(
            config.cache.persist_path,
            dirs::home_dir().map(|home| home.join(".raven").join("cache.json"))
        );
        assert_eq!(config.execution.max_attempts, 3);
        assert!(config.providers.polymarket.enabled);
        assert_eq!(config.providers.polymarket.base_url, POLYMARKET_URL);
        assert!(config.reasoning.enabled);
        assert_eq!(config.routing, DispatchRules::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [cache]
            max_entries = 50
            default_ttl_seconds = 60
            persist_path = "/var/lib/raven/cache.json"

            [execution]
            timeout_secs = 5
            max_attempts = 2
            backoff_ms = 250

            [providers.polymarket]
            enabled = false

            [providers.lunarcrush]
            api_key = "lc-test"
            base_url = "http://localhost:9999"

            [reasoning]
            ttl_seconds = 120

            [routing]
            default_tool = "get_coins_list"

            [[routing.rules]]
            tool = "get_coins_list"
            kind = "source_mention"
            any_of = ["lunar"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(
            config.cache.persist_path,
            Some(PathBuf::from("/var/lib/raven/cache.json"))
        );
        let exec = config.execution_config();
        assert_eq!(exec.timeout, Duration::from_secs(5));
        assert_eq!(exec.max_attempts, 2);
        assert_eq!(exec.backoff_unit, Duration::from_millis(250));
        assert!(!config.providers.polymarket.enabled);
        assert_eq!(config.lunarcrush_api_key().as_deref(), Some("lc-test"));
        assert_eq!(config.reasoning.ttl_seconds, Some(120));
        assert_eq!(config.routing.default_tool, "get_coins_list");
        assert_eq!(config.routing.rules.len(), 1);
        assert!(config.routing.rules[0].none_of.is_empty());
    }

    #[test]
    fn persistence_can_be_disabled() {
        let config: Config = toml::from_str("[cache]\npersist = false").unwrap();
        assert!(config.cache_config().persist_path.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/raven.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[execution]\nmax_attempts = 1\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.execution.max_attempts, 1);
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(RavenError::Configuration(_))
        ));
    }

    #[test]
    fn builder_from_config_builds() {
        let config: Config =
            toml::from_str("[cache]\npersist = false\n[providers.polymarket]\nenabled = false")
                .unwrap();
        let orchestrator = config.into_builder().build().unwrap();
        assert!(orchestrator.registry().contains("combined_reasoning"));
        assert!(!orchestrator.registry().contains("get_events"));
    }
}
