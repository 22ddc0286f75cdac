//! Process-wide configuration. Loading from the environment is provided
//! for convenience, but this is not a hardened validation layer; a
//! hosting HTTP service is expected to validate user-facing configuration
//! before constructing a `Config`.

use std::env;
use std::time::Duration;

/// Model identifiers and the resource envelope the core runs them under.
#[derive(Debug, Clone)]
pub struct Config {
    pub fast_model: String,
    pub accurate_model: String,
    pub embedding_model: String,

    pub fast_timeout_secs: u64,
    pub accurate_timeout_secs: u64,
    pub embedding_timeout_secs: u64,

    pub fast_concurrency: usize,
    pub accurate_concurrency: usize,
    pub embedding_concurrency: usize,

    pub cache_ttl_secs: u64,

    pub top_k: usize,
    pub distance_threshold: f32,
    pub min_results: usize,

    pub related_acts_depth: u8,

    pub metrics_log_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fast_model: "mistral:7b".to_string(),
            accurate_model: "gpt-oss:120b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),

            fast_timeout_secs: 15,
            accurate_timeout_secs: 240,
            embedding_timeout_secs: 30,

            fast_concurrency: 4,
            accurate_concurrency: 1,
            embedding_concurrency: 4,

            cache_ttl_secs: 300,

            top_k: 10,
            distance_threshold: 0.5,
            min_results: 3,

            related_acts_depth: 2,

            metrics_log_interval_secs: 300,
        }
    }
}

impl Config {
    /// Reads overrides from the environment, falling back to `Default` for
    /// anything unset or unparsable. Silently ignores a missing `.env` file.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            fast_model: env_or("IURIS_FAST_MODEL", defaults.fast_model),
            accurate_model: env_or("IURIS_ACCURATE_MODEL", defaults.accurate_model),
            embedding_model: env_or("IURIS_EMBEDDING_MODEL", defaults.embedding_model),

            fast_timeout_secs: env_parsed("IURIS_FAST_TIMEOUT_SECS", defaults.fast_timeout_secs),
            accurate_timeout_secs: env_parsed(
                "IURIS_ACCURATE_TIMEOUT_SECS",
                defaults.accurate_timeout_secs,
            ),
            embedding_timeout_secs: env_parsed(
                "IURIS_EMBEDDING_TIMEOUT_SECS",
                defaults.embedding_timeout_secs,
            ),

            fast_concurrency: env_parsed("IURIS_FAST_CONCURRENCY", defaults.fast_concurrency),
            accurate_concurrency: env_parsed(
                "IURIS_ACCURATE_CONCURRENCY",
                defaults.accurate_concurrency,
            ),
            embedding_concurrency: env_parsed(
                "IURIS_EMBEDDING_CONCURRENCY",
                defaults.embedding_concurrency,
            ),

            cache_ttl_secs: env_parsed("IURIS_CACHE_TTL_SECS", defaults.cache_ttl_secs),

            top_k: env_parsed("IURIS_TOP_K", defaults.top_k),
            distance_threshold: env_parsed(
                "IURIS_DISTANCE_THRESHOLD",
                defaults.distance_threshold,
            ),
            min_results: env_parsed("IURIS_MIN_RESULTS", defaults.min_results),

            related_acts_depth: env_parsed(
                "IURIS_RELATED_ACTS_DEPTH",
                defaults.related_acts_depth,
            ),

            metrics_log_interval_secs: env_parsed(
                "IURIS_METRICS_LOG_INTERVAL_SECS",
                defaults.metrics_log_interval_secs,
            ),
        }
    }

    pub fn fast_timeout(&self) -> Duration {
        Duration::from_secs(self.fast_timeout_secs)
    }

    pub fn accurate_timeout(&self) -> Duration {
        Duration::from_secs(self.accurate_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
