//! Client configuration.
//!
//! All scheduling, retry, and cache behavior is construction-time
//! configuration so callers (and tests) can instantiate isolated clients
//! instead of sharing process-global state.

use std::time::Duration;

/// Configuration for a [`crate::MetClient`].
#[derive(Debug, Clone)]
pub struct MetConfig {
    /// Base URL of the collection API.
    pub base_url: String,
    /// Maximum outbound requests per rolling window.
    pub max_requests: usize,
    /// Rolling window duration for the request quota.
    pub time_window: Duration,
    /// Minimum spacing between any two outbound requests.
    pub min_interval: Duration,
    /// Safety margin added when waiting for the oldest ticket to exit the window.
    pub window_margin: Duration,
    /// Wall-clock timeout for a single outbound request.
    pub request_timeout: Duration,
    /// Retry attempts after the initial one for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Ceiling for backoff delay.
    pub backoff_max: Duration,
    /// TTL for a successfully fetched object.
    pub object_ttl: Duration,
    /// TTL for search and department id lists.
    pub search_ttl: Duration,
    /// TTL for a definitive not-found result.
    pub not_found_ttl: Duration,
    /// TTL for an empty search result.
    pub empty_ttl: Duration,
    /// Cache size limit; least-recently-used entries are evicted past this.
    pub cache_max_entries: usize,
    /// Custom User-Agent. None enables rotating browser-like headers.
    pub user_agent: Option<String>,
}

impl Default for MetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://collectionapi.metmuseum.org/public/collection/v1".to_string(),
            max_requests: 60,
            time_window: Duration::from_secs(60),
            min_interval: Duration::from_millis(250),
            window_margin: Duration::from_millis(100),
            request_timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            object_ttl: Duration::from_secs(12 * 3600),
            search_ttl: Duration::from_secs(6 * 3600),
            not_found_ttl: Duration::from_secs(3600),
            empty_ttl: Duration::from_secs(300),
            cache_max_entries: 500,
            user_agent: None,
        }
    }
}

impl MetConfig {
    /// Build a config from defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("METLINK_BASE_URL").unwrap_or(defaults.base_url.clone()),
            max_requests: usize_from_env("METLINK_MAX_REQUESTS", defaults.max_requests),
            min_interval: delay_from_env("METLINK_MIN_INTERVAL_MS", defaults.min_interval),
            request_timeout: delay_from_env("METLINK_TIMEOUT_MS", defaults.request_timeout),
            user_agent: std::env::var("METLINK_USER_AGENT").ok(),
            ..defaults
        }
    }
}

/// Get a delay from an environment variable (milliseconds), with fallback.
fn delay_from_env(env_var: &str, default: Duration) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn usize_from_env(env_var: &str, default: usize) -> usize {
    std::env::var(env_var)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MetConfig::default();
        assert!(config.base_url.contains("metmuseum.org"));
        assert_eq!(config.max_requests, 60);
        assert!(config.min_interval >= Duration::from_millis(100));
        assert!(config.backoff_max > config.backoff_base);
        assert!(config.object_ttl > config.not_found_ttl);
        assert!(config.not_found_ttl > config.empty_ttl);
    }

    #[test]
    fn test_delay_from_env_fallback() {
        let d = delay_from_env("METLINK_TEST_UNSET_VAR", Duration::from_millis(42));
        assert_eq!(d, Duration::from_millis(42));
    }
}
