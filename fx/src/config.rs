//! Rate store configuration.

use chrono::Duration;
use voyage_common::time::constants;

/// Public exchange-rate API without key; answers `GET {base}/{code}`.
pub const DEFAULT_RATE_API_BASE: &str = "https://open.er-api.com/v6/latest";

/// Configuration for [`crate::RateStore`] and [`crate::HttpRateSource`].
#[derive(Debug, Clone)]
pub struct RateStoreConfig {
    /// Rate API root; the base currency code is appended as a path segment.
    pub rate_api_base: String,
    /// How long a successful refresh is reused.
    pub cache_ttl: Duration,
    /// Outbound request timeout.
    pub request_timeout: std::time::Duration,
}

impl Default for RateStoreConfig {
    fn default() -> Self {
        Self {
            rate_api_base: DEFAULT_RATE_API_BASE.to_string(),
            cache_ttl: constants::rate_cache_window(),
            request_timeout: constants::rate_request_timeout(),
        }
    }
}

impl RateStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unparsable or out-of-range values
    /// keep their defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("FX_RATE_API_BASE") {
            config.rate_api_base = url;
        }

        if let Some(ttl) = lookup("FX_CACHE_TTL_SECS") {
            if let Some(ttl) = ttl.parse().ok().and_then(Duration::try_seconds) {
                config.cache_ttl = ttl;
            }
        }

        if let Some(timeout) = lookup("FX_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.request_timeout = std::time::Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_api_base.is_empty() {
            return Err("Rate API base URL cannot be empty".to_string());
        }

        if !(self.rate_api_base.starts_with("http://") || self.rate_api_base.starts_with("https://")) {
            return Err(format!(
                "Rate API base URL must be http(s): {}",
                self.rate_api_base
            ));
        }

        if self.cache_ttl <= Duration::zero() {
            return Err("Cache TTL must be positive".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        Ok(())
    }

    /// URL of the latest-rates endpoint for `base`.
    pub fn latest_url(&self, base: &str) -> String {
        format!("{}/{}", self.rate_api_base.trim_end_matches('/'), base)
    }
}
