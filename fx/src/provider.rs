//! Rate source trait and implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use voyage_common::Currency;

use crate::config::RateStoreConfig;
use crate::error::{FxError, FxResult};

/// Trait for sources of base-relative exchange rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the latest rates relative to `base`: units of each currency per
    /// unit of `base`.
    async fn fetch_rates(&self, base: &Currency) -> FxResult<HashMap<String, f64>>;
}

/// Body of `GET {api}/{base}`. Fields other than `rates` are ignored.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, serde_json::Value>,
}

/// Parse a latest-rates response body.
///
/// Fails only when the body is not JSON or has no `rates` object. Entries
/// whose value is not a number are skipped.
pub fn parse_latest_rates(body: &str) -> FxResult<HashMap<String, f64>> {
    let response = serde_json::from_str::<LatestRatesResponse>(body)
        .map_err(|e| FxError::MalformedResponse(e.to_string()))?;

    Ok(response
        .rates
        .into_iter()
        .filter_map(|(code, value)| match value.as_f64() {
            Some(rate) => Some((code, rate)),
            None => {
                debug!(code = %code, value = %value, "Skipping non-numeric rate");
                None
            }
        })
        .collect())
}

/// Rate source backed by an HTTP exchange-rate API.
pub struct HttpRateSource {
    client: Client,
    config: RateStoreConfig,
}

impl HttpRateSource {
    /// Create a source with a client honouring the configured timeout.
    pub fn new(config: RateStoreConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn fetch_rates(&self, base: &Currency) -> FxResult<HashMap<String, f64>> {
        let url = self.config.latest_url(base.code());
        debug!(url = %url, "Requesting latest rates");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FxError::Timeout(format!("{}: {}", url, e))
            } else {
                FxError::Network(format!("{}: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FxError::Network(format!("Failed to read rate response: {}", e)))?;

        let rates = parse_latest_rates(&body)?;
        debug!(count = rates.len(), "Received latest rates");
        Ok(rates)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateSource;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use dashmap::DashMap;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Scripted rate source for tests.
    #[derive(Default)]
    pub struct MockRateSource {
        rates: DashMap<String, f64>,
        failing: AtomicBool,
        calls: AtomicUsize,
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl MockRateSource {
        /// Create a source answering with an empty rate object.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a source answering with the given rates.
        pub fn with_rates(rates: &[(&str, f64)]) -> Self {
            let source = Self::new();
            for (code, rate) in rates {
                source.set_rate(code, *rate);
            }
            source
        }

        /// Set a rate returned by subsequent fetches.
        pub fn set_rate(&self, code: &str, rate: f64) {
            self.rates.insert(code.to_string(), rate);
        }

        /// Make subsequent fetches fail with a network error.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of fetches started so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Hold subsequent fetches until [`MockRateSource::resume`].
        pub fn pause(&self) {
            *self.gate.lock() = Some(Arc::new(Notify::new()));
        }

        /// Release one held fetch and stop holding.
        pub fn resume(&self) {
            if let Some(gate) = self.gate.lock().take() {
                gate.notify_one();
            }
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        fn name(&self) -> &str {
            "MOCK"
        }

        async fn fetch_rates(&self, _base: &Currency) -> FxResult<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if self.failing.load(Ordering::SeqCst) {
                return Err(FxError::Network("mock rate source unavailable".to_string()));
            }

            Ok(self
                .rates
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect())
        }
    }
}
