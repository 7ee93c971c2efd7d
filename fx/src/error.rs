//! FX error types.

use thiserror::Error;
use voyage_common::Currency;

/// Errors that can occur while fetching or applying exchange rates.
#[derive(Debug, Error)]
pub enum FxError {
    /// Transport-level failure reaching the rate API.
    #[error("Network error: {0}")]
    Network(String),

    /// The rate API did not answer in time.
    #[error("Rate request timed out: {0}")]
    Timeout(String),

    /// The rate API answered with a non-success status.
    #[error("Rate API returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// The response body was not JSON or had no `rates` object.
    #[error("Malformed rate response: {0}")]
    MalformedResponse(String),

    /// Currency code absent from the current rate table.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(Currency),

    /// Invalid store configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The refresh task panicked or was shut down with the runtime.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FxError {
    /// Check if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FxError::Network(_) | FxError::Timeout(_) => true,
            FxError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
