//! Voyage FX
//!
//! Exchange-rate cache and currency conversion for the booking portal.
//!
//! # Features
//!
//! - Built-in fallback rates so conversion works before the first fetch
//! - Remote refresh with a one-hour cache window and failure fallback
//! - Conversion through the base currency, with detailed status reporting
//! - Booking revenue aggregation in a single reporting currency
//!
//! # Example
//!
//! ```rust,ignore
//! use voyage_fx::{RateStore, RateStoreConfig};
//!
//! let store = RateStore::from_config(RateStoreConfig::from_env())?;
//!
//! // Readiness gate, then convert
//! store.ensure_fresh(false).await;
//! let usd = store.convert(100.0, "TND", "USD");
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod provider;
pub mod revenue;
pub mod snapshot;
pub mod store;

pub use config::RateStoreConfig;
pub use conversion::{Conversion, ConversionStatus, Converter};
pub use error::{FxError, FxResult};
pub use provider::{HttpRateSource, RateSource};
pub use revenue::{RevenueAggregator, RevenueReport};
pub use snapshot::{RateSnapshot, SnapshotOrigin, BASE_CURRENCY, FALLBACK_RATES};
pub use store::{RateStore, RateStoreStatus, SharedRateStore};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
