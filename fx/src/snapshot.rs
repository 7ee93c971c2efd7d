//! Point-in-time exchange-rate tables.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;
use tracing::debug;
use voyage_common::{Currency, Timestamp};

/// Currency every stored rate is expressed against.
pub const BASE_CURRENCY: &str = "EUR";

/// Approximate rates used until the rate API answers: 1 EUR = rate units.
pub const FALLBACK_RATES: &[(&str, f64)] = &[
    ("EUR", 1.0),
    ("USD", 1.08),
    ("GBP", 0.85),
    ("TND", 3.30),
    ("AED", 3.95),
    ("SAR", 4.05),
    ("QAR", 3.95),
    ("EGP", 51.0),
    ("JPY", 165.0),
    ("CNY", 7.8),
    ("CAD", 1.45),
    ("AUD", 1.65),
    ("CHF", 0.97),
    ("TRY", 36.0),
    ("MAD", 10.8),
    ("DZD", 145.0),
    ("LYD", 5.2),
    ("OMR", 0.42),
    ("KWD", 0.30),
    ("BHD", 0.40),
];

/// Where a snapshot's rates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Built-in table only.
    Fallback,
    /// Built-in table merged with a rate API response.
    Remote,
}

/// Immutable mapping from currency code to its value against the base
/// currency.
///
/// Every value is positive and finite, the base maps to 1, and every
/// fallback code is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    base: Currency,
    rates: BTreeMap<Currency, f64>,
    refreshed_at: Option<Timestamp>,
    origin: SnapshotOrigin,
}

fn is_usable(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

fn fallback_table() -> BTreeMap<Currency, f64> {
    FALLBACK_RATES
        .iter()
        .map(|(code, rate)| (Currency::new(*code), *rate))
        .collect()
}

impl RateSnapshot {
    /// Snapshot holding the built-in table, never refreshed.
    pub fn fallback() -> Self {
        let mut rates = fallback_table();
        rates.insert(Currency::new(BASE_CURRENCY), 1.0);

        Self {
            base: Currency::new(BASE_CURRENCY),
            rates,
            refreshed_at: None,
            origin: SnapshotOrigin::Fallback,
        }
    }

    /// Merge a rate API response over the built-in table.
    ///
    /// Remote values win on collisions; unusable remote values are dropped;
    /// the base is forced to 1 whatever the response says.
    pub fn merged<I>(remote: I, refreshed_at: Timestamp) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut rates = fallback_table();

        for (code, rate) in remote {
            if is_usable(rate) {
                rates.insert(Currency::new(code), rate);
            } else {
                debug!(currency = %code, rate, "Discarding unusable remote rate");
            }
        }

        rates.insert(Currency::new(BASE_CURRENCY), 1.0);

        Self {
            base: Currency::new(BASE_CURRENCY),
            rates,
            refreshed_at: Some(refreshed_at),
            origin: SnapshotOrigin::Remote,
        }
    }

    /// The base currency.
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// Units of `code` per unit of base, if known.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied().filter(|rate| is_usable(*rate))
    }

    /// Check if `code` can be converted.
    pub fn contains(&self, code: &str) -> bool {
        self.rate(code).is_some()
    }

    /// Known currency codes, sorted.
    pub fn codes(&self) -> impl Iterator<Item = &Currency> {
        self.rates.keys()
    }

    /// Iterate `(code, rate)` pairs, sorted by code.
    pub fn iter(&self) -> impl Iterator<Item = (&Currency, f64)> {
        self.rates.iter().map(|(code, rate)| (code, *rate))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// When the remote part of this snapshot was fetched.
    pub fn refreshed_at(&self) -> Option<Timestamp> {
        self.refreshed_at
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    /// Time since the last successful refresh.
    pub fn age(&self, now: Timestamp) -> Option<Duration> {
        self.refreshed_at.map(|at| now.signed_duration_since(at))
    }

    /// Check if the snapshot was refreshed less than `ttl` before `now`.
    pub fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age(now).map_or(false, |age| age < ttl)
    }
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self::fallback()
    }
}
