//! Monetary types for the Voyage currency layer.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// ISO 4217-like currency code.
///
/// Codes are kept verbatim and compared case-sensitively. Use
/// [`Currency::normalized`] for user or backend input that may arrive in
/// lower case or with surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a currency from a code, exactly as given.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Create a currency from untrusted input: trimmed and upper-cased.
    pub fn normalized(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" | "TND" | "LYD" => 3,
            _ => 2,
        }
    }

    /// Euro, the base currency of the rate table.
    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    /// Tunisian dinar, the agency's home currency.
    pub fn tnd() -> Self {
        Self::new("TND")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Currency {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A monetary amount with currency.
///
/// Prices travel through the conversion layer as `f64`; rounding happens only
/// at presentation time through [`Money::round`] or [`Money::to_decimal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value.
    pub value: f64,
    /// Currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: f64, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Exact decimal value rounded to the currency's standard decimal places.
    ///
    /// Returns `None` for NaN or infinite amounts.
    pub fn to_decimal(&self) -> Option<Decimal> {
        Decimal::from_f64(self.value).map(|d| {
            d.round_dp_with_strategy(
                self.currency.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            )
        })
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let value = self
            .to_decimal()
            .and_then(|d| d.to_f64())
            .unwrap_or(self.value);
        Self {
            value,
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = self.currency.decimal_places() as usize;
        write!(f, "{:.*} {}", places, self.value, self.currency)
    }
}
