//! Currency conversion over a rate snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use voyage_common::{Currency, Money};

use crate::error::{FxError, FxResult};
use crate::snapshot::RateSnapshot;

/// How a conversion result was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "currency", rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Converted through the base currency.
    Converted,
    /// Converted, but the latest refresh attempt failed so the rates are the
    /// fallback table or an older snapshot.
    Stale,
    /// Zero or NaN amount, or identical codes; returned as is.
    Unchanged,
    /// Returned as is because the code has no rate.
    UnknownCurrency(Currency),
}

/// Result of a detailed conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    /// Input amount.
    pub input: Money,
    /// Output amount, in the target currency.
    pub output: Money,
    pub status: ConversionStatus,
}

impl Conversion {
    /// The numeric result.
    pub fn value(&self) -> f64 {
        self.output.value
    }

    /// False when the figure may be wrong: unknown code or stale rates.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self.status,
            ConversionStatus::Converted | ConversionStatus::Unchanged
        )
    }

    /// True when the amount went through the rate table.
    pub fn is_converted(&self) -> bool {
        matches!(
            self.status,
            ConversionStatus::Converted | ConversionStatus::Stale
        )
    }
}

/// Converts amounts between currency codes using one snapshot.
///
/// Conversions never fail: anything that cannot be converted comes back
/// unchanged. Use [`Converter::convert_detailed`] or
/// [`Converter::try_convert`] to tell a passthrough from a real conversion.
#[derive(Debug, Clone)]
pub struct Converter {
    snapshot: Arc<RateSnapshot>,
    stale: bool,
}

impl Converter {
    /// Create a converter over `snapshot`.
    pub fn new(snapshot: Arc<RateSnapshot>) -> Self {
        Self {
            snapshot,
            stale: false,
        }
    }

    /// Converter over the built-in table.
    pub fn fallback() -> Self {
        Self::new(Arc::new(RateSnapshot::fallback()))
    }

    /// Mark results as computed from stale rates.
    pub fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    pub fn snapshot(&self) -> &RateSnapshot {
        &self.snapshot
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Check if `code` has a rate in the snapshot.
    pub fn supports(&self, code: &str) -> bool {
        self.snapshot.contains(code)
    }

    /// Convert `amount` from `from` to `to`.
    ///
    /// Zero, NaN, identical codes and unknown codes return `amount`
    /// unchanged. No rounding is applied.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        self.compute(amount, from, to).0
    }

    /// Convert and report how the result was obtained.
    pub fn convert_detailed(&self, amount: f64, from: &str, to: &str) -> Conversion {
        let (value, status) = self.compute(amount, from, to);
        let output_currency = match status {
            ConversionStatus::Converted | ConversionStatus::Stale => to,
            ConversionStatus::Unchanged | ConversionStatus::UnknownCurrency(_) => from,
        };

        Conversion {
            input: Money::new(amount, Currency::new(from)),
            output: Money::new(value, Currency::new(output_currency)),
            status,
        }
    }

    /// Convert, failing on unknown codes instead of passing through.
    pub fn try_convert(&self, amount: f64, from: &str, to: &str) -> FxResult<f64> {
        match self.compute(amount, from, to) {
            (_, ConversionStatus::UnknownCurrency(code)) => Err(FxError::UnknownCurrency(code)),
            (value, _) => Ok(value),
        }
    }

    /// Convert a [`Money`] value; the result keeps the source currency when
    /// no conversion happened.
    pub fn convert_money(&self, money: &Money, to: &Currency) -> Money {
        self.convert_detailed(money.value, money.currency.code(), to.code())
            .output
    }

    fn compute(&self, amount: f64, from: &str, to: &str) -> (f64, ConversionStatus) {
        if amount == 0.0 || amount.is_nan() || from == to {
            return (amount, ConversionStatus::Unchanged);
        }

        let from_rate = match self.snapshot.rate(from) {
            Some(rate) => rate,
            None => return self.passthrough(amount, from),
        };
        let to_rate = match self.snapshot.rate(to) {
            Some(rate) => rate,
            None => return self.passthrough(amount, to),
        };

        let amount_in_base = amount / from_rate;
        let status = if self.stale {
            ConversionStatus::Stale
        } else {
            ConversionStatus::Converted
        };

        (amount_in_base * to_rate, status)
    }

    fn passthrough(&self, amount: f64, unknown: &str) -> (f64, ConversionStatus) {
        debug!(currency = %unknown, "No rate for currency, amount left unconverted");
        (amount, ConversionStatus::UnknownCurrency(Currency::new(unknown)))
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FALLBACK_RATES;
    use proptest::prelude::*;
    use voyage_common::now;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_eur_to_tnd_fallback() {
        let converter = Converter::fallback();
        assert!(approx_eq(converter.convert(100.0, "EUR", "TND"), 330.0));
        assert!(approx_eq(converter.convert(2.5, "EUR", "TND"), 2.5 * 3.30));
    }

    #[test]
    fn test_tnd_to_usd_fallback() {
        let converter = Converter::fallback();
        let usd = converter.convert(100.0, "TND", "USD");

        assert!(approx_eq(usd, 100.0 / 3.30 * 1.08));
        assert!((usd - 32.73).abs() < 0.005);
    }

    #[test]
    fn test_to_base_goes_through_rate() {
        let converter = Converter::fallback();
        assert!(approx_eq(converter.convert(330.0, "TND", "EUR"), 100.0));
    }

    #[test]
    fn test_unknown_currency_passthrough() {
        let converter = Converter::fallback();

        assert_eq!(converter.convert(50.0, "XYZ", "TND"), 50.0);
        assert_eq!(converter.convert(50.0, "TND", "XYZ"), 50.0);

        let detailed = converter.convert_detailed(50.0, "XYZ", "TND");
        assert_eq!(
            detailed.status,
            ConversionStatus::UnknownCurrency(Currency::new("XYZ"))
        );
        assert_eq!(detailed.output.currency, Currency::new("XYZ"));
        assert!(!detailed.is_reliable());
    }

    #[test]
    fn test_codes_are_case_sensitive() {
        let converter = Converter::fallback();

        assert_eq!(converter.convert(10.0, "eur", "TND"), 10.0);
        assert!(!converter.supports("eur"));
        assert!(converter.supports("EUR"));
    }

    #[test]
    fn test_zero_and_nan_unchanged() {
        let converter = Converter::fallback();

        assert_eq!(converter.convert(0.0, "EUR", "TND"), 0.0);
        assert!(converter.convert(f64::NAN, "EUR", "TND").is_nan());
        assert_eq!(
            converter.convert_detailed(0.0, "XYZ", "TND").status,
            ConversionStatus::Unchanged
        );
    }

    #[test]
    fn test_same_code_unknown_to_table() {
        let converter = Converter::fallback();
        let detailed = converter.convert_detailed(12.0, "XYZ", "XYZ");

        assert_eq!(detailed.value(), 12.0);
        assert_eq!(detailed.status, ConversionStatus::Unchanged);
    }

    #[test]
    fn test_negative_amounts_convert() {
        let converter = Converter::fallback();
        assert!(approx_eq(converter.convert(-10.0, "EUR", "TND"), -33.0));
    }

    #[test]
    fn test_remote_snapshot_overrides_fallback() {
        let snapshot = RateSnapshot::merged(
            vec![("EUR".to_string(), 1.0), ("TND".to_string(), 3.5)],
            now(),
        );
        let converter = Converter::new(Arc::new(snapshot));

        assert_eq!(converter.convert(1.0, "EUR", "TND"), 3.5);
    }

    #[test]
    fn test_stale_status() {
        let converter = Converter::fallback().with_stale(true);
        let detailed = converter.convert_detailed(100.0, "EUR", "TND");

        assert_eq!(detailed.status, ConversionStatus::Stale);
        assert!(detailed.is_converted());
        assert!(!detailed.is_reliable());
        assert_eq!(detailed.output.currency, Currency::tnd());
    }

    #[test]
    fn test_try_convert() {
        let converter = Converter::fallback();

        assert!(approx_eq(converter.try_convert(1.0, "EUR", "USD").unwrap(), 1.08));
        assert!(matches!(
            converter.try_convert(1.0, "EUR", "XYZ"),
            Err(FxError::UnknownCurrency(code)) if code.code() == "XYZ"
        ));
    }

    #[test]
    fn test_convert_money() {
        let converter = Converter::fallback();
        let tnd = converter.convert_money(&Money::new(100.0, Currency::eur()), &Currency::tnd());

        assert_eq!(tnd.currency, Currency::tnd());
        assert_eq!(tnd.round().value, 330.0);
    }

    fn fallback_code() -> impl Strategy<Value = &'static str> {
        prop::sample::select(FALLBACK_RATES.iter().map(|(code, _)| *code).collect::<Vec<_>>())
    }

    proptest! {
        #[test]
        fn prop_identity_on_equal_codes(x in -1.0e9f64..1.0e9, code in fallback_code()) {
            let converter = Converter::fallback();
            prop_assert_eq!(converter.convert(x, code, code), x);
        }

        #[test]
        fn prop_round_trip(x in 0.01f64..1.0e9, a in fallback_code(), b in fallback_code()) {
            let converter = Converter::fallback();
            let back = converter.convert(converter.convert(x, a, b), b, a);
            prop_assert!(approx_eq(back, x), "{} -> {} -> {}: {} != {}", a, b, a, back, x);
        }
    }
}
