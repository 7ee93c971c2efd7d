//! Booking revenue aggregation in a single reporting currency.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use voyage_common::{Booking, Currency, Money, Timestamp};

use crate::conversion::{ConversionStatus, Converter};
use crate::store::RateStore;

/// Revenue over a set of bookings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueReport {
    /// Unrounded sum in the reporting currency.
    pub total: Money,
    /// Bookings that counted toward revenue.
    pub counted: usize,
    /// Bookings filtered out by status.
    pub skipped: usize,
    /// Bookings whose currency had no rate; their amounts were added
    /// unconverted.
    pub unconverted: Vec<String>,
    /// Whether the rates came from a store whose last refresh failed.
    pub stale: bool,
    /// Refresh time of the snapshot used, `None` for the fallback table.
    pub rates_as_of: Option<Timestamp>,
}

impl RevenueReport {
    /// Total rounded to the reporting currency's decimal places.
    pub fn rounded(&self) -> Option<Decimal> {
        self.total.to_decimal()
    }

    /// False when some amounts were not converted or the rates are stale.
    pub fn is_reliable(&self) -> bool {
        self.unconverted.is_empty() && !self.stale
    }
}

/// Sums approved bookings into one currency.
///
/// Every booking is converted with the latest snapshot, whatever its booking
/// date.
#[derive(Debug, Clone)]
pub struct RevenueAggregator {
    target: Currency,
    default_currency: Currency,
}

impl RevenueAggregator {
    /// Aggregate into `target`; bookings without a currency are taken as TND.
    pub fn new(target: Currency) -> Self {
        Self {
            target,
            default_currency: Currency::tnd(),
        }
    }

    /// Currency assumed for bookings that carry none.
    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    pub fn target(&self) -> &Currency {
        &self.target
    }

    /// Refresh rates if needed, then aggregate.
    pub async fn aggregate_fresh(&self, store: &RateStore, bookings: &[Booking]) -> RevenueReport {
        store.ensure_fresh(false).await;
        self.aggregate(&store.converter(), bookings)
    }

    /// Aggregate with whatever rates `converter` holds.
    pub fn aggregate(&self, converter: &Converter, bookings: &[Booking]) -> RevenueReport {
        let mut total = 0.0;
        let mut counted = 0;
        let mut unconverted = Vec::new();
        let mut stale = false;

        for booking in bookings.iter().filter(|b| b.counts_as_revenue()) {
            let source = booking.source_currency(&self.default_currency);
            let conversion =
                converter.convert_detailed(booking.amount(), source.code(), self.target.code());

            match &conversion.status {
                ConversionStatus::UnknownCurrency(code) => {
                    debug!(booking_id = %booking.id, currency = %code, "Booking amount left unconverted");
                    unconverted.push(booking.id.clone());
                }
                ConversionStatus::Stale => stale = true,
                ConversionStatus::Converted | ConversionStatus::Unchanged => {}
            }

            total += conversion.value();
            counted += 1;
        }

        let report = RevenueReport {
            total: Money::new(total, self.target.clone()),
            counted,
            skipped: bookings.len() - counted,
            unconverted,
            stale: stale || converter.is_stale(),
            rates_as_of: converter.snapshot().refreshed_at(),
        };

        info!(
            currency = %self.target,
            total = report.total.value,
            counted = report.counted,
            unconverted = report.unconverted.len(),
            "Revenue aggregated"
        );

        report
    }
}
