//! Booking records as returned by the portal backend.
//!
//! Only the fields the currency layer reads are modelled; unknown fields in
//! the backend JSON are ignored.

use serde::{Deserialize, Serialize};

use crate::Currency;

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Submitted, awaiting agency review.
    Pending,
    /// Accepted by the agency.
    Confirmed,
    /// Trip or service delivered.
    Completed,
    /// Cancelled by the customer or the agency.
    Cancelled,
    /// Any status this crate does not know; never counted.
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    /// Check if the booking represents an approved service.
    pub fn is_approved(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }
}

/// Payment status attached to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Approved,
    Failed,
    Refunded,
    /// Any status this crate does not know; never settled.
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Check if the payment has been settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Approved)
    }
}

/// A customer booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Backend identifier.
    pub id: String,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Payment status, absent for bookings created before payments existed.
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    /// Total charged amount.
    #[serde(default)]
    pub total_amount: Option<f64>,
    /// Price copied from the package when the booking was made.
    #[serde(default)]
    pub price_snapshot: Option<f64>,
    /// Currency of the total amount.
    #[serde(default)]
    pub currency: Option<String>,
    /// Currency of the booked package.
    #[serde(default)]
    pub package_currency: Option<String>,
}

impl Booking {
    /// Whether the booking counts toward revenue: an approved service whose
    /// payment is settled or was never tracked.
    pub fn counts_as_revenue(&self) -> bool {
        self.status.is_approved()
            && self
                .payment_status
                .map_or(true, |payment| payment.is_settled())
    }

    /// Charged amount, falling back to the price snapshot, then zero.
    pub fn amount(&self) -> f64 {
        self.total_amount.or(self.price_snapshot).unwrap_or(0.0)
    }

    /// Currency of [`Booking::amount`], normalized, with a default for
    /// bookings that carry none.
    pub fn source_currency(&self, default: &Currency) -> Currency {
        non_blank(&self.currency)
            .or_else(|| non_blank(&self.package_currency))
            .map(Currency::normalized)
            .unwrap_or_else(|| default.clone())
    }
}

fn non_blank(code: &Option<String>) -> Option<&str> {
    code.as_deref().filter(|code| !code.trim().is_empty())
}
