use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::pricing::PricingBreakdown;

/// Statuses that block the same dates from being booked again.
pub const OCCUPYING_STATUSES: &[BookingStatus] =
    &[BookingStatus::Pending, BookingStatus::Confirmed];

pub const DEFAULT_MONTHLY_DISCOUNT_THRESHOLD_NIGHTS: i32 = 28;

/// Read-only snapshot of a listing's booking rules and rates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub is_active: bool,
    pub currency: String,
    pub base_rate: Decimal,
    pub weekday_rate: Option<Decimal>,
    pub weekend_rate: Option<Decimal>,
    pub monthly_discount_percent: Option<Decimal>,
    pub monthly_discount_threshold_nights: Option<i32>,
    pub service_fee: Decimal,
    pub cleaning_fee: Decimal,
    pub tax_percent: Decimal,
    pub min_stay_nights: i32,
    pub max_stay_nights: i32,
    pub max_guests: i32,
    pub instant_book: bool,
    pub host_email: Option<String>,
}

impl Listing {
    pub fn has_rate_overrides(&self) -> bool {
        self.weekday_rate.is_some() || self.weekend_rate.is_some()
    }

    pub fn monthly_discount_threshold(&self) -> i64 {
        i64::from(
            self.monthly_discount_threshold_nights
                .filter(|nights| *nights > 0)
                .unwrap_or(DEFAULT_MONTHLY_DISCOUNT_THRESHOLD_NIGHTS),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_occupying(self) -> bool {
        OCCUPYING_STATUSES.contains(&self)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date span with an exclusive end: the guest leaves on `check_out` morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Half-open overlap: a stay ending on another's check-in day does not collide.
    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExistingBooking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub dates: StayDates,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRange {
    pub dates: StayDates,
    pub guests: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    BankTransfer,
    PayAtProperty,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
            Self::PayAtProperty => "pay_at_property",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "card" => Some(Self::Card),
            "paypal" => Some(Self::Paypal),
            "bank_transfer" => Some(Self::BankTransfer),
            "pay_at_property" => Some(Self::PayAtProperty),
            _ => None,
        }
    }
}

/// Booking handed to the Reservation Store for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBooking {
    pub listing_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub guest: GuestInfo,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub pricing: PricingBreakdown,
}

impl NewBooking {
    pub fn dates(&self) -> StayDates {
        StayDates {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedBooking {
    pub id: Uuid,
    #[serde(flatten)]
    pub booking: NewBooking,
    pub created_at: DateTime<Utc>,
}

impl PersistedBooking {
    pub fn as_existing(&self) -> ExistingBooking {
        ExistingBooking {
            id: self.id,
            listing_id: self.booking.listing_id,
            dates: self.booking.dates(),
            status: self.booking.status,
        }
    }
}
