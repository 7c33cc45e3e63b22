use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{BookingStatus, CandidateRange, GuestInfo, PaymentMethod, StayDates};
use crate::services::availability::AvailabilityResult;
use crate::services::booking::BookingRequest;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::BadRequest(format!("Validation failed: {errors}")))
}

fn default_guests() -> i32 {
    1
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid {field}, expected YYYY-MM-DD.")))
}

fn parse_listing_id(value: &str) -> Result<Uuid, AppError> {
    Uuid::try_parse(value.trim())
        .map_err(|_| AppError::BadRequest("Invalid listing_id.".to_string()))
}

/// Query string shared by the availability and pricing endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StayQuery {
    pub listing_id: String,
    pub check_in: String,
    pub check_out: String,
    #[serde(default = "default_guests")]
    #[validate(range(min = 1, max = 50))]
    pub guests: i32,
}

impl StayQuery {
    pub fn parse(&self) -> Result<(Uuid, CandidateRange), AppError> {
        validate_input(self)?;
        let listing_id = parse_listing_id(&self.listing_id)?;
        let range = CandidateRange {
            dates: StayDates {
                check_in: parse_date(&self.check_in, "check_in")?,
                check_out: parse_date(&self.check_out, "check_out")?,
            },
            guests: self.guests,
        };
        Ok((listing_id, range))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GuestInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingInput {
    pub listing_id: Uuid,
    pub check_in: String,
    pub check_out: String,
    #[validate(range(min = 1, max = 50))]
    pub guests: i32,
    #[validate(nested)]
    pub guest: GuestInput,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 2000))]
    pub special_requests: Option<String>,
    pub quoted_total: Option<Decimal>,
}

impl CreateBookingInput {
    pub fn into_request(self) -> Result<BookingRequest, AppError> {
        validate_input(&self)?;
        let dates = StayDates {
            check_in: parse_date(&self.check_in, "check_in")?,
            check_out: parse_date(&self.check_out, "check_out")?,
        };
        Ok(BookingRequest {
            listing_id: self.listing_id,
            range: CandidateRange {
                dates,
                guests: self.guests,
            },
            guest: GuestInfo {
                full_name: self.guest.full_name.trim().to_string(),
                email: self.guest.email.trim().to_string(),
                phone: non_empty_opt(self.guest.phone.as_deref()),
            },
            payment_method: self.payment_method,
            special_requests: non_empty_opt(self.special_requests.as_deref()),
            quoted_total: self.quoted_total,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookingStatusInput {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingPath {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingPath {
    pub listing_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub listing_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nights: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<StayDates>,
}

impl AvailabilityResponse {
    pub fn new(listing_id: Uuid, range: &CandidateRange, result: AvailabilityResult) -> Self {
        Self {
            listing_id,
            check_in: range.dates.check_in,
            check_out: range.dates.check_out,
            guests: range.guests,
            available: result.available,
            reason: result.reason.as_ref().map(ToString::to_string),
            reason_code: result.reason.as_ref().map(|reason| reason.code()),
            nights: result.nights,
            conflicts: result.conflicts,
        }
    }
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
