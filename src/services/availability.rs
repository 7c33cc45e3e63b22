use chrono::NaiveDate;

use crate::models::{CandidateRange, ExistingBooking, Listing, StayDates};

/// Why a candidate range cannot be booked. Messages are shown to guests verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnavailableReason {
    #[error("listing unavailable.")]
    ListingInactive,
    #[error("this listing accommodates at most {max_guests} guests.")]
    TooManyGuests { max_guests: i32 },
    #[error("check-in cannot be in the past.")]
    CheckInInPast,
    #[error("check-out must be after check-in.")]
    CheckOutNotAfterCheckIn,
    #[error("minimum stay is {min_nights} nights.")]
    StayTooShort { min_nights: i32 },
    #[error("maximum stay is {max_nights} nights.")]
    StayTooLong { max_nights: i32 },
    #[error("dates not available.")]
    DatesNotAvailable,
}

impl UnavailableReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ListingInactive => "listing_inactive",
            Self::TooManyGuests { .. } => "too_many_guests",
            Self::CheckInInPast => "check_in_in_past",
            Self::CheckOutNotAfterCheckIn => "check_out_not_after_check_in",
            Self::StayTooShort { .. } => "stay_too_short",
            Self::StayTooLong { .. } => "stay_too_long",
            Self::DatesNotAvailable => "dates_not_available",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityResult {
    pub available: bool,
    pub reason: Option<UnavailableReason>,
    pub nights: Option<i64>,
    pub conflicts: Vec<StayDates>,
}

impl AvailabilityResult {
    fn available(nights: i64) -> Self {
        Self {
            available: true,
            reason: None,
            nights: Some(nights),
            conflicts: Vec::new(),
        }
    }

    fn rejected(reason: UnavailableReason, nights: Option<i64>) -> Self {
        Self {
            available: false,
            reason: Some(reason),
            nights,
            conflicts: Vec::new(),
        }
    }
}

/// Decide whether `range` can be booked on `listing`.
///
/// Rules run in a fixed order and the first failure wins; reasons are never
/// merged. `bookings` may contain non-occupying rows, they are ignored here.
pub fn check_availability(
    listing: &Listing,
    range: &CandidateRange,
    bookings: &[ExistingBooking],
    today: NaiveDate,
) -> AvailabilityResult {
    if !listing.is_active {
        return AvailabilityResult::rejected(UnavailableReason::ListingInactive, None);
    }

    if range.guests > listing.max_guests {
        return AvailabilityResult::rejected(
            UnavailableReason::TooManyGuests {
                max_guests: listing.max_guests,
            },
            None,
        );
    }

    let dates = range.dates;
    if dates.check_in < today {
        return AvailabilityResult::rejected(UnavailableReason::CheckInInPast, None);
    }

    if dates.check_out <= dates.check_in {
        return AvailabilityResult::rejected(UnavailableReason::CheckOutNotAfterCheckIn, None);
    }

    let nights = dates.nights();
    if nights < i64::from(listing.min_stay_nights) {
        return AvailabilityResult::rejected(
            UnavailableReason::StayTooShort {
                min_nights: listing.min_stay_nights,
            },
            Some(nights),
        );
    }
    if nights > i64::from(listing.max_stay_nights) {
        return AvailabilityResult::rejected(
            UnavailableReason::StayTooLong {
                max_nights: listing.max_stay_nights,
            },
            Some(nights),
        );
    }

    let conflicts: Vec<StayDates> = bookings
        .iter()
        .filter(|booking| booking.listing_id == listing.id && booking.status.is_occupying())
        .filter(|booking| dates.overlaps(&booking.dates))
        .map(|booking| booking.dates)
        .collect();

    if !conflicts.is_empty() {
        tracing::debug!(
            listing_id = %listing.id,
            check_in = %dates.check_in,
            check_out = %dates.check_out,
            conflicts = conflicts.len(),
            "Candidate range overlaps occupying bookings"
        );
        let mut result =
            AvailabilityResult::rejected(UnavailableReason::DatesNotAvailable, Some(nights));
        result.conflicts = conflicts;
        return result;
    }

    AvailabilityResult::available(nights)
}
