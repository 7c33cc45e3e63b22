use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    BookingStatus, CandidateRange, GuestInfo, Listing, NewBooking, PaymentMethod,
    PersistedBooking, StayDates,
};
use crate::repository::{Entity, ReservationStore, StoreError};
use crate::services::availability::{check_availability, AvailabilityResult, UnavailableReason};
use crate::services::pricing::{compute_pricing, PricingBreakdown};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),
    #[error("listing not found.")]
    ListingNotFound,
    #[error("booking not found.")]
    BookingNotFound,
    #[error("{reason}")]
    Unavailable {
        reason: UnavailableReason,
        conflicts: Vec<StayDates>,
    },
    /// Lost the race for these dates between the guest's last check and submission.
    #[error("these dates were just booked by someone else.")]
    Conflict {
        reason: Option<UnavailableReason>,
        conflicts: Vec<StayDates>,
    },
    #[error("cannot change booking status from {from} to {to}.")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// The booking was not created; safe to retry.
    #[error("{0}")]
    StorageFailure(String),
}

impl From<StoreError> for BookingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(Entity::Booking) => Self::BookingNotFound,
            StoreError::NotFound(Entity::Listing) => Self::ListingNotFound,
            StoreError::Conflict => Self::Conflict {
                reason: None,
                conflicts: Vec::new(),
            },
            StoreError::Storage(message) => Self::StorageFailure(message),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let message = error.to_string();
        match error {
            BookingError::Validation(_) => AppError::BadRequest(message),
            BookingError::ListingNotFound | BookingError::BookingNotFound => {
                AppError::NotFound(message)
            }
            BookingError::Unavailable { reason, conflicts } => AppError::Unavailable {
                message,
                reason_code: reason.code(),
                conflicts,
            },
            BookingError::Conflict { reason, conflicts } => AppError::Conflict {
                message,
                reason_code: reason.as_ref().map(UnavailableReason::code),
                conflicts,
            },
            BookingError::InvalidTransition { .. } => AppError::UnprocessableEntity(message),
            BookingError::StorageFailure(_) => {
                AppError::Dependency("Reservation store is unavailable, please retry.".to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub listing_id: Uuid,
    pub range: CandidateRange,
    pub guest: GuestInfo,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
    /// Total the guest saw; informational only, never charged.
    pub quoted_total: Option<Decimal>,
}

/// Read the live listing and its occupying bookings, then run the availability rules.
pub async fn check_listing_availability<S: ReservationStore>(
    store: &S,
    listing_id: Uuid,
    range: &CandidateRange,
    today: NaiveDate,
) -> Result<(Listing, AvailabilityResult), BookingError> {
    let listing = store.get_listing(listing_id).await?;
    let bookings = store.get_occupying_bookings(listing_id).await?;
    let result = check_availability(&listing, range, &bookings, today);
    Ok((listing, result))
}

/// Price a stay; only ranges that are currently bookable get a price.
pub async fn price_stay<S: ReservationStore>(
    store: &S,
    listing_id: Uuid,
    range: &CandidateRange,
    today: NaiveDate,
) -> Result<PricingBreakdown, BookingError> {
    let (listing, availability) =
        check_listing_availability(store, listing_id, range, today).await?;
    if let Some(reason) = availability.reason {
        return Err(BookingError::Unavailable {
            reason,
            conflicts: availability.conflicts,
        });
    }
    Ok(compute_pricing(&listing, range))
}

/// Re-check availability, recompute the price and persist the booking.
///
/// Losing the dates to another booking, either here or at insert time, is a
/// [`BookingError::Conflict`]; any other rule failure stays
/// [`BookingError::Unavailable`].
pub async fn confirm_booking<S: ReservationStore>(
    store: &S,
    request: BookingRequest,
    today: NaiveDate,
) -> Result<PersistedBooking, BookingError> {
    let (listing, availability) =
        check_listing_availability(store, request.listing_id, &request.range, today).await?;

    match availability.reason {
        Some(UnavailableReason::DatesNotAvailable) => {
            return Err(BookingError::Conflict {
                reason: Some(UnavailableReason::DatesNotAvailable),
                conflicts: availability.conflicts,
            });
        }
        Some(reason) => {
            return Err(BookingError::Unavailable {
                reason,
                conflicts: availability.conflicts,
            });
        }
        None => {}
    }

    let pricing = compute_pricing(&listing, &request.range);
    if let Some(quoted) = request.quoted_total {
        if quoted != pricing.total {
            tracing::info!(
                listing_id = %listing.id,
                quoted_total = %quoted,
                total = %pricing.total,
                "Quoted total differs from live price, charging live price"
            );
        }
    }

    let status = if listing.instant_book {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };

    let booking = NewBooking {
        listing_id: listing.id,
        check_in: request.range.dates.check_in,
        check_out: request.range.dates.check_out,
        guests: request.range.guests,
        guest: request.guest,
        payment_method: request.payment_method,
        special_requests: request.special_requests,
        status,
        pricing,
    };

    let persisted = store.insert_booking(booking).await.map_err(|error| {
        tracing::warn!(listing_id = %listing.id, error = %error, "Booking insert rejected");
        BookingError::from(error)
    })?;

    tracing::info!(
        booking_id = %persisted.id,
        listing_id = %listing.id,
        status = %persisted.booking.status,
        total = %persisted.booking.pricing.total,
        "Booking created"
    );
    Ok(persisted)
}

pub async fn transition_booking_status<S: ReservationStore>(
    store: &S,
    booking_id: Uuid,
    next: BookingStatus,
) -> Result<PersistedBooking, BookingError> {
    let current = store.get_booking(booking_id).await?;
    let from = current.booking.status;
    if from == next {
        return Ok(current);
    }
    if !from.can_transition_to(next) {
        return Err(BookingError::InvalidTransition { from, to: next });
    }

    let updated = store.update_booking_status(booking_id, next).await?;
    tracing::info!(booking_id = %booking_id, from = %from, to = %next, "Booking status changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{
        confirm_booking, price_stay, transition_booking_status, BookingError, BookingRequest,
    };
    use crate::models::{
        BookingStatus, ExistingBooking, GuestInfo, Listing, NewBooking, PaymentMethod,
        PersistedBooking,
    };
    use crate::repository::{Entity, MemoryReservationStore, ReservationStore, StoreError};
    use crate::services::availability::tests::{date, range, sample_listing};
    use crate::services::availability::UnavailableReason;

    const TODAY: &str = "2024-06-01";

    fn request(listing: &Listing, check_in: &str, check_out: &str) -> BookingRequest {
        BookingRequest {
            listing_id: listing.id,
            range: range(check_in, check_out, 2),
            guest: GuestInfo {
                full_name: "Ana Pereira".to_string(),
                email: "ana@example.com".to_string(),
                phone: Some("+595981000000".to_string()),
            },
            payment_method: PaymentMethod::Card,
            special_requests: Some("Late arrival".to_string()),
            quoted_total: None,
        }
    }

    async fn seeded(listing: Listing) -> MemoryReservationStore {
        let store = MemoryReservationStore::new();
        store.put_listing(listing).await;
        store
    }

    /// Reports no bookings on read and fails every insert with `insert_error`.
    struct RejectingStore {
        inner: MemoryReservationStore,
        insert_error: StoreError,
    }

    impl ReservationStore for RejectingStore {
        async fn get_listing(&self, listing_id: Uuid) -> Result<Listing, StoreError> {
            self.inner.get_listing(listing_id).await
        }

        async fn get_occupying_bookings(
            &self,
            _listing_id: Uuid,
        ) -> Result<Vec<ExistingBooking>, StoreError> {
            Ok(Vec::new())
        }

        async fn insert_booking(
            &self,
            _booking: NewBooking,
        ) -> Result<PersistedBooking, StoreError> {
            Err(self.insert_error.clone())
        }

        async fn get_booking(&self, booking_id: Uuid) -> Result<PersistedBooking, StoreError> {
            self.inner.get_booking(booking_id).await
        }

        async fn update_booking_status(
            &self,
            booking_id: Uuid,
            status: BookingStatus,
        ) -> Result<PersistedBooking, StoreError> {
            self.inner.update_booking_status(booking_id, status).await
        }

        async fn ping(&self) -> bool {
            true
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn instant_book_listing_confirms_with_live_price() {
        let listing = sample_listing();
        let store = seeded(listing.clone()).await;
        let mut req = request(&listing, "2024-06-10", "2024-06-13");
        req.quoted_total = Some(Decimal::from(1));

        let booking = confirm_booking(&store, req, date(TODAY))
            .await
            .expect("booking is created");

        assert_eq!(booking.booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.booking.pricing.total, Decimal::from(360));
        assert_eq!(booking.booking.pricing.label, "$100 x 3 nights");
        assert_eq!(
            store.get_booking(booking.id).await.expect("persisted").id,
            booking.id
        );
    }

    #[tokio::test]
    async fn request_to_book_listing_starts_pending() {
        let mut listing = sample_listing();
        listing.instant_book = false;
        let store = seeded(listing.clone()).await;

        let booking = confirm_booking(
            &store,
            request(&listing, "2024-06-10", "2024-06-13"),
            date(TODAY),
        )
        .await
        .expect("booking is created");
        assert_eq!(booking.booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn overlapping_confirmation_is_a_conflict() {
        let listing = sample_listing();
        let store = seeded(listing.clone()).await;
        confirm_booking(&store, request(&listing, "2024-06-10", "2024-06-13"), date(TODAY))
            .await
            .expect("first booking");

        let second = confirm_booking(
            &store,
            request(&listing, "2024-06-12", "2024-06-15"),
            date(TODAY),
        ).await;
        match second {
            Err(BookingError::Conflict { reason, conflicts }) => {
                assert_eq!(reason, Some(UnavailableReason::DatesNotAvailable));
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].check_in, date("2024-06-10"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rule_failures_stay_unavailable() {
        let listing = sample_listing();
        let store = seeded(listing.clone()).await;
        let mut req = request(&listing, "2024-06-10", "2024-06-13");
        req.range.guests = 9;

        let result = confirm_booking(&store, req, date(TODAY)).await;
        assert_eq!(
            result.map(|booking| booking.id),
            Err(BookingError::Unavailable {
                reason: UnavailableReason::TooManyGuests { max_guests: 4 },
                conflicts: Vec::new(),
            })
        );
    }

    #[tokio::test]
    async fn store_level_rejection_maps_to_conflict() {
        let listing = sample_listing();
        let store = RejectingStore {
            inner: seeded(listing.clone()).await,
            insert_error: StoreError::Conflict,
        };

        let result = confirm_booking(
            &store,
            request(&listing, "2024-06-10", "2024-06-13"),
            date(TODAY),
        ).await;
        assert!(matches!(
            result,
            Err(BookingError::Conflict { reason: None, .. })
        ));
    }

    #[tokio::test]
    async fn storage_failure_is_not_reported_as_success_or_conflict() {
        let listing = sample_listing();
        let store = RejectingStore {
            inner: seeded(listing.clone()).await,
            insert_error: StoreError::Storage("connection reset".to_string()),
        };

        let result = confirm_booking(
            &store,
            request(&listing, "2024-06-10", "2024-06-13"),
            date(TODAY),
        ).await;
        assert_eq!(
            result.map(|booking| booking.id),
            Err(BookingError::StorageFailure("connection reset".to_string()))
        );
    }

    #[tokio::test]
    async fn unknown_listing_is_not_found() {
        let store = MemoryReservationStore::new();
        let listing = sample_listing();
        let result = price_stay(
            &store,
            listing.id,
            &range("2024-06-10", "2024-06-13", 2),
            date(TODAY),
        ).await;
        assert_eq!(result, Err(BookingError::ListingNotFound));
    }

    #[tokio::test]
    async fn pricing_requires_availability() {
        let listing = sample_listing();
        let store = seeded(listing.clone()).await;

        let priced = price_stay(
            &store,
            listing.id,
            &range("2024-06-10", "2024-06-13", 2),
            date(TODAY),
        )
        .await
        .expect("priced");
        assert_eq!(priced.total, Decimal::from(360));

        let rejected = price_stay(
            &store,
            listing.id,
            &range("2024-06-10", "2024-06-10", 2),
            date(TODAY),
        ).await;
        assert!(matches!(
            rejected,
            Err(BookingError::Unavailable {
                reason: UnavailableReason::CheckOutNotAfterCheckIn,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_confirmations_yield_exactly_one_booking() {
        let listing = sample_listing();
        let store = Arc::new(seeded(listing.clone()).await);

        let first = {
            let store = Arc::clone(&store);
            let req = request(&listing, "2024-06-10", "2024-06-13");
            tokio::spawn(async move { confirm_booking(store.as_ref(), req, date(TODAY)).await })
        };
        let second = {
            let store = Arc::clone(&store);
            let req = request(&listing, "2024-06-11", "2024-06-14");
            tokio::spawn(async move { confirm_booking(store.as_ref(), req, date(TODAY)).await })
        };

        let outcomes = [
            first.await.expect("task completes"),
            second.await.expect("task completes"),
        ];
        let created = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Err(BookingError::Conflict { .. })))
            .count();
        assert_eq!(created, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(
            store
                .get_occupying_bookings(listing.id)
                .await
                .expect("list")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn status_transitions_follow_lifecycle() {
        let mut listing = sample_listing();
        listing.instant_book = false;
        let store = seeded(listing.clone()).await;
        let booking = confirm_booking(
            &store,
            request(&listing, "2024-06-10", "2024-06-13"),
            date(TODAY),
        )
        .await
        .expect("created");

        let confirmed = transition_booking_status(&store, booking.id, BookingStatus::Confirmed)
            .await
            .expect("pending -> confirmed");
        assert_eq!(confirmed.booking.status, BookingStatus::Confirmed);

        let again = transition_booking_status(&store, booking.id, BookingStatus::Confirmed)
            .await
            .expect("same status is a no-op");
        assert_eq!(again.booking.status, BookingStatus::Confirmed);

        let invalid = transition_booking_status(&store, booking.id, BookingStatus::Pending).await;
        assert_eq!(
            invalid.map(|row| row.id),
            Err(BookingError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Pending,
            })
        );

        let missing = transition_booking_status(
            &store,
            Uuid::new_v4(),
            BookingStatus::Cancelled,
        ).await;
        assert_eq!(missing.map(|row| row.id), Err(BookingError::BookingNotFound));
    }

    #[test]
    fn store_not_found_maps_to_the_matching_entity() {
        assert_eq!(
            BookingError::from(StoreError::NotFound(Entity::Booking)),
            BookingError::BookingNotFound
        );
        assert_eq!(
            BookingError::from(StoreError::NotFound(Entity::Listing)),
            BookingError::ListingNotFound
        );
        assert_eq!(
            StoreError::NotFound(Entity::Booking).to_string(),
            "booking not found."
        );
    }
}
