use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Entity, ReservationStore, StoreError};
use crate::models::{BookingStatus, ExistingBooking, Listing, NewBooking, PersistedBooking};

#[derive(Debug, Default)]
struct Tables {
    listings: HashMap<Uuid, Listing>,
    bookings: Vec<PersistedBooking>,
}

/// Process-local store for development and tests. A single lock covers the
/// overlap check and the insert, so concurrent confirmations serialise.
#[derive(Debug, Clone, Default)]
pub struct MemoryReservationStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_listing(&self, listing: Listing) {
        let mut tables = self.tables.lock().await;
        tables.listings.insert(listing.id, listing);
    }
}

/// Listing seeded into the in-memory store outside production.
pub fn demo_listing() -> Listing {
    Listing {
        id: Uuid::from_u128(0x0e3c_5a1d_6f4b_4c1e_9a57_3d2b_8c11_d0a1),
        title: "Seaside cottage (demo)".to_string(),
        is_active: true,
        currency: "USD".to_string(),
        base_rate: Decimal::from(119),
        weekday_rate: None,
        weekend_rate: Some(Decimal::from(149)),
        monthly_discount_percent: Some(Decimal::from(10)),
        monthly_discount_threshold_nights: Some(28),
        service_fee: Decimal::from(25),
        cleaning_fee: Decimal::from(40),
        tax_percent: Decimal::from(8),
        min_stay_nights: 2,
        max_stay_nights: 90,
        max_guests: 4,
        instant_book: true,
        host_email: None,
    }
}

impl ReservationStore for MemoryReservationStore {
    async fn get_listing(&self, listing_id: Uuid) -> Result<Listing, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .listings
            .get(&listing_id)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::Listing))
    }

    async fn get_occupying_bookings(
        &self,
        listing_id: Uuid,
    ) -> Result<Vec<ExistingBooking>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|row| row.booking.listing_id == listing_id && row.booking.status.is_occupying())
            .map(PersistedBooking::as_existing)
            .collect())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<PersistedBooking, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.listings.contains_key(&booking.listing_id) {
            return Err(StoreError::NotFound(Entity::Listing));
        }

        let dates = booking.dates();
        let clashes = tables.bookings.iter().any(|row| {
            row.booking.listing_id == booking.listing_id
                && row.booking.status.is_occupying()
                && row.booking.dates().overlaps(&dates)
        });
        if clashes {
            return Err(StoreError::Conflict);
        }

        let persisted = PersistedBooking {
            id: Uuid::new_v4(),
            booking,
            created_at: Utc::now(),
        };
        tables.bookings.push(persisted.clone());
        Ok(persisted)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<PersistedBooking, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .bookings
            .iter()
            .find(|row| row.id == booking_id)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::Booking))
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<PersistedBooking, StoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .bookings
            .iter_mut()
            .find(|row| row.id == booking_id)
            .ok_or(StoreError::NotFound(Entity::Booking))?;
        row.booking.status = status;
        Ok(row.clone())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn close(&self) {}
}
