use std::future::Future;

use uuid::Uuid;

use crate::models::{BookingStatus, ExistingBooking, Listing, NewBooking, PersistedBooking};

pub mod memory;
pub mod postgres;

pub use memory::{demo_listing, MemoryReservationStore};
pub use postgres::PgReservationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Listing,
    Booking,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Listing => "listing",
            Self::Booking => "booking",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found.")]
    NotFound(Entity),
    /// The write would overlap an occupying booking for the same listing.
    #[error("booking overlaps an occupying booking for this listing.")]
    Conflict,
    #[error("reservation store failure: {0}")]
    Storage(String),
}

/// Owner of listings and bookings. Implementations must reject an insert
/// that overlaps an occupying booking with [`StoreError::Conflict`], even
/// when two inserts race.
pub trait ReservationStore: Send + Sync {
    fn get_listing(
        &self,
        listing_id: Uuid,
    ) -> impl Future<Output = Result<Listing, StoreError>> + Send;

    /// Bookings in `pending` or `confirmed` status for the listing.
    fn get_occupying_bookings(
        &self,
        listing_id: Uuid,
    ) -> impl Future<Output = Result<Vec<ExistingBooking>, StoreError>> + Send;

    fn insert_booking(
        &self,
        booking: NewBooking,
    ) -> impl Future<Output = Result<PersistedBooking, StoreError>> + Send;

    fn get_booking(
        &self,
        booking_id: Uuid,
    ) -> impl Future<Output = Result<PersistedBooking, StoreError>> + Send;

    fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> impl Future<Output = Result<PersistedBooking, StoreError>> + Send;

    fn ping(&self) -> impl Future<Output = bool> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Store selected at startup: PostgreSQL when a database URL is configured,
/// otherwise the in-memory store.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(PgReservationStore),
    Memory(MemoryReservationStore),
}

impl Store {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

impl ReservationStore for Store {
    async fn get_listing(&self, listing_id: Uuid) -> Result<Listing, StoreError> {
        match self {
            Self::Postgres(store) => store.get_listing(listing_id).await,
            Self::Memory(store) => store.get_listing(listing_id).await,
        }
    }

    async fn get_occupying_bookings(
        &self,
        listing_id: Uuid,
    ) -> Result<Vec<ExistingBooking>, StoreError> {
        match self {
            Self::Postgres(store) => store.get_occupying_bookings(listing_id).await,
            Self::Memory(store) => store.get_occupying_bookings(listing_id).await,
        }
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<PersistedBooking, StoreError> {
        match self {
            Self::Postgres(store) => store.insert_booking(booking).await,
            Self::Memory(store) => store.insert_booking(booking).await,
        }
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<PersistedBooking, StoreError> {
        match self {
            Self::Postgres(store) => store.get_booking(booking_id).await,
            Self::Memory(store) => store.get_booking(booking_id).await,
        }
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<PersistedBooking, StoreError> {
        match self {
            Self::Postgres(store) => store.update_booking_status(booking_id, status).await,
            Self::Memory(store) => store.update_booking_status(booking_id, status).await,
        }
    }

    async fn ping(&self) -> bool {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(store) => store.ping().await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Postgres(store) => store.close().await,
            Self::Memory(store) => store.close().await,
        }
    }
}
