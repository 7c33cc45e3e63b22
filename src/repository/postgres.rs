use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{Entity, ReservationStore, StoreError};
use crate::config::AppConfig;
use crate::models::{
    BookingStatus, ExistingBooking, GuestInfo, Listing, NewBooking, PaymentMethod,
    PersistedBooking, StayDates,
};
use crate::services::pricing::{NightlyLine, PricingBreakdown};

const LISTING_COLUMNS: &str = "id, title, is_active, currency, base_rate, weekday_rate, \
     weekend_rate, monthly_discount_percent, monthly_discount_threshold_nights, service_fee, \
     cleaning_fee, tax_percent, min_stay_nights, max_stay_nights, max_guests, instant_book, \
     host_email";

const BOOKING_COLUMNS: &str = "id, listing_id, check_in, check_out, guests, guest_full_name, \
     guest_email, guest_phone, payment_method, special_requests, status, currency, nights, \
     nightly_rate, subtotal, discount, service_fee, cleaning_fee, taxes, total, price_label, \
     nightly_lines, created_at";

const OCCUPYING_FILTER: &str = "status IN ('pending', 'confirmed')";

/// PostgreSQL exclusion violation, raised by `bookings_no_overlap`.
const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Debug, Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    /// Open the pool and bring the schema up to date.
    pub async fn connect(config: &AppConfig, database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_pool_max_connections)
            .min_connections(config.db_pool_min_connections)
            .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
            .idle_timeout(Some(Duration::from_secs(config.db_pool_idle_timeout_seconds)))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OccupyingRow {
    id: Uuid,
    listing_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    status: String,
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    listing_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: i32,
    guest_full_name: String,
    guest_email: String,
    guest_phone: Option<String>,
    payment_method: String,
    special_requests: Option<String>,
    status: String,
    currency: String,
    nights: i64,
    nightly_rate: Decimal,
    subtotal: Decimal,
    discount: Decimal,
    service_fee: Decimal,
    cleaning_fee: Decimal,
    taxes: Decimal,
    total: Decimal,
    price_label: String,
    nightly_lines: Json<Vec<NightlyLine>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for PersistedBooking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        let payment_method = PaymentMethod::parse(&row.payment_method).ok_or_else(|| {
            StoreError::Storage(format!("unknown payment method '{}'", row.payment_method))
        })?;

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            booking: NewBooking {
                listing_id: row.listing_id,
                check_in: row.check_in,
                check_out: row.check_out,
                guests: row.guests,
                guest: GuestInfo {
                    full_name: row.guest_full_name,
                    email: row.guest_email,
                    phone: row.guest_phone,
                },
                payment_method,
                special_requests: row.special_requests,
                status,
                pricing: PricingBreakdown {
                    currency: row.currency,
                    nights: row.nights,
                    nightly_rate: row.nightly_rate,
                    subtotal: row.subtotal,
                    discount: row.discount,
                    service_fee: row.service_fee,
                    cleaning_fee: row.cleaning_fee,
                    taxes: row.taxes,
                    total: row.total,
                    label: row.price_label,
                    nightly_lines: row.nightly_lines.0,
                },
            },
        })
    }
}

impl ReservationStore for PgReservationStore {
    async fn get_listing(&self, listing_id: Uuid) -> Result<Listing, StoreError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1");
        sqlx::query_as::<_, Listing>(&sql)
            .bind(listing_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or(StoreError::NotFound(Entity::Listing))
    }

    async fn get_occupying_bookings(
        &self,
        listing_id: Uuid,
    ) -> Result<Vec<ExistingBooking>, StoreError> {
        let sql = format!(
            "SELECT id, listing_id, check_in, check_out, status FROM bookings \
             WHERE listing_id = $1 AND {OCCUPYING_FILTER} ORDER BY check_in"
        );
        let rows = sqlx::query_as::<_, OccupyingRow>(&sql)
            .bind(listing_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(ExistingBooking {
                    id: row.id,
                    listing_id: row.listing_id,
                    dates: StayDates {
                        check_in: row.check_in,
                        check_out: row.check_out,
                    },
                    status: parse_status(&row.status)?,
                })
            })
            .collect()
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<PersistedBooking, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row lock serialises confirmations for the same listing.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM listings WHERE id = $1 FOR UPDATE")
                .bind(booking.listing_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;
        if locked.is_none() {
            return Err(StoreError::NotFound(Entity::Listing));
        }

        let overlap_sql = format!(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE listing_id = $1 AND {OCCUPYING_FILTER} \
             AND check_in < $3 AND check_out > $2)"
        );
        let clashes: bool = sqlx::query_scalar(&overlap_sql)
            .bind(booking.listing_id)
            .bind(booking.check_in)
            .bind(booking.check_out)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;
        if clashes {
            return Err(StoreError::Conflict);
        }

        let insert_sql = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
             $19, $20, $21, $22, now()) RETURNING {BOOKING_COLUMNS}"
        );
        let pricing = &booking.pricing;
        let row = sqlx::query_as::<_, BookingRow>(&insert_sql)
            .bind(Uuid::new_v4())
            .bind(booking.listing_id)
            .bind(booking.check_in)
            .bind(booking.check_out)
            .bind(booking.guests)
            .bind(&booking.guest.full_name)
            .bind(&booking.guest.email)
            .bind(&booking.guest.phone)
            .bind(booking.payment_method.as_str())
            .bind(&booking.special_requests)
            .bind(booking.status.as_str())
            .bind(&pricing.currency)
            .bind(pricing.nights)
            .bind(pricing.nightly_rate)
            .bind(pricing.subtotal)
            .bind(pricing.discount)
            .bind(pricing.service_fee)
            .bind(pricing.cleaning_fee)
            .bind(pricing.taxes)
            .bind(pricing.total)
            .bind(&pricing.label)
            .bind(Json(&pricing.nightly_lines))
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        PersistedBooking::try_from(row)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<PersistedBooking, StoreError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or(StoreError::NotFound(Entity::Booking))?;
        PersistedBooking::try_from(row)
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<PersistedBooking, StoreError> {
        let sql = format!(
            "UPDATE bookings SET status = $2 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .ok_or(StoreError::NotFound(Entity::Booking))?;
        PersistedBooking::try_from(row)
    }

    async fn ping(&self) -> bool {
        // Short timeout so health checks answer even when the first connection hangs.
        match tokio::time::timeout(
            Duration::from_secs(3),
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::error!(error = %error, "Health check DB query failed");
                false
            }
            Err(_) => {
                tracing::error!("Health check DB query timed out (3s)");
                false
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_status(raw: &str) -> Result<BookingStatus, StoreError> {
    BookingStatus::parse(raw)
        .ok_or_else(|| StoreError::Storage(format!("unknown booking status '{raw}'")))
}

fn map_db_error(error: sqlx::Error) -> StoreError {
    let code = error
        .as_database_error()
        .and_then(|db_error| db_error.code())
        .map(|code| code.into_owned());

    if is_conflict_code(code.as_deref()) {
        tracing::warn!(db_code = ?code, "Booking write rejected as overlapping");
        return StoreError::Conflict;
    }

    let message = error.to_string();
    tracing::error!(db_error = %message, db_code = ?code, "Database query failed");
    StoreError::Storage("Database operation failed.".to_string())
}

fn is_conflict_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some(EXCLUSION_VIOLATION) | Some(UNIQUE_VIOLATION) | Some(SERIALIZATION_FAILURE)
    )
}
