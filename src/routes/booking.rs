use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::PersistedBooking,
    repository::ReservationStore,
    schemas::{
        AvailabilityResponse, BookingPath, BookingStatusInput, CreateBookingInput, StayQuery,
    },
    services::{
        booking::{
            check_listing_availability, confirm_booking, price_stay, transition_booking_status,
            BookingError,
        },
        pricing::PricingBreakdown,
    },
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/availability", axum::routing::get(check_availability))
        .route("/pricing", axum::routing::get(get_pricing))
        .route("/bookings", axum::routing::post(create_booking))
        .route("/bookings/{booking_id}", axum::routing::get(get_booking))
        .route(
            "/bookings/{booking_id}/status",
            axum::routing::post(transition_status),
        )
}

/// Check whether a date range can be booked on a listing.
async fn check_availability(
    State(state): State<AppState>,
    query: Result<Query<StayQuery>, QueryRejection>,
) -> AppResult<Json<AvailabilityResponse>> {
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let (listing_id, range) = query.parse()?;

    let (_, result) =
        check_listing_availability(&state.store, listing_id, &range, state.today()).await?;
    Ok(Json(AvailabilityResponse::new(listing_id, &range, result)))
}

/// Price an available date range against the live listing.
async fn get_pricing(
    State(state): State<AppState>,
    query: Result<Query<StayQuery>, QueryRejection>,
) -> AppResult<Json<PricingBreakdown>> {
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let (listing_id, range) = query.parse()?;

    let pricing = price_stay(&state.store, listing_id, &range, state.today()).await?;
    Ok(Json(pricing))
}

/// Confirm a booking. Notifications go out afterwards and never affect the response.
async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookingInput>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let request = payload.into_request()?;

    let booking = confirm_booking(&state.store, request, state.today()).await?;
    state
        .notifier
        .dispatch_booking_created(state.store.clone(), booking.clone());

    Ok((axum::http::StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(state): State<AppState>,
    path: Result<Path<BookingPath>, PathRejection>,
) -> AppResult<Json<PersistedBooking>> {
    let Path(path) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let booking = state
        .store
        .get_booking(path.booking_id)
        .await
        .map_err(BookingError::from)?;
    Ok(Json(booking))
}

async fn transition_status(
    State(state): State<AppState>,
    path: Result<Path<BookingPath>, PathRejection>,
    payload: Result<Json<BookingStatusInput>, JsonRejection>,
) -> AppResult<Json<PersistedBooking>> {
    let Path(path) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let Json(payload) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    if let Some(reason) = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
    {
        tracing::info!(
            booking_id = %path.booking_id,
            status = %payload.status,
            reason = %reason,
            "Status change requested"
        );
    }

    let updated =
        transition_booking_status(&state.store, path.booking_id, payload.status).await?;
    Ok(Json(updated))
}
