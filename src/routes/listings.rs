use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::Listing,
    repository::ReservationStore,
    schemas::ListingPath,
    services::booking::BookingError,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/listings/{listing_id}", axum::routing::get(get_listing))
}

/// Listing terms as the calculator sees them, including inactive listings.
async fn get_listing(
    State(state): State<AppState>,
    path: Result<Path<ListingPath>, PathRejection>,
) -> AppResult<Json<Listing>> {
    let Path(path) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let listing = state
        .store
        .get_listing(path.listing_id)
        .await
        .map_err(BookingError::from)?;
    Ok(Json(listing))
}
