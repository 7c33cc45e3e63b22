use axum::{routing::get, Router};

use crate::state::AppState;

pub mod booking;
pub mod health;
pub mod listings;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(booking::router())
        .merge(listings::router())
}
