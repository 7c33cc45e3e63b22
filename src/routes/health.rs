use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::repository::ReservationStore;
use crate::state::AppState;

/// Liveness plus a bounded reservation store round-trip.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_ok = state.store.ping().await;

    let (code, status) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(json!({
            "status": status,
            "now": Utc::now().to_rfc3339(),
            "store": state.store.backend_name(),
            "db": store_ok
        })),
    )
}
