use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::models::StayDates;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// A booking lost the race for its dates at confirmation time.
    #[error("{message}")]
    Conflict {
        message: String,
        reason_code: Option<&'static str>,
        conflicts: Vec<StayDates>,
    },
    /// The requested stay breaks one of the listing's booking rules.
    #[error("{message}")]
    Unavailable {
        message: String,
        reason_code: &'static str,
        conflicts: Vec<StayDates>,
    },
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    Dependency(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable { .. } | Self::UnprocessableEntity(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unavailable { .. } => "unavailable",
            Self::UnprocessableEntity(_) => "unprocessable_entity",
            Self::Dependency(_) => "storage_failure",
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        match self {
            Self::Conflict {
                reason_code,
                conflicts,
                ..
            } => {
                body["reason_code"] = json!(reason_code);
                body["conflicts"] = json!(conflicts);
            }
            Self::Unavailable {
                reason_code,
                conflicts,
                ..
            } => {
                body["reason_code"] = json!(reason_code);
                body["conflicts"] = json!(conflicts);
            }
            Self::Dependency(_) => {
                body["retryable"] = Value::Bool(true);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
