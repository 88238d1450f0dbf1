//! Error handling

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const NO_DATA: &str = "No data provided.";
pub const MISSING_FIELDS: &str = "Missing sensor data. Expected L1-L4, R1-R4.";
pub const NOT_LOADED: &str = "AI model assets not loaded on server.";

/// Everything a request can fail with, mapped to its HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}", NO_DATA)]
    NoData,
    #[error("{} Missing: {missing:?}", MISSING_FIELDS)]
    MissingFields { missing: Vec<String> },
    #[error("Sensor value for {field} must be a finite number")]
    InvalidValue { field: String },
    #[error("{}", NOT_LOADED)]
    NotLoaded,
    #[error("An error occurred during prediction: {0}")]
    Prediction(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoData | ApiError::MissingFields { .. } | ApiError::InvalidValue { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotLoaded | ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::MissingFields { missing } => json!({
                "error": MISSING_FIELDS,
                "missing": missing,
            }),
            ApiError::Prediction(msg) => {
                log::error!("Prediction failed: {}", msg);
                json!({ "error": self.to_string() })
            }
            ApiError::NotLoaded => {
                log::warn!("Rejected request: no bundle loaded");
                json!({ "error": NOT_LOADED })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
