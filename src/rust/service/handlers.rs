use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;
use super::request::PredictRequest;
use super::state::ServiceState;
use crate::bundle::PredictionResult;
use crate::classifier::PostureModel;

/// `POST /predict_posture`
///
/// The bundle check comes first: a service without a bundle answers 500 to
/// every request, well-formed or not.
pub async fn predict_posture<M: PostureModel + 'static>(
    State(state): State<Arc<ServiceState<M>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let bundle = state.bundle().ok_or(ApiError::NotLoaded)?;

    let Json(body) = body.map_err(|rejection| {
        log::debug!("Unreadable request body: {}", rejection);
        ApiError::NoData
    })?;
    let request = PredictRequest::parse(&body)?;

    let result = bundle
        .predict(&request.reading)
        .map_err(|e| ApiError::Prediction(e.to_string()))?;
    log::debug!("Predicted {} for {:?}", result.predicted_posture, request.reading.values());
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    state: &'static str,
    bundle_id: Option<String>,
    labels: Vec<String>,
    version: &'static str,
}

/// `GET /health`: 200 once a bundle is being served, 503 otherwise.
pub async fn health<M: PostureModel + 'static>(
    State(state): State<Arc<ServiceState<M>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = if state.is_ready() {
        ("healthy", StatusCode::OK)
    } else {
        ("unavailable", StatusCode::SERVICE_UNAVAILABLE)
    };
    let info = state.bundle().map(|bundle| bundle.info());

    let response = HealthResponse {
        status,
        state: state.name(),
        bundle_id: info.as_ref().map(|i| i.bundle_id.clone()),
        labels: info.map(|i| i.labels).unwrap_or_default(),
        version: env!("CARGO_PKG_VERSION"),
    };
    (code, Json(response))
}
