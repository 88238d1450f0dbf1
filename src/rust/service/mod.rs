//! HTTP inference service.
//!
//! ```text
//! POST /predict_posture   {"L1": .., ..., "R4": ..}  ->  {"predicted_posture", "probabilities"}
//! GET  /health                                       ->  {"status", "state", "bundle_id", ...}
//! ```
//!
//! The bundle is loaded once before the listener is bound and shared with every
//! handler as read-only state.

mod error;
mod handlers;
mod request;
mod state;

use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::bundle::ArtifactBundle;
use crate::classifier::{Mlp, PostureModel};
use crate::config::ServiceConfig;

pub use error::{ApiError, MISSING_FIELDS, NOT_LOADED, NO_DATA};
pub use handlers::{health, predict_posture, HealthResponse};
pub use request::PredictRequest;
pub use state::ServiceState;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service failed to start: {0}")]
    StartupFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Create the router with all routes
pub fn router<M: PostureModel + 'static>(state: Arc<ServiceState<M>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/predict_posture", post(predict_posture::<M>))
        .route("/health", get(health::<M>))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    log::error!("Handler panicked: {}", detail);

    let body = json!({ "error": format!("An error occurred during prediction: {}", detail) });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Loads the bundle from `config.artifacts_dir` and serves until Ctrl-C.
///
/// A bundle that fails to load is fatal: the listener is never bound.
pub async fn serve(config: &ServiceConfig) -> Result<(), ServiceError> {
    let dir = config.artifacts_dir.clone();
    let state = ServiceState::<Mlp>::start(|| ArtifactBundle::load(&dir));
    if let ServiceState::Failed(reason) = &state {
        return Err(ServiceError::StartupFailed(reason.clone()));
    }

    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    log::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
