use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ndarray::{Array1, ArrayView1};
use posture::bundle::{ArtifactBundle, SCALER_FILE};
use posture::classifier::{ClassifierError, Mlp, PostureModel};
use posture::service::{router, ServiceState};
use posture::{LabelMapping, ScalerParams};
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceExt;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Returns the same distribution for every input.
#[derive(Debug, Serialize)]
struct StubModel {
    output: Vec<f64>,
}

impl PostureModel for StubModel {
    fn num_features(&self) -> usize {
        8
    }

    fn num_classes(&self) -> usize {
        self.output.len()
    }

    fn predict_proba(&self, _features: ArrayView1<f64>) -> Result<Array1<f64>, ClassifierError> {
        Ok(Array1::from(self.output.clone()))
    }
}

#[derive(Debug, Serialize)]
struct PanickingModel;

impl PostureModel for PanickingModel {
    fn num_features(&self) -> usize {
        8
    }

    fn num_classes(&self) -> usize {
        2
    }

    fn predict_proba(&self, _features: ArrayView1<f64>) -> Result<Array1<f64>, ClassifierError> {
        panic!("model exploded")
    }
}

fn no_op_scaler() -> ScalerParams {
    ScalerParams::new([0.0; 8], [1.0; 8]).unwrap()
}

fn two_labels() -> LabelMapping {
    LabelMapping::new(vec!["straight".to_string(), "lean_left".to_string()]).unwrap()
}

fn stub_app(output: Vec<f64>) -> Router {
    let bundle = ArtifactBundle::new(no_op_scaler(), two_labels(), StubModel { output }).unwrap();
    router(Arc::new(ServiceState::ready(bundle)))
}

fn zero_body() -> Value {
    json!({"L1": 0, "L2": 0, "L3": 0, "L4": 0, "R1": 0, "R2": 0, "R3": 0, "R4": 0})
}

fn predict_request(body: &Value) -> Request<Body> {
    Request::post("/predict_posture")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_stub_end_to_end() {
    init();
    let resp = stub_app(vec![0.9, 0.1]).oneshot(predict_request(&zero_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(
        body,
        json!({
            "predicted_posture": "straight",
            "probabilities": {"straight": 0.9, "lean_left": 0.1}
        })
    );
}

#[tokio::test]
async fn test_probabilities_form_a_distribution() {
    init();
    let resp = stub_app(vec![0.25, 0.75]).oneshot(predict_request(&zero_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["predicted_posture"], "lean_left");
    let probabilities = body["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 2);
    let sum: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
    assert!(probabilities.values().all(|p| p.as_f64().unwrap() >= 0.0));
    assert!((sum - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_each_missing_field_is_rejected() {
    init();
    for field in posture::CHANNELS {
        let mut body = zero_body();
        body.as_object_mut().unwrap().remove(field);

        let resp = stub_app(vec![0.9, 0.1]).oneshot(predict_request(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "missing {}", field);

        let body = json_body(resp).await;
        assert_eq!(body["error"], "Missing sensor data. Expected L1-L4, R1-R4.");
        assert_eq!(body["missing"], json!([field]));
        assert!(body.get("predicted_posture").is_none());
    }
}

#[tokio::test]
async fn test_missing_body() {
    init();
    let empty = Request::post("/predict_posture")
        .header("content-type", "application/json")
        .body(Body::empty())
        .unwrap();
    let resp = stub_app(vec![0.9, 0.1]).oneshot(empty).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await, json!({"error": "No data provided."}));

    let resp = stub_app(vec![0.9, 0.1]).oneshot(predict_request(&json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let garbage = Request::post("/predict_posture")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = stub_app(vec![0.9, 0.1]).oneshot(garbage).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_numeric_field() {
    init();
    let mut body = zero_body();
    body["L3"] = json!("heavy");
    let resp = stub_app(vec![0.9, 0.1]).oneshot(predict_request(&body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await.get("predicted_posture").is_none());
}

#[tokio::test]
async fn test_invalid_distribution_is_a_server_error() {
    init();
    let resp = stub_app(vec![0.9, 0.9]).oneshot(predict_request(&zero_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("An error occurred during prediction:"), "{}", message);
}

#[tokio::test]
async fn test_panic_becomes_500_and_service_keeps_serving() {
    init();
    let bundle = ArtifactBundle::new(no_op_scaler(), two_labels(), PanickingModel).unwrap();
    let app = router(Arc::new(ServiceState::ready(bundle)));

    let resp = app.clone().oneshot(predict_request(&zero_body())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("model exploded"));

    let health = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(health).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_bundle() {
    init();
    let resp = stub_app(vec![0.9, 0.1])
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["state"], "READY");
    assert_eq!(body["labels"], json!(["straight", "lean_left"]));
    assert_eq!(body["bundle_id"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_fatal_startup_without_scaler() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let model = Mlp::new(8, &[4], 2, 42).unwrap();
    let bundle = ArtifactBundle::new(no_op_scaler(), two_labels(), model).unwrap();
    bundle.save(dir.path()).unwrap();
    std::fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

    let state = ServiceState::start(|| ArtifactBundle::load(dir.path()));
    assert!(!state.is_ready());
    assert_eq!(state.name(), "FAILED");
    let app = router(Arc::new(state));

    for body in [zero_body(), json!({}), json!({"L1": 1})] {
        let resp = app.clone().oneshot(predict_request(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(resp).await,
            json!({"error": "AI model assets not loaded on server."})
        );
    }

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["state"], "FAILED");
}

#[tokio::test]
async fn test_serve_refuses_incomplete_bundle() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let config = posture::ServiceConfig {
        artifacts_dir: dir.path().to_path_buf(),
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let result = posture::serve(&config).await;
    assert!(matches!(result, Err(posture::ServiceError::StartupFailed(_))));
}

#[tokio::test]
async fn test_cors_preflight() {
    init();
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/predict_posture")
        .header("origin", "http://localhost:8000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = stub_app(vec![0.9, 0.1]).oneshot(preflight).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
