//! HTTP API tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use authorscope_classifiers::linguistic::{FEATURE_COUNT, FEATURE_NAMES};
use authorscope_classifiers::scoring::from_distribution;
use authorscope_classifiers::{
    AuthorshipClassifier, ParameterInfo, TextAuthorshipClassifier, TextModelBundle, CODE_LABELS,
};
use authorscope_core::{Error, PredictionResult, Result, TextSample};
use authorscope_server::{create_router, ServerSettings, ServiceContext};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "authorscope-test-boundary";

/// Code classifier stand-in returning a fixed distribution
struct FixedCodeClassifier {
    probabilities: Vec<f64>,
    parameters: Vec<ParameterInfo>,
}

impl FixedCodeClassifier {
    fn new(probabilities: Vec<f64>) -> Self {
        Self {
            probabilities,
            parameters: vec![
                ParameterInfo {
                    name: "classifier.bias".to_string(),
                    shape: vec![2],
                },
                ParameterInfo {
                    name: "classifier.weight".to_string(),
                    shape: vec![2, 256],
                },
            ],
        }
    }
}

#[async_trait]
impl AuthorshipClassifier for FixedCodeClassifier {
    async fn classify(&self, sample: &TextSample) -> Result<PredictionResult> {
        from_distribution(&self.probabilities, &CODE_LABELS, sample.char_len())
    }

    fn name(&self) -> &str {
        "code-authorship"
    }

    fn labels(&self) -> &[&'static str] {
        &CODE_LABELS
    }

    fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }
}

struct FailingClassifier;

#[async_trait]
impl AuthorshipClassifier for FailingClassifier {
    async fn classify(&self, _sample: &TextSample) -> Result<PredictionResult> {
        Err(Error::inference("tensor shape mismatch in layer 3"))
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn labels(&self) -> &[&'static str] {
        &CODE_LABELS
    }
}

fn text_classifier() -> TextAuthorshipClassifier {
    let mut coefficients = vec![0.0; 3 + FEATURE_COUNT];
    coefficients[0] = 4.0;
    coefficients[1] = -4.0;
    let bundle = json!({
        "format_version": 1,
        "vectorizer": {
            "vocabulary": {"moreover": 0, "lol": 1, "the": 2},
            "idf": [2.0, 2.0, 1.0],
            "ngram_range": [1, 1],
            "sublinear_tf": false,
            "norm": "l2"
        },
        "scaler": {
            "mean": vec![0.0; FEATURE_COUNT],
            "scale": vec![1.0; FEATURE_COUNT]
        },
        "model": {
            "type": "logistic-regression",
            "coefficients": coefficients,
            "intercept": 0.0
        },
        "feature_names": FEATURE_NAMES,
        "is_trained": true
    });
    let bundle = TextModelBundle::from_json(&bundle.to_string()).unwrap();
    TextAuthorshipClassifier::from_bundle("text-authorship", bundle).unwrap()
}

fn app_with(
    code: Option<Arc<dyn AuthorshipClassifier>>,
    text: Option<Arc<dyn AuthorshipClassifier>>,
    settings: ServerSettings,
) -> Router {
    create_router(ServiceContext::new(settings, code, text, None).unwrap())
}

fn app() -> Router {
    app_with(
        Some(Arc::new(FixedCodeClassifier::new(vec![0.25, 0.75]))),
        Some(Arc::new(text_classifier())),
        ServerSettings::default(),
    )
}

/// One multipart part: (name, optional file name, content)
fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Body {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart(parts))
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_loaded_models() {
    let app = app_with(
        None,
        Some(Arc::new(text_classifier())),
        ServerSettings::default(),
    );
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models"]["code"], false);
    assert_eq!(body["models"]["text"], true);
}

#[tokio::test]
async fn test_code_prediction_from_form_field() {
    let (status, body) = send(
        app(),
        multipart_request("/v1/code/predict", &[("code", None, "fn main() {}")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["label"], "MACHINE_GENERATED");
    assert_eq!(body["confidence"], 0.75);
    assert_eq!(body["probabilities"]["HUMAN_GENERATED"], 0.25);
    assert_eq!(body["input_length"], 12);
}

#[tokio::test]
async fn test_code_prediction_from_uploaded_file() {
    let source = "def add(a, b):\n    return a + b\n";
    let (status, body) = send(
        app(),
        multipart_request(
            "/v1/code/predict",
            &[("file", Some("add.py"), source)],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_length"], source.chars().count());
}

#[tokio::test]
async fn test_both_sources_rejected() {
    let (status, body) = send(
        app(),
        multipart_request(
            "/v1/code/predict",
            &[("file", Some("a.rs"), "fn a() {}"), ("code", None, "fn b() {}")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_input");
    assert_eq!(
        body["error"]["message"],
        "Provide either 'file' or 'code', not both"
    );
}

#[tokio::test]
async fn test_missing_input_rejected() {
    let (status, body) = send(app(), form_request("/v1/text/predict", "other=1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Either 'file' or 'text' parameter must be provided"
    );
}

#[tokio::test]
async fn test_blank_input_rejected() {
    let (status, body) = send(
        app(),
        multipart_request("/v1/code/predict", &[("code", None, "   \n\t")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Empty code provided");
}

#[tokio::test]
async fn test_empty_text_rejected_on_text_endpoint() {
    let (status, body) = send(app(), form_request("/v1/text/predict", "text=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_input");
    assert_eq!(body["error"]["message"], "Empty text provided");

    let (status, body) = send(
        app(),
        multipart_request("/v1/text/predict", &[("file", Some("blank.txt"), " \r\n\t")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Empty text provided");
}

#[tokio::test]
async fn test_bad_input_reported_before_missing_model() {
    let app = app_with(None, None, ServerSettings::default());
    let (status, body) = send(app, form_request("/v1/text/predict", "text=+++")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Empty text provided");
}

#[tokio::test]
async fn test_empty_unnamed_file_part_is_ignored() {
    let (status, body) = send(
        app(),
        multipart_request(
            "/v1/code/predict",
            &[("file", Some(""), ""), ("code", None, "x = 1")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_length"], 5);
}

#[tokio::test]
async fn test_unconfigured_model_is_unavailable() {
    let app = app_with(None, None, ServerSettings::default());
    let (status, body) = send(app, form_request("/v1/code/predict", "code=x%3D1")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "model_unavailable");
    assert_eq!(body["error"]["message"], "code model not loaded");
}

#[tokio::test]
async fn test_text_prediction_end_to_end() {
    let (status, body) = send(
        app(),
        form_request("/v1/text/predict", "text=Moreover%2C+the+results+are+clear."),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], "AI");
    assert_eq!(body["input_length"], 32);

    let human = body["probabilities"]["Human"].as_f64().unwrap();
    let ai = body["probabilities"]["AI"].as_f64().unwrap();
    assert!((human + ai - 1.0).abs() < 1e-9);
    assert_eq!(body["confidence"].as_f64().unwrap(), ai);
}

#[tokio::test]
async fn test_inference_failure_detail() {
    let app = app_with(
        Some(Arc::new(FailingClassifier)),
        None,
        ServerSettings::default(),
    );
    let (status, body) = send(app, form_request("/v1/code/predict", "code=x")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "inference_failure");
    assert_eq!(
        body["error"]["message"],
        "Prediction failed: inference failure: tensor shape mismatch in layer 3"
    );
}

#[tokio::test]
async fn test_inference_failure_redacted() {
    let settings = ServerSettings {
        redact_internal_errors: true,
        ..Default::default()
    };
    let app = app_with(Some(Arc::new(FailingClassifier)), None, settings);
    let (status, body) = send(app, form_request("/v1/code/predict", "code=x")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["message"], "Prediction failed: internal error");
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/text/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text":"hello"}"#))
        .unwrap();
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["type"], "rejected");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let settings = ServerSettings {
        max_body_bytes: 64,
        ..Default::default()
    };
    let app = app_with(None, Some(Arc::new(text_classifier())), settings);
    let text = format!("text={}", "a".repeat(256));
    let (status, body) = send(app, form_request("/v1/text/predict", &text)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["type"], "rejected");
}

#[tokio::test]
async fn test_features_endpoint() {
    let (status, body) = send(
        app(),
        form_request("/v1/text/features", "text=Hello+world.+How+are+you%3F"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_length"], 25);
    let features = body["features"].as_object().unwrap();
    assert_eq!(features.len(), FEATURE_COUNT);
    assert_eq!(features["word_count"], 5.0);
    assert_eq!(features["question_count"], 1.0);
}

#[tokio::test]
async fn test_parameters_endpoint() {
    let request = Request::get("/v1/code/parameters")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "code-authorship");
    assert_eq!(body["count"], 2);
    assert_eq!(body["parameters"][1]["name"], "classifier.weight");
    assert_eq!(body["parameters"][1]["shape"], json!([2, 256]));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let request = Request::get("/v2/nothing").body(Body::empty()).unwrap();
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}
