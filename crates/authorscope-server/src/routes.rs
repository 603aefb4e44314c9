//! HTTP routes and handlers

use authorscope_classifiers::{
    AuthorshipClassifier, CodePredictionResponse, LinguisticFeatures, ParameterInfo,
    TextPredictionResponse,
};
use authorscope_core::{PredictionResult, TextSample};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::input::extract_sample;
use crate::state::ServiceContext;

pub fn create_router(state: ServiceContext) -> Router {
    let max_body_bytes = state.settings.max_body_bytes;
    let cors = cors_layer(&state.settings.cors_origins);

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/v1/code/predict", post(predict_code))
        .route("/v1/code/parameters", get(code_parameters))
        .route("/v1/text/predict", post(predict_text))
        .route("/v1/text/features", post(text_features))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let layer = if origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    };

    Some(layer.allow_methods(Any).allow_headers(Any))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    models: ModelStatus,
}

#[derive(Serialize)]
struct ModelStatus {
    code: bool,
    text: bool,
}

async fn health_check(State(state): State<ServiceContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models: ModelStatus {
            code: state.code.is_some(),
            text: state.text.is_some(),
        },
    })
}

async fn metrics(State(state): State<ServiceContext>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics exporter not installed").into_response(),
    }
}

async fn predict_code(
    State(state): State<ServiceContext>,
    request: Request,
) -> Result<Json<CodePredictionResponse>, AppError> {
    let span = info_span!("predict", request_id = %Uuid::new_v4(), endpoint = "code");
    async move {
        let classifier = state.code.clone();
        let result = run_prediction(&state, classifier, request, "code").await?;
        Ok::<_, AppError>(Json(CodePredictionResponse::from(result)))
    }
    .instrument(span)
    .await
}

async fn predict_text(
    State(state): State<ServiceContext>,
    request: Request,
) -> Result<Json<TextPredictionResponse>, AppError> {
    let span = info_span!("predict", request_id = %Uuid::new_v4(), endpoint = "text");
    async move {
        let classifier = state.text.clone();
        let result = run_prediction(&state, classifier, request, "text").await?;
        Ok::<_, AppError>(Json(TextPredictionResponse::from(result)))
    }
    .instrument(span)
    .await
}

/// Shared body of both prediction endpoints.
///
/// Input is validated before the model lookup, so a bad request answers 400
/// even when the endpoint has no model.
async fn run_prediction(
    state: &ServiceContext,
    classifier: Option<Arc<dyn AuthorshipClassifier>>,
    request: Request,
    endpoint: &'static str,
) -> Result<PredictionResult, AppError> {
    metrics::counter!("authorscope_requests_total", "endpoint" => endpoint).increment(1);

    let outcome = async {
        let sample = extract_sample(request, endpoint).await?;
        let classifier = classifier.ok_or(AppError::ModelUnavailable(endpoint))?;
        info!("Processing {} input of length: {}", endpoint, sample.char_len());
        classify(state, classifier.as_ref(), &sample).await
    }
    .await;

    if let Err(err) = &outcome {
        metrics::counter!(
            "authorscope_errors_total",
            "endpoint" => endpoint,
            "type" => err.kind()
        )
        .increment(1);
    }
    outcome
}

async fn classify(
    state: &ServiceContext,
    classifier: &dyn AuthorshipClassifier,
    sample: &TextSample,
) -> Result<PredictionResult, AppError> {
    let start = Instant::now();
    let result = classifier
        .classify(sample)
        .await
        .map_err(|e| AppError::from_prediction(e, state.settings.redact_internal_errors))?;

    let elapsed_us = start.elapsed().as_micros() as f64;
    metrics::histogram!(
        "authorscope_inference_latency_us",
        "model" => classifier.name().to_string()
    )
    .record(elapsed_us);
    debug!(
        label = %result.label,
        confidence = result.confidence,
        latency_us = result.latency_us,
        "Prediction complete"
    );
    Ok(result)
}

#[derive(Serialize)]
struct FeaturesResponse {
    features: LinguisticFeatures,
    input_length: usize,
}

async fn text_features(
    State(state): State<ServiceContext>,
    request: Request,
) -> Result<Json<FeaturesResponse>, AppError> {
    metrics::counter!("authorscope_requests_total", "endpoint" => "features").increment(1);
    let sample = extract_sample(request, "text").await?;
    Ok(Json(FeaturesResponse {
        features: state.extractor.extract(sample.as_str()),
        input_length: sample.char_len(),
    }))
}

#[derive(Serialize)]
struct ParametersResponse<'a> {
    model: &'a str,
    count: usize,
    parameters: &'a [ParameterInfo],
}

async fn code_parameters(State(state): State<ServiceContext>) -> Result<Response, AppError> {
    let classifier: Arc<dyn AuthorshipClassifier> =
        state.code.clone().ok_or(AppError::ModelUnavailable("code"))?;
    let parameters = classifier.parameters();
    let body = ParametersResponse {
        model: classifier.name(),
        count: parameters.len(),
        parameters,
    };
    Ok(Json(body).into_response())
}

async fn fallback() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"message": "Not found", "type": "not_found"}})),
    )
        .into_response()
}
