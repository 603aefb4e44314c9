//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to API clients
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, duplicated, empty or undecodable input
    #[error("{0}")]
    InvalidInput(String),

    /// Request rejected before it reached a handler (size, content type)
    #[error("{1}")]
    Rejected(StatusCode, String),

    /// No model is configured for the endpoint
    #[error("{0} model not loaded")]
    ModelUnavailable(&'static str),

    /// Feature extraction or scoring failed
    #[error("{0}")]
    Inference(String),
}

impl AppError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map a classifier error, hiding internal detail when `redact` is set
    pub fn from_prediction(err: authorscope_core::Error, redact: bool) -> Self {
        match err {
            authorscope_core::Error::InvalidInput(msg) => Self::InvalidInput(msg),
            other if other.is_client_error() => Self::InvalidInput(other.to_string()),
            other => {
                tracing::error!("Prediction failed: {}", other);
                let detail = if redact {
                    "internal error".to_string()
                } else {
                    other.to_string()
                };
                Self::Inference(format!("Prediction failed: {}", detail))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(status, _) => *status,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `type` field in the error body
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Rejected(..) => "rejected",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Inference(_) => "inference_failure",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
