use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use misinfo_core::{Error, PredictionResult, Verdict};
use serde::{Deserialize, Serialize};

// ============================================================================
// Health endpoints
// ============================================================================

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "classifier": state.classifier.name(),
    }))
}

// ============================================================================
// Prediction endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Two-line output shown on the page
    pub output: String,
    pub predicted_class: u32,
    pub confidence: f32,
    pub verdict: Verdict,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            output: result.render(),
            predicted_class: result.predicted_class,
            confidence: result.confidence,
            verdict: result.verdict,
        }
    }
}

pub async fn predict(
    State(state): State<AppState>,
    request: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    match state.classifier.classify(&request.text).await {
        Ok(result) => {
            tracing::debug!(
                predicted_class = result.predicted_class,
                confidence = result.confidence,
                "Prediction served"
            );
            Json(PredictResponse::from(result)).into_response()
        }
        Err(e) => {
            tracing::error!("Prediction failed: {}", e);
            error_response(status_for(&e), e.to_string())
        }
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
