//! HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use verity_text::{ClassifyError, Prediction, Verdict, WordImpact};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub verdict: Verdict,
    pub confidence: f64,
    pub important_words: Vec<WordImpact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,
}

impl PredictResponse {
    /// Payload returned when the pipeline fails for any reason.
    pub fn error() -> Self {
        Self {
            verdict: Verdict::Error,
            confidence: 0.0,
            important_words: Vec::new(),
            cleaned_text: None,
        }
    }
}

impl From<Prediction> for PredictResponse {
    fn from(p: Prediction) -> Self {
        Self {
            verdict: p.verdict,
            confidence: p.confidence,
            important_words: p.important_words,
            cleaned_text: Some(p.cleaned_text),
        }
    }
}

/// Liveness check.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Backend running successfully" }))
}

/// Classify a news text.
///
/// Pipeline failures are logged and answered with the `ERROR` verdict and
/// status 200. Only a malformed request body is rejected.
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(req) = body?;

    let classifier = state.classifier.clone();
    let outcome = tokio::task::spawn_blocking(move || classifier.predict(&req.text))
        .await
        .unwrap_or_else(|e| Err(ClassifyError::Unexpected(e.to_string())));

    let response = match outcome {
        Ok(prediction) => {
            tracing::debug!(
                verdict = ?prediction.verdict,
                decision = prediction.decision,
                "prediction served"
            );
            PredictResponse::from(prediction)
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "prediction failed");
            PredictResponse::error()
        }
    };
    Ok(Json(response))
}
