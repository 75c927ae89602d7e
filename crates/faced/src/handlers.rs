//! HTTP handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use verity_store::{DetectionRecord, NewDetection};
use verity_vision::{detect_and_annotate, write_replace, AnnotateError, FaceBox};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const DEFAULT_HISTORY_LIMIT: u32 = 20;
const UNREADABLE_IMAGE: &str = "Could not read image";

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub id: i64,
    pub file_name: String,
    pub face_count: usize,
    pub boxes: Vec<FaceBox>,
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Liveness check.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Face Detection Backend is running" }))
}

/// Detect faces in an uploaded image, save the annotated copy and record the
/// detection.
pub async fn detect_faces(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    let (file_name, bytes) = read_file_field(&mut multipart).await?;
    tracing::debug!(file_name = %file_name, size = bytes.len(), "image received");

    let detector = state.detector.clone();
    let output_path = state.output_path.clone();
    let boxes = tokio::task::spawn_blocking(move || -> Result<Vec<FaceBox>, AnnotateError> {
        let annotated = detect_and_annotate(&detector, &bytes)?;
        write_replace(&output_path, &annotated.to_jpeg()?)?;
        Ok(annotated.boxes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("detection task failed: {e}")))?
    .map_err(|e| match e {
        AnnotateError::Decode(err) => {
            tracing::warn!(file_name = %file_name, error = %err, "undecodable upload");
            ApiError::bad_request(UNREADABLE_IMAGE)
        }
        other => ApiError::internal(other.to_string()),
    })?;

    let store = state.store.clone();
    let new = NewDetection { file_name, boxes };
    let record = tokio::task::spawn_blocking(move || store.insert(&new))
        .await
        .map_err(|e| ApiError::internal(format!("history task failed: {e}")))??;

    tracing::info!(id = record.id, file_name = %record.file_name, faces = record.boxes.len(), "faces detected");

    let note = format!(
        "Annotated image saved as {} and history stored in DB",
        state.output_path.display()
    );
    Ok(Json(DetectResponse {
        id: record.id,
        face_count: record.boxes.len(),
        file_name: record.file_name,
        boxes: record.boxes,
        note,
    }))
}

/// Take the first `file` field of the form, ignoring any others.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<(String, Vec<u8>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::bad_request(format!("missing form field '{FILE_FIELD}'")))
}

/// Most recent detections, newest first.
pub async fn history(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<DetectionRecord>>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let store = state.store.clone();
    let records = tokio::task::spawn_blocking(move || store.recent(limit))
        .await
        .map_err(|e| ApiError::internal(format!("history task failed: {e}")))??;
    Ok(Json(records))
}

/// The most recently annotated image.
pub async fn processed_image(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    match tokio::fs::read(state.output_path.as_path()).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("No processed image available"))
        }
        Err(e) => Err(ApiError::internal(format!(
            "failed to read {}: {e}",
            state.output_path.display()
        ))),
    }
}
