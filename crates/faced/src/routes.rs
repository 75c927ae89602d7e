//! Router configuration.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{detect_faces, history, processed_image, root};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/detect-faces", post(detect_faces))
        .route("/history", get(history))
        .route("/processed-image", get(processed_image))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));
    verity_http::with_request_layers(router).with_state(state)
}
