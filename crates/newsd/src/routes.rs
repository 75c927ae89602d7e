//! Router configuration.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{predict, root};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/predict", post(predict));
    verity_http::with_request_layers(router).with_state(state)
}
