//! faced — HTTP front end for face detection and detection history.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
