//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use verity_store::HistoryStore;
use verity_vision::FaceDetector;

use crate::config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<FaceDetector>,
    pub store: Arc<HistoryStore>,
    /// Single slot holding the most recent annotated image.
    pub output_path: Arc<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        detector: FaceDetector,
        store: HistoryStore,
        output_path: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            detector: Arc::new(detector),
            store: Arc::new(store),
            output_path: Arc::new(output_path),
            max_upload_bytes,
        }
    }

    /// Load the cascade and open the history store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let detector = FaceDetector::load(&config.cascade_path)?;
        tracing::info!(cascade = %config.cascade_path.display(), "face detector ready");
        let store = HistoryStore::open(&config.db_path)?;
        Ok(Self::new(
            detector,
            store,
            config.output_path.clone(),
            config.max_upload_bytes,
        ))
    }
}
