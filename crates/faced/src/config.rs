use std::net::SocketAddr;
use std::path::PathBuf;

/// Default upload cap: 20 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:8001).
    pub bind: SocketAddr,
    /// OpenCV Haar cascade XML.
    pub cascade_path: PathBuf,
    /// SQLite history database.
    pub db_path: PathBuf,
    /// Where the latest annotated image is written.
    pub output_path: PathBuf,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `VERITY_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind: env_addr("VERITY_FACE_BIND", SocketAddr::from(([127, 0, 0, 1], 8001))),
            cascade_path: env_path("VERITY_CASCADE_PATH", "models/haarcascade_frontalface_default.xml"),
            db_path: env_path("VERITY_DB_PATH", "history.db"),
            output_path: env_path("VERITY_OUTPUT_IMAGE", "output.jpg"),
            max_upload_bytes: env_usize("VERITY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_addr(key: &str, default: SocketAddr) -> SocketAddr {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "invalid socket address, using default");
            default
        }),
        Err(_) => default,
    }
}
