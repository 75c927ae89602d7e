//! Loading of serialized model artifacts.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Read a JSON artifact from disk.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}
