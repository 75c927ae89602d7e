use std::net::SocketAddr;
use std::path::PathBuf;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:8000).
    pub bind: SocketAddr,
    /// Fitted TF-IDF vectorizer, JSON.
    pub vectorizer_path: PathBuf,
    /// Fitted linear classifier, JSON.
    pub classifier_path: PathBuf,
    /// Stop-word list replacing the built-in English list.
    pub stopwords_path: Option<PathBuf>,
    /// Lemma table (JSON) enabling vocabulary-checked lemmatization.
    pub lemma_table_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `VERITY_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind: env_addr("VERITY_NEWS_BIND", SocketAddr::from(([127, 0, 0, 1], 8000))),
            vectorizer_path: env_path("VERITY_VECTORIZER_PATH")
                .unwrap_or_else(|| PathBuf::from("artifacts/tfidf_vectorizer.json")),
            classifier_path: env_path("VERITY_CLASSIFIER_PATH")
                .unwrap_or_else(|| PathBuf::from("artifacts/svm_model.json")),
            stopwords_path: env_path("VERITY_STOPWORDS_PATH"),
            lemma_table_path: env_path("VERITY_LEMMA_TABLE_PATH"),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_addr_falls_back_on_garbage() {
        std::env::set_var("VERITY_TEST_NEWS_BIND", "not-an-address");
        let addr = env_addr("VERITY_TEST_NEWS_BIND", SocketAddr::from(([127, 0, 0, 1], 8000)));
        assert_eq!(addr.port(), 8000);
        std::env::remove_var("VERITY_TEST_NEWS_BIND");
    }

    #[test]
    fn test_empty_path_is_unset() {
        std::env::set_var("VERITY_TEST_STOPWORDS", "");
        assert!(env_path("VERITY_TEST_STOPWORDS").is_none());
        std::env::remove_var("VERITY_TEST_STOPWORDS");
    }
}
