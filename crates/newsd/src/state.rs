//! Application state.

use std::sync::Arc;

use verity_text::lemma::Lemmatizer;
use verity_text::preprocess::{builtin_stopwords, load_stopwords};
use verity_text::{ArtifactError, Preprocessor, TextClassifier};

use crate::config::Config;

/// Shared application state. The classifier is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<TextClassifier>,
}

impl AppState {
    pub fn new(classifier: TextClassifier) -> Self {
        Self {
            classifier: Arc::new(classifier),
        }
    }

    /// Load every artifact named by `config`. Any missing or malformed
    /// artifact is fatal.
    pub fn from_config(config: &Config) -> Result<Self, ArtifactError> {
        let stopwords = match &config.stopwords_path {
            Some(path) => load_stopwords(path)?,
            None => builtin_stopwords(),
        };
        let lemmatizer = match &config.lemma_table_path {
            Some(path) => Lemmatizer::load(path)?,
            None => Lemmatizer::builtin(),
        };
        tracing::info!(
            stopwords = stopwords.len(),
            lemma_vocabulary = lemmatizer.has_vocabulary(),
            "preprocessor ready"
        );

        let classifier = TextClassifier::load(
            Preprocessor::new(stopwords, lemmatizer),
            &config.vectorizer_path,
            &config.classifier_path,
        )?;
        tracing::info!(
            vectorizer = %config.vectorizer_path.display(),
            classifier = %config.classifier_path.display(),
            "model artifacts loaded"
        );

        Ok(Self::new(classifier))
    }
}
