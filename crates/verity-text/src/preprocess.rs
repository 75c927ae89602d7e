//! Text normalization ahead of vectorization.

use crate::artifact::{self, ArtifactError};
use crate::lemma::Lemmatizer;
use std::collections::HashSet;
use std::path::Path;

const STOPWORDS_EN: &str = include_str!("../data/stopwords_en.txt");

/// The embedded English stop-word list.
pub fn builtin_stopwords() -> HashSet<String> {
    parse_stopwords(STOPWORDS_EN)
}

/// Load a newline-separated stop-word file. Blank lines and `#` comments are skipped.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>, ArtifactError> {
    let raw = artifact::read_to_string(path)?;
    let words = parse_stopwords(&raw);
    if words.is_empty() {
        return Err(ArtifactError::Invalid(format!(
            "stop-word file {} is empty",
            path.display()
        )));
    }
    tracing::info!(path = %path.display(), count = words.len(), "loaded stop words");
    Ok(words)
}

fn parse_stopwords(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

/// Lowercases, strips non-letters, drops stop words and lemmatizes.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    stopwords: HashSet<String>,
    lemmatizer: Lemmatizer,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(builtin_stopwords(), Lemmatizer::builtin())
    }
}

impl Preprocessor {
    pub fn new(stopwords: HashSet<String>, lemmatizer: Lemmatizer) -> Self {
        Self {
            stopwords,
            lemmatizer,
        }
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Produce the cleaned token string. Never fails; may return `""`.
    ///
    /// A lemma that lands on a stop word is dropped as well, so the output
    /// never contains one.
    pub fn clean(&self, text: &str) -> String {
        let letters: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_lowercase() || c.is_whitespace() { c } else { ' ' })
            .collect();

        letters
            .split_whitespace()
            .filter(|w| !self.is_stopword(w))
            .map(|w| self.lemmatizer.lemmatize(w))
            .filter(|w| !self.is_stopword(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
