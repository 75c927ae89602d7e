//! TF-IDF vectorizer with a vocabulary fixed at load time.
//!
//! Mirrors scikit-learn's `TfidfVectorizer.transform` for cleaned text:
//! tokens are whitespace-separated words of at least two characters,
//! n-grams are joined with a single space, term weights are
//! `tf * idf` followed by row normalization.

use crate::artifact::{self, ArtifactError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Tokens shorter than this are ignored (scikit-learn's `\b\w\w+\b`).
const MIN_TOKEN_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

#[derive(Debug, Deserialize)]
struct VectorizerArtifact {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default)]
    binary: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Sparse feature vector; entries are sorted by feature index and non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    pub dim: usize,
    pub entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    feature_names: Vec<String>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    binary: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    /// Unigram, L2-normalized vectorizer.
    pub fn new(vocabulary: HashMap<String, usize>, idf: Vec<f64>) -> Result<Self, ArtifactError> {
        Self::from_artifact(VectorizerArtifact {
            vocabulary,
            idf,
            ngram_range: default_ngram_range(),
            sublinear_tf: false,
            binary: false,
            norm: default_norm(),
        })
    }

    /// Load the vectorizer artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let vectorizer = Self::from_artifact(artifact::load_json(path)?)?;
        tracing::info!(
            path = %path.display(),
            features = vectorizer.dim(),
            ngram_range = ?vectorizer.ngram_range,
            "loaded TF-IDF vectorizer"
        );
        Ok(vectorizer)
    }

    pub fn from_json(raw: &str) -> Result<Self, ArtifactError> {
        let parsed: VectorizerArtifact =
            serde_json::from_str(raw).map_err(|e| ArtifactError::Invalid(e.to_string()))?;
        Self::from_artifact(parsed)
    }

    fn from_artifact(a: VectorizerArtifact) -> Result<Self, ArtifactError> {
        let dim = a.vocabulary.len();
        if a.idf.len() != dim {
            return Err(ArtifactError::Invalid(format!(
                "idf has {} entries but vocabulary has {dim}",
                a.idf.len()
            )));
        }
        let (lo, hi) = a.ngram_range;
        if lo == 0 || lo > hi {
            return Err(ArtifactError::Invalid(format!(
                "bad ngram_range ({lo}, {hi})"
            )));
        }

        let mut feature_names: Vec<Option<String>> = vec![None; dim];
        for (term, &idx) in &a.vocabulary {
            let slot = feature_names.get_mut(idx).ok_or_else(|| {
                ArtifactError::Invalid(format!("term {term:?} has index {idx} >= {dim}"))
            })?;
            if slot.replace(term.clone()).is_some() {
                return Err(ArtifactError::Invalid(format!("duplicate feature index {idx}")));
            }
        }
        // dim slots and dim distinct in-range indices: every slot is filled.
        let feature_names = feature_names.into_iter().flatten().collect();

        Ok(Self {
            vocabulary: a.vocabulary,
            feature_names,
            idf: a.idf,
            ngram_range: a.ngram_range,
            sublinear_tf: a.sublinear_tf,
            binary: a.binary,
            norm: a.norm,
        })
    }

    /// Number of features.
    pub fn dim(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_name(&self, idx: usize) -> Option<&str> {
        self.feature_names.get(idx).map(String::as_str)
    }

    /// Vectorize cleaned text. Out-of-vocabulary terms contribute nothing.
    pub fn transform(&self, text: &str) -> SparseVector {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .collect();

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        let (lo, hi) = self.ngram_range;
        for n in lo..=hi.min(tokens.len()) {
            for window in tokens.windows(n) {
                if let Some(&idx) = self.vocabulary.get(&window.join(" ")) {
                    *counts.entry(idx).or_insert(0.0) += 1.0;
                }
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = if self.binary {
                    1.0
                } else if self.sublinear_tf {
                    1.0 + count.ln()
                } else {
                    count
                };
                (idx, tf * self.idf[idx])
            })
            .collect();

        let norm = match self.norm {
            Some(Norm::L2) => entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt(),
            Some(Norm::L1) => entries.iter().map(|(_, v)| v.abs()).sum::<f64>(),
            None => 1.0,
        };
        if norm > 0.0 {
            for (_, v) in &mut entries {
                *v /= norm;
            }
        }
        entries.retain(|(_, v)| *v != 0.0);

        SparseVector {
            dim: self.dim(),
            entries,
        }
    }
}
