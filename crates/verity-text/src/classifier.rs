//! Linear binary classifier (exported linear SVM).

use crate::artifact::{self, ArtifactError};
use crate::vectorizer::SparseVector;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    coef: Vec<f64>,
    intercept: f64,
    /// Class labels; `classes[1]` is predicted for a positive decision score.
    #[serde(default = "default_classes")]
    classes: [i64; 2],
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

impl LinearClassifier {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self {
            coef,
            intercept,
            classes: default_classes(),
        }
    }

    /// Load the classifier artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let model: Self = artifact::load_json(path)?;
        if model.coef.is_empty() {
            return Err(ArtifactError::Invalid(format!(
                "{}: classifier has no coefficients",
                path.display()
            )));
        }
        tracing::info!(
            path = %path.display(),
            features = model.coef.len(),
            classes = ?model.classes,
            "loaded linear classifier"
        );
        Ok(model)
    }

    /// Number of features the model was trained on.
    pub fn dim(&self) -> usize {
        self.coef.len()
    }

    pub fn coefficient(&self, idx: usize) -> Option<f64> {
        self.coef.get(idx).copied()
    }

    /// Signed distance from the separating hyperplane: `coef · x + intercept`.
    ///
    /// The caller guarantees `x.dim == self.dim()`.
    pub fn decision_function(&self, x: &SparseVector) -> f64 {
        x.entries
            .iter()
            .map(|&(i, v)| self.coef[i] * v)
            .sum::<f64>()
            + self.intercept
    }

    pub fn label_for(&self, decision: f64) -> i64 {
        if decision > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        }
    }

    /// Per-feature contribution `coef[i] * x[i]` for every active feature.
    pub fn contributions(&self, x: &SparseVector) -> Vec<(usize, f64)> {
        x.entries
            .iter()
            .map(|&(i, v)| (i, self.coef[i] * v))
            .collect()
    }
}
