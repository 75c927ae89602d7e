//! End-to-end prediction: clean, vectorize, score, explain.

use crate::artifact::ArtifactError;
use crate::classifier::LinearClassifier;
use crate::preprocess::Preprocessor;
use crate::types::{Prediction, Verdict, WordImpact};
use crate::vectorizer::{SparseVector, TfidfVectorizer};
use std::path::Path;
use thiserror::Error;

/// Decision scores at or beyond this magnitude map to confidence 1.0.
const CONFIDENCE_SCALE: f64 = 5.0;
/// Number of terms reported in an explanation.
const TOP_WORDS: usize = 5;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("vectorization error: {0}")]
    Vectorization(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Vectorization(_) => "vectorization",
            ClassifyError::Model(_) => "model",
            ClassifyError::Unexpected(_) => "unexpected",
        }
    }
}

/// Fake/real news classifier over immutable, pre-fit artifacts.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    preprocessor: Preprocessor,
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
}

impl TextClassifier {
    pub fn new(
        preprocessor: Preprocessor,
        vectorizer: TfidfVectorizer,
        classifier: LinearClassifier,
    ) -> Self {
        Self {
            preprocessor,
            vectorizer,
            classifier,
        }
    }

    /// Load vectorizer and classifier artifacts.
    ///
    /// A dimension mismatch between the two is logged but not fatal: every
    /// prediction then fails with [`ClassifyError::Vectorization`].
    pub fn load(
        preprocessor: Preprocessor,
        vectorizer_path: &Path,
        classifier_path: &Path,
    ) -> Result<Self, ArtifactError> {
        let model = Self::new(
            preprocessor,
            TfidfVectorizer::load(vectorizer_path)?,
            LinearClassifier::load(classifier_path)?,
        );
        if let Err(e) = model.check_dimensions() {
            tracing::warn!(error = %e, "vectorizer and classifier do not match");
        }
        Ok(model)
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn check_dimensions(&self) -> Result<(), ClassifyError> {
        let (features, weights) = (self.vectorizer.dim(), self.classifier.dim());
        if features != weights {
            return Err(ClassifyError::Vectorization(format!(
                "vectorizer produces {features} features but classifier expects {weights}"
            )));
        }
        Ok(())
    }

    /// Classify raw text.
    pub fn predict(&self, text: &str) -> Result<Prediction, ClassifyError> {
        let cleaned_text = self.preprocessor.clean(text);
        let x = self.vectorizer.transform(&cleaned_text);
        self.check_dimensions()?;
        if x.entries.iter().any(|(_, v)| !v.is_finite()) {
            return Err(ClassifyError::Vectorization(
                "non-finite feature weight".to_string(),
            ));
        }

        let decision = self.classifier.decision_function(&x);
        if !decision.is_finite() {
            return Err(ClassifyError::Model(format!(
                "non-finite decision score {decision}"
            )));
        }
        let label = self.classifier.label_for(decision);
        let verdict = Verdict::from_label(label)
            .ok_or_else(|| ClassifyError::Model(format!("unknown class label {label}")))?;
        let confidence = (decision.abs() / CONFIDENCE_SCALE).min(1.0);
        let important_words = self.explain(&x)?;

        tracing::debug!(%decision, ?verdict, terms = x.entries.len(), "classified text");

        Ok(Prediction {
            verdict,
            decision,
            confidence,
            important_words,
            cleaned_text,
        })
    }

    /// Top contributing terms, least important first.
    ///
    /// Contribution is `coef[i] * x[i]`, exact for a linear model.
    fn explain(&self, x: &SparseVector) -> Result<Vec<WordImpact>, ClassifyError> {
        let mut scored = self.classifier.contributions(x);
        scored.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));
        scored.truncate(TOP_WORDS);
        scored.reverse();

        scored
            .into_iter()
            .map(|(idx, impact)| {
                let word = self.vectorizer.feature_name(idx).ok_or_else(|| {
                    ClassifyError::Vectorization(format!("no feature name for index {idx}"))
                })?;
                Ok(WordImpact {
                    word: word.to_string(),
                    impact,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TERMS: [(&str, f64); 8] = [
        ("economy", 1.5),
        ("great", 2.0),
        ("year", 0.5),
        ("hoax", -4.0),
        ("shocking", -2.5),
        ("secret", -1.0),
        ("cure", -3.0),
        ("report", 0.25),
    ];

    fn fixture(intercept: f64) -> TextClassifier {
        let vocab: HashMap<String, usize> =
            TERMS.iter().enumerate().map(|(i, (t, _))| (t.to_string(), i)).collect();
        let vectorizer = TfidfVectorizer::new(vocab, vec![1.0; TERMS.len()]).unwrap();
        let classifier = LinearClassifier::new(TERMS.iter().map(|(_, c)| *c).collect(), intercept);
        TextClassifier::new(Preprocessor::default(), vectorizer, classifier)
    }

    #[test]
    fn test_economy_sentence() {
        let p = fixture(-0.2).predict("The economy is doing great this year").unwrap();
        assert_eq!(p.cleaned_text, "economy great year");
        assert_eq!(p.verdict, Verdict::Real);

        let expected_decision = 4.0 / 3f64.sqrt() - 0.2;
        assert!((p.decision - expected_decision).abs() < 1e-12);
        assert!((p.confidence - expected_decision / 5.0).abs() < 1e-12);

        let words: Vec<&str> = p.important_words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, ["year", "economy", "great"]);
        assert!((p.important_words[2].impact - 2.0 / 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fake_verdict_with_negative_impacts() {
        let p = fixture(0.0).predict("Shocking secret hoax cure!").unwrap();
        assert_eq!(p.verdict, Verdict::Fake);
        assert!(p.important_words.iter().all(|w| w.impact < 0.0));
        assert_eq!(p.important_words.last().unwrap().word, "hoax");
    }

    #[test]
    fn test_empty_text() {
        let p = fixture(-0.2).predict("").unwrap();
        assert_eq!(p.cleaned_text, "");
        assert_eq!(p.verdict, Verdict::Fake);
        assert!((p.confidence - 0.04).abs() < 1e-12);
        assert!(p.important_words.is_empty());
    }

    #[test]
    fn test_confidence_saturates() {
        let p = fixture(40.0).predict("report").unwrap();
        assert_eq!(p.confidence, 1.0);
        let p = fixture(-40.0).predict("report").unwrap();
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn test_at_most_five_words_sorted_ascending() {
        let p = fixture(0.0)
            .predict("economy great year hoax shocking secret cure report")
            .unwrap();
        assert_eq!(p.important_words.len(), 5);
        for pair in p.important_words.windows(2) {
            assert!(pair[0].impact.abs() <= pair[1].impact.abs());
        }
        let words: Vec<&str> = p.important_words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, ["economy", "great", "shocking", "cure", "hoax"]);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let model = fixture(0.1);
        let text = "Secret report: the cure they don't want you to see";
        assert_eq!(model.predict(text).unwrap(), model.predict(text).unwrap());
    }

    #[test]
    fn test_dimension_mismatch_is_vectorization_error() {
        let vocab: HashMap<String, usize> = [("moon".to_string(), 0)].into_iter().collect();
        let model = TextClassifier::new(
            Preprocessor::default(),
            TfidfVectorizer::new(vocab, vec![1.0]).unwrap(),
            LinearClassifier::new(vec![1.0, 2.0], 0.0),
        );
        let err = model.predict("moon landing").unwrap_err();
        assert!(matches!(err, ClassifyError::Vectorization(_)));
        assert_eq!(err.kind(), "vectorization");
    }

    #[test]
    fn test_non_finite_weights_are_vectorization_errors() {
        let vocab: HashMap<String, usize> = [("moon".to_string(), 0)].into_iter().collect();
        let model = TextClassifier::new(
            Preprocessor::default(),
            TfidfVectorizer::new(vocab, vec![f64::NAN]).unwrap(),
            LinearClassifier::new(vec![1.0], 0.0),
        );
        assert!(matches!(model.predict("moon"), Err(ClassifyError::Vectorization(_))));
    }

    #[test]
    fn test_non_finite_score_is_model_error() {
        let vocab: HashMap<String, usize> = [("moon".to_string(), 0)].into_iter().collect();
        let model = TextClassifier::new(
            Preprocessor::default(),
            TfidfVectorizer::new(vocab, vec![1.0]).unwrap(),
            LinearClassifier::new(vec![f64::INFINITY], 0.0),
        );
        let err = model.predict("moon").unwrap_err();
        assert!(matches!(err, ClassifyError::Model(_)));
        // text without known terms never touches the bad coefficient
        assert!(model.predict("sun").is_ok());
    }

    #[test]
    fn test_unknown_class_label_is_model_error() {
        let vocab: HashMap<String, usize> = [("moon".to_string(), 0)].into_iter().collect();
        let classifier: LinearClassifier =
            serde_json::from_str(r#"{"coef": [1.0], "intercept": 1.0, "classes": [0, 7]}"#).unwrap();
        let model = TextClassifier::new(
            Preprocessor::default(),
            TfidfVectorizer::new(vocab, vec![1.0]).unwrap(),
            classifier,
        );
        assert!(matches!(model.predict("moon"), Err(ClassifyError::Model(_))));
    }
}
