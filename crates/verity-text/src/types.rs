use serde::{Deserialize, Serialize};

/// Verdict reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fake,
    Real,
    Error,
}

impl Verdict {
    /// Class label 0 is fake news, 1 is real news.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(Verdict::Fake),
            1 => Some(Verdict::Real),
            _ => None,
        }
    }
}

/// A vocabulary term and its signed contribution to the decision score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordImpact {
    pub word: String,
    pub impact: f64,
}

/// Outcome of a successful classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub verdict: Verdict,
    /// Raw decision-function score.
    pub decision: f64,
    /// `min(|decision| / 5, 1)`.
    pub confidence: f64,
    /// Up to five terms, least important first.
    pub important_words: Vec<WordImpact>,
    pub cleaned_text: String,
}
