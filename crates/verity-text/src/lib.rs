//! verity-text — Fake-news text classification.
//!
//! Cleans raw text (lowercase, letters only, stop words removed, nouns
//! lemmatized), vectorizes it with a pre-fit TF-IDF vocabulary and scores it
//! with an exported linear SVM. Explanations are linear per-term
//! contributions.

pub mod artifact;
pub mod classifier;
pub mod lemma;
pub mod model;
pub mod preprocess;
pub mod types;
pub mod vectorizer;

pub use artifact::ArtifactError;
pub use classifier::LinearClassifier;
pub use lemma::Lemmatizer;
pub use model::{ClassifyError, TextClassifier};
pub use preprocess::Preprocessor;
pub use types::{Prediction, Verdict, WordImpact};
pub use vectorizer::TfidfVectorizer;
