use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use verity_store::{DetectionRecord, HistoryStore, NewDetection};
use verity_text::{Preprocessor, TextClassifier, Verdict, WordImpact};
use verity_vision::{detect_and_annotate, write_replace, AnnotateError, FaceDetector};

#[derive(Parser)]
#[command(name = "verity", about = "Fake-news classification and face detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a news text as FAKE or REAL
    Classify {
        /// Text to classify
        text: String,
        /// Fitted TF-IDF vectorizer (JSON)
        #[arg(long, default_value = "artifacts/tfidf_vectorizer.json")]
        vectorizer: PathBuf,
        /// Fitted linear classifier (JSON)
        #[arg(long, default_value = "artifacts/svm_model.json")]
        classifier: PathBuf,
    },
    /// Detect faces in an image, save the annotated copy and record it
    Detect {
        /// Image file
        image: PathBuf,
        /// Haar cascade XML
        #[arg(long, default_value = "models/haarcascade_frontalface_default.xml")]
        cascade: PathBuf,
        /// Annotated image destination
        #[arg(long, default_value = "output.jpg")]
        output: PathBuf,
        /// History database
        #[arg(long, default_value = "history.db")]
        db: PathBuf,
    },
    /// Show recent detections, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
        /// History database
        #[arg(long, default_value = "history.db")]
        db: PathBuf,
    },
}

#[derive(Serialize)]
struct ClassifyOutput {
    verdict: Verdict,
    confidence: f64,
    decision: f64,
    important_words: Vec<WordImpact>,
    cleaned_text: String,
}

#[derive(Serialize)]
struct DetectOutput {
    #[serde(flatten)]
    record: DetectionRecord,
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            text,
            vectorizer,
            classifier,
        } => print_json(&classify(&text, &vectorizer, &classifier)?),
        Commands::Detect {
            image,
            cascade,
            output,
            db,
        } => print_json(&detect(&image, &cascade, &output, &db)?),
        Commands::History { limit, db } => print_json(&history(limit, &db)?),
    }
}

fn classify(text: &str, vectorizer: &Path, classifier: &Path) -> Result<ClassifyOutput> {
    let model = TextClassifier::load(Preprocessor::default(), vectorizer, classifier)
        .context("failed to load model artifacts")?;
    let p = model.predict(text).map_err(|e| {
        tracing::error!(kind = e.kind(), error = %e, "classification failed");
        e
    })?;
    tracing::debug!(verdict = ?p.verdict, decision = p.decision, "text classified");
    Ok(ClassifyOutput {
        verdict: p.verdict,
        confidence: p.confidence,
        decision: p.decision,
        important_words: p.important_words,
        cleaned_text: p.cleaned_text,
    })
}

/// Same pipeline as `POST /detect-faces`, including the history record.
fn detect(image: &Path, cascade: &Path, output: &Path, db: &Path) -> Result<DetectOutput> {
    let detector = FaceDetector::load(cascade)
        .with_context(|| format!("failed to load cascade {}", cascade.display()))?;
    let store = HistoryStore::open(db)?;
    let bytes = std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;

    let annotated = match detect_and_annotate(&detector, &bytes) {
        Err(AnnotateError::Decode(e)) => {
            anyhow::bail!("Could not read image {}: {e}", image.display())
        }
        other => other?,
    };
    write_replace(output, &annotated.to_jpeg()?)?;
    tracing::info!(
        faces = annotated.face_count(),
        output = %output.display(),
        "annotated image written"
    );

    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let record = store.insert(&NewDetection {
        file_name,
        boxes: annotated.boxes,
    })?;
    tracing::info!(id = record.id, db = %db.display(), "history record stored");

    Ok(DetectOutput {
        record,
        output: output.to_path_buf(),
    })
}

fn history(limit: u32, db: &Path) -> Result<Vec<DetectionRecord>> {
    let records = HistoryStore::open(db)?.recent(limit)?;
    tracing::debug!(limit, returned = records.len(), "history listed");
    Ok(records)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
